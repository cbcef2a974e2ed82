pub mod client;
pub mod messages;
pub mod policy;

pub use client::{ChannelError, ChannelEvent, ChannelSender, EventSink, MessageChannel};
pub use messages::{
    Envelope, InboundEvent, MessageError, OutboundEvent, SceneRoleConfirmed, SceneRoleSelection,
    SessionStatus, Speaker, TranscriptionUpdate, TranslationUpdate,
};
pub use policy::{ConnectionState, ConnectionStatus, ReconnectPolicy};
