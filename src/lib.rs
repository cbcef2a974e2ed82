pub mod app;
pub mod audio;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod console;
pub mod http;
pub mod session;

pub use app::{AppContext, Presenter};
pub use audio::{
    AudioCapturePipeline, CaptureConfig, CaptureError, MicrophoneSource, MonitorConfig,
    SyntheticSource, VolumeSample, WavSource,
};
pub use catalog::{Scene, SceneCatalog};
pub use channel::{ChannelEvent, ConnectionState, InboundEvent, MessageChannel, OutboundEvent, ReconnectPolicy};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{Phase, SessionController, SessionNotification, StartRequest, UserIntent};
