//! Session management
//!
//! This module provides the `SessionController` state machine that:
//! - Validates scene/role choices and forwards them to the backend
//! - Applies the backend's confirmations and session status updates
//! - Starts and stops volume monitoring with the session
//! - Keeps the in-memory conversation history
//! - Reports every change to the presentation layer as a notification

mod controller;
mod error;
mod events;
mod state;
mod transcript;

pub use controller::SessionController;
pub use error::ValidationError;
pub use events::{SessionNotification, StartRequest, UserIntent};
pub use state::{Phase, RoleSelection, Session};
pub use transcript::{ConversationLog, ConversationMessage};
