use thiserror::Error;

/// Errors raised while acquiring or releasing a microphone.
///
/// None of these are fatal: the pipeline stays in its "not acquired" state and
/// the caller decides how to surface the failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("microphone already acquired")]
    AlreadyAcquired,

    #[error("release step failed: {0}")]
    ReleaseFailed(String),
}

impl CaptureError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable(reason.into())
    }
}
