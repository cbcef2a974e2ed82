pub mod analyser;
pub mod backend;
pub mod error;
pub mod file;
pub mod pipeline;
pub mod synthetic;

#[cfg(feature = "cpal")]
pub mod microphone;

pub use analyser::{volume_level, SpectrumAnalyser};
pub use backend::{CaptureConfig, DeviceStream, MicrophoneSource, SignalTap};
pub use error::CaptureError;
pub use file::{AudioClip, WavSource};
pub use pipeline::{AudioCapturePipeline, AudioDeviceHandle, MonitorConfig, VolumeMeter, VolumeSample};
pub use synthetic::{Signal, SyntheticSource};

#[cfg(feature = "cpal")]
pub use microphone::CpalSource;
