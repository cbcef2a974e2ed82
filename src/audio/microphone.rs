// System microphone backend using cpal
//
// The cpal stream is not `Send` on every host, so it lives on a dedicated
// capture thread. The thread owns the stream until `running` clears, then drops
// it, which stops the device.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::backend::{CaptureConfig, DeviceStream, MicrophoneSource, SignalTap};
use super::error::CaptureError;

/// Default input device of the default cpal host.
///
/// cpal exposes no echo cancellation or noise suppression controls; those
/// constraints are logged and otherwise ignored.
pub struct CpalSource;

impl CpalSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MicrophoneSource for CpalSource {
    async fn open(
        &self,
        config: &CaptureConfig,
        window: usize,
    ) -> Result<Box<dyn DeviceStream>, CaptureError> {
        if config.echo_cancellation || config.noise_suppression {
            info!("cpal backend: echo cancellation / noise suppression left to the OS");
        }

        let tap = SignalTap::new(window);
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_tap = tap.clone();
        let thread_running = Arc::clone(&running);
        let requested = config.clone();
        let handle = thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || capture_thread(requested, thread_tap, thread_running, ready_tx))
            .map_err(|e| CaptureError::unavailable(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                tap,
                running,
                thread: Some(handle),
            })),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(CaptureError::unavailable("capture thread exited before start")),
        }
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

fn capture_thread(
    requested: CaptureConfig,
    tap: SignalTap,
    running: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), CaptureError>>,
) {
    let stream = match build_stream(&requested, tap) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(map_error(e.to_string())));
        return;
    }

    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    info!("Microphone stream closed");
}

fn build_stream(requested: &CaptureConfig, tap: SignalTap) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::unavailable("no default input device"))?;

    let name = device.name().unwrap_or_else(|_| "unknown".into());
    let supported = device
        .default_input_config()
        .map_err(|e| map_error(e.to_string()))?;

    let channels = supported.channels().max(1) as usize;
    let format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    info!(
        "Opening input device '{}' ({}Hz, {} channels, {:?}); requested {}Hz mono",
        name, stream_config.sample_rate.0, channels, format, requested.sample_rate
    );

    let on_error = |e: cpal::StreamError| error!("Microphone stream error: {}", e);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(&tap, data, channels, |s| s)
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(&tap, data, channels, |s| s as f32 / i16::MAX as f32)
            },
            on_error,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                push_mono(&tap, data, channels, |s| (s as f32 - 32768.0) / 32768.0)
            },
            on_error,
            None,
        ),
        other => {
            warn!("Unsupported sample format {:?}", other);
            return Err(CaptureError::unavailable(format!("unsupported sample format {:?}", other)));
        }
    };

    stream.map_err(|e| map_error(e.to_string()))
}

fn push_mono<T: Copy>(tap: &SignalTap, data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) {
    let mono: Vec<f32> = data
        .chunks(channels)
        .map(|frame| frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32)
        .collect();
    tap.push(&mono);
}

/// cpal has no dedicated permission error; hosts report it in the message text
fn map_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

struct CpalStream {
    tap: SignalTap,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DeviceStream for CpalStream {
    fn tap(&self) -> SignalTap {
        self.tap.clone()
    }

    fn stop_tracks(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        self.tap.clear();
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| CaptureError::ReleaseFailed("capture thread panicked".into()))?;
        }
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
