// Synthetic microphone source
//
// Generates a test signal on a background tokio task instead of reading a real
// device. Also scripts acquisition failures so the permission and
// device-missing paths can be exercised without hardware.

use async_trait::async_trait;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{CaptureConfig, DeviceStream, MicrophoneSource, SignalTap};
use super::error::CaptureError;

/// Signal produced by a `SyntheticSource`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    /// All-zero samples
    Silence,
    /// Sine tone
    Tone { frequency_hz: f32, amplitude: f32 },
    /// Full-scale square wave
    Saturated { frequency_hz: f32 },
    /// Uniform white noise
    Noise { amplitude: f32 },
}

impl Signal {
    fn sample(&self, index: u64, sample_rate: u32, rng: &mut u32) -> f32 {
        let t = index as f32 / sample_rate.max(1) as f32;
        match *self {
            Signal::Silence => 0.0,
            Signal::Tone {
                frequency_hz,
                amplitude,
            } => (2.0 * PI * frequency_hz * t).sin() * amplitude,
            Signal::Saturated { frequency_hz } => {
                if (2.0 * PI * frequency_hz * t).sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            Signal::Noise { amplitude } => {
                // xorshift32
                *rng ^= *rng << 13;
                *rng ^= *rng >> 17;
                *rng ^= *rng << 5;
                (*rng as f32 / u32::MAX as f32 * 2.0 - 1.0) * amplitude
            }
        }
    }
}

/// What `open` does
#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Grant(Signal),
    Deny,
    Missing,
}

/// Synthetic microphone
pub struct SyntheticSource {
    acquisition: Acquisition,
    /// Fails the stop-tracks step on release, to exercise partial release
    fail_stop_tracks: bool,
    opened: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn new(signal: Signal) -> Self {
        Self {
            acquisition: Acquisition::Grant(signal),
            fail_stop_tracks: false,
            opened: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Source whose permission prompt is always declined
    pub fn denied() -> Self {
        Self {
            acquisition: Acquisition::Deny,
            ..Self::new(Signal::Silence)
        }
    }

    /// Source with no input device attached
    pub fn missing() -> Self {
        Self {
            acquisition: Acquisition::Missing,
            ..Self::new(Signal::Silence)
        }
    }

    pub fn with_failing_stop(mut self) -> Self {
        self.fail_stop_tracks = true;
        self
    }

    /// Shared flag that is true while a stream from this source is open.
    ///
    /// Lets tests observe the device from outside the pipeline.
    pub fn open_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.opened)
    }
}

#[async_trait]
impl MicrophoneSource for SyntheticSource {
    async fn open(
        &self,
        config: &CaptureConfig,
        window: usize,
    ) -> Result<Box<dyn DeviceStream>, CaptureError> {
        let signal = match &self.acquisition {
            Acquisition::Grant(signal) => *signal,
            Acquisition::Deny => return Err(CaptureError::PermissionDenied),
            Acquisition::Missing => {
                return Err(CaptureError::unavailable("no synthetic input device"))
            }
        };

        if self.opened.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::AlreadyAcquired);
        }

        info!("Synthetic microphone opened ({:?}, {}Hz)", signal, config.sample_rate);

        let tap = SignalTap::new(window);
        let running = Arc::new(AtomicBool::new(true));
        let generator = spawn_generator(signal, config.sample_rate, tap.clone(), Arc::clone(&running));

        Ok(Box::new(SyntheticStream {
            tap,
            running,
            generator: Some(generator),
            opened: Arc::clone(&self.opened),
            fail_stop_tracks: self.fail_stop_tracks,
        }))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Produce 10ms blocks of signal until `running` clears
fn spawn_generator(
    signal: Signal,
    sample_rate: u32,
    tap: SignalTap,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let block = (sample_rate / 100).max(1) as usize;
        let mut index: u64 = 0;
        let mut rng: u32 = 0x9E37_79B9;
        let mut buf = vec![0.0f32; block];
        let mut ticker = tokio::time::interval(Duration::from_millis(10));

        while running.load(Ordering::SeqCst) {
            for slot in buf.iter_mut() {
                *slot = signal.sample(index, sample_rate, &mut rng);
                index += 1;
            }
            tap.push(&buf);
            ticker.tick().await;
        }
        debug!("Synthetic generator stopped after {} samples", index);
    })
}

struct SyntheticStream {
    tap: SignalTap,
    running: Arc<AtomicBool>,
    generator: Option<JoinHandle<()>>,
    opened: Arc<AtomicBool>,
    fail_stop_tracks: bool,
}

impl DeviceStream for SyntheticStream {
    fn tap(&self) -> SignalTap {
        self.tap.clone()
    }

    fn stop_tracks(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(generator) = self.generator.take() {
            generator.abort();
        }
        if self.fail_stop_tracks {
            return Err(CaptureError::ReleaseFailed("synthetic track refused to stop".into()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.tap.clear();
        self.opened.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
