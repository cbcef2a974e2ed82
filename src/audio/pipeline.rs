//! Microphone acquisition and volume monitoring
//!
//! `AudioCapturePipeline` owns at most one `AudioDeviceHandle`. While a handle
//! is live a sampler task reads the device's signal tap on a fixed interval and
//! publishes `VolumeSample`s; stopping the pipeline cancels the sampler and
//! releases the handle in the same call. A sampler that ends on its own
//! releases the handle itself.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::analyser::{volume_level, SpectrumAnalyser, DEFAULT_MAX_DECIBELS, DEFAULT_MIN_DECIBELS};
use super::backend::{CaptureConfig, DeviceStream, MicrophoneSource, SignalTap};
use super::error::CaptureError;

/// Volume monitoring parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u64,
    /// Multiplier applied to the mean magnitude percentage
    pub visibility_scale: f32,
    /// Analysis window in samples (bins = fft_size / 2)
    pub fft_size: usize,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            visibility_scale: 2.0,
            fft_size: 256,
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// One loudness reading, 0..=100
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeSample {
    pub level: f32,
    pub timestamp: DateTime<Utc>,
}

/// Spectrum analyser plus scaling: window of samples in, loudness out
pub struct VolumeMeter {
    analyser: SpectrumAnalyser,
    visibility_scale: f32,
    bins: Vec<u8>,
}

impl VolumeMeter {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            analyser: SpectrumAnalyser::new(
                config.fft_size,
                config.min_decibels,
                config.max_decibels,
            ),
            visibility_scale: config.visibility_scale,
            bins: Vec::new(),
        }
    }

    pub fn measure(&mut self, window: &[f32]) -> f32 {
        self.analyser.frequency_data(window, &mut self.bins);
        volume_level(&self.bins, self.visibility_scale)
    }
}

/// Exclusive ownership of one open microphone stream
pub struct AudioDeviceHandle {
    stream: Box<dyn DeviceStream>,
    source: String,
    acquired_at: DateTime<Utc>,
    released: bool,
}

impl AudioDeviceHandle {
    fn new(stream: Box<dyn DeviceStream>, source: &str) -> Self {
        Self {
            stream,
            source: source.to_string(),
            acquired_at: Utc::now(),
            released: false,
        }
    }

    pub fn tap(&self) -> SignalTap {
        self.stream.tap()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn is_live(&self) -> bool {
        !self.released && self.stream.is_live()
    }

    /// Stop all tracks and close the context.
    ///
    /// Both steps always run; the first failure is returned. Calling it again
    /// is a no-op.
    pub fn release(&mut self) -> Result<(), CaptureError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let tracks = self.stream.stop_tracks();
        if let Err(e) = &tracks {
            error!("Failed to stop {} tracks: {}", self.source, e);
        }

        let context = self.stream.close();
        if let Err(e) = &context {
            error!("Failed to close {} context: {}", self.source, e);
        }

        info!("Released {} microphone", self.source);
        tracks.and(context)
    }
}

impl Drop for AudioDeviceHandle {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// The monitored handle, shared with its sampler so either side can release it
type DeviceSlot = Arc<Mutex<Option<AudioDeviceHandle>>>;

/// Acquires a microphone and reports its loudness at a fixed interval
pub struct AudioCapturePipeline {
    source: Arc<dyn MicrophoneSource>,
    capture: CaptureConfig,
    monitor: MonitorConfig,
    samples: mpsc::Sender<VolumeSample>,
    device: DeviceSlot,
    sampler: Option<JoinHandle<()>>,
}

impl AudioCapturePipeline {
    pub fn new(
        source: Arc<dyn MicrophoneSource>,
        capture: CaptureConfig,
        monitor: MonitorConfig,
        samples: mpsc::Sender<VolumeSample>,
    ) -> Self {
        info!(
            "Audio pipeline using {} source ({}Hz, {} ch, every {}ms)",
            source.name(),
            capture.sample_rate,
            capture.channels,
            monitor.interval_ms
        );

        Self {
            source,
            capture,
            monitor,
            samples,
            device: Arc::new(Mutex::new(None)),
            sampler: None,
        }
    }

    /// Request microphone access.
    pub async fn acquire(&self) -> Result<AudioDeviceHandle, CaptureError> {
        if self.is_acquired() {
            return Err(CaptureError::AlreadyAcquired);
        }

        info!("Requesting microphone from {} source", self.source.name());
        let stream = self
            .source
            .open(&self.capture, self.monitor.fft_size)
            .await
            .map_err(|e| {
                warn!("Microphone acquisition failed: {}", e);
                e
            })?;

        Ok(AudioDeviceHandle::new(stream, self.source.name()))
    }

    /// Take ownership of `handle` and begin sampling its volume.
    ///
    /// Any previously monitored handle is released first. If the sampler
    /// exits on its own (the sample consumer went away) it releases the
    /// handle before finishing.
    pub fn start_monitoring(&mut self, handle: AudioDeviceHandle) {
        if self.sampler.is_some() || self.is_acquired() {
            if let Err(e) = self.stop() {
                warn!("Audio release reported an error: {}", e);
            }
        }

        let tap = handle.tap();
        let meter = VolumeMeter::new(&self.monitor);
        *self.device.lock() = Some(handle);

        let sampler = spawn_sampler(
            tap,
            meter,
            self.monitor.interval(),
            self.samples.clone(),
            Arc::clone(&self.device),
        );
        self.sampler = Some(sampler);

        info!("Volume monitoring started ({}ms)", self.monitor.interval_ms);
    }

    /// Acquire and start monitoring. No-op when already active.
    pub async fn start(&mut self) -> Result<(), CaptureError> {
        if self.is_active() {
            debug!("Audio pipeline already active");
            return Ok(());
        }
        // Leftovers of a sampler that exited on its own
        if let Err(e) = self.stop() {
            warn!("Audio release reported an error: {}", e);
        }

        let handle = self.acquire().await?;
        self.start_monitoring(handle);
        Ok(())
    }

    /// Cancel the sampler and release the device.
    ///
    /// Idempotent. The pipeline always ends with no timer and no handle, even
    /// when a release step reports an error.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(sampler) = self.sampler.take() {
            sampler.abort();
            debug!("Volume sampler cancelled");
        }

        let handle = self.device.lock().take();
        match handle {
            Some(mut handle) => handle.release(),
            None => Ok(()),
        }
    }

    /// A handle is live and its sampler is still running
    pub fn is_active(&self) -> bool {
        self.is_acquired()
            && self
                .sampler
                .as_ref()
                .is_some_and(|sampler| !sampler.is_finished())
    }

    pub fn is_acquired(&self) -> bool {
        self.device.lock().is_some()
    }
}

impl Drop for AudioCapturePipeline {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn spawn_sampler(
    tap: SignalTap,
    mut meter: VolumeMeter,
    period: Duration,
    samples: mpsc::Sender<VolumeSample>,
    device: DeviceSlot,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the first reading comes one period in
        ticker.tick().await;

        let mut window = Vec::with_capacity(tap.capacity());
        loop {
            ticker.tick().await;
            tap.snapshot(&mut window);
            let sample = VolumeSample {
                level: meter.measure(&window),
                timestamp: Utc::now(),
            };

            match samples.try_send(sample) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Volume consumer lagging, dropping sample");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Volume consumer gone, sampler exiting");
                    break;
                }
            }
        }

        // Monitoring ended without a stop(); the device must not outlive it
        let handle = device.lock().take();
        if let Some(mut handle) = handle {
            if let Err(e) = handle.release() {
                warn!("Audio release reported an error: {}", e);
            }
        }
    })
}
