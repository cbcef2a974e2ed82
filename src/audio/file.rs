use async_trait::async_trait;
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{CaptureConfig, DeviceStream, MicrophoneSource, SignalTap};
use super::error::CaptureError;

/// Decoded WAV clip, downmixed to mono `f32`
pub struct AudioClip {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .map_err(|e| CaptureError::unavailable(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let interleaved: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::unavailable(format!("failed to read samples: {}", e)))?;

        let channels = spec.channels.max(1);
        let samples: Vec<f32> = interleaved
            .chunks(channels as usize)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum();
                sum / frame.len() as f32
            })
            .collect();

        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} frames",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}

/// Microphone source that replays a WAV file in a loop
pub struct WavSource {
    path: PathBuf,
}

impl WavSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MicrophoneSource for WavSource {
    async fn open(
        &self,
        config: &CaptureConfig,
        window: usize,
    ) -> Result<Box<dyn DeviceStream>, CaptureError> {
        let clip = AudioClip::open(&self.path)?;
        if clip.samples.is_empty() {
            return Err(CaptureError::unavailable(format!("{} has no samples", clip.path)));
        }
        if clip.sample_rate != config.sample_rate {
            warn!(
                "{} is {}Hz, requested {}Hz; replaying at file rate",
                clip.path, clip.sample_rate, config.sample_rate
            );
        }

        let tap = SignalTap::new(window);
        let running = Arc::new(AtomicBool::new(true));
        let player = spawn_player(clip, tap.clone(), Arc::clone(&running));

        Ok(Box::new(WavStream {
            tap,
            running,
            player: Some(player),
        }))
    }

    fn name(&self) -> &str {
        "wav"
    }
}

fn spawn_player(clip: AudioClip, tap: SignalTap, running: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        // 10ms blocks at the file's own rate
        let block = (clip.sample_rate / 100).max(1) as usize;
        let mut ticker = tokio::time::interval(Duration::from_millis(10));
        let mut cursor = 0usize;

        while running.load(Ordering::SeqCst) {
            let end = (cursor + block).min(clip.samples.len());
            tap.push(&clip.samples[cursor..end]);
            cursor = if end == clip.samples.len() { 0 } else { end };
            ticker.tick().await;
        }
    })
}

struct WavStream {
    tap: SignalTap,
    running: Arc<AtomicBool>,
    player: Option<JoinHandle<()>>,
}

impl DeviceStream for WavStream {
    fn tap(&self) -> SignalTap {
        self.tap.clone()
    }

    fn stop_tracks(&mut self) -> Result<(), CaptureError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(player) = self.player.take() {
            player.abort();
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CaptureError> {
        self.tap.clear();
        Ok(())
    }

    fn is_live(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
