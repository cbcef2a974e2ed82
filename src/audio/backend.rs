use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::error::CaptureError;

/// Constraints requested when opening a microphone
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Requested channel count (1 = mono)
    pub channels: u16,
    /// Ask the device for echo cancellation when it supports it
    pub echo_cancellation: bool,
    /// Ask the device for noise suppression when it supports it
    pub noise_suppression: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz speech
            channels: 1,        // Mono
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Rolling window of the most recent mono samples written by a device.
///
/// The device side pushes samples (often from a real-time callback thread)
/// and the analysis side takes snapshots. Samples are `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SignalTap {
    window: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl SignalTap {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append samples, discarding the oldest ones past capacity
    pub fn push(&self, samples: &[f32]) {
        let mut window = self.window.lock();
        let skip = samples.len().saturating_sub(self.capacity);
        for &s in &samples[skip..] {
            if window.len() == self.capacity {
                window.pop_front();
            }
            window.push_back(s);
        }
    }

    /// Copy the current window into `out`, zero-padding at the front when the
    /// device has not produced a full window yet.
    pub fn snapshot(&self, out: &mut Vec<f32>) {
        let window = self.window.lock();
        out.clear();
        out.resize(self.capacity - window.len(), 0.0);
        out.extend(window.iter().copied());
    }

    pub fn clear(&self) {
        self.window.lock().clear();
    }
}

/// An open microphone stream.
///
/// Release happens in two independent steps so a failure in one never skips
/// the other.
pub trait DeviceStream: Send {
    /// Tap carrying the live signal
    fn tap(&self) -> SignalTap;

    /// Stop every track on the stream
    fn stop_tracks(&mut self) -> Result<(), CaptureError>;

    /// Close the processing context backing the stream
    fn close(&mut self) -> Result<(), CaptureError>;

    /// Whether any track is still producing samples
    fn is_live(&self) -> bool;
}

/// Microphone source trait
///
/// Implementations:
/// - `SyntheticSource`: signal generator and scripted failures
/// - `WavSource`: replays a WAV file as microphone input
/// - `CpalSource` (feature `cpal`): system default input device
#[async_trait]
pub trait MicrophoneSource: Send + Sync {
    /// Request device access with the given constraints.
    ///
    /// `window` is the number of samples the returned stream's tap must hold.
    async fn open(
        &self,
        config: &CaptureConfig,
        window: usize,
    ) -> Result<Box<dyn DeviceStream>, CaptureError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_keeps_most_recent_samples() {
        let tap = SignalTap::new(4);
        tap.push(&[0.1, 0.2, 0.3]);
        tap.push(&[0.4, 0.5, 0.6]);

        let mut out = Vec::new();
        tap.snapshot(&mut out);
        assert_eq!(out, vec![0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn tap_pads_partial_window() {
        let tap = SignalTap::new(4);
        tap.push(&[0.5]);

        let mut out = Vec::new();
        tap.snapshot(&mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn oversized_push_keeps_tail() {
        let tap = SignalTap::new(2);
        tap.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let mut out = Vec::new();
        tap.snapshot(&mut out);
        assert_eq!(out, vec![4.0, 5.0]);
    }
}
