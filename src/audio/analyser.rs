//! Frequency-domain analysis of the live microphone signal
//!
//! `SpectrumAnalyser` turns the most recent `fft_size` samples into
//! `fft_size / 2` byte magnitudes (0..=255) on a decibel scale, and
//! `volume_level` reduces those magnitudes to a single loudness percentage.

use std::f32::consts::PI;

/// Default decibel floor mapped to magnitude 0
pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
/// Default decibel ceiling mapped to magnitude 255
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

/// Largest representable bin magnitude
pub const MAX_MAGNITUDE: f32 = u8::MAX as f32;

pub struct SpectrumAnalyser {
    fft_size: usize,
    min_decibels: f32,
    max_decibels: f32,
    /// Blackman window coefficients
    window: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    windowed: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize, min_decibels: f32, max_decibels: f32) -> Self {
        let fft_size = fft_size.max(2);
        let n = fft_size as f32;

        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos_table = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).cos()).collect();
        let sin_table = (0..fft_size).map(|i| (2.0 * PI * i as f32 / n).sin()).collect();

        Self {
            fft_size,
            min_decibels,
            max_decibels,
            window,
            cos_table,
            sin_table,
            windowed: vec![0.0; fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced per analysis
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Compute byte magnitudes for one window of time-domain samples.
    ///
    /// `samples` must hold `fft_size` values; shorter input is zero-padded and
    /// longer input is truncated to its most recent `fft_size` values.
    pub fn frequency_data(&mut self, samples: &[f32], bins: &mut Vec<u8>) {
        let n = self.fft_size;
        let start = samples.len().saturating_sub(n);
        let recent = &samples[start..];
        let pad = n - recent.len();

        for (i, slot) in self.windowed.iter_mut().enumerate() {
            let s = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = s * self.window[i];
        }

        bins.clear();
        let range = self.max_decibels - self.min_decibels;
        for k in 0..self.bin_count() {
            let mut re = 0.0f32;
            let mut im = 0.0f32;
            for (j, &x) in self.windowed.iter().enumerate() {
                let idx = (k * j) % n;
                re += x * self.cos_table[idx];
                im -= x * self.sin_table[idx];
            }
            let magnitude = (re * re + im * im).sqrt() / n as f32;
            let db = 20.0 * magnitude.log10();

            let scaled = if db.is_finite() && range > 0.0 {
                ((db - self.min_decibels) / range * MAX_MAGNITUDE).clamp(0.0, MAX_MAGNITUDE)
            } else {
                0.0
            };
            bins.push(scaled as u8);
        }
    }
}

/// Reduce byte magnitudes to a loudness percentage in `[0, 100]`.
///
/// Mean magnitude, normalized against `MAX_MAGNITUDE`, multiplied by
/// `visibility_scale` so ordinary speech fills more of the meter.
pub fn volume_level(bins: &[u8], visibility_scale: f32) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }

    let sum: u64 = bins.iter().map(|&b| b as u64).sum();
    let average = sum as f32 / bins.len() as f32;
    let level = average / MAX_MAGNITUDE * 100.0 * visibility_scale;

    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_no_energy() {
        let mut analyser = SpectrumAnalyser::new(256, DEFAULT_MIN_DECIBELS, DEFAULT_MAX_DECIBELS);
        let mut bins = Vec::new();
        analyser.frequency_data(&[0.0; 256], &mut bins);

        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(256, DEFAULT_MIN_DECIBELS, DEFAULT_MAX_DECIBELS);
        // Exactly 16 cycles per window lands on bin 16
        let samples: Vec<f32> = (0..256)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / 256.0).sin() * 0.5)
            .collect();
        let mut bins = Vec::new();
        analyser.frequency_data(&samples, &mut bins);

        assert_eq!(bins[16], 255);
        assert!(bins[64] < 50, "far bin should be quiet, got {}", bins[64]);
        assert!(bins[16] >= bins[18]);
    }

    #[test]
    fn short_input_is_padded() {
        let mut analyser = SpectrumAnalyser::new(64, DEFAULT_MIN_DECIBELS, DEFAULT_MAX_DECIBELS);
        let mut bins = Vec::new();
        analyser.frequency_data(&[0.25; 10], &mut bins);
        assert_eq!(bins.len(), 32);
    }

    #[test]
    fn tiny_window_is_widened() {
        let analyser = SpectrumAnalyser::new(0, DEFAULT_MIN_DECIBELS, DEFAULT_MAX_DECIBELS);
        assert_eq!(analyser.fft_size(), 2);
        assert_eq!(analyser.bin_count(), 1);
    }

    #[test]
    fn level_of_empty_bins_is_zero() {
        assert_eq!(volume_level(&[], 2.0), 0.0);
    }

    #[test]
    fn level_doubles_mean_percentage() {
        // mean 51 -> 20% -> x2 = 40%
        let level = volume_level(&[51; 128], 2.0);
        assert!((level - 40.0).abs() < 1e-4);
    }
}
