//! Output-side spectrum for visualizers.
//!
//! The mixer copies every rendered block into a [`FrequencyTap`]; a UI thread
//! turns the most recent window into byte magnitudes with [`SpectrumAnalyser`],
//! which follows the Web Audio analyser conventions (Blackman window, temporal
//! smoothing, decibel range mapped onto 0..=255). Reading the tap never touches
//! session state.

use crate::lock_or_recover;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;

#[derive(Debug)]
struct TapRing {
    samples: VecDeque<f32>,
    capacity: usize,
}

/// Shared ring holding the last `capacity` rendered output samples.
#[derive(Debug, Clone)]
pub struct FrequencyTap {
    ring: Arc<Mutex<TapRing>>,
}

impl FrequencyTap {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            ring: Arc::new(Mutex::new(TapRing {
                samples: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    pub fn capacity(&self) -> usize {
        lock_or_recover(&self.ring, "frequency_tap").capacity
    }

    pub fn push(&self, samples: &[f32]) {
        let mut ring = lock_or_recover(&self.ring, "frequency_tap");
        let capacity = ring.capacity;
        let tail = &samples[samples.len().saturating_sub(capacity)..];
        ring.samples.extend(tail.iter().copied());
        let excess = ring.samples.len().saturating_sub(capacity);
        ring.samples.drain(..excess);
    }

    /// Oldest-first copy of the window, zero-padded at the front until full.
    pub fn snapshot(&self) -> Vec<f32> {
        let ring = lock_or_recover(&self.ring, "frequency_tap");
        let mut out = vec![0.0; ring.capacity - ring.samples.len()];
        out.extend(ring.samples.iter().copied());
        out
    }

    pub fn clear(&self) {
        lock_or_recover(&self.ring, "frequency_tap").samples.clear();
    }
}

pub struct SpectrumAnalyser {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    smoothed: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let spectrum = fft.make_output_vec();
        Self {
            fft,
            fft_size,
            window: blackman_window(fft_size),
            smoothing: smoothing.clamp(0.0, 1.0),
            min_db: DEFAULT_MIN_DECIBELS,
            max_db: DEFAULT_MAX_DECIBELS,
            smoothed: vec![0.0; fft_size / 2],
            input: vec![0.0; fft_size],
            spectrum,
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn byte_frequency_data(&mut self, tap: &FrequencyTap) -> Vec<u8> {
        let window = tap.snapshot();
        self.analyse(&window)
    }

    /// Analyse the newest `fft_size` samples of `samples`.
    pub fn analyse(&mut self, samples: &[f32]) -> Vec<u8> {
        let n = self.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let offset = n - tail.len();
        self.input[..offset].fill(0.0);
        for (i, sample) in tail.iter().enumerate() {
            self.input[offset + i] = sample * self.window[offset + i];
        }

        if let Err(err) = self.fft.process(&mut self.input, &mut self.spectrum) {
            crate::log_debug(&format!("spectrum fft failed: {err}"));
            return vec![0; self.frequency_bin_count()];
        }

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        for (bin, value) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.spectrum[bin].norm() * scale;
            *value = tau * *value + (1.0 - tau) * magnitude;
        }

        let range = self.max_db - self.min_db;
        self.smoothed
            .iter()
            .map(|value| {
                let db = 20.0 * value.log10();
                let scaled = (255.0 / range) * (db - self.min_db);
                scaled.clamp(0.0, 255.0).floor() as u8
            })
            .collect()
    }
}

fn blackman_window(n: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let two_pi = 2.0 * std::f32::consts::PI;
    (0..n)
        .map(|i| {
            let x = i as f32 / n as f32;
            A0 - A1 * (two_pi * x).cos() + A2 * (2.0 * two_pi * x).cos()
        })
        .collect()
}

/// Levels for a circular visualizer: overall loudness, a pulse factor for the
/// core radius, and one normalized length per radial bar.
#[derive(Debug, Clone, PartialEq)]
pub struct RingLevels {
    pub average: f32,
    pub pulse: f32,
    pub bars: Vec<f32>,
}

/// Bars sample the lower half of the bins, where speech energy lives.
pub fn ring_levels(bins: &[u8], bars: usize) -> RingLevels {
    if bins.is_empty() {
        return RingLevels {
            average: 0.0,
            pulse: 1.0,
            bars: vec![0.0; bars],
        };
    }
    let sum: u32 = bins.iter().map(|value| u32::from(*value)).sum();
    let average = sum as f32 / bins.len() as f32;
    let pulse = 1.0 + (average / 255.0) * 0.5;
    let half = bins.len() as f32 / 2.0;
    let levels = (0..bars)
        .map(|i| {
            let index = ((i as f32 / bars as f32) * half).floor() as usize;
            let value = bins.get(index).copied().unwrap_or(0);
            f32::from(value) / 255.0 * pulse
        })
        .collect();
    RingLevels {
        average,
        pulse,
        bars: levels,
    }
}
