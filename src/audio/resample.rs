//! Streaming rate conversion from a device clock onto the session's input clock.
//!
//! A [`StreamResampler`] lives as long as one capture node and sees every
//! device frame in order, so filter history and fractional phase carry across
//! frame boundaries. Converted audio collects in a queue that the capture node
//! drains in exact block-sized pieces.

use crate::log_debug;
#[cfg(feature = "high-quality-audio")]
use rubato::{InterpolationParameters, InterpolationType, Resampler, SincFixedIn, WindowFunction};
use std::collections::VecDeque;
use std::f32::consts::PI;

pub(crate) const MIN_DEVICE_RATE: u32 = 4_000;
pub(crate) const MAX_DEVICE_RATE: u32 = 384_000;
pub(crate) const MIN_RESAMPLE_RATIO: f64 = 0.01;
pub(crate) const MAX_RESAMPLE_RATIO: f64 = 12.0;
const MAX_DOWNSAMPLING_TAPS: usize = 129;
#[cfg(feature = "high-quality-audio")]
const SINC_CHUNK: usize = 256;
/// Slack for per-call output jitter on top of the input the engine holds back.
const PRIME_SLACK: usize = 4;

fn rates_supported(from_rate: u32, to_rate: u32) -> bool {
    if !(MIN_DEVICE_RATE..=MAX_DEVICE_RATE).contains(&from_rate)
        || !(MIN_DEVICE_RATE..=MAX_DEVICE_RATE).contains(&to_rate)
    {
        return false;
    }
    let ratio = to_rate as f64 / from_rate as f64;
    (MIN_RESAMPLE_RATIO..=MAX_RESAMPLE_RATIO).contains(&ratio)
}

pub(super) fn downsampling_tap_count(from_rate: u32, to_rate: u32) -> usize {
    let decimation_ratio = from_rate as f32 / to_rate as f32;
    let mut taps = (decimation_ratio * 4.0).ceil().max(11.0) as usize;
    if taps % 2 == 0 {
        taps += 1;
    }
    taps.min(MAX_DOWNSAMPLING_TAPS)
}

/// Normalized Hamming-windowed sinc taps.
pub(super) fn design_low_pass(normalized_cutoff: f32, taps: usize) -> Vec<f32> {
    let mut coeffs = Vec::with_capacity(taps);
    let m = (taps.max(2) - 1) as f32;

    for n in 0..taps {
        let centered = n as f32 - m / 2.0;
        let x = 2.0 * PI * normalized_cutoff * centered;
        let sinc = if centered == 0.0 {
            2.0 * normalized_cutoff
        } else {
            (2.0 * normalized_cutoff * x.sin()) / x
        };
        let window = 0.54 - 0.46 * ((2.0 * PI * n as f32) / m).cos();
        coeffs.push(sinc * window);
    }

    let sum: f32 = coeffs.iter().sum();
    if sum != 0.0 {
        for coeff in coeffs.iter_mut() {
            *coeff /= sum;
        }
    }
    coeffs
}

/// Causal FIR plus linear interpolation. State survives between pushes.
pub(super) struct LinearStream {
    coeffs: Vec<f32>,
    history: Vec<f32>,
    /// Input samples consumed per output sample.
    step: f64,
    filtered: Vec<f32>,
    phase: f64,
}

impl LinearStream {
    pub(super) fn new(from_rate: u32, to_rate: u32) -> Self {
        // Decimation needs a low-pass first or speech sibilance aliases down.
        let coeffs = if from_rate > to_rate {
            let cutoff = (to_rate as f32 * 0.5 / from_rate as f32).min(0.499);
            design_low_pass(cutoff, downsampling_tap_count(from_rate, to_rate))
        } else {
            Vec::new()
        };
        let history = vec![0.0; coeffs.len().saturating_sub(1)];
        Self {
            coeffs,
            history,
            step: f64::from(from_rate) / f64::from(to_rate),
            filtered: Vec::new(),
            phase: 0.0,
        }
    }

    fn filter_into(&mut self, input: &[f32]) {
        if self.coeffs.is_empty() {
            self.filtered.extend_from_slice(input);
            return;
        }
        let mut work = std::mem::take(&mut self.history);
        work.extend_from_slice(input);
        let taps = self.coeffs.len();
        for window in work.windows(taps) {
            let acc: f32 = window.iter().zip(&self.coeffs).map(|(s, c)| s * c).sum();
            self.filtered.push(acc);
        }
        self.history = work.split_off(work.len() + 1 - taps);
    }

    pub(super) fn push(&mut self, input: &[f32], out: &mut VecDeque<f32>) {
        self.filter_into(input);
        while self.phase + 1.0 < self.filtered.len() as f64 {
            let idx = self.phase.floor() as usize;
            let frac = (self.phase - idx as f64) as f32;
            let a = self.filtered[idx];
            let b = self.filtered[idx + 1];
            out.push_back(a + (b - a) * frac);
            self.phase += self.step;
        }
        let consumed = (self.phase.floor() as usize).min(self.filtered.len());
        self.filtered.drain(..consumed);
        self.phase -= consumed as f64;
    }
}

#[cfg(feature = "high-quality-audio")]
struct SincStream {
    resampler: SincFixedIn<f32>,
    pending: Vec<f32>,
    #[cfg(test)]
    fail_next: bool,
}

#[cfg(feature = "high-quality-audio")]
impl SincStream {
    fn new(from_rate: u32, to_rate: u32) -> Result<Self, String> {
        let params = InterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.90,
            interpolation: InterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let ratio = f64::from(to_rate) / f64::from(from_rate);
        let resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, SINC_CHUNK, 1)
            .map_err(|err| format!("failed to construct sinc resampler: {err:?}"))?;
        Ok(Self {
            resampler,
            pending: Vec::with_capacity(SINC_CHUNK * 2),
            #[cfg(test)]
            fail_next: false,
        })
    }

    /// Run every whole chunk through the filter. Leftovers wait for the next push.
    fn push(&mut self, input: &[f32], out: &mut VecDeque<f32>) -> Result<(), String> {
        self.pending.extend_from_slice(input);
        while self.pending.len() >= SINC_CHUNK {
            #[cfg(test)]
            if std::mem::take(&mut self.fail_next) {
                return Err("forced sinc failure".to_string());
            }
            let produced = self
                .resampler
                .process(&[&self.pending[..SINC_CHUNK]], None)
                .map_err(|err| format!("resampler process failed: {err:?}"))?;
            out.extend(produced.into_iter().next().unwrap_or_default());
            self.pending.drain(..SINC_CHUNK);
        }
        Ok(())
    }
}

enum Engine {
    Passthrough,
    #[cfg(feature = "high-quality-audio")]
    Sinc(SincStream),
    Linear(LinearStream),
}

pub(crate) struct StreamResampler {
    from_rate: u32,
    to_rate: u32,
    engine: Engine,
    output: VecDeque<f32>,
}

impl StreamResampler {
    /// Unsupported rate pairs pass through untouched so a strange device never
    /// stalls capture.
    pub(crate) fn new(from_rate: u32, to_rate: u32) -> Self {
        let engine = if from_rate == to_rate || !rates_supported(from_rate, to_rate) {
            Engine::Passthrough
        } else {
            Self::preferred_engine(from_rate, to_rate)
        };
        let mut resampler = Self {
            from_rate,
            to_rate,
            engine,
            output: VecDeque::new(),
        };
        resampler.prime();
        resampler
    }

    /// Force the FIR plus linear path.
    #[cfg(test)]
    pub(super) fn linear(from_rate: u32, to_rate: u32) -> Self {
        let mut resampler = Self::new(from_rate, to_rate);
        if !matches!(resampler.engine, Engine::Passthrough) {
            resampler.engine = Engine::Linear(LinearStream::new(from_rate, to_rate));
            resampler.output.clear();
            resampler.prime();
        }
        resampler
    }

    #[cfg(feature = "high-quality-audio")]
    fn preferred_engine(from_rate: u32, to_rate: u32) -> Engine {
        match SincStream::new(from_rate, to_rate) {
            Ok(sinc) => Engine::Sinc(sinc),
            Err(err) => {
                log_debug(&format!("{err}; using linear resampler"));
                Engine::Linear(LinearStream::new(from_rate, to_rate))
            }
        }
    }

    #[cfg(not(feature = "high-quality-audio"))]
    fn preferred_engine(from_rate: u32, to_rate: u32) -> Engine {
        Engine::Linear(LinearStream::new(from_rate, to_rate))
    }

    /// Lead-in silence so the first device frame already fills a whole block
    /// despite the input the engine holds back.
    fn prime(&mut self) {
        let held_back = match self.engine {
            Engine::Passthrough => return,
            #[cfg(feature = "high-quality-audio")]
            Engine::Sinc(_) => SINC_CHUNK,
            Engine::Linear(_) => 2,
        };
        let ratio = f64::from(self.to_rate) / f64::from(self.from_rate);
        let lead = (held_back as f64 * ratio).ceil() as usize + PRIME_SLACK;
        self.output.extend(std::iter::repeat(0.0).take(lead));
    }

    pub(crate) fn is_high_quality(&self) -> bool {
        #[cfg(feature = "high-quality-audio")]
        if matches!(self.engine, Engine::Sinc(_)) {
            return true;
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn is_passthrough(&self) -> bool {
        matches!(self.engine, Engine::Passthrough)
    }

    pub(crate) fn push(&mut self, input: &[f32]) {
        match &mut self.engine {
            Engine::Passthrough => self.output.extend(input.iter().copied()),
            #[cfg(feature = "high-quality-audio")]
            Engine::Sinc(sinc) => {
                if let Err(err) = sinc.push(input, &mut self.output) {
                    log_debug(&format!(
                        "high-quality resampler failed ({err}); falling back to linear path"
                    ));
                    let held = std::mem::take(&mut sinc.pending);
                    let mut linear = LinearStream::new(self.from_rate, self.to_rate);
                    linear.push(&held, &mut self.output);
                    self.engine = Engine::Linear(linear);
                }
            }
            Engine::Linear(linear) => linear.push(input, &mut self.output),
        }
    }

    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.output.len()
    }

    /// Take exactly `len` converted samples, or nothing if fewer are ready.
    pub(crate) fn pop_block(&mut self, len: usize) -> Option<Vec<f32>> {
        if len == 0 || self.output.len() < len {
            return None;
        }
        Some(self.output.drain(..len).collect())
    }

    #[cfg(all(test, feature = "high-quality-audio"))]
    pub(super) fn fail_next_chunk(&mut self) {
        if let Engine::Sinc(sinc) = &mut self.engine {
            sinc.fail_next = true;
        }
    }
}
