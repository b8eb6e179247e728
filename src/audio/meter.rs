use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

pub const METER_FLOOR_DB: f32 = -60.0;

/// Microphone level of the most recent outbound block, shared lock-free with
/// whoever renders it.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(METER_FLOOR_DB.to_bits())),
        }
    }

    pub fn set_db(&self, db: f32) {
        self.level_bits
            .store(db.max(METER_FLOOR_DB).to_bits(), Ordering::Relaxed);
    }

    pub fn update(&self, samples: &[f32]) {
        self.set_db(rms_db(samples));
    }

    pub fn reset(&self) {
        self.set_db(METER_FLOOR_DB);
    }

    pub fn level_db(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn rms_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return METER_FLOOR_DB;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = energy.sqrt().max(1e-6);
    20.0 * rms.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_meter_defaults_to_floor() {
        let meter = LiveMeter::new();
        assert_eq!(meter.level_db(), METER_FLOOR_DB);
    }

    #[test]
    fn live_meter_tracks_block_level_and_resets() {
        let meter = LiveMeter::new();
        meter.update(&[0.5; 64]);
        assert!((meter.level_db() - (-6.0206)).abs() < 0.01);
        meter.reset();
        assert_eq!(meter.level_db(), METER_FLOOR_DB);
    }

    #[test]
    fn silence_clamps_to_floor() {
        let meter = LiveMeter::new();
        meter.update(&[0.0; 32]);
        assert_eq!(meter.level_db(), METER_FLOOR_DB);
        assert_eq!(rms_db(&[]), METER_FLOOR_DB);
    }
}
