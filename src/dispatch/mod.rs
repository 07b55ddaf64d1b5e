//! Volume dispatcher
//!
//! Converts one batch of raw slider readings into volume-set calls against
//! the resolved mapping. Unbound sliders are ignored, and a stale handle
//! never aborts the rest of the batch.

use crate::mapping::ResolvedMapping;
use crate::sessions::VolumeSetError;

/// Largest raw reading the device sends (10-bit ADC).
pub const MAX_READING: u16 = 1023;

/// What one dispatched batch did.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of targets that received a volume update.
    pub applied: usize,
    /// Stale-handle failures, one per dead underlying session.
    ///
    /// Diagnostics only; a non-empty list is the engine's cue to re-resolve
    /// early so dead sessions drop out of the mapping.
    pub failures: Vec<VolumeSetError>,
}

/// Normalizes raw readings and fans them out to resolved targets.
#[derive(Debug, Clone, Copy)]
pub struct VolumeDispatcher {
    max_raw: u16,
    inverted: bool,
}

impl VolumeDispatcher {
    pub fn new(max_raw: u16, inverted: bool) -> Self {
        Self { max_raw, inverted }
    }

    /// Map a raw reading to a volume level in `[0, 1]`.
    pub fn normalize(&self, raw: u16) -> f32 {
        let level = f32::from(raw.min(self.max_raw)) / f32::from(self.max_raw);
        if self.inverted {
            1.0 - level
        } else {
            level
        }
    }

    /// Apply one batch of readings to the bound targets.
    ///
    /// An index without a reading, or a reading without a bound target, is
    /// skipped silently.
    pub fn dispatch(&self, readings: &[u16], mapping: &ResolvedMapping) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, target) in mapping.iter() {
            let Some(&raw) = readings.get(index) else {
                continue;
            };
            let failures = target.set_volume(self.normalize(raw));
            if failures.is_empty() {
                report.applied += 1;
            }
            report.failures.extend(failures);
        }

        report
    }
}
