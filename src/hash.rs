use std::fmt::{Display, Formatter};

use serde::Serialize;

const FREQ_BITS: u32 = 20;
const DELTA_BITS: u32 = 24;

const FREQ_MASK: u64 = (1 << FREQ_BITS) - 1;
const DELTA_MASK: u64 = (1 << DELTA_BITS) - 1;

const TARGET_SHIFT: u32 = DELTA_BITS;
const ANCHOR_SHIFT: u32 = DELTA_BITS + FREQ_BITS;

/// Lookup key derived from one landmark pair.
///
/// Layout of the 64 bits, from the most significant end:
///
/// | bits  | content                                   |
/// |-------|-------------------------------------------|
/// | 20    | anchor frequency in `freq_resolution` units |
/// | 20    | target frequency in `freq_resolution` units |
/// | 24    | time delta in `time_resolution` units       |
///
/// Each field is rounded to the nearest unit and truncated to its width. With the
/// default 1 Hz / 1 ms resolution frequencies up to 1 MHz and deltas up to about
/// 4.6 hours are represented without wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FingerprintKey(pub u64);

impl FingerprintKey {
    pub fn anchor_bits(&self) -> u64 {
        (self.0 >> ANCHOR_SHIFT) & FREQ_MASK
    }

    pub fn target_bits(&self) -> u64 {
        (self.0 >> TARGET_SHIFT) & FREQ_MASK
    }

    pub fn delta_bits(&self) -> u64 {
        self.0 & DELTA_MASK
    }
}

impl Display for FingerprintKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<FingerprintKey> for u64 {
    fn from(key: FingerprintKey) -> Self {
        key.0
    }
}

/// Turns `(anchor frequency, target frequency, time delta)` into a [FingerprintKey].
#[derive(Debug, Clone, Copy)]
pub struct HashGenerator {
    freq_resolution: f64,
    time_resolution: f64,
}

impl HashGenerator {
    /// Panics unless both resolutions are positive.
    pub fn new(freq_resolution: f64, time_resolution: f64) -> Self {
        assert!(freq_resolution > 0.0 && time_resolution > 0.0);
        Self { freq_resolution, time_resolution }
    }

    pub fn hash(&self, anchor_freq: f64, target_freq: f64, time_delta: f64) -> FingerprintKey {
        let anchor = quantize(anchor_freq, self.freq_resolution) & FREQ_MASK;
        let target = quantize(target_freq, self.freq_resolution) & FREQ_MASK;
        let delta = quantize(time_delta, self.time_resolution) & DELTA_MASK;
        FingerprintKey((anchor << ANCHOR_SHIFT) | (target << TARGET_SHIFT) | delta)
    }
}

impl Default for HashGenerator {
    fn default() -> Self {
        Self::new(1.0, 0.001)
    }
}

/// Rounds `value / resolution` to the nearest integer, saturating at 0 and `u64::MAX`.
fn quantize(value: f64, resolution: f64) -> u64 {
    (value / resolution).round() as u64
}

#[cfg(test)]
mod tests {
    use crate::hash::{quantize, FingerprintKey, HashGenerator};

    #[test]
    fn quantization() {
        assert_eq!(quantize(440.49, 1.0), 440);
        assert_eq!(quantize(440.5, 1.0), 441);
        assert_eq!(quantize(0.1234, 0.001), 123);
        assert_eq!(quantize(0.1236, 0.001), 124);
        assert_eq!(quantize(445.0, 10.0), 45);
        assert_eq!(quantize(-3.0, 1.0), 0);
    }

    #[test]
    fn layout() {
        let key = HashGenerator::default().hash(440.0, 880.0, 0.25);
        assert_eq!(key.anchor_bits(), 440);
        assert_eq!(key.target_bits(), 880);
        assert_eq!(key.delta_bits(), 250);
        assert_eq!(key, FingerprintKey((440 << 44) | (880 << 24) | 250));
    }

    #[test]
    fn known_values() {
        // keys are persisted by callers, so these must never change
        let hasher = HashGenerator::default();
        assert_eq!(hasher.hash(440.0, 880.0, 0.25).0, 7_740_576_623_493_370);
        assert_eq!(hasher.hash(0.0, 0.0, 0.0).0, 0);
        assert_eq!(hasher.hash(1.0, 0.0, 0.0).0, 1 << 44);
        assert_eq!(hasher.hash(0.0, 1.0, 0.0).0, 1 << 24);
        assert_eq!(hasher.hash(0.0, 0.0, 0.001).0, 1);
    }

    #[test]
    fn jitter_is_absorbed() {
        let hasher = HashGenerator::default();
        let a = hasher.hash(441.0, 882.0, 0.3);
        let b = hasher.hash(441.0000001, 881.9999999, 0.3000000001);
        assert_eq!(a, b);
    }

    #[test]
    fn fields_are_distinguished() {
        let hasher = HashGenerator::default();
        let base = hasher.hash(500.0, 600.0, 0.2);
        assert_ne!(base, hasher.hash(600.0, 500.0, 0.2));
        assert_ne!(base, hasher.hash(500.0, 600.0, 0.201));
        assert_ne!(base, hasher.hash(501.0, 600.0, 0.2));
    }

    #[test]
    fn coarse_resolution() {
        let hasher = HashGenerator::new(10.0, 0.01);
        assert_eq!(hasher.hash(441.0, 879.0, 0.304), hasher.hash(438.0, 881.0, 0.298));
    }

    #[test]
    fn display() {
        assert_eq!(FingerprintKey(12345).to_string(), "12345");
    }
}
