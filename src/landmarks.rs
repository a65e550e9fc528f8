use serde::{Deserialize, Serialize};

use crate::peaks::Peak;

/// Region after an anchor peak in which target peaks are paired with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetZone {
    /// Minimum time between anchor and target, in seconds.
    pub start_offset: f64,
    /// Length of the zone after `start_offset`, in seconds.
    pub duration: f64,
    /// Maximum frequency distance between anchor and target, in Hz.
    pub freq_width: f64,
}

impl TargetZone {
    pub const fn new(start_offset: f64, duration: f64, freq_width: f64) -> Self {
        Self { start_offset, duration, freq_width }
    }

    /// Returns `true` if `target` lies inside the zone anchored at `anchor`.
    pub fn contains(&self, anchor: &Peak, target: &Peak) -> bool {
        let t_min = anchor.time + self.start_offset;
        let t_max = t_min + self.duration;
        let f_min = anchor.frequency - self.freq_width;
        let f_max = anchor.frequency + self.freq_width;

        target.time > anchor.time
            && (t_min..=t_max).contains(&target.time)
            && (f_min..=f_max).contains(&target.frequency)
    }
}

impl Default for TargetZone {
    fn default() -> Self {
        Self::new(0.1, 0.8, 200.0)
    }
}

/// An anchor peak together with a later peak from its target zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPair {
    pub anchor: Peak,
    pub target: Peak,
}

impl LandmarkPair {
    /// Time from the anchor to the target, in seconds.
    pub fn time_delta(&self) -> f64 {
        self.target.time - self.anchor.time
    }
}

#[derive(Debug, Clone)]
pub struct LandmarkPairer {
    zone: TargetZone,
}

impl LandmarkPairer {
    pub fn new(zone: TargetZone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> &TargetZone {
        &self.zone
    }

    /// Pairs every peak with the later peaks that fall into its target zone.
    ///
    /// Pairs come out ordered by anchor (time, then frequency) and, for each anchor,
    /// by target in the same order.
    pub fn pair(&self, peaks: &[Peak]) -> Vec<LandmarkPair> {
        let mut sorted = peaks.to_vec();
        sort_peaks(&mut sorted);

        let mut pairs = Vec::new();
        for (i, anchor) in sorted.iter().enumerate() {
            let t_max = anchor.time + self.zone.start_offset + self.zone.duration;
            for target in &sorted[i + 1..] {
                // peaks are time-sorted, nothing after this one can enter the zone
                if target.time > t_max {
                    break;
                }
                if self.zone.contains(anchor, target) {
                    pairs.push(LandmarkPair { anchor: *anchor, target: *target });
                }
            }
        }

        log::debug!("Formed {} landmark pairs from {} peaks", pairs.len(), peaks.len());
        pairs
    }
}

/// Stable sort by ascending time, ties broken by ascending frequency.
pub(crate) fn sort_peaks(peaks: &mut [Peak]) {
    peaks.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.frequency.total_cmp(&b.frequency)));
}
