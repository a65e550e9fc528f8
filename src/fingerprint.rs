use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::{FingerprintKey, HashGenerator};
use crate::landmarks::LandmarkPair;

/// How repeated occurrences of a key are stored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// Every occurrence is appended to the key's list, in insertion order.
    #[default]
    Accumulate,
    /// Only the most recent occurrence of a key is kept.
    Latest,
}

impl FromStr for AggregationMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accumulate" => Ok(AggregationMode::Accumulate),
            "latest" => Ok(AggregationMode::Latest),
            _ => Err("aggregation mode must be either `accumulate` or `latest`"),
        }
    }
}

impl Display for AggregationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::Accumulate => f.write_str("accumulate"),
            AggregationMode::Latest => f.write_str("latest"),
        }
    }
}

/// One occurrence of a key: where its anchor sits and which song it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintEntry {
    /// Anchor time in seconds from the start of the audio.
    pub anchor_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
}

/// Mapping from landmark keys to their occurrences.
///
/// Serializes as a plain object in ascending key order, valued by a list of entries
/// ([AggregationMode::Accumulate]) or by a single entry ([AggregationMode::Latest]).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fingerprint {
    Accumulated(BTreeMap<FingerprintKey, Vec<FingerprintEntry>>),
    Latest(BTreeMap<FingerprintKey, FingerprintEntry>),
}

impl Fingerprint {
    /// Creates an empty fingerprint that aggregates according to `mode`.
    pub fn new(mode: AggregationMode) -> Self {
        match mode {
            AggregationMode::Accumulate => Fingerprint::Accumulated(BTreeMap::new()),
            AggregationMode::Latest => Fingerprint::Latest(BTreeMap::new()),
        }
    }

    pub fn mode(&self) -> AggregationMode {
        match self {
            Fingerprint::Accumulated(_) => AggregationMode::Accumulate,
            Fingerprint::Latest(_) => AggregationMode::Latest,
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        match self {
            Fingerprint::Accumulated(map) => map.len(),
            Fingerprint::Latest(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, key: FingerprintKey, entry: FingerprintEntry) {
        match self {
            Fingerprint::Accumulated(map) => map.entry(key).or_default().push(entry),
            Fingerprint::Latest(map) => {
                map.insert(key, entry);
            }
        }
    }

    /// Occurrences stored for `key`; empty if the key is absent.
    pub fn get(&self, key: FingerprintKey) -> &[FingerprintEntry] {
        match self {
            Fingerprint::Accumulated(map) => match map.get(&key) {
                Some(entries) => entries.as_slice(),
                None => &[],
            },
            Fingerprint::Latest(map) => match map.get(&key) {
                Some(entry) => std::slice::from_ref(entry),
                None => &[],
            },
        }
    }

    pub fn contains_key(&self, key: FingerprintKey) -> bool {
        !self.get(key).is_empty()
    }

    /// Iterates over keys in ascending order together with their occurrences.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (FingerprintKey, &[FingerprintEntry])> + '_> {
        match self {
            Fingerprint::Accumulated(map) => Box::new(map.iter().map(|(k, v)| (*k, v.as_slice()))),
            Fingerprint::Latest(map) => Box::new(map.iter().map(|(k, v)| (*k, std::slice::from_ref(v)))),
        }
    }

    /// Total number of stored occurrences over all keys.
    pub fn entry_count(&self) -> usize {
        self.iter().map(|(_, entries)| entries.len()).sum()
    }
}

/// Hashes landmark pairs and aggregates them into a [Fingerprint].
#[derive(Debug, Clone)]
pub struct FingerprintAssembler {
    hasher: HashGenerator,
    mode: AggregationMode,
}

impl FingerprintAssembler {
    pub fn new(hasher: HashGenerator, mode: AggregationMode) -> Self {
        Self { hasher, mode }
    }

    pub fn assemble(&self, pairs: &[LandmarkPair], song_id: Option<&str>) -> Fingerprint {
        let mut fingerprint = Fingerprint::new(self.mode);
        self.assemble_into(&mut fingerprint, pairs, song_id);
        fingerprint
    }

    /// Adds `pairs` to an existing fingerprint, following that fingerprint's own mode.
    pub fn assemble_into(&self, fingerprint: &mut Fingerprint, pairs: &[LandmarkPair], song_id: Option<&str>) {
        for pair in pairs {
            let key = self.hasher.hash(pair.anchor.frequency, pair.target.frequency, pair.time_delta());
            fingerprint.insert(key, FingerprintEntry {
                anchor_time: pair.anchor.time,
                song_id: song_id.map(str::to_owned),
            });
        }

        log::debug!(
            "Assembled {} pairs into a fingerprint with {} keys ({} mode)",
            pairs.len(),
            fingerprint.len(),
            fingerprint.mode()
        );
    }
}
