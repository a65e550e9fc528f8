//! Landmark-based audio fingerprinting in pure Rust.
//!
//! Audio is turned into a dB spectrogram, the spectrogram's local maxima are paired
//! with later peaks from a target zone, and every pair is hashed into a
//! [FingerprintKey]. The resulting [Fingerprint] maps keys to the anchor times (and
//! optionally song ids) they were seen at.
//!
//! ```no_run
//! use rusty_landmarks::{fingerprint, Configuration};
//!
//! let samples: Vec<f64> = vec![0.0; 22050];
//! let fp = fingerprint(&samples, 22050, &Configuration::default(), Some("song")).unwrap();
//! assert!(fp.is_empty());
//! ```

pub use audio_processor::{AudioProcessor, ResetError};
pub use error::FingerprintError;
pub use fingerprint::{AggregationMode, Fingerprint, FingerprintAssembler, FingerprintEntry};
pub use fingerprinter::{
    fingerprint, fingerprint_into, Configuration, Fingerprinter, MAX_FRAME_SIZE, MAX_NEIGHBORHOOD_SIZE,
};
pub use hash::{FingerprintKey, HashGenerator};
pub use landmarks::{LandmarkPair, LandmarkPairer, TargetZone};
pub use peaks::{Peak, PeakExtractor};
pub use spectrogram::{Spectrogram, SpectrogramBuilder, Waveform};

mod audio_processor;
mod error;
mod fingerprint;
mod fingerprinter;
mod hash;
mod landmarks;
mod peaks;
mod spectrogram;
mod utils;
