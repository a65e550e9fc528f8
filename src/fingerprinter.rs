use serde::{Deserialize, Serialize};

use crate::audio_processor::{AudioProcessor, ResetError};
use crate::error::FingerprintError;
use crate::fingerprint::{AggregationMode, Fingerprint, FingerprintAssembler};
use crate::hash::HashGenerator;
use crate::landmarks::{LandmarkPairer, TargetZone};
use crate::peaks::PeakExtractor;
use crate::spectrogram::{SpectrogramBuilder, Waveform};

/// Structure containing configuration for a [Fingerprinter].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    sample_rate: u32,
    frame_size: usize,
    hop_size: usize,
    top_db: f64,
    neighborhood_size: usize,
    amplitude_threshold_db: f64,
    zone: TargetZone,
    freq_resolution: f64,
    time_resolution: f64,
    aggregation: AggregationMode,
}

impl Configuration {
    /// Creates a new default configuration.
    fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
            top_db: DEFAULT_TOP_DB,
            neighborhood_size: DEFAULT_NEIGHBORHOOD_SIZE,
            amplitude_threshold_db: DEFAULT_AMPLITUDE_THRESHOLD_DB,
            zone: TargetZone::default(),
            freq_resolution: DEFAULT_FREQ_RESOLUTION,
            time_resolution: DEFAULT_TIME_RESOLUTION,
            aggregation: AggregationMode::Accumulate,
        }
    }

    /// Sets the rate PCM fed through [Fingerprinter::consume] is resampled to.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets number of samples in a single frame for FFT.
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Sets number of samples between the starts of two consecutive frames.
    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = hop_size;
        self
    }

    /// Sets how far below the loudest cell the spectrogram is floored, in dB.
    pub fn with_top_db(mut self, top_db: f64) -> Self {
        self.top_db = top_db;
        self
    }

    /// Sets the side of the square neighborhood a peak must dominate.
    pub fn with_neighborhood_size(mut self, neighborhood_size: usize) -> Self {
        self.neighborhood_size = neighborhood_size;
        self
    }

    /// Sets the level (relative to the loudest cell) a peak must exceed.
    pub fn with_amplitude_threshold(mut self, amplitude_threshold_db: f64) -> Self {
        self.amplitude_threshold_db = amplitude_threshold_db;
        self
    }

    pub fn with_zone(mut self, zone: TargetZone) -> Self {
        self.zone = zone;
        self
    }

    /// Sets quantization steps applied before hashing.
    pub fn with_resolution(mut self, freq_resolution: f64, time_resolution: f64) -> Self {
        self.freq_resolution = freq_resolution;
        self.time_resolution = time_resolution;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationMode) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Every occurrence of every key is kept, for building a searchable corpus.
    pub fn preset_corpus() -> Self {
        Self::new().with_aggregation(AggregationMode::Accumulate)
    }

    /// Only the newest occurrence of each key is kept.
    pub fn preset_single_shot() -> Self {
        Self::new().with_aggregation(AggregationMode::Latest)
    }

    /// Target sample rate for the streaming PCM path.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn top_db(&self) -> f64 {
        self.top_db
    }

    pub fn neighborhood_size(&self) -> usize {
        self.neighborhood_size
    }

    pub fn amplitude_threshold_db(&self) -> f64 {
        self.amplitude_threshold_db
    }

    pub fn zone(&self) -> &TargetZone {
        &self.zone
    }

    pub fn freq_resolution(&self) -> f64 {
        self.freq_resolution
    }

    pub fn time_resolution(&self) -> f64 {
        self.time_resolution
    }

    pub fn aggregation(&self) -> AggregationMode {
        self.aggregation
    }

    /// Checks that every option is usable.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        if self.sample_rate == 0 {
            return Err(FingerprintError::invalid("target sample rate must be positive"));
        }
        if !(2..=MAX_FRAME_SIZE).contains(&self.frame_size) {
            return Err(FingerprintError::invalid(format!(
                "frame size must be between 2 and {MAX_FRAME_SIZE}, got {}",
                self.frame_size
            )));
        }
        if self.hop_size == 0 {
            return Err(FingerprintError::invalid("hop size must be positive"));
        }
        if !(self.top_db.is_finite() && self.top_db > 0.0) {
            return Err(FingerprintError::invalid(format!("top_db must be positive, got {}", self.top_db)));
        }
        if !(1..=MAX_NEIGHBORHOOD_SIZE).contains(&self.neighborhood_size) {
            return Err(FingerprintError::invalid(format!(
                "neighborhood size must be between 1 and {MAX_NEIGHBORHOOD_SIZE}, got {}",
                self.neighborhood_size
            )));
        }
        if !self.amplitude_threshold_db.is_finite() {
            return Err(FingerprintError::invalid("amplitude threshold must be a finite number"));
        }
        check_non_negative("zone start offset", self.zone.start_offset)?;
        check_non_negative("zone duration", self.zone.duration)?;
        check_non_negative("zone frequency width", self.zone.freq_width)?;
        check_positive("frequency resolution", self.freq_resolution)?;
        check_positive("time resolution", self.time_resolution)?;
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), FingerprintError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FingerprintError::invalid(format!("{name} must be a non-negative number, got {value}")))
    }
}

fn check_positive(name: &str, value: f64) -> Result<(), FingerprintError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FingerprintError::invalid(format!("{name} must be a positive number, got {value}")))
    }
}

const DEFAULT_SAMPLE_RATE: u32 = 22050;
const DEFAULT_FRAME_SIZE: usize = 2048;
const DEFAULT_HOP_SIZE: usize = 512;
const DEFAULT_TOP_DB: f64 = 80.0;
const DEFAULT_NEIGHBORHOOD_SIZE: usize = 15;
const DEFAULT_AMPLITUDE_THRESHOLD_DB: f64 = -50.0;
const DEFAULT_FREQ_RESOLUTION: f64 = 1.0;
const DEFAULT_TIME_RESOLUTION: f64 = 0.001;

/// Largest accepted FFT size.
pub const MAX_FRAME_SIZE: usize = 1 << 16;
/// Largest accepted neighborhood side, in cells.
pub const MAX_NEIGHBORHOOD_SIZE: usize = 1 << 12;

/// Computes the fingerprint of `samples` recorded at `sample_rate` Hz.
///
/// Silent, too short or too quiet audio yields an empty fingerprint.
pub fn fingerprint(
    samples: &[f64],
    sample_rate: u32,
    config: &Configuration,
    song_id: Option<&str>,
) -> Result<Fingerprint, FingerprintError> {
    let mut fingerprint = Fingerprint::new(config.aggregation);
    fingerprint_into(&mut fingerprint, samples, sample_rate, config, song_id)?;
    Ok(fingerprint)
}

/// Adds the landmarks of `samples` to an existing fingerprint.
///
/// Occurrences are aggregated according to the mode `fingerprint` was created with.
/// Nothing is added when the input or the configuration is rejected.
pub fn fingerprint_into(
    fingerprint: &mut Fingerprint,
    samples: &[f64],
    sample_rate: u32,
    config: &Configuration,
    song_id: Option<&str>,
) -> Result<(), FingerprintError> {
    config.validate()?;
    let waveform = Waveform::new(samples, sample_rate)?;

    let spectrogram = SpectrogramBuilder::new(config.frame_size, config.hop_size, config.top_db).build(&waveform);
    let peaks = PeakExtractor::new(config.neighborhood_size, config.amplitude_threshold_db).extract(&spectrogram);
    if peaks.is_empty() {
        log::debug!("No peaks in {:.2}s of audio", waveform.duration());
        return Ok(());
    }

    let pairs = LandmarkPairer::new(config.zone).pair(&peaks);
    let assembler = FingerprintAssembler::new(
        HashGenerator::new(config.freq_resolution, config.time_resolution),
        fingerprint.mode(),
    );
    assembler.assemble_into(fingerprint, &pairs, song_id);
    Ok(())
}

/// Calculates a fingerprint for streamed 16-bit PCM.
pub struct Fingerprinter {
    config: Configuration,
    processor: AudioProcessor,
}

impl Fingerprinter {
    /// Creates a new [Fingerprinter] with the given [Configuration].
    pub fn new(config: &Configuration) -> Self {
        Self {
            config: config.clone(),
            processor: AudioProcessor::new(config.sample_rate),
        }
    }

    /// Resets the internal state to allow for a new fingerprint calculation.
    pub fn start(&mut self, sample_rate: u32, channels: u32) -> Result<(), ResetError> {
        self.processor.reset(sample_rate, channels)
    }

    /// Adds a new chunk of interleaved samples to the current calculation.
    pub fn consume(&mut self, data: &[i16]) {
        self.processor.consume(data)
    }

    /// Finishes the calculation by flushing internal buffers.
    pub fn finish(&mut self) {
        self.processor.flush();
    }

    /// Mono samples consumed so far, at [Configuration::sample_rate].
    pub fn samples(&self) -> &[f64] {
        self.processor.samples()
    }

    /// Returns the fingerprint of the audio consumed since the last [Fingerprinter::start].
    pub fn fingerprint(&self, song_id: Option<&str>) -> Result<Fingerprint, FingerprintError> {
        fingerprint(self.processor.samples(), self.processor.target_sample_rate(), &self.config, song_id)
    }

    /// Adds the landmarks of the consumed audio to `fingerprint`.
    pub fn fingerprint_into(&self, fingerprint: &mut Fingerprint, song_id: Option<&str>) -> Result<(), FingerprintError> {
        fingerprint_into(
            fingerprint,
            self.processor.samples(),
            self.processor.target_sample_rate(),
            &self.config,
            song_id,
        )
    }
}
