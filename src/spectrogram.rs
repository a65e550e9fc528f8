use std::sync::Arc;

use rustfft::num_complex::Complex64;
use rustfft::num_traits::Zero;

use crate::error::FingerprintError;

/// Magnitudes below this value are treated as silence.
const AMIN: f64 = 1e-5;

/// Decoded mono audio borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct Waveform<'a> {
    samples: &'a [f64],
    sample_rate: u32,
}

impl<'a> Waveform<'a> {
    /// Wraps `samples` recorded at `sample_rate` Hz.
    ///
    /// Fails for a zero sample rate or when any sample is NaN or infinite.
    pub fn new(samples: &'a [f64], sample_rate: u32) -> Result<Self, FingerprintError> {
        if sample_rate == 0 {
            return Err(FingerprintError::invalid("sample rate must be positive"));
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(FingerprintError::invalid(format!("sample #{index} is not a finite number")));
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &'a [f64] {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration of the waveform in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Magnitude spectrogram in dB relative to its own loudest cell.
///
/// Cells are indexed by `(bin, frame)`. Every value lies in `[floor_db, 0.0]`.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    // frame-major: data[frame * bins + bin]
    data: Vec<f64>,
    floor_db: f64,
    times: Vec<f64>,
    frequencies: Vec<f64>,
}

impl Spectrogram {
    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Returns `true` when the spectrogram has no usable frames.
    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn get(&self, bin: usize, frame: usize) -> f64 {
        assert!(bin < self.bins && frame < self.frames);
        self.data[frame * self.bins + bin]
    }

    /// All bins of a single frame.
    pub fn frame(&self, frame: usize) -> &[f64] {
        &self.data[frame * self.bins..(frame + 1) * self.bins]
    }

    /// The value assigned to silent or out-of-range cells.
    pub fn floor_db(&self) -> f64 {
        self.floor_db
    }

    /// Start time of every frame, in seconds.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Center frequency of every bin, in Hz.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }
}

/// Short-time Fourier transform with a periodic Hann window.
pub struct SpectrogramBuilder {
    frame_size: usize,
    hop_size: usize,
    top_db: f64,
    fft_plan: Arc<dyn rustfft::Fft<f64>>,
    window: Box<[f64]>,
}

impl SpectrogramBuilder {
    /// # Panics
    ///
    /// Panics if `frame_size < 2`, `hop_size == 0` or `top_db` is not positive.
    /// [Configuration::validate](crate::Configuration::validate) rejects all of these.
    pub fn new(frame_size: usize, hop_size: usize, top_db: f64) -> Self {
        assert!(frame_size >= 2 && hop_size > 0 && top_db > 0.0);
        let fft_plan = rustfft::FftPlanner::new().plan_fft_forward(frame_size);
        Self {
            frame_size,
            hop_size,
            top_db,
            fft_plan,
            window: make_hann_window(frame_size),
        }
    }

    /// Number of complete frames that fit into `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.frame_size {
            0
        } else {
            1 + (len - self.frame_size) / self.hop_size
        }
    }

    pub fn build(&self, waveform: &Waveform) -> Spectrogram {
        let bins = self.frame_size / 2 + 1;
        let frames = self.frame_count(waveform.samples.len());
        let sample_rate = waveform.sample_rate as f64;

        let magnitudes = self.magnitudes(waveform.samples, frames);
        let data = self.to_db(magnitudes);

        let times = (0..frames)
            .map(|i| (i * self.hop_size) as f64 / sample_rate)
            .collect();
        let frequencies = (0..bins)
            .map(|i| i as f64 * sample_rate / self.frame_size as f64)
            .collect();

        log::debug!("Built spectrogram: {} frames x {} bins", frames, bins);

        Spectrogram {
            bins,
            frames,
            data,
            floor_db: -self.top_db,
            times,
            frequencies,
        }
    }

    #[cfg(feature = "parallel")]
    fn magnitudes(&self, samples: &[f64], frames: usize) -> Vec<f64> {
        use rayon::prelude::*;

        (0..frames)
            .into_par_iter()
            .flat_map_iter(|i| self.frame_magnitudes(&samples[i * self.hop_size..][..self.frame_size]))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn magnitudes(&self, samples: &[f64], frames: usize) -> Vec<f64> {
        (0..frames)
            .flat_map(|i| self.frame_magnitudes(&samples[i * self.hop_size..][..self.frame_size]))
            .collect()
    }

    fn frame_magnitudes(&self, frame: &[f64]) -> Vec<f64> {
        assert_eq!(frame.len(), self.frame_size);

        let mut buffer: Vec<Complex64> = frame
            .iter()
            .zip(self.window.iter())
            .map(|(&sample, &w)| Complex64::new(sample * w, 0.0))
            .collect();
        let mut scratch = vec![Complex64::zero(); self.fft_plan.get_inplace_scratch_len()];
        self.fft_plan.process_with_scratch(&mut buffer, &mut scratch);

        buffer[..self.frame_size / 2 + 1].iter().map(|c| c.norm()).collect()
    }

    fn to_db(&self, mut magnitudes: Vec<f64>) -> Vec<f64> {
        let floor = -self.top_db;
        let reference = magnitudes.iter().copied().fold(0.0, f64::max);
        for value in magnitudes.iter_mut() {
            *value = if *value < AMIN {
                floor
            } else {
                (20.0 * f64::log10(*value / reference)).max(floor)
            };
        }
        magnitudes
    }
}

fn make_hann_window(size: usize) -> Box<[f64]> {
    (0..size)
        .map(|i| 0.5 - 0.5 * f64::cos(2.0 * std::f64::consts::PI * i as f64 / size as f64))
        .collect()
}
