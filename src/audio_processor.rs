use std::fmt::{Display, Formatter};

use rubato::{InterpolationParameters, Resampler, ResamplerConstructionError};

const MIN_SAMPLE_RATE: u32 = 1000;
const MAX_BUFFER_SIZE: usize = 1024 * 32;

/// Turns interleaved 16-bit PCM into mono `f64` samples at a fixed target rate.
///
/// Channels are averaged, samples are scaled into `[-1.0, 1.0]` and, when the input
/// rate differs from the target, passed through a sinc resampler.
pub struct AudioProcessor {
    buffer: Box<[i16]>,
    buffer_offset: usize,
    output_buffer: Vec<f64>,
    input: Vec<f64>,
    channels: u32,
    sample_rate: u32,
    input_frames: usize,
    target_sample_rate: u32,
    resampler: Option<rubato::SincFixedIn<f64>>,
    samples: Vec<f64>,
}

impl AudioProcessor {
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            buffer: vec![0; MAX_BUFFER_SIZE].into_boxed_slice(),
            buffer_offset: 0,
            output_buffer: Vec::new(),
            input: Vec::new(),
            channels: 0,
            sample_rate: 0,
            input_frames: 0,
            target_sample_rate,
            resampler: None,
            samples: Vec::new(),
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Prepares the processor for a new stream, dropping all previous output.
    pub fn reset(&mut self, sample_rate: u32, channels: u32) -> Result<(), ResetError> {
        if channels == 0 {
            return Err(ResetError::NoChannels);
        }

        if sample_rate <= MIN_SAMPLE_RATE {
            return Err(ResetError::SampleRateTooLow);
        }

        self.channels = channels;
        self.sample_rate = sample_rate;
        self.input_frames = 0;
        self.buffer_offset = 0;
        self.input.clear();
        self.samples.clear();

        self.resampler = if self.target_sample_rate != sample_rate {
            Some(rubato::SincFixedIn::new(
                self.target_sample_rate as f64 / sample_rate as f64,
                1.0,
                InterpolationParameters {
                    sinc_len: 16,
                    f_cutoff: 0.8,
                    oversampling_factor: 128,
                    interpolation: rubato::InterpolationType::Nearest,
                    window: rubato::WindowFunction::Blackman,
                },
                MAX_BUFFER_SIZE,
                1,
            )?)
        } else {
            None
        };

        log::debug!(
            "Audio processor reset: {} Hz x {} channels -> {} Hz mono",
            sample_rate,
            channels,
            self.target_sample_rate
        );
        Ok(())
    }

    /// Adds interleaved samples; the length must be a multiple of the channel count.
    pub fn consume(&mut self, data: &[i16]) {
        assert!(self.channels > 0, "consume called before reset");
        assert_eq!(data.len() % self.channels as usize, 0);

        let mut index = 0;
        while index < data.len() {
            index += self.load(&data[index..], self.channels as usize);
            if self.buffer.len() == self.buffer_offset {
                self.resample(false);
            }
        }
    }

    /// Pushes out everything still buffered.
    ///
    /// Output is trimmed to the length implied by the resampling ratio, so the
    /// zero padding of the last chunk does not lengthen the audio.
    pub fn flush(&mut self) {
        if self.buffer_offset > 0 || !self.input.is_empty() {
            self.resample(true);
        }

        if self.resampler.is_some() {
            let ratio = self.target_sample_rate as f64 / self.sample_rate as f64;
            let expected = (self.input_frames as f64 * ratio).ceil() as usize;
            self.samples.truncate(expected);
        }
    }

    /// Mono samples produced so far, at [AudioProcessor::target_sample_rate].
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    fn load(&mut self, input: &[i16], channels: usize) -> usize {
        assert!(self.buffer_offset <= self.buffer.len());

        let available_samples = input.len() / channels;
        let consumed = available_samples.min(self.available_space());
        let input = &input[..consumed * channels];
        self.input_frames += consumed;

        match channels {
            1 => {
                for sample in input.iter().copied() {
                    self.push_sample(sample);
                }
            }
            _ => {
                for frame in input.chunks_exact(channels) {
                    let sum: i32 = frame.iter().copied().map(i32::from).sum();
                    // the average of i16 values always fits in i16
                    self.push_sample((sum / channels as i32) as i16);
                }
            }
        }

        consumed * channels
    }

    fn resample(&mut self, flush: bool) {
        for &sample in &self.buffer[..self.buffer_offset] {
            self.input.push(f64::from(sample) / f64::from(i16::MAX));
        }
        self.buffer_offset = 0;

        if let Some(resampler) = self.resampler.as_mut() {
            loop {
                let required_input = resampler.input_frames_next();
                if flush && !self.input.is_empty() && self.input.len() < required_input {
                    self.input.resize(required_input, 0.0);
                }
                if self.input.len() < required_input {
                    break;
                }

                self.output_buffer.clear();
                resampler
                    .process_into_buffer(
                        &[&self.input[..required_input]],
                        std::slice::from_mut(&mut self.output_buffer),
                        None,
                    )
                    .expect("resampler buffers match the requested frame count");
                self.input.drain(..required_input);
                self.samples.extend_from_slice(&self.output_buffer);
            }
        } else {
            self.samples.append(&mut self.input);
        }
    }

    fn available_space(&self) -> usize {
        self.buffer.len() - self.buffer_offset
    }

    #[inline]
    fn push_sample(&mut self, value: i16) {
        self.buffer[self.buffer_offset] = value;
        self.buffer_offset += 1;
    }
}

#[derive(Debug)]
pub enum ResetError {
    SampleRateTooLow,
    NoChannels,
    CannotResample(ResamplerConstructionError),
}

impl From<ResamplerConstructionError> for ResetError {
    fn from(e: ResamplerConstructionError) -> Self {
        ResetError::CannotResample(e)
    }
}

impl Display for ResetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResetError::SampleRateTooLow => write!(f, "Sample rate is too low. Required min. {}", MIN_SAMPLE_RATE),
            ResetError::NoChannels => write!(f, "At least one channel is required"),
            ResetError::CannotResample(e) => write!(f, "Cannot resample: {}", e),
        }
    }
}

impl std::error::Error for ResetError {}

#[cfg(test)]
mod tests {
    use crate::assert_eq_float_slice;
    use crate::audio_processor::{AudioProcessor, ResetError};
    use crate::utils::{tones, to_s16};

    fn i16_to_f64(s: &[i16]) -> Vec<f64> {
        s.iter().copied().map(|x| (x as f64) / (i16::MAX as f64)).collect::<Vec<_>>()
    }

    #[test]
    fn pass_through() {
        let data = to_s16(&tones(&[440.0], 0.5, 2.0, 22050));
        let mut processor = AudioProcessor::new(22050);
        processor.reset(22050, 1).unwrap();
        for chunk in data.chunks(1000) {
            processor.consume(chunk);
        }
        processor.flush();
        assert_eq_float_slice!(processor.samples(), i16_to_f64(&data));
    }

    #[test]
    fn stereo_to_mono() {
        let mono = to_s16(&tones(&[440.0], 0.5, 0.5, 22050));
        let stereo: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();

        let mut processor = AudioProcessor::new(22050);
        processor.reset(22050, 2).unwrap();
        processor.consume(&stereo);
        processor.flush();
        assert_eq_float_slice!(processor.samples(), i16_to_f64(&mono));
    }

    #[test]
    fn opposite_channels_cancel() {
        let left = to_s16(&tones(&[1000.0], 0.5, 0.1, 44100));
        let stereo: Vec<i16> = left.iter().flat_map(|&s| [s, -s]).collect();

        let mut processor = AudioProcessor::new(44100);
        processor.reset(44100, 2).unwrap();
        processor.consume(&stereo);
        processor.flush();
        assert!(processor.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn resample_halves_length() {
        let data = to_s16(&tones(&[440.0], 0.5, 3.0, 44100));
        let mut processor = AudioProcessor::new(22050);
        processor.reset(44100, 1).unwrap();
        processor.consume(&data);
        processor.flush();

        assert_eq!(processor.samples().len(), (data.len() + 1) / 2);
        assert!(processor.samples().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn reset_clears_output() {
        let mut processor = AudioProcessor::new(22050);
        processor.reset(22050, 1).unwrap();
        processor.consume(&[1000; 64]);
        processor.flush();
        assert_eq!(processor.samples().len(), 64);

        processor.reset(22050, 1).unwrap();
        assert!(processor.samples().is_empty());
    }

    #[test]
    fn invalid_reset() {
        let mut processor = AudioProcessor::new(22050);
        assert!(matches!(processor.reset(22050, 0), Err(ResetError::NoChannels)));
        assert!(matches!(processor.reset(800, 1), Err(ResetError::SampleRateTooLow)));
        assert!(matches!(processor.reset(0, 2), Err(ResetError::SampleRateTooLow)));
    }
}
