use std::collections::VecDeque;

use crate::spectrogram::Spectrogram;

/// A locally dominant time-frequency point of a [Spectrogram].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Frame index in the spectrogram.
    pub frame: usize,
    /// Bin index in the spectrogram.
    pub bin: usize,
    /// Start time of the frame, in seconds.
    pub time: f64,
    /// Center frequency of the bin, in Hz.
    pub frequency: f64,
    /// Level in dB relative to the loudest cell.
    pub magnitude: f64,
}

/// Finds cells that are the maximum of their square neighborhood and louder than a threshold.
#[derive(Debug, Clone)]
pub struct PeakExtractor {
    neighborhood_size: usize,
    amplitude_threshold_db: f64,
}

impl PeakExtractor {
    /// # Panics
    ///
    /// Panics if `neighborhood_size` is zero.
    pub fn new(neighborhood_size: usize, amplitude_threshold_db: f64) -> Self {
        assert!(neighborhood_size > 0);
        Self { neighborhood_size, amplitude_threshold_db }
    }

    /// Returns peaks in no particular order.
    ///
    /// A cell sitting at the spectrogram's floor is never a peak, so silent input
    /// yields no peaks regardless of the threshold.
    pub fn extract(&self, spectrogram: &Spectrogram) -> Vec<Peak> {
        if spectrogram.is_empty() {
            return Vec::new();
        }

        let local_max = maximum_filter(spectrogram, self.neighborhood_size);
        let floor = spectrogram.floor_db();

        let mut peaks = Vec::new();
        for frame in 0..spectrogram.frames() {
            let values = spectrogram.frame(frame);
            let maxima = &local_max[frame * spectrogram.bins()..][..spectrogram.bins()];
            for (bin, (&value, &max)) in values.iter().zip(maxima).enumerate() {
                if value == max && value > self.amplitude_threshold_db && value > floor {
                    peaks.push(Peak {
                        frame,
                        bin,
                        time: spectrogram.times()[frame],
                        frequency: spectrogram.frequencies()[bin],
                        magnitude: value,
                    });
                }
            }
        }

        log::debug!(
            "Extracted {} peaks (neighborhood {}, threshold {} dB)",
            peaks.len(),
            self.neighborhood_size,
            self.amplitude_threshold_db
        );
        peaks
    }
}

/// Square maximum filter over the whole spectrogram; cells outside the grid count as -inf.
///
/// The output shares the spectrogram's frame-major layout.
pub(crate) fn maximum_filter(spectrogram: &Spectrogram, size: usize) -> Vec<f64> {
    let bins = spectrogram.bins();
    let frames = spectrogram.frames();

    let mut along_bins = vec![0.0; bins * frames];
    for frame in 0..frames {
        sliding_max(
            spectrogram.frame(frame),
            size,
            &mut along_bins[frame * bins..(frame + 1) * bins],
        );
    }

    let mut output = vec![0.0; bins * frames];
    let mut column = vec![0.0; frames];
    let mut column_max = vec![0.0; frames];
    for bin in 0..bins {
        for frame in 0..frames {
            column[frame] = along_bins[frame * bins + bin];
        }
        sliding_max(&column, size, &mut column_max);
        for frame in 0..frames {
            output[frame * bins + bin] = column_max[frame];
        }
    }

    output
}

/// Maximum over the window `[i - size / 2, i + size - 1 - size / 2]`, clipped to the input.
fn sliding_max(values: &[f64], size: usize, output: &mut [f64]) {
    assert_eq!(values.len(), output.len());
    let before = size / 2;
    let after = size - 1 - before;

    // indices of a non-increasing run of values
    let mut window: VecDeque<usize> = VecDeque::with_capacity(size.min(values.len()));
    let mut next = 0;
    for i in 0..values.len() {
        let end = i.saturating_add(after).min(values.len() - 1);
        while next <= end {
            while window.back().map_or(false, |&back| values[back] <= values[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }

        let start = i.saturating_sub(before);
        while window.front().map_or(false, |&front| front < start) {
            window.pop_front();
        }

        output[i] = values[window[0]];
    }
}

#[cfg(test)]
mod tests {
    use crate::peaks::{maximum_filter, sliding_max, PeakExtractor};
    use crate::spectrogram::{SpectrogramBuilder, Waveform};
    use crate::utils::tones;

    fn naive_sliding_max(values: &[f64], size: usize) -> Vec<f64> {
        let before = size / 2;
        let after = size - 1 - before;
        (0..values.len())
            .map(|i| {
                let start = i.saturating_sub(before);
                let end = i.saturating_add(after).min(values.len() - 1);
                values[start..=end].iter().copied().fold(f64::NEG_INFINITY, f64::max)
            })
            .collect()
    }

    #[test]
    fn sliding_max_matches_naive() {
        let values = [3.0, -1.0, 4.0, 1.0, -5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0, -8.0, 9.0, 7.0];
        for size in 1..=16 {
            let mut output = vec![0.0; values.len()];
            sliding_max(&values, size, &mut output);
            assert_eq!(output, naive_sliding_max(&values, size), "size = {size}");
        }
    }

    #[test]
    fn sliding_max_size_one_is_identity() {
        let values = [0.5, -2.0, 7.0];
        let mut output = [0.0; 3];
        sliding_max(&values, 1, &mut output);
        assert_eq!(output, values);
    }

    #[test]
    fn sliding_max_even_window() {
        // size 4 covers [i - 2, i + 1]
        let values = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0];
        let mut output = [0.0; 7];
        sliding_max(&values, 4, &mut output);
        assert_eq!(output, [0.0, 0.0, 5.0, 5.0, 5.0, 5.0, 0.0]);
    }

    #[test]
    fn sliding_max_window_wider_than_input() {
        let values = [1.0, 4.0, 2.0];
        let mut output = [0.0; 3];
        sliding_max(&values, usize::MAX, &mut output);
        assert_eq!(output, [4.0; 3]);
    }

    #[test]
    fn neighborhood_larger_than_grid_keeps_global_maximum() {
        let samples = tones(&[250.0], 0.5, 1.0, 8000);
        let waveform = Waveform::new(&samples, 8000).unwrap();
        let spectrogram = SpectrogramBuilder::new(512, 128, 80.0).build(&waveform);
        let peaks = PeakExtractor::new(1 << 20, -50.0).extract(&spectrogram);

        assert!(!peaks.is_empty());
        let loudest = peaks.iter().map(|p| p.magnitude).fold(f64::NEG_INFINITY, f64::max);
        assert!(peaks.iter().all(|p| p.magnitude == loudest && p.bin == 16));
    }

    #[test]
    fn silence_has_no_peaks() {
        let samples = vec![0.0; 22050];
        let waveform = Waveform::new(&samples, 22050).unwrap();
        let spectrogram = SpectrogramBuilder::new(2048, 512, 80.0).build(&waveform);
        // even a threshold below the floor must not turn silence into peaks
        let peaks = PeakExtractor::new(15, -1000.0).extract(&spectrogram);
        assert!(peaks.is_empty());
    }

    #[test]
    fn empty_spectrogram() {
        let samples = vec![0.1; 100];
        let waveform = Waveform::new(&samples, 22050).unwrap();
        let spectrogram = SpectrogramBuilder::new(2048, 512, 80.0).build(&waveform);
        assert!(PeakExtractor::new(15, -50.0).extract(&spectrogram).is_empty());
    }

    #[test]
    fn peaks_are_local_maxima() {
        let samples = tones(&[300.0, 1200.0], 0.9, 1.5, 8000);
        let waveform = Waveform::new(&samples, 8000).unwrap();
        let spectrogram = SpectrogramBuilder::new(512, 128, 80.0).build(&waveform);
        let size = 7;
        let peaks = PeakExtractor::new(size, -50.0).extract(&spectrogram);
        assert!(!peaks.is_empty());

        for peak in &peaks {
            assert!(peak.magnitude > -50.0);
            assert_eq!(peak.magnitude, spectrogram.get(peak.bin, peak.frame));
            assert_eq!(peak.time, spectrogram.times()[peak.frame]);
            assert_eq!(peak.frequency, spectrogram.frequencies()[peak.bin]);

            let bins = peak.bin.saturating_sub(size / 2)..=(peak.bin + size / 2).min(spectrogram.bins() - 1);
            for bin in bins {
                let frames = peak.frame.saturating_sub(size / 2)..=(peak.frame + size / 2).min(spectrogram.frames() - 1);
                for frame in frames {
                    assert!(peak.magnitude >= spectrogram.get(bin, frame));
                }
            }
        }
    }

    #[test]
    fn tone_peaks_near_tone_frequency() {
        // 250 Hz sits exactly on bin 16 of a 512-point transform at 8 kHz
        let samples = tones(&[250.0], 0.5, 1.0, 8000);
        let waveform = Waveform::new(&samples, 8000).unwrap();
        let spectrogram = SpectrogramBuilder::new(512, 128, 80.0).build(&waveform);
        let peaks = PeakExtractor::new(15, -50.0).extract(&spectrogram);

        assert!(!peaks.is_empty());
        assert!(peaks.iter().all(|p| p.bin == 16));
    }

    #[test]
    fn filter_matches_brute_force() {
        let samples = tones(&[440.0, 700.0, 2500.0], 0.7, 0.5, 8000);
        let waveform = Waveform::new(&samples, 8000).unwrap();
        let spectrogram = SpectrogramBuilder::new(256, 64, 80.0).build(&waveform);
        let size = 5;
        let filtered = maximum_filter(&spectrogram, size);

        for frame in 0..spectrogram.frames() {
            for bin in 0..spectrogram.bins() {
                let mut expected = f64::NEG_INFINITY;
                for f in frame.saturating_sub(2)..=(frame + 2).min(spectrogram.frames() - 1) {
                    for b in bin.saturating_sub(2)..=(bin + 2).min(spectrogram.bins() - 1) {
                        expected = expected.max(spectrogram.get(b, f));
                    }
                }
                assert_eq!(filtered[frame * spectrogram.bins() + bin], expected);
            }
        }
    }
}
