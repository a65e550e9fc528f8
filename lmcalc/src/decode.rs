use std::path::Path;

use anyhow::Context;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use rusty_landmarks::Fingerprinter;

/// Decodes the first audio track of `path` and feeds it to `printer`.
///
/// At most `max_seconds` of audio are consumed; `None` means the whole track.
/// Returns the duration that was fed, in seconds.
pub fn feed_file(path: &Path, printer: &mut Fingerprinter, max_seconds: Option<u64>) -> anyhow::Result<f64> {
    let src = std::fs::File::open(path).context("failed to open file")?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .context("unsupported format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no supported audio tracks")?;

    let dec_opts: DecoderOptions = Default::default();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .context("unsupported codec")?;

    let track_id = track.id;

    let sample_rate = track.codec_params.sample_rate.context("missing sample rate")?;
    let channels = track.codec_params.channels.context("missing audio channels")?.count();
    printer.start(sample_rate, channels as u32).context("initializing fingerprinter")?;

    let limit = max_seconds.map(|secs| sample_limit(secs, sample_rate, channels));
    let mut consumed = 0;
    let mut sample_buf = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                if sample_buf.is_none() {
                    let spec = *audio_buf.spec();
                    let duration = audio_buf.capacity() as u64;
                    sample_buf = Some(SampleBuffer::<i16>::new(duration, spec));
                }

                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    let mut samples = buf.samples();
                    if let Some(limit) = limit {
                        samples = &samples[..samples.len().min(limit - consumed)];
                    }
                    printer.consume(samples);
                    consumed += samples.len();
                }

                if limit.map_or(false, |limit| consumed >= limit) {
                    log::debug!("Reached the {}s limit for {}", max_seconds.unwrap_or_default(), path.display());
                    break;
                }
            }
            Err(Error::DecodeError(e)) => log::warn!("Skipping undecodable packet in {}: {}", path.display(), e),
            Err(_) => break,
        }
    }

    printer.finish();
    Ok((consumed / channels) as f64 / sample_rate as f64)
}

/// Number of interleaved samples in `seconds` of audio, saturating at `usize::MAX`.
fn sample_limit(seconds: u64, sample_rate: u32, channels: usize) -> usize {
    usize::try_from(seconds)
        .unwrap_or(usize::MAX)
        .saturating_mul(sample_rate as usize)
        .saturating_mul(channels)
}

#[cfg(test)]
mod tests {
    use crate::decode::sample_limit;

    #[test]
    fn limits() {
        assert_eq!(sample_limit(120, 44100, 2), 120 * 44100 * 2);
        assert_eq!(sample_limit(1, 22050, 1), 22050);
        assert_eq!(sample_limit(u64::MAX, 48000, 6), usize::MAX);
    }
}
