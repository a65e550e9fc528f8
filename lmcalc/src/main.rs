use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use serde::Serialize;

use rusty_landmarks::{AggregationMode, Configuration, Fingerprint, Fingerprinter, TargetZone};

mod decode;

const EMPTY_MESSAGE: &str = "Could not generate fingerprint. The audio might be silent or too short.";

/// Generate landmark fingerprints from audio files.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Song id attached to every entry (single file only; defaults to the file stem)
    #[arg(short, long)]
    song_id: Option<String>,

    /// How repeated keys are stored: `accumulate` or `latest`
    #[arg(short, long)]
    mode: Option<AggregationMode>,

    /// Read the base configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Side of the square neighborhood a peak must dominate
    #[arg(short, long)]
    neighborhood_size: Option<usize>,

    /// Minimum peak level in dB relative to the loudest point
    #[arg(short, long, allow_negative_numbers = true)]
    threshold: Option<f64>,

    /// Seconds between an anchor and the start of its target zone
    #[arg(long)]
    zone_start: Option<f64>,

    /// Length of the target zone in seconds
    #[arg(long)]
    zone_duration: Option<f64>,

    /// Maximum frequency distance between an anchor and a target, in Hz
    #[arg(long)]
    zone_freq_width: Option<f64>,

    /// Restrict the duration of the processed input audio (0 = unlimited)
    #[arg(short, long, default_value_t = 120)]
    length: u64,

    /// Print one `key<TAB>anchor_time<TAB>song_id` line per entry
    #[arg(long)]
    text: bool,

    /// Pretty-print the JSON output
    #[arg(short, long)]
    pretty: bool,

    /// Files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Serialize)]
struct Output<'a> {
    song_ids: Vec<String>,
    fingerprint: &'a Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

fn load_config(args: &Args) -> anyhow::Result<Configuration> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => Configuration::default(),
    };

    if let Some(mode) = args.mode {
        config = config.with_aggregation(mode);
    }
    if let Some(size) = args.neighborhood_size {
        config = config.with_neighborhood_size(size);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_amplitude_threshold(threshold);
    }

    let zone = config.zone();
    let zone = TargetZone::new(
        args.zone_start.unwrap_or(zone.start_offset),
        args.zone_duration.unwrap_or(zone.duration),
        args.zone_freq_width.unwrap_or(zone.freq_width),
    );
    config = config.with_zone(zone);

    config.validate()?;
    Ok(config)
}

fn song_id_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.song_id.is_some() && args.files.len() > 1 {
        bail!("--song-id can only be used with a single file");
    }

    let config = load_config(&args)?;
    log::debug!("Using configuration {:?}", config);

    let max_seconds = (args.length > 0).then_some(args.length);
    let mut printer = Fingerprinter::new(&config);
    let mut fingerprint = Fingerprint::new(config.aggregation());
    let mut song_ids = Vec::with_capacity(args.files.len());

    for path in &args.files {
        let song_id = args.song_id.clone().unwrap_or_else(|| song_id_for(path));
        let duration = decode::feed_file(path, &mut printer, max_seconds)
            .with_context(|| format!("decoding {}", path.display()))?;

        let before = fingerprint.entry_count();
        printer
            .fingerprint_into(&mut fingerprint, Some(&song_id))
            .with_context(|| format!("fingerprinting {}", path.display()))?;
        log::info!(
            "{}: {:.2}s of audio, {} landmarks",
            path.display(),
            duration,
            fingerprint.entry_count().saturating_sub(before)
        );

        song_ids.push(song_id);
    }

    if args.text {
        for (key, entries) in fingerprint.iter() {
            for entry in entries {
                println!("{}\t{:.6}\t{}", key, entry.anchor_time, entry.song_id.as_deref().unwrap_or(""));
            }
        }
        if fingerprint.is_empty() {
            eprintln!("{}", EMPTY_MESSAGE);
        }
        return Ok(());
    }

    let output = Output {
        song_ids,
        fingerprint: &fingerprint,
        message: fingerprint.is_empty().then_some(EMPTY_MESSAGE),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);

    Ok(())
}
