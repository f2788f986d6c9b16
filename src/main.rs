use clap::{Parser, Subcommand};
use pitch2midi::{audio, config, DrumRemoval, OctaveRemoval, Options, Transcriber, WindowKind};
use pitch2midi::{TranscribeError, TranscriptionSession};
use std::path::PathBuf;

/// Polyphonic Audio-to-MIDI Transcription
#[derive(Parser)]
#[command(name = "pitch2midi")]
#[command(about = "Transcribe polyphonic audio recordings to MIDI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe an audio file and write a MIDI file
    Transcribe {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long, default_value = "output.mid")]
        output: PathBuf,

        /// Custom configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Spectral transform length (power of two)
        #[arg(long)]
        fft_size: Option<usize>,

        /// Frame stride in samples; 0 selects fft_size/4
        #[arg(long)]
        hop_size: Option<usize>,

        /// Window function: rectangular, hanning, hamming, blackman
        #[arg(long)]
        window: Option<String>,

        /// Activation threshold in dB (negative)
        #[arg(long)]
        cutoff: Option<f32>,

        /// Lowest MIDI note scanned
        #[arg(long)]
        note_bottom: Option<u8>,

        /// Highest MIDI note scanned
        #[arg(long)]
        note_top: Option<u8>,

        /// Enable phase-vocoder frequency refinement
        #[arg(long)]
        phase_vocoder: bool,

        /// Semitone offset for the note-frequency mapping
        #[arg(long)]
        pitch_adjust: Option<f32>,

        /// Drum removal onset window in frames (requires --drum-ratio)
        #[arg(long)]
        drum_window: Option<usize>,

        /// Drum removal power ratio (requires --drum-window)
        #[arg(long)]
        drum_ratio: Option<f32>,

        /// Octave-error removal power ratio
        #[arg(long)]
        octave_ratio: Option<f32>,

        /// Also dump the note events as JSON
        #[arg(long)]
        dump_notes: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate a configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show the default configuration
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transcribe {
            input,
            output,
            config,
            fft_size,
            hop_size,
            window,
            cutoff,
            note_bottom,
            note_top,
            phase_vocoder,
            pitch_adjust,
            drum_window,
            drum_ratio,
            octave_ratio,
            dump_notes,
            verbose,
            quiet,
        } => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            let mut options = if let Some(path) = config {
                config::load_options(path)?
            } else {
                Options::default()
            };

            if let Some(fft) = fft_size {
                options.fft_size = fft;
                options.hop_size = fft / 4;
            }
            match hop_size {
                Some(0) => options.hop_size = options.fft_size / 4,
                Some(hop) => options.hop_size = hop,
                None => {}
            }
            if let Some(name) = window {
                options.window = WindowKind::from_name(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown window function: {}", name))?;
            }
            if let Some(db) = cutoff {
                options.cutoff = db;
            }
            if let Some(note) = note_bottom {
                options.note_bottom = note;
            }
            if let Some(note) = note_top {
                options.note_top = note;
            }
            if phase_vocoder {
                options.phase_vocoder = true;
            }
            if let Some(semitones) = pitch_adjust {
                options.pitch_adjust = semitones;
            }
            match (drum_window, drum_ratio) {
                (Some(window_frames), Some(ratio)) => {
                    options.drum_removal = Some(DrumRemoval {
                        window_frames,
                        ratio,
                    });
                }
                (None, None) => {}
                _ => anyhow::bail!("--drum-window and --drum-ratio must be given together"),
            }
            if let Some(ratio) = octave_ratio {
                options.octave_removal = Some(OctaveRemoval { ratio });
            }

            let transcriber = Transcriber::new(options)?;

            let buffer = audio::read_wav_file(&input)?;
            log::info!(
                "loaded {} ({:.2}s at {} Hz)",
                input.display(),
                buffer.duration_sec(),
                buffer.sample_rate
            );

            let mut session = TranscriptionSession::new();
            if !quiet {
                let mut last_decile = 0u32;
                session = session.with_progress(Box::new(move |fraction| {
                    let decile = (fraction * 10.0) as u32;
                    if decile > last_decile {
                        last_decile = decile;
                        log::info!("analysis {}0% complete", decile);
                    }
                    true
                }));
            }

            let transcription = match transcriber.transcribe_session(&buffer, &mut session) {
                Ok(result) => result,
                Err(TranscribeError::Cancelled) => {
                    log::warn!("transcription cancelled, no output written");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            transcription.write_midi(&output)?;
            if let Some(path) = dump_notes {
                std::fs::write(&path, serde_json::to_string_pretty(&transcription)?)?;
                log::info!("dumped note events to {}", path.display());
            }

            if !quiet {
                println!(
                    "Wrote {} note events to {}",
                    transcription.events.len(),
                    output.display()
                );
            }
        }
        Commands::ValidateConfig { config } => {
            env_logger::init();
            let options = config::load_options(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&options) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            env_logger::init();
            let options = Options::default();
            let json = serde_json::to_string_pretty(&options)?;
            println!("{}", json);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}
