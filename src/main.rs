//! Skelsync
//!
//! Orchestrator for multi-camera skeleton calibration.
//!
//! Features:
//! - Synthetic multi-camera session recording
//! - Session replay statistics
//! - Per-camera calibration training with model export
//! - Binary log inspection

mod config;

use clap::{Parser, Subcommand};
use config::{AppConfig, LoggingConfig};
use skelsync_capture::{Recorder, SyntheticWalker};
use skelsync_data::{JointType, LogReader, SessionId};
use skelsync_train::{Calibration, Synchronizer, TrainingMode};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

/// Skelsync - Multi-camera skeleton recording and calibration
#[derive(Parser, Debug)]
#[command(name = "skelsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config with optional [logging] and [calibration] tables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a synthetic walking skeleton seen by several cameras
    RecordSynthetic {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        cameras: usize,
        #[arg(long)]
        frames: usize,
        #[arg(long, default_value_t = 555)]
        seed: u64,
    },

    /// Replay a session and report synchronization statistics
    Replay {
        #[arg(long)]
        dir: PathBuf,
        /// Session start as HH:MM:SS.fff
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        cameras: usize,
        #[arg(long)]
        tolerance_ms: Option<u32>,
    },

    /// Train per-camera calibration networks from a recorded session
    Calibrate {
        #[arg(long)]
        dir: PathBuf,
        /// Session start as HH:MM:SS.fff
        #[arg(long)]
        session: SessionId,
        #[arg(long)]
        cameras: usize,
        /// Where to write the trained model (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        learning_rate: Option<f32>,
        #[arg(long)]
        momentum: Option<f32>,
        /// Accumulate gradients and update every N rounds
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        tolerance_ms: Option<u32>,
        /// Also train on rounds with untracked joints
        #[arg(long)]
        keep_untracked: bool,
    },

    /// Print the header and records of a camera log
    Inspect { file: PathBuf },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_logging(&config.logging);

    match args.command {
        Command::RecordSynthetic {
            dir,
            cameras,
            frames,
            seed,
        } => {
            let started_at = chrono::Local::now();
            let mut recorder = Recorder::new(&dir, started_at);
            let mut walker = SyntheticWalker::new(cameras, seed);
            let stored = walker.record(&mut recorder, started_at, frames)?;
            let session = recorder.session();
            let counts = recorder.close()?;

            info!("Recorded {} skeletons: {:?}", stored, counts);
            println!("{}", session);
        }

        Command::Replay {
            dir,
            session,
            cameras,
            tolerance_ms,
        } => {
            let tolerance = tolerance_ms.unwrap_or(config.calibration.tolerance_ms);
            let mut synchronizer = Synchronizer::load(&dir, session, cameras, tolerance)?;
            while synchronizer.replay_session_frame(|_| {}) {}

            println!(
                "session {}: {} synchronized rounds, {} frames discarded",
                session,
                synchronizer.rounds(),
                synchronizer.discarded()
            );
        }

        Command::Calibrate {
            dir,
            session,
            cameras,
            output,
            learning_rate,
            momentum,
            batch_size,
            tolerance_ms,
            keep_untracked,
        } => {
            let mut calibration_config = config.calibration;
            if let Some(learning_rate) = learning_rate {
                calibration_config.learning_rate = learning_rate;
            }
            if let Some(momentum) = momentum {
                calibration_config.momentum = momentum;
            }
            if let Some(batch_size) = batch_size {
                calibration_config.mode = TrainingMode::Batch;
                calibration_config.batch_size = batch_size;
            }
            if let Some(tolerance_ms) = tolerance_ms {
                calibration_config.tolerance_ms = tolerance_ms;
            }
            if keep_untracked {
                calibration_config.skip_untracked = false;
            }

            let mut calibration = Calibration::new(&dir, session, cameras, &calibration_config)?;
            let report = calibration.calibrate()?;

            println!(
                "{} rounds trained, {} skipped, {} frames discarded",
                report.rounds_trained, report.rounds_skipped, report.frames_discarded
            );
            for (camera, loss) in &report.mean_loss {
                println!("camera {}: mean loss {:.6}", camera, loss);
            }

            if let Some(path) = output {
                calibration.save_model(&path)?;
                info!("Model written to {}", path.display());
            }
        }

        Command::Inspect { file } => {
            let mut reader = LogReader::open_any(BufReader::new(File::open(&file)?))?;
            println!("{}: camera {}", file.display(), reader.camera_id());

            while let Some(frame) = reader.next_frame()? {
                let tracked = JointType::ALL
                    .iter()
                    .filter(|&&joint| frame.joints().is_tracked(joint))
                    .count();
                let hip = frame.joints().get(JointType::HipCenter);
                println!(
                    "#{:<6} skeleton {:<4} {:>8}ms  tracked {:>2}/{}  hip ({:.3}, {:.3}, {:.3})",
                    reader.records_read() - 1,
                    frame.skeleton_id(),
                    frame.frame_offset_ms(),
                    tracked,
                    JointType::ALL.len(),
                    hip.x,
                    hip.y,
                    hip.z
                );
            }
            println!("{} records", reader.records_read());
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level)),
        )
        .with_target(false)
        .init();
}
