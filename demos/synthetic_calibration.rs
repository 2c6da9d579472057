//! Synthetic calibration example
//!
//! Records a short synthetic two-camera session, trains the calibration
//! network for camera 1 and reports how far its transformed joints land from
//! the reference camera's.
//!
//! Usage:
//!   cargo run --release --example synthetic_calibration -- [frames]

use skelsync_capture::{Recorder, SyntheticWalker};
use skelsync_train::{Calibration, CalibrationConfig, Synchronizer};
use std::error::Error;
use tracing::info;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let frames: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 300,
    };

    let dir = tempfile::tempdir()?;
    let started_at = chrono::Local::now();
    let mut recorder = Recorder::new(dir.path(), started_at);
    SyntheticWalker::new(2, 555).record(&mut recorder, started_at, frames)?;
    let session = recorder.session();
    recorder.close()?;
    info!("Recorded session {} ({} frames per camera)", session, frames);

    let config = CalibrationConfig::default();
    let mut calibration = Calibration::new(dir.path(), session, 2, &config)?;
    let report = calibration.calibrate()?;
    info!(
        "Trained on {} rounds ({} skipped, {} frames discarded)",
        report.rounds_trained, report.rounds_skipped, report.frames_discarded
    );

    // Score against a fresh replay of the same session.
    let mut total = 0.0f32;
    let mut count = 0usize;
    for round in Synchronizer::load(dir.path(), session, 2, config.tolerance_ms)? {
        let (Some(reference), Some(camera)) = (round.get(0), round.get(1)) else {
            continue;
        };
        if !camera.joints().is_fully_tracked() || !reference.joints().is_fully_tracked() {
            continue;
        }

        let mapped = calibration.transform(1, camera.skeleton_id(), camera.joints())?;
        for (got, want) in mapped.joints().positions().iter().zip(reference.joints().positions()) {
            total += got.distance(*want);
            count += 1;
        }
    }

    info!(
        "Mean joint error after calibration: {:.4} m over {} joints",
        total / count.max(1) as f32,
        count
    );
    Ok(())
}
