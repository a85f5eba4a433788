use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use flate2::read::GzDecoder;
use inertial_tracker::types::{AccelData, GyroData, MagData};
use inertial_tracker::{
    CovarianceUpdate, MotionTracker, OutputChannel, RawVelocityBlend, SampleKind,
    SampleOutcome, SensorSample, TimeStep, TrackerConfig,
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded session (.json or .json.gz)
    #[arg(long, conflicts_with = "session_dir")]
    log: Option<PathBuf>,

    /// Directory of recorded sessions to batch replay (processes *.json[.gz])
    #[arg(long)]
    session_dir: Option<PathBuf>,

    /// Tracker configuration (JSON); missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed integration step in seconds
    #[arg(long, conflicts_with = "measured_dt")]
    fixed_dt: Option<f64>,

    /// Integrate over the measured time between samples of the same sensor
    #[arg(long, default_value_t = false)]
    measured_dt: bool,

    /// dt used for the first sample and for gaps when --measured-dt is set
    #[arg(long, default_value = "0.01")]
    fallback_dt: f64,

    /// Longest accepted gap between samples when --measured-dt is set
    #[arg(long, default_value = "0.5")]
    max_gap_secs: f64,

    /// Contract the covariance after each Kalman update
    #[arg(long, default_value_t = false)]
    contract_covariance: bool,

    /// Emit the per-axis Kalman estimate instead of the first state column
    #[arg(long, default_value_t = false)]
    per_axis_output: bool,

    /// Blend raw accelerometer x/y into velocity after every motion update
    #[arg(long, default_value_t = false)]
    raw_velocity_blend: bool,

    /// Include a snapshot after every accepted accelerometer sample
    #[arg(long, default_value_t = false)]
    trace: bool,
}

#[derive(Deserialize)]
struct Reading {
    timestamp: f64,
    accel: Option<AccelData>,
    gyro: Option<GyroData>,
    mag: Option<MagData>,
}

#[derive(Deserialize)]
struct LogFile {
    readings: Vec<Reading>,
}

fn load_log(path: &Path) -> anyhow::Result<LogFile> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn build_config(args: &Args) -> anyhow::Result<TrackerConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => TrackerConfig::default(),
    };

    if let Some(dt) = args.fixed_dt {
        config.time_step = TimeStep::Fixed { dt };
    }
    if args.measured_dt {
        config.time_step = TimeStep::Measured {
            fallback_dt: args.fallback_dt,
            max_gap_secs: args.max_gap_secs,
        };
    }
    if args.contract_covariance {
        config.kalman.covariance_update = CovarianceUpdate::Contracting;
    }
    if args.per_axis_output {
        config.kalman.output = OutputChannel::Diagonal;
    }

    config.validate()?;
    Ok(config)
}

#[derive(Default)]
struct Counters {
    fed: u64,
    non_finite: u64,
    calibrating: u64,
    rejected_gyro: u64,
    rejected_accel: u64,
    orientation_updates: u64,
    motion_updates: u64,
    recovered: u64,
    ignored: u64,
}

impl Counters {
    fn record(&mut self, outcome: &SampleOutcome) {
        self.fed += 1;
        match outcome {
            SampleOutcome::Ignored => self.ignored += 1,
            SampleOutcome::Calibrating { .. } | SampleOutcome::CalibrationComplete { .. } => {
                self.calibrating += 1
            }
            SampleOutcome::Rejected { kind, .. } => match kind {
                SampleKind::Gyroscope => self.rejected_gyro += 1,
                _ => self.rejected_accel += 1,
            },
            SampleOutcome::OrientationUpdated => self.orientation_updates += 1,
            SampleOutcome::MotionUpdated { .. } => self.motion_updates += 1,
            SampleOutcome::Recovered(_) => self.recovered += 1,
        }
    }
}

fn run_once(path: &Path, args: &Args, config: &TrackerConfig) -> anyhow::Result<serde_json::Value> {
    let mut log = load_log(path).with_context(|| format!("loading {}", path.display()))?;
    log.readings.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut tracker = MotionTracker::new(config.clone());
    let blend = RawVelocityBlend::new(config.raw_velocity_alpha);
    let mut counters = Counters::default();
    let mut trace = Vec::new();

    for reading in &log.readings {
        if !reading.timestamp.is_finite() {
            counters.non_finite += 1;
            continue;
        }

        let samples = [
            reading.gyro.as_ref().map(SensorSample::from),
            reading.accel.as_ref().map(SensorSample::from),
            reading.mag.as_ref().map(SensorSample::from),
        ];

        for sample in samples.into_iter().flatten() {
            if !sample.is_finite() {
                counters.non_finite += 1;
                continue;
            }

            let outcome = tracker.process_sample_at(sample, reading.timestamp);
            if let SampleOutcome::Recovered(ref e) = outcome {
                warn!("{}: recovered at t={:.3}s: {}", path.display(), reading.timestamp, e);
            }

            if let (SampleOutcome::MotionUpdated { .. }, SensorSample::Accelerometer(raw)) =
                (&outcome, &sample)
            {
                if args.raw_velocity_blend {
                    blend.apply(tracker.velocity_mut(), raw);
                }
                if args.trace {
                    trace.push(json!({
                        "timestamp": reading.timestamp,
                        "snapshot": tracker.snapshot(),
                    }));
                }
            }

            counters.record(&outcome);
        }
    }

    info!(
        "{}: {} readings, {} samples, {} steps",
        path.display(),
        log.readings.len(),
        counters.fed,
        tracker.step_count()
    );

    let duration = match (log.readings.first(), log.readings.last()) {
        (Some(first), Some(last)) => last.timestamp - first.timestamp,
        _ => 0.0,
    };
    let mut result = json!({
        "file": path.display().to_string(),
        "readings": log.readings.len(),
        "duration_secs": duration,
        "samples": {
            "fed": counters.fed,
            "non_finite": counters.non_finite,
            "calibrating": counters.calibrating,
            "rejected_gyro": counters.rejected_gyro,
            "rejected_accel": counters.rejected_accel,
            "orientation_updates": counters.orientation_updates,
            "motion_updates": counters.motion_updates,
            "recovered": counters.recovered,
            "ignored": counters.ignored,
        },
        "final": tracker.snapshot(),
    });
    if args.trace {
        result["trace"] = serde_json::Value::Array(trace);
    }
    Ok(result)
}

fn is_session_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".json") || name.ends_with(".json.gz")
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;
    let mut results = Vec::new();

    if let Some(dir) = args.session_dir.as_ref() {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_session_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            match run_once(&path, &args, &config) {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {:#}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &args, &config)?);
    } else {
        anyhow::bail!("Provide --log or --session-dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
