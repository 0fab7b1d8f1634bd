//! `sailtrack` CLI: scenario runs, live threaded runs, replay evaluation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::replay::{load_replay, save_replay, ReplayLog};
use sim::scenarios::{Scenario, ScenarioKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracker_core::metrics::TrackingMetrics;
use tracker_core::{
    IngestReport, IngestWorker, ManualClock, ObjectQuery, Shutdown, Ticker, TrackRegistry,
    TrackSnapshot, TrackerConfig,
};

/// Tracks farther than this from a target (m) do not count as tracking it.
const MATCH_RADIUS: f64 = 5.0;

#[derive(Parser)]
#[command(name = "sailtrack", about = "Sailboat object tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a named scenario in batch mode (simulated clock) and output metrics.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Tracker config (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the full replay log
        #[arg(long)]
        save_replay: Option<PathBuf>,
    },
    /// Feed a scenario in real time through the background ticker and ingest threads.
    Live {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many seconds instead of the scenario duration
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Load and evaluate a previously recorded scenario log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            config,
            output,
            save_replay: save_path,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(scenario, seed, config, output.as_deref(), save_path.as_deref())?;
        }
        Commands::Live {
            scenario,
            seed,
            config,
            duration,
        } => {
            let config = load_config(config.as_deref())?;
            run_live(scenario, seed, config, duration)?;
        }
        Commands::Replay {
            input,
            config,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            run_replay(&input, config, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    match path {
        Some(p) => TrackerConfig::from_path(p)
            .with_context(|| format!("loading tracker config from {}", p.display())),
        None => Ok(TrackerConfig::default()),
    }
}

/// Outcome of driving a registry through a recorded log.
struct Evaluation {
    metrics: TrackingMetrics,
    ingest: IngestReport,
    final_tracks: Vec<TrackSnapshot>,
    elapsed: Duration,
}

/// Replay `log` into a fresh registry on a manual clock: tick on the
/// configured interval, ingest epochs as their time comes, score every step.
fn evaluate(log: &ReplayLog, config: TrackerConfig) -> Result<Evaluation> {
    let clock = Arc::new(ManualClock::new(0.0));
    let registry = TrackRegistry::new(config, clock.clone())?;
    let tick_interval = registry.config().registry.tick_interval;
    let stale_age = registry.config().registry.stale_age;

    let start = Instant::now();
    let mut metrics = TrackingMetrics::default();
    let mut ingest = IngestReport::default();
    let mut epochs = log.epochs.iter().peekable();
    let mut next_tick = 0.0;

    for frame in &log.ground_truth {
        clock.set(frame.time);
        if frame.time >= next_tick {
            registry.tick();
            if let Some(age) = stale_age {
                registry.clear_objects(age);
            }
            while next_tick <= frame.time {
                next_tick += tick_interval;
            }
        }
        while let Some(timed) = epochs.next_if(|e| e.time <= frame.time) {
            ingest += registry.ingest_epoch(&timed.epoch);
        }
        metrics.accumulate(&registry.snapshots(), &frame.targets, MATCH_RADIUS);
    }

    Ok(Evaluation {
        metrics,
        ingest,
        final_tracks: registry.snapshots(),
        elapsed: start.elapsed(),
    })
}

fn print_evaluation(eval: &Evaluation) {
    let m = &eval.metrics;
    println!(
        "Done: {} frames, {} tracks alive, elapsed={:.2}s",
        m.n_frames,
        eval.final_tracks.len(),
        eval.elapsed.as_secs_f64(),
    );
    println!(
        "Ingest: {} updated, {} missed, {} spawned, {} rejected, {} failed",
        eval.ingest.updated,
        eval.ingest.missed,
        eval.ingest.spawned,
        eval.ingest.rejected,
        eval.ingest.failed,
    );
    println!(
        "RMSE={:.2} m  precision={:.3}  recall={:.3}  id_switches={}",
        m.rmse_position(),
        m.precision(),
        m.recall(),
        m.id_switches,
    );
}

fn write_metrics(path: &Path, log: &ReplayLog, eval: &Evaluation) -> Result<()> {
    let json = serde_json::json!({
        "scenario": log.scenario_name,
        "seed": log.seed,
        "elapsed_s": eval.elapsed.as_secs_f64(),
        "epochs": log.epochs.len(),
        "final_tracks": eval.final_tracks.len(),
        "ingest": eval.ingest,
        "rmse_position": eval.metrics.rmse_position(),
        "precision": eval.metrics.precision(),
        "recall": eval.metrics.recall(),
        "id_switches": eval.metrics.id_switches,
        "metrics": eval.metrics,
    });
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    println!("Metrics saved to {}", path.display());
    Ok(())
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: TrackerConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s)...",
        scenario.name, seed, scenario.duration
    );

    let log = scenario.record();
    let eval = evaluate(&log, config)?;
    print_evaluation(&eval);

    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }
    if let Some(opath) = output_path {
        write_metrics(opath, &log, &eval)?;
    }
    Ok(())
}

fn run_replay(input: &Path, config: TrackerConfig, output_path: Option<&Path>) -> Result<()> {
    let log = load_replay(input)
        .with_context(|| format!("loading replay from {}", input.display()))?;
    println!(
        "Replaying '{}' ({} epochs)...",
        log.scenario_name,
        log.epochs.len()
    );

    let eval = evaluate(&log, config)?;
    print_evaluation(&eval);

    if let Some(opath) = output_path {
        write_metrics(opath, &log, &eval)?;
    }
    Ok(())
}

fn run_live(
    kind: ScenarioKind,
    seed: u64,
    config: TrackerConfig,
    duration: Option<f64>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    let log = scenario.record();
    let limit = duration.unwrap_or(log.duration);

    let registry = Arc::new(TrackRegistry::with_monotonic_clock(config)?);
    let shutdown = Shutdown::new();
    let ticker = Ticker::spawn(registry.clone(), shutdown.clone())?;
    let (ingest, tx) = IngestWorker::spawn(registry.clone(), shutdown.clone())?;

    info!(scenario = %scenario.name, seconds = limit, "live run started");
    let start = Instant::now();
    for timed in log.epochs.iter().take_while(|e| e.time <= limit) {
        let due = start + Duration::from_secs_f64(timed.time);
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
        tx.send(timed.epoch.clone())?;
    }
    drop(tx);

    let epochs = ingest.join();
    let ticks = ticker.stop();
    if epochs as usize != log.epochs.iter().filter(|e| e.time <= limit).count() {
        warn!(epochs, "ingest worker stopped early");
    }
    println!(
        "Live run done: {} epochs, {} ticks, {} tracks alive, elapsed={:.2}s",
        epochs,
        ticks,
        registry.len(),
        start.elapsed().as_secs_f64(),
    );

    for t in registry.return_objects(&ObjectQuery::default()) {
        println!(
            "  {} {:>5} r={:7.2} m  b={:7.2}°  conf={:.2}",
            t.id, t.object_type, t.range, t.bearing, t.confidence
        );
    }
    println!("Buoys: {}", registry.get_buoys().len());
    Ok(())
}
