//! Emblem Bridge - play a tactical game scenario through the turn engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emblem_ai::{DevicePreference, MlpEstimator};
use emblem_bridge::orchestrator::filter_actions;
use emblem_bridge::{SimulatedGame, StateSource, TurnOrchestrator};
use emblem_core::{
    ActionEnumerator, ActionScorer, EngineConfig, EngineMetrics, JsonlSink, Snapshot, UnitMaps,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "emblem-bridge")]
#[command(about = "Play tactical game scenarios with the probe-then-commit turn engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Play episodes of a scenario against the simulated game process
    Run {
        /// Scenario snapshot (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of episodes
        #[arg(short, long, default_value = "1")]
        episodes: u32,

        /// Override the turn limit
        #[arg(long)]
        max_turns: Option<u32>,

        /// Override the exploration seed
        #[arg(long)]
        seed: Option<u64>,

        /// Learned estimator weights (safetensors)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Estimator device: cpu, gpu or cuda:N
        #[arg(long, default_value = "cpu")]
        device: DevicePreference,

        /// Append decision records as JSON lines ("-" for stdout)
        #[arg(short, long)]
        records: Option<PathBuf>,

        /// Print run metrics as JSON
        #[arg(long)]
        metrics: bool,
    },

    /// List ranked actions for each ready unit of a scenario
    Actions {
        /// Scenario snapshot (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Only this unit
        #[arg(short, long)]
        unit: Option<u8>,

        /// Learned estimator weights (safetensors)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Estimator device: cpu, gpu or cuda:N
        #[arg(long, default_value = "cpu")]
        device: DevicePreference,
    },
}

fn load_scenario(path: &Path) -> Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario {}", path.display()))?;
    Snapshot::from_json(&text).with_context(|| format!("Invalid scenario {}", path.display()))
}

fn load_scorer(model: Option<&Path>, device: DevicePreference) -> Result<ActionScorer> {
    match model {
        Some(path) => {
            let estimator = MlpEstimator::load(path, device)
                .with_context(|| format!("Failed to load model {}", path.display()))?;
            Ok(ActionScorer::with_estimator(Box::new(estimator)))
        }
        None => Ok(ActionScorer::heuristic()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    scenario: &Path,
    config: Option<&Path>,
    episodes: u32,
    max_turns: Option<u32>,
    seed: Option<u64>,
    model: Option<&Path>,
    device: DevicePreference,
    records: Option<&Path>,
    print_metrics: bool,
) -> Result<()> {
    let snapshot = load_scenario(scenario)?;
    let mut config = match config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(turns) = max_turns {
        config.max_turns = turns;
    }
    if let Some(seed) = seed {
        config.exploration.seed = seed;
    }
    // The simulated process answers instantly.
    config.poll.interval_ms = 0;

    let scorer = load_scorer(model, device)?;
    let mut orchestrator = TurnOrchestrator::new(SimulatedGame::new(snapshot), config, scorer);
    match records {
        Some(path) if path == Path::new("-") => {
            orchestrator.register_sink(Box::new(JsonlSink::stdout()));
        }
        Some(path) => {
            let sink = JsonlSink::file(path)
                .with_context(|| format!("Failed to open records file {}", path.display()))?;
            orchestrator.register_sink(Box::new(sink));
        }
        None => {}
    }

    let cancel = orchestrator.cancel_token();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        log::warn!("Ctrl-C will not stop the run cleanly: {}", e);
    }

    let mut played = 0;
    let mut victories = 0;
    for _ in 0..episodes {
        if cancel.is_cancelled() {
            log::info!("Interrupted, skipping the remaining episodes");
            break;
        }
        played += 1;
        orchestrator.link_mut().reset();
        let report = orchestrator.run_episode();
        if report.cause.is_victory() {
            victories += 1;
        }
        println!("{}", report);
    }
    println!("{} of {} episodes won", victories, played);

    let totals: EngineMetrics = orchestrator.totals().clone();
    if print_metrics {
        println!("{}", serde_json::to_string_pretty(&totals)?);
    }
    orchestrator.into_link();
    Ok(())
}

fn list_actions(
    scenario: &Path,
    unit: Option<u8>,
    model: Option<&Path>,
    device: DevicePreference,
) -> Result<()> {
    let snapshot = load_scenario(scenario)?;
    let scorer = load_scorer(model, device)?;
    let mut game = SimulatedGame::new(snapshot);
    let snapshot = game.snapshot()?;
    let enumerator = ActionEnumerator::new(&snapshot);

    for ready in snapshot.ready_units().filter(|u| unit.is_none_or(|id| u.id == id)) {
        let maps = UnitMaps::compute(&snapshot, ready);
        let actions = filter_actions(&snapshot, ready, &maps, enumerator.enumerate(ready, Some(&maps)));
        let ranked = scorer.rank(&snapshot, actions);
        println!(
            "Unit {} ({}) at {}: {} actions, {} scorer",
            ready.id,
            ready.name,
            ready.pos,
            ranked.len(),
            scorer.name()
        );
        for action in ranked.iter().take(10) {
            println!("  {:>8.2}  {}", action.score, action);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = std::str::FromStr::from_str(&cli.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            config,
            episodes,
            max_turns,
            seed,
            model,
            device,
            records,
            metrics,
        } => run(
            &scenario,
            config.as_deref(),
            episodes,
            max_turns,
            seed,
            model.as_deref(),
            device,
            records.as_deref(),
            metrics,
        )?,

        Commands::Actions {
            scenario,
            unit,
            model,
            device,
        } => list_actions(&scenario, unit, model.as_deref(), device)?,
    }

    Ok(())
}
