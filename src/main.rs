use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use dsfb_flight::io::{write_csv, write_json_pretty};
use dsfb_flight::{
    create_timestamped_output_dir, summarize_batch, FlightConfig, FlightRenderer, RunnerConfig,
    ScenarioRunner,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEMO_SCENARIOS: [(&str, &str); 3] = [
    ("mean_revert_test", "mean_revert"),
    ("breakout_test", "breakout"),
    ("false_breakout_test", "false_breakout"),
];
const MONTE_CARLO_NAME: &str = "mc_breakout";
const DEFAULT_OUTPUT_BASE: &str = "output-dsfb-flight";

#[derive(Debug, Parser)]
#[command(author, version, about = "Option flight-envelope scenarios and Monte Carlo telemetry")]
struct Cli {
    /// JSON config with `envelope` and `runner` sections (defaults to ./flight.json if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output base directory; each invocation gets a timestamped run directory below it.
    /// Falls back to the config's `runner.output_dir`, then `output-dsfb-flight`
    #[arg(long)]
    output: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Steps per scenario
    #[arg(long)]
    steps: Option<usize>,

    /// Monte Carlo run count
    #[arg(long)]
    runs: Option<usize>,

    /// Path type for the Monte Carlo batch
    #[arg(long, default_value = "breakout")]
    mc_path_type: String,

    /// Keep one JSONL log per Monte Carlo run
    #[arg(long, default_value_t = false)]
    persist_runs: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref())?;
    if let Some(v) = cli.seed {
        cfg.runner.seed = v;
    }
    if let Some(v) = cli.steps {
        cfg.runner.steps = v;
    }
    if let Some(v) = cli.runs {
        cfg.runner.monte_carlo_runs = v;
    }
    if cli.persist_runs {
        cfg.runner.persist_monte_carlo_runs = true;
    }
    cfg.validate().context("invalid configuration")?;

    let base = output_base(cli.output, &cfg.runner);
    let output_dir = create_timestamped_output_dir(&base)
        .with_context(|| format!("failed to create run directory under {}", base.display()))?;
    let runner = ScenarioRunner::new(cfg.envelope.clone(), cfg.runner.clone())?
        .with_output_dir(&output_dir);
    let steps = cfg.runner.steps;

    let mut failed = Vec::new();
    for (name, path_type) in DEMO_SCENARIOS {
        match run_demo(&runner, &cfg, &output_dir, name, path_type, steps) {
            Ok(html_path) => println!("Visualization saved to {}", html_path.display()),
            Err(err) => {
                let message = format!("{err:#}");
                error!(scenario = name, error = %message, "scenario failed");
                failed.push(name);
            }
        }
    }

    let batch = runner
        .run_monte_carlo_batch(
            MONTE_CARLO_NAME,
            &cli.mc_path_type,
            cfg.runner.monte_carlo_runs,
            steps,
        )
        .context("monte carlo batch failed")?;
    let summary = summarize_batch(&batch);

    write_csv(&output_dir.join("monte_carlo_runs.csv"), &batch.records())?;
    write_json_pretty(&output_dir.join("summary.json"), &summary)?;

    println!();
    println!(
        "Monte Carlo Results for {} ({}):",
        summary.name, summary.path_type
    );
    println!(
        "Runs: {} completed / {} requested ({} failed)",
        summary.completed_runs, summary.n_runs, summary.failed_runs
    );
    println!("Breach Rate: {:.1}%", summary.breach_rate * 100.0);
    println!("Max Load: {:.3}", summary.max_load);
    println!("Avg Max Load: {:.3}", summary.mean_max_load);
    println!("Run directory: {}", output_dir.display());

    if !failed.is_empty() {
        println!("Failed scenarios: {}", failed.join(", "));
    }

    Ok(())
}

fn run_demo(
    runner: &ScenarioRunner,
    cfg: &FlightConfig,
    output_dir: &Path,
    name: &str,
    path_type: &str,
    steps: usize,
) -> anyhow::Result<PathBuf> {
    let result = runner.run_scenario(name, path_type, steps)?;
    println!(
        "Log saved to {}",
        output_dir.join(format!("{name}.jsonl")).display()
    );

    let html_path = output_dir.join(format!("{name}.html"));
    FlightRenderer::new(&result.frames, &cfg.envelope)
        .render_to_file(&html_path, name)
        .with_context(|| format!("failed to render {}", html_path.display()))?;
    Ok(html_path)
}

/// `--output` wins over the config file's `runner.output_dir`.
fn output_base(cli_output: Option<PathBuf>, runner: &RunnerConfig) -> PathBuf {
    cli_output
        .or_else(|| runner.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_BASE))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FlightConfig> {
    if let Some(path) = path {
        return FlightConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let cwd_config = PathBuf::from("flight.json");
    if cwd_config.exists() {
        return FlightConfig::from_json_file(&cwd_config)
            .with_context(|| format!("failed to load config {}", cwd_config.display()));
    }

    Ok(FlightConfig::default())
}
