use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use quixio::NoModel;
use selfplay::orchestrator::default_workers;
use selfplay::{SelfPlay, SelfPlayConfig};
use tracing::info;

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

fn default_games() -> u64 {
    env_or("QUIXIO_GAMES", 100)
}

fn default_worker_count() -> usize {
    env_or("QUIXIO_WORKERS", default_workers())
}

fn default_iterations() -> u32 {
    env_or("QUIXIO_ITERATIONS", 400)
}

fn default_opening_plies() -> u32 {
    env_or("QUIXIO_OPENING_PLIES", 10)
}

fn default_opening_temperature() -> f32 {
    env_or("QUIXIO_OPENING_TEMPERATURE", 1.0)
}

fn default_ply_cap() -> u32 {
    env_or("QUIXIO_PLY_CAP", 50)
}

fn default_output_dir() -> String {
    std::env::var("QUIXIO_OUTPUT_DIR").unwrap_or_else(|_| "data/selfplay".to_string())
}

fn default_log_level() -> String {
    std::env::var("QUIXIO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

#[derive(Parser, Debug, Clone)]
#[command(name = "quixio-selfplay")]
#[command(about = "Generate Quixio training records by PUCT self-play")]
struct Cli {
    /// Number of games to play
    #[arg(long, default_value_t = default_games())]
    games: u64,

    /// Games run in parallel
    #[arg(long, default_value_t = default_worker_count())]
    workers: usize,

    /// PUCT simulations per move
    #[arg(long, default_value_t = default_iterations())]
    iterations: u32,

    /// Plies played with the opening temperature
    #[arg(long, default_value_t = default_opening_plies())]
    opening_plies: u32,

    #[arg(long, default_value_t = default_opening_temperature())]
    opening_temperature: f32,

    /// Plies before a game is scored as a draw
    #[arg(long, default_value_t = default_ply_cap())]
    ply_cap: u32,

    /// Base RNG seed (QUIXIO_SEED); random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Directory receiving selfplay_<unix-millis>_<pid>.jsonl
    #[arg(long, default_value_t = default_output_dir())]
    output_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    log_level: String,
}

impl Cli {
    fn validate(&self) -> Result<()> {
        self.clone().into_config().validate()
    }

    fn into_config(self) -> SelfPlayConfig {
        let seed = self
            .seed
            .or_else(|| std::env::var("QUIXIO_SEED").ok().and_then(|v| v.parse().ok()));
        SelfPlayConfig {
            games: self.games,
            workers: self.workers,
            iterations: self.iterations,
            opening_plies: self.opening_plies,
            opening_temperature: self.opening_temperature,
            ply_cap: self.ply_cap,
            seed,
            output_dir: PathBuf::from(self.output_dir),
            ..SelfPlayConfig::default()
        }
    }
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.validate()?;
    init_tracing(&cli.log_level);

    // No trained model ships with the engine; searches use uniform priors.
    let runner = SelfPlay::new(cli.into_config(), Arc::new(NoModel));
    let summary = runner.run().await?;
    info!(
        completed = summary.completed,
        failed = summary.failed,
        records = summary.records,
        output = %summary.output.display(),
        "done"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let argv = std::iter::once("quixio-selfplay").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_are_valid() {
        assert!(parse(&[]).validate().is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        for flag in ["--games", "--workers", "--iterations", "--ply-cap"] {
            let cli = parse(&[flag, "0"]);
            assert!(cli.validate().is_err(), "{flag} 0 accepted");
        }
    }

    #[test]
    fn zero_iterations_name_the_flag() {
        let err = parse(&["--iterations", "0"]).validate().unwrap_err();
        assert!(err.to_string().contains("iterations"));
    }

    #[test]
    fn negative_opening_temperature_is_rejected() {
        let cli = parse(&["--opening-temperature=-1"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn flags_reach_the_config() {
        let config = parse(&["--games", "3", "--iterations", "64", "--seed", "9"]).into_config();
        assert_eq!(config.games, 3);
        assert_eq!(config.iterations, 64);
        assert_eq!(config.seed, Some(9));
    }
}
