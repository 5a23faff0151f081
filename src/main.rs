use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use marionette::validator::validate_markup;
use marionette::{CommandRouter, DispatchPlan, LogTransport, TimingConfig, build_timed_sequence};

#[derive(Parser)]
#[command(name = "marionette")]
#[command(version, about = "Robot behavior sequencing and dispatch tester")]
struct Cli {
    /// Path to a JSON timing config; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the markup of a timed sequence
    Sequence {
        #[arg(long, default_value_t = 60.0)]
        total: f64,
        #[arg(long, default_value = "Bht_Vg_Laugh_Big_Fourcount")]
        behavior: String,
        #[arg(long, default_value_t = 1.5)]
        behavior_seconds: f64,
        #[arg(long, default_value_t = 0.5)]
        gap: f64,
    },
    /// Send the prebuilt laugh sequence through the dry-run transport
    Laugh {
        device: String,
        /// Override the configured target duration
        #[arg(long)]
        total: Option<f64>,
    },
    /// Run a repeated dispatch through the dry-run transport
    Repeated {
        device: String,
        #[arg(long, default_value = "Bht_Vg_Laugh_Big_Fourcount")]
        behavior: String,
        /// Stop after this many seconds; runs until ctrl-c when omitted
        #[arg(long)]
        total: Option<f64>,
        #[arg(long, default_value_t = 1.5)]
        behavior_seconds: f64,
        #[arg(long, default_value_t = 0.5)]
        gap: f64,
    },
    /// Validate a markup payload (pass the markup, or @path for a file)
    Validate { markup: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<TimingConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config at {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse config at {}", path.display()))
        }
        None => Ok(TimingConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Sequence {
            total,
            behavior,
            behavior_seconds,
            gap,
        } => {
            let sequence = build_timed_sequence(total, &behavior, behavior_seconds, gap)?;
            println!("{}", sequence.render());
            eprintln!(
                "{} behaviors, {} pauses, {:.1}s realized of {:.1}s requested",
                sequence.behavior_count(),
                sequence.pause_count(),
                sequence.realized_seconds(),
                total,
            );
        }

        Commands::Laugh { device, total } => {
            let router = CommandRouter::new(Arc::new(LogTransport), config);
            router.prebuilt_sequence(&device, total).await?;
        }

        Commands::Repeated {
            device,
            behavior,
            total,
            behavior_seconds,
            gap,
        } => {
            let router = CommandRouter::new(Arc::new(LogTransport), config);
            let plan = DispatchPlan::new(behavior)
                .with_behavior_seconds(behavior_seconds)
                .with_gap_seconds(gap);
            let plan = match total {
                Some(total) => plan.with_total_seconds(total),
                None => plan.run_until_cancelled(),
            };
            let handle = router.repeated_behavior(&device, plan)?;

            tokio::select! {
                _ = handle.finished() => {}
                _ = tokio::signal::ctrl_c() => {
                    router.interrupt(&device).await?;
                    handle.finished().await;
                }
            }
            eprintln!(
                "{:?}: {} commands sent, {} failed",
                handle.state(),
                handle.ticks_sent(),
                handle.failed_ticks(),
            );
        }

        Commands::Validate { markup } => {
            let payload = match markup.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read markup file {path}"))?,
                None => markup,
            };
            validate_markup(&payload)?;
            println!("markup is valid ({} characters)", payload.len());
        }
    }

    Ok(())
}
