use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleetpulse::config::{FleetConfig, LoggingConfig, CONFIG_ENV};

#[derive(Parser)]
#[command(
    name = "fleetpulse",
    about = "Fleet telemetry monitoring and alerting",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (ingest loop + API server)
    Serve {
        /// Bind address (overrides [api].bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run a number of ingestion ticks against the simulator and print a summary
    Simulate {
        /// Number of ticks to run
        #[arg(long, default_value = "30")]
        ticks: u32,

        /// Simulator seed (overrides [fleet].simulation_seed)
        #[arg(long)]
        seed: Option<u64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Validate and list the effective alert rules
    Rules,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = FleetConfig::resolve(cli.config.as_deref())?;
    init_tracing(&cfg.logging);

    match cli.command {
        Commands::Serve { bind } => {
            tracing::info!(?bind, "Starting FleetPulse daemon");
            fleetpulse::serve(cfg, bind).await?;
        }
        Commands::Simulate { ticks, seed, json } => {
            tracing::info!(ticks, ?seed, "Running fleet simulation");
            let report = fleetpulse::simulate(&cfg, ticks, seed).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nFleetPulse Simulation ({} ticks, seed {})", report.ticks, report.seed);
                println!(
                    "Alerts: {} ({} unacknowledged)   Audit entries: {}",
                    report.summary.alerts, report.summary.unacknowledged, report.summary.audit_entries
                );
                println!("\n{:<8} | {:<12} | {:>8} | {:>7}", "Vehicle", "Link", "Latency", "Samples");
                println!("{:-<8}-|-{:-<12}-|-{:->8}-|-{:->7}", "", "", "", "");
                for d in &report.edge_status {
                    let link = if d.connected { "connected" } else { "disconnected" };
                    println!(
                        "{:<8} | {:<12} | {:>6}ms | {:>7}",
                        d.vehicle_id, link, d.latency_ms, d.sample_count
                    );
                }
                if !report.alerts.is_empty() {
                    println!("\nRecent alerts:");
                    for a in report.alerts.iter().take(10) {
                        println!(" - [{}] {} {}: {}", a.severity, a.vehicle_id, a.title, a.message);
                    }
                }
                println!();
            }
        }
        Commands::Rules => {
            let pipeline = cfg.validate()?;
            println!("{:<6} | {:<24} | {:<18} | {:<8} | Enabled", "Id", "Name", "Condition", "Severity");
            println!("{:-<6}-|-{:-<24}-|-{:-<18}-|-{:-<8}-|-{:-<7}", "", "", "", "", "");
            for rule in &pipeline.rules {
                println!(
                    "{:<6} | {:<24} | {:<18} | {:<8} | {}",
                    rule.id,
                    rule.name,
                    rule.condition(),
                    rule.severity.to_string(),
                    rule.enabled
                );
            }
        }
    }

    Ok(())
}
