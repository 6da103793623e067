use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use floodwatch::config::{AppConfig, LogFormat, LoggingConfig};
use floodwatch::{analysis, collector, storage};

#[derive(Parser)]
#[command(
    name = "floodwatch",
    about = "Volumetric traffic anomaly detection and incident tracking",
    version,
    long_about = None
)]
struct Cli {
    /// SQLite database path (overrides [storage].db_path)
    #[arg(long, global = true, env = "FLOODWATCH_DB")]
    db: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the database
    InitDb,

    /// Generate synthetic traffic and store it
    Generate {
        /// Number of one-second samples to write
        #[arg(long, default_value = "120")]
        seconds: u32,

        /// Chance per second that an attack burst starts
        #[arg(long)]
        ddos_prob: Option<f64>,
    },

    /// Analyze stored traffic and record analysis rows and incidents
    Analyze {
        /// Number of most recent points to analyze
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run the dashboard with the background producer and analyzer
    Run {
        /// Bind address
        #[arg(long)]
        bind: Option<String>,

        /// Number of most recent points replayed per analysis pass
        #[arg(long)]
        limit: Option<usize>,

        /// Chance per second that an attack burst starts
        #[arg(long)]
        ddos_prob: Option<f64>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, origin) = AppConfig::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    init_tracing(&config.logging);
    origin.log();

    match cli.command {
        Commands::InitDb => {
            storage::open_pool(&config.storage.db_path)?;
            println!("Database initialized: {}", config.storage.db_path.display());
        }
        Commands::Generate { seconds, ddos_prob } => {
            let probability = ddos_prob.unwrap_or(config.collector.ddos_probability);
            tracing::info!(%seconds, %probability, "Generating synthetic traffic");

            let pool = storage::open_pool(&config.storage.db_path)?;
            let start_ts = chrono::Utc::now().timestamp();
            let generator = collector::TrafficGenerator::from_entropy(start_ts, probability)?;

            let mut attack_seconds = 0;
            for sample in generator.take(seconds as usize) {
                if sample.label == collector::TrafficLabel::Attack {
                    attack_seconds += 1;
                }
                storage::insert_sample(&pool, &sample)?;
            }
            println!(
                "Wrote {} points ({} attack seconds) into {}",
                seconds,
                attack_seconds,
                config.storage.db_path.display()
            );
        }
        Commands::Analyze { limit } => {
            let limit = limit.unwrap_or(config.analysis.limit);
            let pool = storage::open_pool(&config.storage.db_path)?;
            let report = analysis::analyze_batch(&pool, &config.detector, limit)?;
            println!(
                "Analyzed {} points: {} anomalous, {} new incidents",
                report.points, report.anomalies, report.incidents_written
            );
        }
        Commands::Run {
            bind,
            limit,
            ddos_prob,
        } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(limit) = limit {
                config.analysis.limit = limit;
            }
            if let Some(p) = ddos_prob {
                config.collector.ddos_probability = p;
            }
            tracing::info!(bind = %config.server.bind, "Starting floodwatch daemon");
            floodwatch::serve(config).await?;
        }
    }

    Ok(())
}
