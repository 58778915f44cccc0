use anyhow::Result;
use clap::Parser;
use feedwatch_core::Config;
use feedwatch_ingestion::{create_event_channel, IngestionManager};
use feedwatch_output::{OutputFormat, StdoutWriter};
use feedwatch_pipeline::Pipeline;
use std::path::PathBuf;
use tokio::io::Stdout;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// feedwatch - readable, rate-limited view of a news pipeline's log stream
#[derive(Parser, Debug)]
#[command(name = "feedwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format: plain or json (overrides config)
    #[arg(short, long)]
    format: Option<String>,

    /// Minimum gap between rate-limited lines in milliseconds (overrides config)
    #[arg(long)]
    min_interval_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

/// `--verbose` wins; otherwise `general.log_level`, falling back to warn
fn log_level(args: &Args, config: &Config) -> Level {
    if args.verbose {
        return Level::DEBUG;
    }
    config.general.log_level.parse().unwrap_or(Level::WARN)
}

fn init_tracing(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::default().to_toml()?);
        return Ok(());
    }

    let mut config = if let Some(ref config_path) = args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    if let Some(ms) = args.min_interval_ms {
        config.filter.min_interval_ms = ms;
    }

    init_tracing(log_level(&args, &config));
    info!(instance = %config.general.instance_name, "Starting feedwatch");

    let output_format = args
        .format
        .as_deref()
        .unwrap_or(&config.output.stdout.format);

    let (sender, receiver) = create_event_channel(config.general.buffer_size);
    let mut pipeline = Pipeline::from_config(&config)?;

    let mut ingestion = IngestionManager::new(config.ingestion.clone(), sender);
    let source_count = ingestion.start();
    if source_count == 0 {
        eprintln!("Warning: No event sources enabled. Enable stdin or tcp in config.");
        return Ok(());
    }
    info!(
        sources = source_count,
        stdin = ingestion.has_stdin(),
        network = ingestion.has_network(),
        "Ingestion started"
    );

    let stats = if config.output.stdout.enabled {
        let mut writer = StdoutWriter::with_format(OutputFormat::from_name(output_format));
        pipeline.run(receiver, Some(&mut writer)).await
    } else {
        pipeline.run::<Stdout>(receiver, None).await
    };

    info!(
        received = stats.received,
        emitted = stats.emitted,
        "Processing complete"
    );
    Ok(())
}
