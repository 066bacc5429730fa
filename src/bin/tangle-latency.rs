//! tangle-latency CLI - samples end-to-end delivery latency on a pub/sub bus
//!
//! Connects to the configured publisher, collects latency samples and writes
//! them to a numbered CSV report.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use tangle_latency::config::{
    parse_topics, DEFAULT_IP, DEFAULT_OUTPUT_DIR, DEFAULT_PORT, DEFAULT_SAMPLE_SIZE,
    DEFAULT_TOPICS,
};
use tangle_latency::{transport, Mode, Sampler, SamplerConfig, SamplerError, TransportKind};

#[derive(Parser)]
#[command(name = "tangle-latency")]
#[command(version, about = "Samples end-to-end delivery latency of pub/sub messages", long_about = None)]
struct Cli {
    /// IP address of the publisher
    #[arg(long, env = "TANGLE_IP", default_value = DEFAULT_IP)]
    ip: String,

    /// Port of the publisher
    #[arg(long, env = "TANGLE_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Comma-separated list of topics to subscribe to
    #[arg(long, env = "TANGLE_TOPICS", default_value = DEFAULT_TOPICS)]
    topics: String,

    /// Number of distinct messages to sample
    #[arg(
        long,
        env = "TANGLE_SIZE",
        default_value_t = DEFAULT_SAMPLE_SIZE as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    size: u64,

    /// Directory that receives the CSV reports
    #[arg(long, env = "TANGLE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Pub/sub client to use
    #[arg(long, env = "TANGLE_TRANSPORT", value_enum, default_value_t = TransportKind::Zmq)]
    transport: TransportKind,

    /// Sample a fixed number of messages, or stream rows until Ctrl-C
    #[arg(long, env = "TANGLE_MODE", value_enum, default_value_t = Mode::Sample)]
    mode: Mode,
}

impl Cli {
    fn into_config(self) -> SamplerConfig {
        SamplerConfig {
            ip: self.ip,
            port: self.port,
            topics: parse_topics(&self.topics),
            target: self.size as usize,
            output_dir: self.output_dir,
            transport: self.transport,
            mode: self.mode,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables before clap reads them
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config();
    tracing::info!("IP: {}", config.ip);
    tracing::info!("Port: {}", config.port);
    tracing::info!("Topics: {:?}", config.topics);

    if let Err(e) = run(config).await {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

async fn run(config: SamplerConfig) -> Result<(), SamplerError> {
    let subscriber = transport::open(&config).await?;
    let sampler = Sampler::from_config(&config);

    match config.mode {
        Mode::Sample => {
            let report = sampler.run(subscriber).await?;
            tracing::info!(
                "{} samples written to {} ({} frames received, {} rejected, {} duplicates, {} transport errors)",
                report.samples,
                report.path.display(),
                report.ingest.frames_received,
                report.aggregation.frames_rejected,
                report.aggregation.duplicates,
                report.ingest.transport_errors
            );
        }
        Mode::Stream => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
                tracing::info!("Interrupted, finishing report");
            };
            let report = sampler.stream(subscriber, shutdown).await?;
            tracing::info!("{} rows written to {}", report.rows, report.path.display());
        }
    }

    Ok(())
}
