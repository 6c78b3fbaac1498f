//! murmur-sim - Murmur gossip simulator
//!
//! Starts a cluster of gossip nodes on an in-process network, spreads one
//! rumor from the first node and reports how far it got.

use anyhow::Context;
use clap::{Parser, Subcommand};
use murmur_gossip::{
    Endpoint, Envelope, GossipConfig, GossipHandle, GossipService, LinkSettings, MemoryNetwork,
    NetworkEmulator, Rumor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Payload qualifier of the simulated rumor.
const SIM_QUALIFIER: &str = "murmur-sim/hello";

#[derive(Parser)]
#[command(name = "murmur-sim")]
#[command(about = "Murmur gossip cluster simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated cluster and spread one rumor
    Run(RunArgs),

    /// Print the default gossip config as JSON
    InitConfig {
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Number of nodes in the cluster
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u16).range(1..=1024))]
    nodes: u16,

    /// Tick periods to wait before reporting
    #[arg(long, default_value_t = 20)]
    rounds: u32,

    /// Percentage of accepted sends silently dropped on every link
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=100))]
    loss_percent: u8,

    /// Delivery delay applied to every link, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Path to a JSON gossip config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override: peers targeted per tick
    #[arg(long)]
    fanout: Option<usize>,

    /// Override: sends per rumor per node
    #[arg(long)]
    max_sends: Option<u32>,

    /// Override: retention window in ticks
    #[arg(long)]
    retention: Option<u64>,

    /// Override: early-eviction margin in ticks
    #[arg(long)]
    margin: Option<u64>,

    /// Override: tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,
}

impl RunArgs {
    fn gossip_config(&self) -> anyhow::Result<GossipConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => GossipConfig::default(),
        };

        if let Some(fanout) = self.fanout {
            config.fanout = fanout;
        }
        if let Some(max_sends) = self.max_sends {
            config.max_sends = max_sends;
        }
        if let Some(retention) = self.retention {
            config.retention_window = retention;
        }
        if let Some(margin) = self.margin {
            config.margin = margin;
        }
        if let Some(ms) = self.tick_ms {
            config.tick_period = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            delay: Duration::from_millis(self.delay_ms),
            ..LinkSettings::lossy(self.loss_percent)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("murmur_sim=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            run_simulation(&args).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

fn node_endpoint(index: u16) -> Endpoint {
    Endpoint::new("127.0.0.1", 9000 + index, format!("node-{index}"))
}

async fn run_simulation(args: &RunArgs) -> anyhow::Result<()> {
    let config = args.gossip_config()?;

    let emulator = NetworkEmulator::new();
    let network = MemoryNetwork::with_emulator(emulator.clone());
    let settings = args.link_settings();

    let transports: Vec<_> = (0..args.nodes)
        .map(|i| network.bind(node_endpoint(i)))
        .collect();
    if !settings.is_clean() {
        for i in 0..args.nodes {
            emulator.put(node_endpoint(i), settings);
        }
    }

    info!(
        nodes = args.nodes,
        fanout = config.fanout,
        max_sends = config.max_sends,
        loss_percent = settings.loss_percent,
        delay = ?settings.delay,
        "starting simulated cluster"
    );

    let mut handles: Vec<GossipHandle> = Vec::with_capacity(transports.len());
    for transport in transports {
        let service = GossipService::new(Arc::new(transport), Arc::new(network.clone()));
        handles.push(service.start(config.clone())?);
    }

    let origin = handles.first().context("cluster has no nodes")?;
    origin.spread(Rumor::new("sim-rumor-0", Envelope::qualifier_only(SIM_QUALIFIER)))?;
    info!(origin = %origin.local_endpoint(), "spread rumor");

    tokio::time::sleep(config.tick_period * args.rounds).await;

    let reached = handles.iter().filter(|h| h.stats().ingested > 0).count();
    let (sent, failures) = handles.iter().fold((0, 0), |(sent, failures), h| {
        let stats = h.stats();
        (sent + stats.rumors_sent, failures + stats.send_failures)
    });

    if reached < handles.len() {
        warn!(reached, total = handles.len(), "rumor did not reach every node");
    }

    println!("Simulation after {} rounds:", args.rounds);
    println!();
    println!("  Nodes reached: {} / {}", reached, handles.len());
    println!("  Rumor sends:   {sent}");
    println!("  Send failures: {failures}");

    for handle in handles {
        handle.stop().await;
    }

    Ok(())
}

fn init_config(output: Option<PathBuf>) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(&GossipConfig::default())?;

    match output {
        Some(path) => {
            std::fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Config written to {}", path.display());
        }
        None => println!("{content}"),
    }

    Ok(())
}
