mod config;
mod host;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use bridgelink::{CadenceConfig, SessionConfig};
use config::PrimaryConfig;
use host::PrimaryHost;

#[derive(Parser)]
#[command(name = "bridgelink-primary")]
#[command(about = "Primary simulator: broadcasts state to secondaries and applies their commands")]
struct Args {
    #[arg(long, default_value = "", help = "Secondaries as host or host:port, comma separated")]
    peers: String,

    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: String,

    #[arg(
        short,
        long,
        default_value_t = bridgelink::DEFAULT_PORT,
        help = "Base port for bare host names"
    )]
    port: u16,

    #[arg(short, long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(long, default_value_t = 100, help = "Loops between scenario payloads (0 disables)")]
    scenario_interval: u64,

    #[arg(long, default_value_t = 10, help = "Loops between full state payloads (0 disables)")]
    full_state_interval: u64,

    #[arg(long, default_value_t = 1000)]
    connect_timeout_ms: u64,

    #[arg(long, default_value_t = 32)]
    max_peers: usize,

    #[arg(long, default_value_t = 10)]
    stats_secs: u64,
}

impl Args {
    fn into_config(self) -> PrimaryConfig {
        PrimaryConfig {
            peers: self.peers,
            session: SessionConfig {
                bind_addr: self.bind,
                base_port: self.port,
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
                max_peers: self.max_peers,
                ..Default::default()
            },
            cadence: CadenceConfig {
                scenario_interval: self.scenario_interval,
                full_state_interval: self.full_state_interval,
            },
            tick_rate: self.tick_rate,
            stats_interval: Duration::from_secs(self.stats_secs),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    let mut host = PrimaryHost::new(config);

    let connected = host.connect()?;
    log::info!("{} secondaries connected", connected);

    host.run();

    Ok(())
}
