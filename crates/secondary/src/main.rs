mod config;
mod host;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use bridgelink::ListenerConfig;
use config::SecondaryConfig;
use host::SecondaryHost;

#[derive(Parser)]
#[command(name = "bridgelink-secondary")]
#[command(about = "Secondary simulator: mirrors the primary's state")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = bridgelink::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value_t = 10)]
    poll_ms: u64,

    #[arg(long, default_value_t = 10)]
    stats_secs: u64,

    #[arg(
        short,
        long = "command",
        help = "Command to forward once the primary connects, e.g. MO,1 (repeatable)"
    )]
    commands: Vec<String>,
}

impl Args {
    fn into_config(self) -> SecondaryConfig {
        SecondaryConfig {
            listener: ListenerConfig {
                bind_addr: format!("{}:{}", self.bind, self.port),
            },
            poll_timeout: Duration::from_millis(self.poll_ms),
            stats_interval: Duration::from_secs(self.stats_secs),
            commands: self.commands,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    let mut host = SecondaryHost::new(config)?;
    host.run()?;
    log::info!("Secondary shutting down");

    Ok(())
}
