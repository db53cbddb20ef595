use std::time::{Duration, Instant};

use anyhow::Result;

use bridgelink::wire::encode_commands;
use bridgelink::{decode_payload, Command, Payload, SecondaryListener, ShipModel};

use crate::config::SecondaryConfig;

pub struct SecondaryHost {
    listener: SecondaryListener,
    model: ShipModel,
    outbox: Vec<Command>,
    poll_timeout: Duration,
    stats_interval: Duration,
    last_stats: Instant,
    payloads_applied: u64,
    payloads_rejected: u64,
}

impl SecondaryHost {
    pub fn new(config: SecondaryConfig) -> Result<Self> {
        let listener = SecondaryListener::bind(&config.listener)?;

        let mut outbox = Vec::new();
        for text in &config.commands {
            match Command::decode(text.trim()) {
                Some(command) => outbox.push(command),
                None => log::warn!("Ignoring malformed command {:?}", text),
            }
        }

        Ok(Self {
            listener,
            model: ShipModel::new(),
            outbox,
            poll_timeout: config.poll_timeout,
            stats_interval: config.stats_interval,
            last_stats: Instant::now(),
            payloads_applied: 0,
            payloads_rejected: 0,
        })
    }

    /// Applies primary payloads until the primary sends `SD`.
    pub fn run(&mut self) -> Result<()> {
        loop {
            for text in self.listener.poll(self.poll_timeout)? {
                match decode_payload(&text) {
                    Ok(Payload::Shutdown) => {
                        log::info!("Shutdown received from primary");
                        return Ok(());
                    }
                    Ok(payload) => match payload.apply(&mut self.model) {
                        Ok(()) => self.payloads_applied += 1,
                        Err(e) => {
                            self.payloads_rejected += 1;
                            log::debug!("Payload rejected by model: {}", e);
                        }
                    },
                    Err(e) => {
                        self.payloads_rejected += 1;
                        log::debug!("Undecodable payload: {}", e);
                    }
                }
            }

            if !self.outbox.is_empty() && self.listener.primary().is_some() {
                let buffer = encode_commands(&self.outbox);
                if self.listener.send_command(&buffer)? {
                    log::info!("Forwarded {} commands to primary", self.outbox.len());
                    self.outbox.clear();
                }
            }

            if self.last_stats.elapsed() >= self.stats_interval {
                self.last_stats = Instant::now();
                self.log_stats();
            }
        }
    }

    fn log_stats(&self) {
        let stats = self.listener.stats();
        let own = self.model.own_ship.kinematics;
        log::info!(
            "loop {} | own ship ({:.1}, {:.1}) hdg {:.1} | {} contacts | recv {} pkts ({} B) | {} applied, {} rejected",
            self.model.loop_number,
            own.position.x,
            own.position.y,
            own.heading,
            self.model.contacts.len(),
            stats.packets_received,
            stats.bytes_received,
            self.payloads_applied,
            self.payloads_rejected,
        );
    }
}
