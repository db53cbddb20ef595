use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bridgelink::{PrimarySession, ShipModel, TransportError};

use crate::config::PrimaryConfig;

pub struct PrimaryHost {
    model: ShipModel,
    session: PrimarySession,
    peers: String,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    stats_interval: Duration,
    last_stats: Instant,
}

impl PrimaryHost {
    pub fn new(config: PrimaryConfig) -> Self {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let tick_duration = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);

        Self {
            model: ShipModel::training_area(start),
            session: PrimarySession::new(config.session, config.cadence),
            peers: config.peers,
            tick_duration,
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            stats_interval: config.stats_interval,
            last_stats: Instant::now(),
        }
    }

    pub fn connect(&mut self) -> Result<usize, TransportError> {
        self.session.connect(&self.peers)
    }

    /// Runs the fixed-tick loop until the process is stopped. An `SD` from a
    /// secondary is relayed to every secondary and the loop carries on.
    pub fn run(&mut self) {
        self.restart_clock();
        loop {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Drops time spent before the loop started, connecting included.
    fn restart_clock(&mut self) {
        self.last_tick_time = Instant::now();
        self.accumulator = Duration::ZERO;
        self.last_stats = Instant::now();
    }

    fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick_time;
        self.last_tick_time = now;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick();
        }

        if self.last_stats.elapsed() >= self.stats_interval {
            self.last_stats = Instant::now();
            self.log_stats();
        }
    }

    fn tick(&mut self) {
        self.model.advance(self.tick_duration.as_secs_f32());

        match self.session.update(&mut self.model) {
            Ok(Some(kind)) => log::trace!("loop {} sent {:?}", self.model.loop_number, kind),
            Ok(None) => {}
            Err(e) => log::error!("Network error: {}", e),
        }

        if std::mem::take(&mut self.model.shutdown_requested) {
            log::info!("Shutdown requested by a secondary");
            self.session.shutdown_all_secondaries();
        }
    }

    fn log_stats(&self) {
        let Some(stats) = self.session.stats() else {
            return;
        };
        log::info!(
            "loop {} | {} peers | sent {} pkts ({} B) | recv {} pkts ({} B) | resent {} | abandoned {} | commands {} applied, {} dropped | {} unacked",
            self.model.loop_number,
            self.session.peers().len(),
            stats.packets_sent,
            stats.bytes_sent,
            stats.packets_received,
            stats.bytes_received,
            stats.reliable_resent,
            stats.reliable_abandoned,
            stats.commands_applied,
            stats.commands_dropped,
            self.session.unacked_count(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridgelink::{ListenerConfig, SecondaryListener, SessionConfig};

    fn offline_host() -> PrimaryHost {
        PrimaryHost::new(PrimaryConfig {
            tick_rate: 100,
            ..Default::default()
        })
    }

    #[test]
    fn shutdown_request_is_cleared_after_tick() {
        let mut host = offline_host();
        bridgelink::dispatch("MCSD#", &mut host.model);
        assert!(host.model.shutdown_requested);

        let before = host.model.loop_number;
        host.tick();
        assert!(!host.model.shutdown_requested);

        host.tick();
        assert_eq!(host.model.loop_number, before + 2);
    }

    #[test]
    fn startup_delay_is_not_caught_up() {
        let mut host = offline_host();
        std::thread::sleep(Duration::from_millis(200));

        let before = host.model.loop_number;
        host.restart_clock();
        host.tick_once();
        assert!(host.model.loop_number - before <= 1);
    }

    #[test]
    fn shutdown_from_secondary_is_relayed_and_loop_continues() {
        let mut listener = SecondaryListener::bind(&ListenerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        })
        .unwrap();
        let mut host = PrimaryHost::new(PrimaryConfig {
            peers: listener.local_addr().to_string(),
            session: SessionConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                ..Default::default()
            },
            tick_rate: 100,
            ..Default::default()
        });

        let connected = std::thread::scope(|s| {
            s.spawn(|| {
                let deadline = Instant::now() + Duration::from_secs(2);
                while listener.primary().is_none() && Instant::now() < deadline {
                    listener.poll(Duration::from_millis(20)).unwrap();
                }
            });
            host.connect().unwrap()
        });
        assert_eq!(connected, 1);

        assert!(listener.send_command("MCSD#").unwrap());

        let mut saw_shutdown = false;
        let mut after_shutdown = 0;
        let deadline = Instant::now() + Duration::from_secs(3);
        host.restart_clock();
        while after_shutdown < 3 && Instant::now() < deadline {
            host.tick_once();
            for payload in listener.poll(Duration::from_millis(5)).unwrap() {
                if payload == "SD" {
                    saw_shutdown = true;
                } else if saw_shutdown {
                    after_shutdown += 1;
                }
            }
        }

        assert!(saw_shutdown);
        assert_eq!(after_shutdown, 3);
        assert!(!host.model.shutdown_requested);
    }
}
