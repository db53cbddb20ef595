use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::simulation::{
    CadenceConfig, CadenceScheduler, CommandSink, PayloadKind, Reliability, SnapshotSource,
};
use crate::wire::{dispatch, encode_payload, SHUTDOWN_PAYLOAD};

use super::endpoint::NetworkEndpoint;
use super::error::TransportError;
use super::peers::{parse_peer_list, PeerSpec};
use super::protocol::{Packet, PacketType, DEFAULT_PORT};
use super::stats::NetworkStats;
use super::tracking::{ReceiveTracker, ReliableTracker};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub bind_addr: String,
    /// Port for bare host names; repeats of a host count up from here.
    pub base_port: u16,
    pub connect_timeout: Duration,
    pub poll_timeout: Duration,
    pub max_peers: usize,
    pub resend_interval: Duration,
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:0".to_string(),
            base_port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(1),
            poll_timeout: Duration::from_millis(10),
            max_peers: 32,
            resend_interval: Duration::from_millis(250),
            max_attempts: 20,
        }
    }
}

#[derive(Debug)]
pub struct Peer {
    pub spec: PeerSpec,
    pub addr: SocketAddr,
    receive_tracker: ReceiveTracker,
}

impl Peer {
    fn new(spec: PeerSpec, addr: SocketAddr) -> Self {
        Self {
            spec,
            addr,
            receive_tracker: ReceiveTracker::new(),
        }
    }
}

/// The primary's side of the protocol: one socket, any number of connected
/// secondaries, one payload per simulation loop.
pub struct PrimarySession {
    config: SessionConfig,
    scheduler: CadenceScheduler,
    endpoint: Option<NetworkEndpoint>,
    peers: Vec<Peer>,
    reliable: ReliableTracker,
    next_sequence: u32,
}

impl PrimarySession {
    pub fn new(config: SessionConfig, cadence: CadenceConfig) -> Self {
        let reliable = ReliableTracker::new(config.resend_interval, config.max_attempts);
        Self {
            config,
            scheduler: CadenceScheduler::new(cadence),
            endpoint: None,
            peers: Vec::new(),
            reliable,
            next_sequence: 1,
        }
    }

    /// Connects to every secondary in `peer_list` and returns how many accepted.
    ///
    /// An empty list leaves networking disabled. Peers that fail to resolve or
    /// do not answer within the connect timeout are skipped with a warning.
    pub fn connect(&mut self, peer_list: &str) -> Result<usize, TransportError> {
        let specs = parse_peer_list(peer_list, self.config.base_port);
        if specs.is_empty() {
            log::info!("No secondaries configured, networking disabled");
            return Ok(0);
        }
        if specs.len() > self.config.max_peers {
            return Err(TransportError::PeerLimit {
                requested: specs.len(),
                max: self.config.max_peers,
            });
        }

        let mut endpoint =
            NetworkEndpoint::bind(self.config.bind_addr.as_str()).map_err(|source| {
                TransportError::Bind {
                    addr: self.config.bind_addr.clone(),
                    source,
                }
            })?;
        log::info!("Primary session bound on {}", endpoint.local_addr());

        for spec in specs {
            let addr = match spec.resolve() {
                Ok(addr) => addr,
                Err(e) => {
                    log::warn!("Could not resolve secondary {}: {}", spec, e);
                    continue;
                }
            };

            if Self::handshake(&mut endpoint, addr, self.config.connect_timeout)? {
                log::info!("Connected to secondary {} ({})", spec, addr);
                self.peers.push(Peer::new(spec, addr));
            } else {
                log::warn!("Connection to secondary {} ({}) failed", spec, addr);
            }
        }

        self.endpoint = Some(endpoint);
        Ok(self.peers.len())
    }

    fn handshake(
        endpoint: &mut NetworkEndpoint,
        addr: SocketAddr,
        timeout: Duration,
    ) -> Result<bool, TransportError> {
        if let Err(e) = endpoint.send_to(&Packet::control(PacketType::Connect), addr) {
            log::warn!("Failed to send connect to {}: {}", addr, e);
            return Ok(false);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            for (packet, from) in endpoint.receive_within(remaining)? {
                if from == addr && packet.payload == PacketType::ConnectAccepted {
                    return Ok(true);
                }
                log::trace!("ignoring {:?} from {} during handshake", packet.payload, from);
            }
        }
    }

    /// One loop of the protocol: service inbound traffic, resend overdue
    /// reliable payloads, then send the payload the cadence picks for the
    /// model's current loop. Does nothing while networking is disabled.
    pub fn update<M>(&mut self, model: &mut M) -> Result<Option<PayloadKind>, TransportError>
    where
        M: SnapshotSource + CommandSink,
    {
        if self.endpoint.is_none() {
            return Ok(None);
        }

        self.receive_commands(model)?;
        self.flush_reliable();
        Ok(Some(self.send_snapshot(&*model)))
    }

    /// Applies inbound commands from connected secondaries to `model`.
    pub fn receive_commands<M: CommandSink + ?Sized>(
        &mut self,
        model: &mut M,
    ) -> Result<(), TransportError> {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return Ok(());
        };

        for (packet, addr) in endpoint.receive_within(self.config.poll_timeout)? {
            match packet.payload {
                PacketType::Ack { sequence } => {
                    if !self.reliable.acknowledge(sequence, addr) {
                        log::trace!("stale ack {} from {}", sequence, addr);
                    }
                }
                PacketType::Payload(text) => {
                    let Some(peer) = self.peers.iter_mut().find(|p| p.addr == addr) else {
                        log::debug!("ignoring payload from unknown address {}", addr);
                        continue;
                    };

                    if packet.header.is_reliable() {
                        let ack = Packet::control(PacketType::Ack {
                            sequence: packet.header.sequence,
                        });
                        if let Err(e) = endpoint.send_to(&ack, addr) {
                            log::warn!("Failed to ack {}: {}", addr, e);
                        }
                        let sequence = packet.header.sequence;
                        if !peer.receive_tracker.record_received(sequence) {
                            log::trace!("duplicate payload {} from {}", sequence, addr);
                            continue;
                        }
                    }

                    let report = dispatch(&text, model);
                    let stats = endpoint.stats_mut();
                    stats.commands_applied += report.applied as u64;
                    stats.commands_dropped += report.dropped as u64;
                }
                PacketType::Disconnect => {
                    if let Some(index) = self.peers.iter().position(|p| p.addr == addr) {
                        let peer = self.peers.remove(index);
                        self.reliable.forget_peer(addr);
                        log::info!("Secondary {} ({}) disconnected", peer.spec, addr);
                    }
                }
                PacketType::Connect | PacketType::ConnectAccepted => {
                    log::debug!("unexpected {:?} from {}", packet.payload, addr);
                }
            }
        }

        Ok(())
    }

    /// Resends reliable payloads whose ack is overdue, giving up after the
    /// configured number of attempts.
    pub fn flush_reliable(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };

        let plan = self.reliable.due(Instant::now());
        for (sequence, addr, text) in plan.resend {
            endpoint.stats_mut().reliable_resent += 1;
            if let Err(e) = endpoint.send_to(&Packet::reliable(sequence, text), addr) {
                log::warn!("Resend {} to {} failed: {}", sequence, addr, e);
            }
        }
        for (sequence, addr) in plan.abandoned {
            endpoint.stats_mut().reliable_abandoned += 1;
            log::warn!("Giving up on reliable payload {} to {}", sequence, addr);
        }
    }

    /// Encodes and broadcasts the payload the cadence selects for the model's
    /// current loop number.
    pub fn send_snapshot<S: SnapshotSource + ?Sized>(&mut self, model: &S) -> PayloadKind {
        let kind = self.scheduler.select(model.loop_number());
        let text = encode_payload(kind, model);
        match kind.reliability() {
            Reliability::Reliable => self.broadcast_reliable(&text),
            Reliability::BestEffort => self.broadcast_best_effort(&text),
        };
        kind
    }

    /// Sends `text` to every peer and tracks it until each one acks.
    /// Returns the number of peers the first send reached.
    pub fn broadcast_reliable(&mut self, text: &str) -> usize {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return 0;
        };

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let packet = Packet::reliable(sequence, text);
        let mut sent = 0;
        for peer in &self.peers {
            match endpoint.send_to(&packet, peer.addr) {
                Ok(_) => sent += 1,
                Err(e) => log::warn!("Reliable send to {} failed: {}", peer.addr, e),
            }
            self.reliable.track(sequence, peer.addr, text);
        }
        sent
    }

    pub fn broadcast_best_effort(&mut self, text: &str) -> usize {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return 0;
        };

        let packet = Packet::best_effort(text);
        let mut sent = 0;
        for peer in &self.peers {
            match endpoint.send_to(&packet, peer.addr) {
                Ok(_) => sent += 1,
                Err(e) => log::warn!("Send to {} failed: {}", peer.addr, e),
            }
        }
        sent
    }

    /// Tells every secondary to exit.
    pub fn shutdown_all_secondaries(&mut self) -> usize {
        log::info!("Sending shutdown to {} secondaries", self.peers.len());
        self.broadcast_best_effort(SHUTDOWN_PAYLOAD)
    }

    /// Says goodbye to every peer and closes the socket.
    pub fn disconnect(&mut self) {
        if let Some(mut endpoint) = self.endpoint.take() {
            let packet = Packet::control(PacketType::Disconnect);
            for peer in self.peers.drain(..) {
                if let Err(e) = endpoint.send_to(&packet, peer.addr) {
                    log::debug!("Disconnect to {} failed: {}", peer.addr, e);
                }
                self.reliable.forget_peer(peer.addr);
            }
        }
    }

    pub fn is_networking(&self) -> bool {
        self.endpoint.is_some()
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn stats(&self) -> Option<&NetworkStats> {
        self.endpoint.as_ref().map(|e| e.stats())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.endpoint.as_ref().map(|e| e.local_addr())
    }

    pub fn unacked_count(&self) -> usize {
        self.reliable.unacked_count()
    }

    pub fn scheduler(&self) -> &CadenceScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::ShipModel;

    #[test]
    fn empty_peer_list_disables_networking() {
        let mut session = PrimarySession::new(SessionConfig::default(), CadenceConfig::default());
        assert_eq!(session.connect("  ").unwrap(), 0);
        assert!(!session.is_networking());

        let mut model = ShipModel::training_area(0);
        assert_eq!(session.update(&mut model).unwrap(), None);
        assert!(session.stats().is_none());
    }

    #[test]
    fn too_many_peers_is_fatal() {
        let config = SessionConfig {
            max_peers: 2,
            ..Default::default()
        };
        let mut session = PrimarySession::new(config, CadenceConfig::default());
        let err = session.connect("a,b,c").unwrap_err();
        assert!(matches!(
            err,
            TransportError::PeerLimit {
                requested: 3,
                max: 2
            }
        ));
        assert!(!session.is_networking());
    }
}
