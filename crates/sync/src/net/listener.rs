use std::net::SocketAddr;
use std::time::Duration;

use super::endpoint::NetworkEndpoint;
use super::error::TransportError;
use super::protocol::{Packet, PacketType, DEFAULT_PORT};
use super::stats::NetworkStats;
use super::tracking::ReceiveTracker;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind_addr: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
        }
    }
}

/// A secondary's socket. Accepts one primary at a time; the most recent
/// `Connect` wins.
pub struct SecondaryListener {
    endpoint: NetworkEndpoint,
    primary: Option<SocketAddr>,
    receive_tracker: ReceiveTracker,
}

impl SecondaryListener {
    pub fn bind(config: &ListenerConfig) -> Result<Self, TransportError> {
        let endpoint = NetworkEndpoint::bind(config.bind_addr.as_str()).map_err(|source| {
            TransportError::Bind {
                addr: config.bind_addr.clone(),
                source,
            }
        })?;
        log::info!("Secondary listening on {}", endpoint.local_addr());

        Ok(Self {
            endpoint,
            primary: None,
            receive_tracker: ReceiveTracker::new(),
        })
    }

    /// Waits up to `timeout` for traffic and returns the payload strings that
    /// arrived from the primary, in arrival order.
    pub fn poll(&mut self, timeout: Duration) -> Result<Vec<String>, TransportError> {
        let mut payloads = Vec::new();

        for (packet, addr) in self.endpoint.receive_within(timeout)? {
            match packet.payload {
                PacketType::Connect => {
                    self.reply(&Packet::control(PacketType::ConnectAccepted), addr);
                    if self.primary != Some(addr) {
                        log::info!("Primary connected from {}", addr);
                        self.primary = Some(addr);
                        self.receive_tracker.reset();
                    }
                }
                PacketType::Payload(text) => {
                    if self.primary != Some(addr) {
                        log::debug!("ignoring payload from {}, not the primary", addr);
                        continue;
                    }
                    if packet.header.is_reliable() {
                        let ack = Packet::control(PacketType::Ack {
                            sequence: packet.header.sequence,
                        });
                        self.reply(&ack, addr);
                        let sequence = packet.header.sequence;
                        if !self.receive_tracker.record_received(sequence) {
                            log::trace!("duplicate payload {} from {}", sequence, addr);
                            continue;
                        }
                    }
                    payloads.push(text);
                }
                PacketType::Disconnect => {
                    if self.primary == Some(addr) {
                        log::info!("Primary {} disconnected", addr);
                        self.primary = None;
                    }
                }
                PacketType::ConnectAccepted | PacketType::Ack { .. } => {
                    log::trace!("ignoring {:?} from {}", packet.payload, addr);
                }
            }
        }

        Ok(payloads)
    }

    /// Sends a control reply. Failures are logged and the batch carries on.
    fn reply(&mut self, packet: &Packet, addr: SocketAddr) -> bool {
        match self.endpoint.send_to(packet, addr) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Reply to {} failed: {}", addr, e);
                false
            }
        }
    }

    /// Sends an `MC...` buffer to the primary. Returns false if no primary has
    /// connected yet.
    pub fn send_command(&mut self, text: &str) -> Result<bool, TransportError> {
        let Some(primary) = self.primary else {
            log::debug!("no primary connected, dropping command {:?}", text);
            return Ok(false);
        };
        self.endpoint.send_to(&Packet::best_effort(text), primary)?;
        Ok(true)
    }

    pub fn primary(&self) -> Option<SocketAddr> {
        self.primary
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> ListenerConfig {
        ListenerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn command_without_primary_is_not_sent() {
        let mut listener = SecondaryListener::bind(&loopback()).unwrap();
        assert!(!listener.send_command("MCMO,1#").unwrap());
        assert_eq!(listener.stats().packets_sent, 0);
    }

    #[test]
    fn connect_is_accepted_and_payloads_deduplicated() {
        let mut listener = SecondaryListener::bind(&loopback()).unwrap();
        let mut primary = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr();

        primary
            .send_to(&Packet::control(PacketType::Connect), target)
            .unwrap();
        assert!(listener.poll(Duration::from_millis(500)).unwrap().is_empty());
        assert_eq!(listener.primary(), Some(primary.local_addr()));

        let accepted = primary.receive_within(Duration::from_millis(500)).unwrap();
        assert_eq!(accepted[0].0.payload, PacketType::ConnectAccepted);

        primary.send_to(&Packet::reliable(7, "SC1"), target).unwrap();
        primary.send_to(&Packet::reliable(7, "SC1"), target).unwrap();
        primary.send_to(&Packet::best_effort("OS1,2,3,4,5"), target).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        let payloads = listener.poll(Duration::from_millis(500)).unwrap();
        assert_eq!(payloads, vec!["SC1".to_string(), "OS1,2,3,4,5".to_string()]);

        let acks = primary.receive_within(Duration::from_millis(500)).unwrap();
        assert!(acks
            .iter()
            .all(|(packet, _)| packet.payload == PacketType::Ack { sequence: 7 }));
    }

    #[test]
    fn failed_reply_keeps_listening() {
        let mut listener = SecondaryListener::bind(&loopback()).unwrap();
        let unreachable: SocketAddr = "[::1]:9".parse().unwrap();
        assert!(!listener.reply(&Packet::control(PacketType::ConnectAccepted), unreachable));
        assert_eq!(listener.stats().packets_sent, 0);
    }

    #[test]
    fn whole_batch_is_returned() {
        let mut listener = SecondaryListener::bind(&loopback()).unwrap();
        let mut primary = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        let target = listener.local_addr();

        primary
            .send_to(&Packet::control(PacketType::Connect), target)
            .unwrap();
        for sequence in 1..=3 {
            primary
                .send_to(&Packet::reliable(sequence, format!("SC{sequence}")), target)
                .unwrap();
            primary
                .send_to(&Packet::best_effort(format!("OS{sequence}")), target)
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));

        let mut payloads = Vec::new();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while payloads.len() < 6 && std::time::Instant::now() < deadline {
            payloads.extend(listener.poll(Duration::from_millis(50)).unwrap());
        }
        assert_eq!(payloads, ["SC1", "OS1", "SC2", "OS2", "SC3", "OS3"]);
        assert_eq!(listener.primary(), Some(primary.local_addr()));
    }

    #[test]
    fn payload_from_stranger_is_ignored() {
        let mut listener = SecondaryListener::bind(&loopback()).unwrap();
        let mut stranger = NetworkEndpoint::bind("127.0.0.1:0").unwrap();
        stranger
            .send_to(&Packet::best_effort("SD"), listener.local_addr())
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(listener.poll(Duration::from_millis(20)).unwrap().is_empty());
    }
}
