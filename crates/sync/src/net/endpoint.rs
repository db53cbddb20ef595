use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use super::protocol::{Packet, MAX_PACKET_SIZE};
use super::stats::NetworkStats;

const POLL_SLEEP: Duration = Duration::from_millis(1);

/// Non-blocking UDP socket that speaks the packet envelope.
pub struct NetworkEndpoint {
    socket: UdpSocket,
    local_addr: SocketAddr,
    stats: NetworkStats,
    recv_buffer: Box<[u8; MAX_PACKET_SIZE]>,
}

impl NetworkEndpoint {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            stats: NetworkStats::default(),
            recv_buffer: Box::new([0u8; MAX_PACKET_SIZE]),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut NetworkStats {
        &mut self.stats
    }

    pub fn send_to(&mut self, packet: &Packet, addr: SocketAddr) -> io::Result<usize> {
        let data = packet.serialize().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )
        })?;

        let bytes = self.socket.send_to(&data, addr)?;
        self.stats.record_sent(bytes);
        log::trace!("sent {} bytes to {}", bytes, addr);

        Ok(bytes)
    }

    /// Drains every datagram currently queued on the socket.
    pub fn receive(&mut self) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let mut packets = Vec::new();

        loop {
            match self.socket.recv_from(&mut self.recv_buffer[..]) {
                Ok((size, addr)) => match Packet::deserialize(&self.recv_buffer[..size]) {
                    Ok(packet) if packet.header.is_valid() => {
                        self.stats.record_received(size);
                        packets.push((packet, addr));
                    }
                    Ok(_) => log::trace!("discarding packet with bad magic from {}", addr),
                    Err(e) => log::trace!("discarding undecodable packet from {}: {}", addr, e),
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                // ICMP port-unreachable from a vanished peer surfaces here on some platforms.
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(packets)
    }

    /// Waits up to `timeout` for at least one packet, then drains the socket.
    pub fn receive_within(&mut self, timeout: Duration) -> io::Result<Vec<(Packet, SocketAddr)>> {
        let start = Instant::now();
        loop {
            let packets = self.receive()?;
            if !packets.is_empty() || start.elapsed() >= timeout {
                return Ok(packets);
            }
            thread::sleep(POLL_SLEEP.min(timeout.saturating_sub(start.elapsed())));
        }
    }
}
