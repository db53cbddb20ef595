use std::net::{SocketAddr, ToSocketAddrs};

pub const PEER_LIST_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSpec {
    pub host: String,
    pub port: u16,
}

impl PeerSpec {
    /// Resolves to a socket address, preferring IPv4 since the session socket is IPv4.
    pub fn resolve(&self) -> std::io::Result<SocketAddr> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", self.host),
                )
            })
    }
}

impl std::fmt::Display for PeerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parses a comma separated host list.
///
/// Entries are trimmed and lower-cased. `host:port` uses the explicit port. A bare
/// host uses `base_port`, plus one for every earlier identical bare entry, so
/// `"a,a,a"` lands on three consecutive ports.
pub fn parse_peer_list(list: &str, base_port: u16) -> Vec<PeerSpec> {
    let entries: Vec<String> = list
        .trim()
        .split(PEER_LIST_SEPARATOR)
        .map(|entry| entry.trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect();

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            if entry.contains(':') {
                let parts: Vec<&str> = entry.split(':').collect();
                if let [host, port] = parts.as_slice() {
                    let port = port.parse().unwrap_or_else(|_| {
                        log::warn!("invalid port in '{}', using {}", entry, base_port);
                        base_port
                    });
                    return PeerSpec {
                        host: (*host).to_string(),
                        port,
                    };
                }
                return PeerSpec {
                    host: entry.clone(),
                    port: base_port,
                };
            }

            let repeats = entries[..i].iter().filter(|earlier| *earlier == entry).count();
            PeerSpec {
                host: entry.clone(),
                port: base_port.wrapping_add(repeats as u16),
            }
        })
        .collect()
}
