use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind UDP socket on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("{requested} secondaries requested, at most {max} outgoing connections allowed")]
    PeerLimit { requested: usize, max: usize },
}
