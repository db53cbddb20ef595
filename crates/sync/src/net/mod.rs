mod endpoint;
mod error;
mod listener;
mod peers;
mod protocol;
mod session;
mod stats;
mod tracking;

pub use endpoint::NetworkEndpoint;
pub use error::TransportError;
pub use listener::{ListenerConfig, SecondaryListener};
pub use peers::{parse_peer_list, PeerSpec};
pub use protocol::{
    ArchivedPacket, Packet, PacketError, PacketFlags, PacketHeader, PacketType, DEFAULT_PORT,
    MAX_PACKET_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use session::{Peer, PrimarySession, SessionConfig};
pub use stats::NetworkStats;
pub use tracking::{ReceiveTracker, ReliableTracker, ResendPlan};
