pub mod net;
pub mod simulation;
pub mod wire;

pub use net::{
    ListenerConfig, NetworkStats, Packet, PacketType, PrimarySession, SecondaryListener,
    SessionConfig, TransportError, DEFAULT_PORT,
};
pub use simulation::{
    CadenceConfig, CadenceScheduler, CommandSink, PayloadKind, ShipModel, SnapshotSink,
    SnapshotSource,
};
pub use wire::{decode_payload, dispatch, encode_payload, Command, DecodeError, Payload};
