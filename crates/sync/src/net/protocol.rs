use bitflags::bitflags;
use rkyv::util::AlignedVec;
use rkyv::{rancor, Archive, Deserialize, Serialize};

pub const MAX_PACKET_SIZE: usize = 8192;
pub const PROTOCOL_VERSION: u32 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4252_444C;
pub const DEFAULT_PORT: u16 = 18304;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u8 {
        /// Receiver must answer with `PacketType::Ack` carrying the header sequence.
        const RELIABLE = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u32,
    pub sequence: u32,
    pub flags: u8,
}

impl PacketHeader {
    pub fn new(sequence: u32, flags: PacketFlags) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            sequence,
            flags: flags.bits(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }

    pub fn flags(&self) -> PacketFlags {
        PacketFlags::from_bits_truncate(self.flags)
    }

    pub fn is_reliable(&self) -> bool {
        self.flags().contains(PacketFlags::RELIABLE)
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum PacketType {
    Connect,
    ConnectAccepted,
    /// One wire string (`OS...`, `BC...`, `SC...`, `SD`, `MC...`).
    Payload(String),
    Ack {
        sequence: u32,
    },
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: PacketType,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
    #[error("packet of {size} bytes exceeds the {MAX_PACKET_SIZE} byte limit")]
    TooLarge { size: usize },
}

impl Packet {
    pub fn new(header: PacketHeader, payload: PacketType) -> Self {
        Self { header, payload }
    }

    pub fn control(payload: PacketType) -> Self {
        Self::new(PacketHeader::new(0, PacketFlags::empty()), payload)
    }

    pub fn best_effort(text: impl Into<String>) -> Self {
        Self::new(
            PacketHeader::new(0, PacketFlags::empty()),
            PacketType::Payload(text.into()),
        )
    }

    pub fn reliable(sequence: u32, text: impl Into<String>) -> Self {
        Self::new(
            PacketHeader::new(sequence, PacketFlags::RELIABLE),
            PacketType::Payload(text.into()),
        )
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        let bytes = rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)?;
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(PacketError::TooLarge { size: bytes.len() });
        }
        Ok(bytes)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        // Receive buffers carry no alignment guarantee.
        let mut aligned = AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(PacketError::Deserialize)
    }
}
