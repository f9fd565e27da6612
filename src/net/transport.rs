//! Transport-layer segment carried by packets.

/// TCP segment (minimal fields for simulation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpSegment {
    /// Data segment: `seq` is byte sequence number, `len` is payload bytes.
    Data { seq: u64, len: u32 },
    /// Pure ACK: `ack` is next expected byte (cumulative).
    Ack { ack: u64 },
}

impl TcpSegment {
    /// Sequence number as it would appear in the 32-bit header field.
    pub fn header_seq(&self) -> u32 {
        match *self {
            TcpSegment::Data { seq, .. } => seq as u32,
            TcpSegment::Ack { .. } => 0,
        }
    }

    /// Acknowledgement number as it would appear in the 32-bit header field.
    pub fn header_ack(&self) -> u32 {
        match *self {
            TcpSegment::Data { .. } => 0,
            TcpSegment::Ack { ack } => ack as u32,
        }
    }
}
