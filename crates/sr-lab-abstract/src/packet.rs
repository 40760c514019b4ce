use serde::{Deserialize, Serialize};

use crate::error::PacketError;

/// Fixed size of every message and packet payload.
pub const PAYLOAD_SIZE: usize = 20;

/// Header value for a field the packet does not use (seqnum of an ACK,
/// acknum of a data packet).
pub const NOT_IN_USE: i32 = -1;

/// One application data unit handed down to the sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub data: [u8; PAYLOAD_SIZE],
}

impl Message {
    pub fn new(data: [u8; PAYLOAD_SIZE]) -> Self {
        Self { data }
    }

    /// Build a message from arbitrary bytes, zero-padding short input.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() > PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge {
                len: bytes.len(),
                max: PAYLOAD_SIZE,
            });
        }
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { data })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub seqnum: i32,
    pub acknum: i32,
    /// Integrity value over seqnum, acknum and payload. Left at 0 by the
    /// constructors below; the sending entity seals it.
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_SIZE],
}

impl Packet {
    pub fn new(seqnum: i32, acknum: i32, payload: [u8; PAYLOAD_SIZE]) -> Self {
        Self {
            seqnum,
            acknum,
            checksum: 0,
            payload,
        }
    }

    /// Data packet carrying `payload` under `seqnum`.
    pub fn data(seqnum: i32, payload: [u8; PAYLOAD_SIZE]) -> Self {
        Self::new(seqnum, NOT_IN_USE, payload)
    }

    /// Create a pure ACK packet
    pub fn ack(acknum: i32) -> Self {
        Self::new(NOT_IN_USE, acknum, [0; PAYLOAD_SIZE])
    }

    pub fn is_ack(&self) -> bool {
        self.seqnum == NOT_IN_USE
    }
}
