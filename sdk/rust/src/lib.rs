//! Selective Repeat sender and receiver for the SR lab channel.
//! Provides the integrity codec, circular sequence arithmetic and the two
//! protocol entities.

pub mod checksum;
pub mod config;
pub mod error;
pub mod receiver;
pub mod sender;
pub mod seq;

#[cfg(test)]
mod test_support;

pub use config::SrConfig;
pub use error::ConfigError;
pub use receiver::{ReceiverStats, SrReceiver};
pub use sender::{SenderStats, SrSender};
pub use seq::SequenceSpace;

pub use sr_lab_abstract::{Message, Packet, ProtocolError, SystemContext, TransportProtocol};

pub fn sender() -> Box<dyn TransportProtocol> {
    Box::new(SrSender::default())
}

pub fn receiver() -> Box<dyn TransportProtocol> {
    Box::new(SrReceiver::default())
}
