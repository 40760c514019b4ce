pub mod config;
pub mod error;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{Message, NOT_IN_USE, PAYLOAD_SIZE, Packet};

pub use config::SimConfig;
pub use error::{PacketError, ProtocolError};
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
