#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("send window full: {outstanding} of {window} packets outstanding")]
    WindowFull { outstanding: usize, window: usize },

    #[error("entity does not accept application data")]
    SendUnsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
}
