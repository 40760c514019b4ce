#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,

    #[error("sequence space {seq_space} too small for window {window_size} (need at least {min})")]
    SequenceSpaceTooSmall {
        seq_space: usize,
        window_size: usize,
        min: usize,
    },

    #[error("sequence space {0} does not fit the packet header")]
    SequenceSpaceTooLarge(usize),

    #[error("sequence number {seq} outside sequence space {seq_space}")]
    SequenceOutOfRange { seq: usize, seq_space: usize },
}
