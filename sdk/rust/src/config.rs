use tracing::warn;

use crate::error::ConfigError;

/// Maximum number of sent-but-unacknowledged packets.
pub const WINDOW_SIZE: usize = 6;
/// Number of distinct sequence numbers; must be at least `WINDOW_SIZE + 1`.
pub const SEQ_SPACE: usize = 12;
/// Retransmission timeout in ticks. Covers one round trip plus margin.
pub const TIMEOUT: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrConfig {
    pub window_size: usize,
    pub seq_space: usize,
    pub timeout: u64,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            seq_space: SEQ_SPACE,
            timeout: TIMEOUT,
        }
    }
}

impl SrConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        let min = self.window_size + 1;
        if self.seq_space < min {
            return Err(ConfigError::SequenceSpaceTooSmall {
                seq_space: self.seq_space,
                window_size: self.window_size,
                min,
            });
        }
        if i32::try_from(self.seq_space).is_err() {
            return Err(ConfigError::SequenceSpaceTooLarge(self.seq_space));
        }
        if self.seq_space < 2 * self.window_size {
            // The receiver can then mistake a late retransmission for new data.
            warn!(
                seq_space = self.seq_space,
                window_size = self.window_size,
                "sequence space smaller than twice the window"
            );
        }
        Ok(())
    }
}
