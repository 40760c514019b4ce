use sr_lab_abstract::{Message, Packet, ProtocolError, SystemContext, TransportProtocol};
use tracing::debug;

use crate::checksum::{is_corrupted, seal};
use crate::config::SrConfig;
use crate::error::ConfigError;
use crate::seq::SequenceSpace;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverStats {
    pub packets_received: u32,
}

/// Selective Repeat receiver.
///
/// Every valid packet is acknowledged individually. Packets inside the
/// receive window are buffered by sequence number and handed to the
/// application only once they extend the in-order prefix at `expected`.
pub struct SrReceiver {
    config: SrConfig,
    space: SequenceSpace,
    initial_seq: usize,
    buffer: Vec<Option<Packet>>,
    expected: usize,
    stats: ReceiverStats,
}

impl Default for SrReceiver {
    fn default() -> Self {
        Self::build(SrConfig::default(), 0)
    }
}

impl SrReceiver {
    pub fn new(config: SrConfig) -> Result<Self, ConfigError> {
        Self::starting_at(config, 0)
    }

    /// Receiver expecting `seq` as its first in-order packet.
    pub fn starting_at(config: SrConfig, seq: usize) -> Result<Self, ConfigError> {
        config.validate()?;
        if seq >= config.seq_space {
            return Err(ConfigError::SequenceOutOfRange {
                seq,
                seq_space: config.seq_space,
            });
        }
        Ok(Self::build(config, seq))
    }

    fn build(config: SrConfig, seq: usize) -> Self {
        Self {
            config,
            space: SequenceSpace::new(config.seq_space),
            initial_seq: seq,
            buffer: vec![None; config.seq_space],
            expected: seq,
            stats: ReceiverStats::default(),
        }
    }

    pub fn expected_seq(&self) -> usize {
        self.expected
    }

    /// Whether `seq` has arrived and is waiting for the gap before it to close.
    pub fn is_buffered(&self, seq: usize) -> bool {
        self.buffer.get(seq).is_some_and(Option::is_some)
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    fn send_ack(&self, ctx: &mut dyn SystemContext, ack: usize) {
        // ack < seq_space, which validate() bounds to i32.
        ctx.send_packet(seal(Packet::ack(ack as i32)));
    }

    fn deliver_contiguous(&mut self, ctx: &mut dyn SystemContext) {
        let from = self.expected;
        while let Some(packet) = self.buffer[self.expected].take() {
            ctx.deliver_data(&packet.payload);
            self.expected = self.space.next(self.expected);
        }
        if self.expected != from {
            debug!(
                delivered = self.space.distance(from, self.expected),
                expected = self.expected,
                "delivered in-order run"
            );
        }
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.buffer.fill(None);
        self.expected = self.initial_seq;
        self.stats = ReceiverStats::default();
        ctx.log("SR receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            let last_good = self.space.prev(self.expected);
            ctx.log(&format!("Packet corrupted, resending ACK {last_good}"));
            self.send_ack(ctx, last_good);
            return;
        }

        let Some(seq) = self.space.index(packet.seqnum) else {
            ctx.log(&format!(
                "Packet with seqnum {} outside sequence space, ignoring",
                packet.seqnum
            ));
            return;
        };

        self.stats.packets_received += 1;
        ctx.record_metric("packets_received", f64::from(self.stats.packets_received));

        let in_window = self
            .space
            .contains(seq, self.expected, self.config.window_size);
        if in_window && self.buffer[seq].is_none() {
            self.buffer[seq] = Some(packet);
            ctx.log(&format!("Packet {seq} correctly received, send ACK"));
        } else {
            // Either buffered already or delivered earlier and its ACK was lost.
            ctx.log(&format!("Duplicate packet {seq} received, resend ACK"));
        }
        self.send_ack(ctx, seq);

        self.deliver_contiguous(ctx);
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {
        // Receiver has no timers
    }

    fn on_app_data(
        &mut self,
        _ctx: &mut dyn SystemContext,
        _message: Message,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::SendUnsupported)
    }
}
