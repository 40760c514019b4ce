use sr_lab_abstract::{Message, Packet, ProtocolError, SystemContext, TransportProtocol};
use tracing::debug;

use crate::checksum::{is_corrupted, seal};
use crate::config::SrConfig;
use crate::error::ConfigError;
use crate::seq::SequenceSpace;

/// Running totals published through `SystemContext::record_metric`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SenderStats {
    pub window_full: u32,
    pub new_acks: u32,
    pub packets_resent: u32,
}

/// Selective Repeat sender.
///
/// Keeps the last packet sent for every sequence number in the window and a
/// per-slot acknowledged flag. `base` is the oldest unacknowledged sequence
/// number and `next_seq` the next one to assign; the single timer always
/// tracks the packet at `base`.
pub struct SrSender {
    config: SrConfig,
    space: SequenceSpace,
    initial_seq: usize,
    window: Vec<Option<Packet>>,
    acked: Vec<bool>,
    base: usize,
    next_seq: usize,
    stats: SenderStats,
}

impl Default for SrSender {
    fn default() -> Self {
        Self::build(SrConfig::default(), 0)
    }
}

impl SrSender {
    pub fn new(config: SrConfig) -> Result<Self, ConfigError> {
        Self::starting_at(config, 0)
    }

    /// Sender whose first packet will carry sequence number `seq`.
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
            window: vec![None; config.seq_space],
            acked: vec![false; config.seq_space],
            base: seq,
            next_seq: seq,
            stats: SenderStats::default(),
        }
    }

    pub fn config(&self) -> &SrConfig {
        &self.config
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn next_seq(&self) -> usize {
        self.next_seq
    }

    /// Packets sent but not yet slid out of the window.
    pub fn outstanding(&self) -> usize {
        self.space.distance(self.base, self.next_seq)
    }

    pub fn is_window_full(&self) -> bool {
        self.outstanding() >= self.config.window_size
    }

    pub fn is_acked(&self, seq: usize) -> bool {
        self.acked.get(seq).copied().unwrap_or(false)
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    /// Packetize `message` under the next sequence number and send it.
    /// Returns the sequence number used.
    pub fn submit(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<usize, ProtocolError> {
        if self.is_window_full() {
            self.stats.window_full += 1;
            ctx.log("New message arrives, send window is full");
            ctx.record_metric("window_full", f64::from(self.stats.window_full));
            return Err(ProtocolError::WindowFull {
                outstanding: self.outstanding(),
                window: self.config.window_size,
            });
        }

        let seq = self.next_seq;
        // seq < seq_space, which validate() bounds to i32.
        let packet = seal(Packet::data(seq as i32, message.data));
        self.window[seq] = Some(packet);
        self.acked[seq] = false;

        ctx.log(&format!("Sending packet {seq}"));
        ctx.send_packet(packet);

        if self.base == self.next_seq {
            ctx.start_timer(self.config.timeout);
        }
        self.next_seq = self.space.next(seq);
        Ok(seq)
    }

    fn handle_ack(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            ctx.log("Corrupted ACK received, ignoring");
            return;
        }

        let outstanding = self.outstanding();
        let Some(ack) = self
            .space
            .index(packet.acknum)
            .filter(|&ack| self.space.contains(ack, self.base, outstanding))
        else {
            ctx.log(&format!(
                "ACK {} is outside of current window, ignoring",
                packet.acknum
            ));
            return;
        };

        if self.acked[ack] {
            ctx.log(&format!("Duplicate ACK {ack} received, ignoring"));
            return;
        }

        self.acked[ack] = true;
        self.stats.new_acks += 1;
        ctx.record_metric("new_acks", f64::from(self.stats.new_acks));
        ctx.log(&format!("ACK {ack} received"));

        self.slide_window();

        ctx.stop_timer();
        if self.base != self.next_seq {
            ctx.start_timer(self.config.timeout);
        }
    }

    /// Advance `base` over the contiguous acknowledged prefix.
    fn slide_window(&mut self) {
        let old_base = self.base;
        while self.base != self.next_seq && self.acked[self.base] {
            self.acked[self.base] = false;
            self.window[self.base] = None;
            self.base = self.space.next(self.base);
        }
        if self.base != old_base {
            debug!(
                from = old_base,
                to = self.base,
                outstanding = self.outstanding(),
                "send window advanced"
            );
        }
    }

    fn retransmit_base(&mut self, ctx: &mut dyn SystemContext) {
        let pending = if self.base == self.next_seq {
            None
        } else {
            self.window[self.base]
        };
        let Some(packet) = pending else {
            ctx.log("Timer fired with an empty window, ignoring");
            return;
        };

        ctx.log(&format!("Timeout, resending packet {}", self.base));
        ctx.start_timer(self.config.timeout);
        ctx.send_packet(packet);
        self.stats.packets_resent += 1;
        ctx.record_metric("packets_resent", f64::from(self.stats.packets_resent));
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.window.fill(None);
        self.acked.fill(false);
        self.base = self.initial_seq;
        self.next_seq = self.initial_seq;
        self.stats = SenderStats::default();
        ctx.log(&format!(
            "SR sender ready (window {}, sequence space {})",
            self.config.window_size, self.config.seq_space
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        self.handle_ack(ctx, packet);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        self.retransmit_base(ctx);
    }

    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<(), ProtocolError> {
        self.submit(ctx, message).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TIMEOUT, WINDOW_SIZE};
    use crate::test_support::{RecordingContext, TimerOp, message};

    fn ack(seq: i32) -> Packet {
        seal(Packet::ack(seq))
    }

    fn sender_with(ctx: &mut RecordingContext, count: u8) -> SrSender {
        let mut sender = SrSender::default();
        sender.init(ctx);
        for i in 0..count {
            sender.submit(ctx, message(b'a' + i)).unwrap();
        }
        ctx.clear();
        sender
    }

    #[test]
    fn submit_assigns_sequence_numbers_and_starts_timer_once() {
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::default();
        sender.init(&mut ctx);

        assert_eq!(sender.submit(&mut ctx, message(b'a')), Ok(0));
        assert_eq!(sender.submit(&mut ctx, message(b'b')), Ok(1));

        let seqs: Vec<i32> = ctx.sent.iter().map(|p| p.seqnum).collect();
        assert_eq!(seqs, vec![0, 1]);
        assert!(ctx.sent.iter().all(|p| !is_corrupted(p)));
        assert_eq!(ctx.timer_ops, vec![TimerOp::Start(TIMEOUT)]);
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.next_seq(), 2);
    }

    #[test]
    fn full_window_rejects_without_mutation() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, WINDOW_SIZE as u8);
        assert!(sender.is_window_full());

        let err = sender.submit(&mut ctx, message(b'z')).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WindowFull {
                outstanding: WINDOW_SIZE,
                window: WINDOW_SIZE
            }
        );
        assert!(ctx.sent.is_empty());
        assert!(ctx.timer_ops.is_empty());
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.next_seq(), WINDOW_SIZE);
        assert_eq!(sender.stats().window_full, 1);
    }

    #[test]
    fn in_order_acks_drain_window_and_stop_timer() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 3);

        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(sender.base(), 1);
        assert_eq!(ctx.timer_ops, vec![TimerOp::Stop, TimerOp::Start(TIMEOUT)]);

        sender.on_packet(&mut ctx, ack(1));
        sender.on_packet(&mut ctx, ack(2));
        assert_eq!(sender.base(), 3);
        assert_eq!(sender.outstanding(), 0);
        assert_eq!(ctx.timer_running(), Some(false));
        assert_eq!(sender.stats().new_acks, 3);
    }

    #[test]
    fn base_never_jumps_a_gap() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 4);

        sender.on_packet(&mut ctx, ack(1));
        sender.on_packet(&mut ctx, ack(2));
        assert_eq!(sender.base(), 0);
        assert!(sender.is_acked(1));
        assert!(sender.is_acked(2));

        sender.on_packet(&mut ctx, ack(0));
        assert_eq!(sender.base(), 3);
        assert_eq!(ctx.timer_running(), Some(true));
    }

    #[test]
    fn duplicate_ack_leaves_timer_alone() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 3);
        sender.on_packet(&mut ctx, ack(1));
        ctx.clear();

        sender.on_packet(&mut ctx, ack(1));
        assert!(ctx.timer_ops.is_empty());
        assert!(ctx.sent.is_empty());
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.stats().new_acks, 1);
    }

    #[test]
    fn stale_and_corrupted_acks_are_dropped() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 2);

        // Receiver's "last good" ACK before anything arrived.
        sender.on_packet(&mut ctx, ack(11));
        sender.on_packet(&mut ctx, ack(5));

        let mut bad = ack(0);
        bad.acknum = 1;
        sender.on_packet(&mut ctx, bad);

        assert!(ctx.timer_ops.is_empty());
        assert_eq!(sender.base(), 0);
        assert!(!sender.is_acked(0));
        assert!(!sender.is_acked(1));
    }

    #[test]
    fn timeout_resends_only_base() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 4);
        sender.on_packet(&mut ctx, ack(0));
        ctx.clear();

        sender.on_timer(&mut ctx);
        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(ctx.sent[0].seqnum, 1);
        assert_eq!(ctx.sent[0].payload, message(b'b').data);
        assert_eq!(ctx.timer_ops, vec![TimerOp::Start(TIMEOUT)]);
        assert_eq!(sender.stats().packets_resent, 1);
    }

    #[test]
    fn timer_with_empty_window_is_ignored() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 0);
        sender.on_timer(&mut ctx);
        assert!(ctx.sent.is_empty());
        assert!(ctx.timer_ops.is_empty());
    }

    #[test]
    fn window_wraps_the_sequence_space() {
        let config = SrConfig::default();
        let mut ctx = RecordingContext::default();
        let mut sender = SrSender::starting_at(config, 10).unwrap();

        for i in 0..4 {
            sender.submit(&mut ctx, message(i)).unwrap();
        }
        assert_eq!(sender.next_seq(), 2);
        assert_eq!(sender.outstanding(), 4);

        sender.on_packet(&mut ctx, ack(0));
        sender.on_packet(&mut ctx, ack(1));
        assert_eq!(sender.base(), 10);
        sender.on_packet(&mut ctx, ack(11));
        assert_eq!(sender.base(), 10);
        sender.on_packet(&mut ctx, ack(10));
        assert_eq!(sender.base(), 2);
        assert_eq!(sender.outstanding(), 0);
    }

    #[test]
    fn every_base_position_fills_and_drains() {
        let config = SrConfig::default();
        for start in 0..config.seq_space {
            let mut ctx = RecordingContext::default();
            let mut sender = SrSender::starting_at(config, start).unwrap();
            for i in 0..config.window_size {
                sender.submit(&mut ctx, message(i as u8)).unwrap();
            }
            assert!(sender.is_window_full(), "start={start}");
            assert!(sender.submit(&mut ctx, message(0xff)).is_err());

            // Acknowledge newest first; base must hold until the oldest is acked.
            for k in (0..config.window_size).rev() {
                let seq = (start + k) % config.seq_space;
                sender.on_packet(&mut ctx, ack(seq as i32));
                let expected_base = if k == 0 {
                    (start + config.window_size) % config.seq_space
                } else {
                    start
                };
                assert_eq!(sender.base(), expected_base, "start={start} k={k}");
            }
            assert_eq!(sender.outstanding(), 0);
            assert_eq!(ctx.timer_running(), Some(false));
        }
    }

    #[test]
    fn starting_position_must_be_in_space() {
        let err = SrSender::starting_at(SrConfig::default(), 12).err();
        assert_eq!(
            err,
            Some(ConfigError::SequenceOutOfRange {
                seq: 12,
                seq_space: 12
            })
        );
    }

    #[test]
    fn init_resets_state() {
        let mut ctx = RecordingContext::default();
        let mut sender = sender_with(&mut ctx, 3);
        sender.on_packet(&mut ctx, ack(1));
        sender.init(&mut ctx);
        assert_eq!(sender.base(), 0);
        assert_eq!(sender.next_seq(), 0);
        assert!(!sender.is_acked(1));
        assert_eq!(sender.stats(), SenderStats::default());
    }
}
