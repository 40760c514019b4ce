use sr_lab_abstract::{PAYLOAD_SIZE, Packet, SystemContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    Start(u64),
    Stop,
}

/// Context that records every effect so tests can inspect them directly.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<[u8; PAYLOAD_SIZE]>,
    pub timer_ops: Vec<TimerOp>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
}

impl RecordingContext {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn timer_running(&self) -> Option<bool> {
        self.timer_ops.last().map(|op| matches!(op, TimerOp::Start(_)))
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.timer_ops.push(TimerOp::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, payload: &[u8; PAYLOAD_SIZE]) {
        self.delivered.push(*payload);
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}

pub fn message(fill: u8) -> sr_lab_abstract::Message {
    sr_lab_abstract::Message::new([fill; PAYLOAD_SIZE])
}
