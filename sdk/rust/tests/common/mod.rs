use sr_lab_rust::{Message, Packet, SystemContext};
use sr_lab_abstract::PAYLOAD_SIZE;

/// Hand-driven stand-in for the channel: records effects, keeps one timer.
#[derive(Default)]
pub struct Wire {
    pub outbox: Vec<Packet>,
    pub delivered: Vec<[u8; PAYLOAD_SIZE]>,
    pub timer: Option<u64>,
    pub timer_starts: u32,
    pub timer_stops: u32,
}

impl Wire {
    pub fn take_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }
}

impl SystemContext for Wire {
    fn send_packet(&mut self, packet: Packet) {
        self.outbox.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.timer = Some(delay);
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        self.timer = None;
        self.timer_stops += 1;
    }

    fn deliver_data(&mut self, payload: &[u8; PAYLOAD_SIZE]) {
        self.delivered.push(*payload);
    }

    fn log(&mut self, _message: &str) {}

    fn now(&self) -> u64 {
        0
    }
}

pub fn message(i: u8) -> Message {
    Message::new([b'a' + i % 26; PAYLOAD_SIZE])
}
