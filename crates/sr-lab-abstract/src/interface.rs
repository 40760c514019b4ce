use crate::error::ProtocolError;
use crate::packet::{Message, PAYLOAD_SIZE, Packet};

/// The capability provided by the channel to an entity while it handles one
/// event. Effects are applied by the channel after the handler returns.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel for delivery to the peer.
    fn send_packet(&mut self, packet: Packet);

    /// Start this entity's single countdown timer. A timer that is already
    /// running is replaced, so at most one deadline is ever pending.
    fn start_timer(&mut self, delay: u64);

    /// Stop this entity's timer, if running.
    fn stop_timer(&mut self);

    /// Deliver an in-order payload to the application layer.
    fn deliver_data(&mut self, payload: &[u8; PAYLOAD_SIZE]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Get current simulation time in ticks
    fn now(&self) -> u64;

    /// Record a numeric metric (e.g. a running counter) for the final report.
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so non-reporting environments don't need to care.
    }
}

/// The events an entity reacts to. Every handler runs to completion
/// without blocking.
pub trait TransportProtocol {
    /// Called once before any other event.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the network.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when this entity's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer has a new message to send.
    /// A rejected message is dropped; resubmitting it is the caller's job.
    fn on_app_data(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<(), ProtocolError>;
}
