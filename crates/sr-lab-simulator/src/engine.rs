use crate::trace::{ChannelStats, SimulationReport};
use rand::Rng;
use serde::Serialize;
use sr_lab_abstract::{
    Message, PAYLOAD_SIZE, Packet, ProtocolError, SimConfig, SystemContext, TransportProtocol,
};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

/// Value the channel writes into a corrupted header field.
const CORRUPTED_FIELD: i32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Actions buffered during an entity's callback
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<[u8; PAYLOAD_SIZE]>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl SystemContext for ScopedContext<'_> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, payload: &[u8; PAYLOAD_SIZE]) {
        self.buffer.delivered_data.push(*payload);
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

/// The single countdown timer of one entity. Expiry events carry the
/// generation they were scheduled under; any later start or stop bumps the
/// generation so the stale event is skipped.
#[derive(Debug, Default)]
struct TimerSlot {
    generation: u64,
    deadline: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    Drop,
    Corrupt,
}

/// One-shot fault matched against the seqnum of sender packets or the
/// acknum of receiver ACKs.
#[derive(Debug)]
struct Fault {
    source: NodeId,
    key: i32,
    kind: FaultKind,
}

/// Message number `index` of generated traffic: 20 copies of one letter.
pub fn traffic_message(index: u32) -> Message {
    Message::new([b'a' + (index % 26) as u8; PAYLOAD_SIZE])
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,
    initialized: bool,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    /// Messages the sender accepted, in submission order.
    pub accepted_data: Vec<[u8; PAYLOAD_SIZE]>,
    /// Payloads handed to the receiving application, in delivery order.
    pub delivered_data: Vec<[u8; PAYLOAD_SIZE]>,
    pub stats: ChannelStats,

    /// Time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "packets_resent"), Value: Vec<(time, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    faults: Vec<Fault>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerSlot>,
    /// Latest arrival time scheduled toward each node; keeps each direction FIFO.
    last_arrival: HashMap<NodeId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        if config.max_latency < config.min_latency {
            warn!(
                min = config.min_latency,
                max = config.max_latency,
                "max_latency below min_latency; using min_latency for every packet"
            );
        }

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            initialized: false,
            config,
            rng,
            sender,
            receiver,
            accepted_data: Vec::new(),
            delivered_data: Vec::new(),
            stats: ChannelStats::default(),
            metrics: HashMap::new(),
            faults: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
            last_arrival: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: i32) {
        self.add_fault(NodeId::Sender, seq, FaultKind::Drop);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: i32) {
        self.add_fault(NodeId::Receiver, ack, FaultKind::Drop);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: i32) {
        self.add_fault(NodeId::Sender, seq, FaultKind::Corrupt);
    }

    /// Register a deterministic fault: corrupt the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: i32) {
        self.add_fault(NodeId::Receiver, ack, FaultKind::Corrupt);
    }

    fn add_fault(&mut self, source: NodeId, key: i32, kind: FaultKind) {
        self.faults.push(Fault { source, key, kind });
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Return a slice of (time, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` generated messages after the current time, spaced by
    /// a uniform draw from `[0, 2 * mean_interval]`.
    pub fn schedule_traffic(&mut self, count: u32, mean_interval: u64) {
        let mut at = self.time;
        for index in 0..count {
            at += self.rng.random_range(0..=mean_interval.saturating_mul(2));
            self.schedule_app_send(at, traffic_message(index));
        }
    }

    /// Run both entities' `init`. Later calls do nothing.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.dispatch(NodeId::Sender, |entity, ctx| entity.init(ctx));
        self.dispatch(NodeId::Receiver, |entity, ctx| entity.init(ctx));
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Deadline of `node`'s pending timer, if one is running.
    pub fn timer_deadline(&self, node: NodeId) -> Option<u64> {
        self.timers.get(&node).and_then(|slot| slot.deadline)
    }

    /// Invoke one entity callback and apply the effects it buffered.
    fn dispatch<R>(
        &mut self,
        node: NodeId,
        callback: impl FnOnce(&mut dyn TransportProtocol, &mut dyn SystemContext) -> R,
    ) -> R {
        let mut buffer = ActionBuffer::default();
        let result = {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            let entity = match node {
                NodeId::Sender => self.sender.as_mut(),
                NodeId::Receiver => self.receiver.as_mut(),
            };
            callback(entity, &mut ctx)
        };
        self.process_actions(node, buffer);
        result
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::PacketArrival { to, packet } => {
                self.dispatch(to, |entity, ctx| entity.on_packet(ctx, packet));
            }
            EventType::TimerExpiry { node, generation } => {
                let slot = self.timers.entry(node).or_default();
                if slot.generation != generation || slot.deadline.is_none() {
                    debug!("Skipping stale timer event for {:?}", node);
                    return true; // Event processed (by being ignored)
                }
                slot.deadline = None;
                self.dispatch(node, |entity, ctx| entity.on_timer(ctx));
            }
            EventType::AppSend { message } => {
                self.stats.messages_offered += 1;
                let outcome = self.dispatch(NodeId::Sender, |entity, ctx| {
                    entity.on_app_data(ctx, message)
                });
                match outcome {
                    Ok(()) => {
                        self.stats.messages_accepted += 1;
                        self.accepted_data.push(message.data);
                    }
                    Err(err @ ProtocolError::WindowFull { .. }) => {
                        self.stats.messages_rejected += 1;
                        debug!("Sender rejected message: {}", err);
                    }
                    Err(err) => {
                        self.stats.messages_rejected += 1;
                        warn!("Sender rejected message: {}", err);
                    }
                }
            }
        }
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            accepted_data: self.accepted_data.clone(),
            delivered_data: self.delivered_data.clone(),
            stats: self.stats.clone(),
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Run until the queue drains or the next event lies beyond `limit`.
    /// Returns false in the latter case.
    pub fn run_until(&mut self, limit: u64) -> bool {
        self.init();
        while let Some(next) = self.peek_next_event_time() {
            if next > limit {
                return false;
            }
            self.step();
        }
        true
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        // First, fold metrics into simulator-wide store
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            self.stats.payloads_delivered += 1;
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!("[{:?}] DELIVERED payload to application", source_node),
            });
            self.delivered_data.push(data);
        }

        // Timer operations apply in call order; the last one wins.
        for op in buffer.timer_ops {
            let now = self.time;
            let slot = self.timers.entry(source_node).or_default();
            slot.generation += 1;
            match op {
                TimerOp::Start(delay) => {
                    if slot.deadline.is_some() {
                        debug!("[{:?}] replacing pending timer", source_node);
                    }
                    slot.deadline = Some(now + delay);
                    let generation = slot.generation;
                    self.push_event(
                        now + delay,
                        EventType::TimerExpiry {
                            node: source_node,
                            generation,
                        },
                    );
                }
                TimerOp::Stop => {
                    if slot.deadline.is_none() {
                        debug!("[{:?}] stop_timer with no timer running", source_node);
                    }
                    slot.deadline = None;
                }
            }
        }

        for packet in buffer.outgoing_packets {
            self.transmit(source_node, packet);
        }
    }

    /// Channel: faults, loss, corruption, then order-preserving delivery.
    fn transmit(&mut self, source_node: NodeId, mut packet: Packet) {
        let target_node = source_node.peer();
        let key = match source_node {
            NodeId::Sender => {
                self.stats.sender_packets += 1;
                Some(packet.seqnum)
            }
            NodeId::Receiver => {
                self.stats.receiver_packets += 1;
                packet.is_ack().then_some(packet.acknum)
            }
        };

        let fault = key.and_then(|key| {
            self.faults
                .iter()
                .position(|f| f.source == source_node && f.key == key)
                .map(|pos| self.faults.remove(pos).kind)
        });

        match fault {
            Some(FaultKind::Drop) => {
                self.record_loss(source_node, &packet, "deterministic");
                return;
            }
            Some(FaultKind::Corrupt) => self.corrupt(source_node, &mut packet),
            None => {
                if self.rng.random::<f64>() < self.config.loss_rate {
                    self.record_loss(source_node, &packet, "random loss");
                    return;
                }
                if self.rng.random::<f64>() < self.config.corrupt_rate {
                    self.corrupt(source_node, &mut packet);
                }
            }
        }

        let max_latency = self.config.max_latency.max(self.config.min_latency);
        let latency = self
            .rng
            .random_range(self.config.min_latency..=max_latency);
        let earliest = self
            .last_arrival
            .get(&target_node)
            .copied()
            .unwrap_or(0)
            .max(self.time);
        let arrival_time = earliest + latency;
        self.last_arrival.insert(target_node, arrival_time);

        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] SEND seq={} ack={} (arrives at {})",
                source_node, target_node, packet.seqnum, packet.acknum, arrival_time
            ),
        });

        self.push_event(
            arrival_time,
            EventType::PacketArrival {
                to: target_node,
                packet,
            },
        );
    }

    fn record_loss(&mut self, source_node: NodeId, packet: &Packet, cause: &str) {
        self.stats.packets_lost += 1;
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] DROP ({}) seq={} ack={}",
                source_node,
                source_node.peer(),
                cause,
                packet.seqnum,
                packet.acknum
            ),
        });
        debug!("Packet lost in channel ({})", cause);
    }

    /// Overwrite one field, leaving the checksum as sent.
    fn corrupt(&mut self, source_node: NodeId, packet: &mut Packet) {
        self.stats.packets_corrupted += 1;
        let roll = self.rng.random::<f64>();
        if roll < 0.75 {
            packet.payload[0] = b'Z';
        } else if roll < 0.875 {
            packet.seqnum = CORRUPTED_FIELD;
        } else {
            packet.acknum = CORRUPTED_FIELD;
        }
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description: format!(
                "[{:?}->{:?}] CORRUPT seq={} ack={}",
                source_node,
                source_node.peer(),
                packet.seqnum,
                packet.acknum
            ),
        });
        debug!("Packet corrupted in channel");
    }
}
