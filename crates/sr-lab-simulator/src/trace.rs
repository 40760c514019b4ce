use serde::Serialize;
use sr_lab_abstract::{PAYLOAD_SIZE, SimConfig};
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

/// Counters kept by the channel over one run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChannelStats {
    /// Messages handed to the sender by the application.
    pub messages_offered: u32,
    /// Messages the sender accepted into its window.
    pub messages_accepted: u32,
    /// Messages the sender refused because its window was full.
    pub messages_rejected: u32,
    pub sender_packets: u32,
    pub receiver_packets: u32,
    pub packets_lost: u32,
    pub packets_corrupted: u32,
    pub payloads_delivered: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    pub accepted_data: Vec<[u8; PAYLOAD_SIZE]>,
    pub delivered_data: Vec<[u8; PAYLOAD_SIZE]>,
    pub stats: ChannelStats,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}

impl SimulationReport {
    /// Last recorded value of a running-total metric, 0 if never recorded.
    pub fn metric_total(&self, name: &str) -> f64 {
        self.metrics
            .get(name)
            .and_then(|series| series.last())
            .map_or(0.0, |&(_, value)| value)
    }

    /// Whether the receiver's output is exactly the accepted input.
    pub fn delivered_in_order(&self) -> bool {
        self.accepted_data == self.delivered_data
    }
}
