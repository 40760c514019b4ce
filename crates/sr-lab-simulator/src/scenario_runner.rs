use anyhow::{Context, anyhow, bail};
use sr_lab_abstract::{
    Message, SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

/// Time limit applied when a scenario carries no `max_duration` assertion.
pub const DEFAULT_MAX_DURATION: u64 = 10_000;

pub fn load_scenario(path: impl AsRef<Path>) -> anyhow::Result<TestScenario> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    toml::from_str(&content).context("Failed to parse scenario file")
}

pub fn run_scenario(
    scenario_path: impl AsRef<Path>,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> anyhow::Result<SimulationReport> {
    let scenario = load_scenario(scenario_path)?;
    run(&scenario, sender, receiver)
}

/// Build a simulator with the scenario's config and actions applied.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> anyhow::Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, sender, receiver);
    for action in &scenario.actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::from_slice(data.as_bytes())
                    .with_context(|| format!("Invalid app_send data {:?}", data))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::GenerateTraffic { count, interval } => {
                sim.schedule_traffic(*count, *interval);
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq);
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack);
            }
        }
    }
    Ok(sim)
}

/// Run `scenario` to completion and check its assertions.
pub fn run(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> anyhow::Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    if !scenario.description.is_empty() {
        info!("Description: {}", scenario.description);
    }

    let mut sim = build_simulator(scenario, sender, receiver)?;

    let max_duration = scenario
        .assertions
        .iter()
        .find_map(|a| match a {
            TestAssertion::MaxDuration { time } => Some(*time),
            _ => None,
        })
        .unwrap_or(DEFAULT_MAX_DURATION);

    if !sim.run_until(max_duration) {
        bail!("Test timed out after {} time units", max_duration);
    }

    let report = sim.export_report();
    for assertion in &scenario.assertions {
        check(assertion, &report)?;
    }
    info!(
        "Scenario '{}' passed ({} payloads delivered at time {})",
        scenario.name,
        report.delivered_data.len(),
        report.duration
    );
    Ok(report)
}

fn check(assertion: &TestAssertion, report: &SimulationReport) -> anyhow::Result<()> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            let expected = Message::from_slice(data.as_bytes())
                .with_context(|| format!("Invalid data_delivered data {:?}", data))?;
            if !report.delivered_data.contains(&expected.data) {
                bail!("Assertion Failed: Data {:?} was not delivered", data);
            }
        }
        TestAssertion::DeliveredInOrder => {
            if !report.delivered_in_order() {
                bail!(
                    "Assertion Failed: delivered {} payloads that do not match the {} accepted messages in order",
                    report.delivered_data.len(),
                    report.accepted_data.len()
                );
            }
        }
        TestAssertion::DeliveredCount { count } => {
            if report.delivered_data.len() != *count {
                bail!(
                    "Assertion Failed: delivered {} payloads, expected {}",
                    report.delivered_data.len(),
                    count
                );
            }
        }
        TestAssertion::SenderPacketCount { min, max } => {
            check_range("Sender packet count", report.stats.sender_packets, *min, *max)?;
        }
        TestAssertion::Retransmissions { min, max } => {
            let resent = report.metric_total("packets_resent") as u32;
            check_range("Retransmissions", resent, *min, *max)?;
        }
        TestAssertion::MaxDuration { .. } => {}
    }
    Ok(())
}

fn check_range(what: &str, actual: u32, min: u32, max: Option<u32>) -> anyhow::Result<()> {
    if actual < min {
        return Err(anyhow!(
            "Assertion Failed: {} is {}, expected min {}",
            what,
            actual,
            min
        ));
    }
    if let Some(max) = max
        && actual > max
    {
        return Err(anyhow!(
            "Assertion Failed: {} is {}, expected max {}",
            what,
            actual,
            max
        ));
    }
    Ok(())
}
