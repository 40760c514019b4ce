use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use sr_lab_abstract::SimConfig;
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective Repeat lab simulator")]
struct Args {
    /// Run a TOML scenario instead of generated traffic.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of messages the application hands to the sender.
    #[arg(long, default_value_t = 20)]
    messages: u32,

    /// Mean time between messages from the application.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    /// Packet loss probability.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Packet corruption probability.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,

    #[arg(long, default_value_t = 1)]
    min_latency: u64,
    #[arg(long, default_value_t = 9)]
    max_latency: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Stop the simulation at this time even if events remain.
    #[arg(long, default_value_t = 1_000_000)]
    max_time: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("sr-lab-sim-cli starting…");

    let report = match &args.scenario {
        Some(path) => {
            scenario_runner::run_scenario(path, sr_lab_rust::sender(), sr_lab_rust::receiver())?
        }
        None => run_generated(&args)?,
    };

    log_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_generated(args: &Args) -> Result<SimulationReport> {
    for (name, rate) in [("--loss", args.loss), ("--corrupt", args.corrupt)] {
        if !(0.0..=1.0).contains(&rate) {
            anyhow::bail!("{name} must be between 0 and 1, got {rate}");
        }
    }

    let config = SimConfig {
        loss_rate: args.loss,
        corrupt_rate: args.corrupt,
        min_latency: args.min_latency,
        max_latency: args.max_latency,
        seed: args.seed,
    };
    let mut sim = Simulator::new(config, sr_lab_rust::sender(), sr_lab_rust::receiver());
    sim.schedule_traffic(args.messages, args.interval);

    info!(
        "Simulating {} messages (loss {}, corruption {}, seed {})",
        args.messages, args.loss, args.corrupt, args.seed
    );
    if !sim.run_until(args.max_time) {
        warn!(
            "Stopped at time limit {} with {} events pending",
            args.max_time,
            sim.remaining_events()
        );
    }
    Ok(sim.export_report())
}

fn log_summary(report: &SimulationReport) {
    let stats = &report.stats;
    info!(
        "Finished at time {} | messages offered: {} | rejected (window full): {}",
        report.duration, stats.messages_offered, stats.messages_rejected
    );
    info!(
        "Packets sent: {} by sender, {} by receiver | lost: {} | corrupted: {}",
        stats.sender_packets, stats.receiver_packets, stats.packets_lost, stats.packets_corrupted
    );
    info!(
        "Retransmissions: {} | new ACKs: {} | packets received: {} | delivered: {}",
        report.metric_total("packets_resent"),
        report.metric_total("new_acks"),
        report.metric_total("packets_received"),
        stats.payloads_delivered
    );
    if report.delivered_in_order() {
        info!("Delivered payloads match accepted messages in order");
    } else {
        warn!(
            "Delivered {} payloads, accepted {} messages: streams differ",
            report.delivered_data.len(),
            report.accepted_data.len()
        );
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    info!("Trace written to {}", path.display());
    Ok(())
}
