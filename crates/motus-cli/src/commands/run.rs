//! Patch simulation command.
//!
//! Instantiates a patch on the simulated backend, holds the given sensor
//! readings fixed, ticks the engine and reports where every route target ended
//! up. With `--realtime` the ticks follow the wall clock until Ctrl+C.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use super::common::{load_patch, parse_metric, print_report};
use anyhow::Context;
use clap::Args;
use motus_core::SensorFrame;
use motus_engine::{EngineConfig, FixedStep, IntervalTicks, Session};
use motus_patch::TemplateRegistry;
use motus_registry::SimBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ticks run offline when `--ticks` is not given.
const DEFAULT_TICKS: u64 = 60;

#[derive(Args)]
pub struct RunArgs {
    /// Patch file (JSON) or factory patch name
    #[arg(value_name = "FILE|NAME")]
    patch: String,

    /// Number of ticks to run (realtime runs until Ctrl+C when omitted)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Tick interval in milliseconds (defaults to the engine config)
    #[arg(short, long)]
    interval_ms: Option<f64>,

    /// Sensor reading held for the whole run (e.g. "pitch=30")
    #[arg(short, long, value_parser = parse_metric, number_of_values = 1)]
    metric: Vec<(String, f64)>,

    /// Modulator node to trigger before the first tick
    #[arg(long, value_name = "NODE")]
    trigger: Vec<String>,

    /// Follow the wall clock instead of stepping instantly
    #[arg(long)]
    realtime: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            EngineConfig::from_json(&text)
                .with_context(|| format!("Invalid engine config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    let interval_ms = args.interval_ms.unwrap_or(config.tick_interval_ms);
    if !(interval_ms.is_finite() && interval_ms > 0.0) {
        anyhow::bail!("Tick interval must be a positive number of milliseconds");
    }

    let registry = TemplateRegistry::new();
    let (patch, report) = load_patch(&args.patch, &registry)?;
    if !report.is_clean() {
        print_report(&report);
        println!();
    }
    tracing::info!(
        nodes = patch.nodes.len(),
        routes = patch.routes.len(),
        "patch loaded"
    );

    let mut session = Session::new(SimBackend::new(), config);
    session.store_mut().set_patch(patch);

    if !args.metric.is_empty() {
        session.push_metrics(SensorFrame::from_pairs(args.metric.iter().cloned()), 0.0);
    }
    for node in &args.trigger {
        if !session.trigger(node) {
            tracing::warn!(node = %node, "not a live modulator node, trigger ignored");
        }
    }

    let ticks_run = if args.realtime {
        let running = Arc::new(AtomicBool::new(true));
        let r = Arc::clone(&running);
        ctrlc::set_handler(move || {
            println!("\nStopping...");
            r.store(false, Ordering::SeqCst);
        })?;

        let mut ticks = IntervalTicks::new(interval_ms, running);
        if let Some(limit) = args.ticks {
            ticks = ticks.limit(limit);
        }
        println!("Running at {} ms per tick. Press Ctrl+C to stop.", interval_ms);
        session.run(&mut ticks)
    } else {
        let mut ticks = FixedStep::new(0.0, interval_ms).limit(args.ticks.unwrap_or(DEFAULT_TICKS));
        session.run(&mut ticks)
    };

    print_summary(&session, ticks_run);
    session.dispose();
    Ok(())
}

fn print_summary(session: &Session<SimBackend>, ticks_run: u64) {
    let engine = session.engine();
    println!("Ran {} ticks, last at {:.1} ms", ticks_run, engine.now_ms());
    println!();

    let mut targets: Vec<&str> = Vec::new();
    for route in &engine.patch().routes {
        if !targets.contains(&route.target.as_str()) {
            targets.push(&route.target);
        }
    }

    println!("Targets:");
    println!("  {:20}  {:>12}  {:>12}  {}", "Target", "Base", "Value", "Writes");
    println!("  {:20}  {:>12}  {:>12}  {}", "------", "----", "-----", "------");
    for target in targets {
        let binding = target
            .split_once('.')
            .and_then(|(node, param)| engine.binding(node, param));
        match binding {
            Some(b) => println!(
                "  {:20}  {:>12.3}  {:>12.3}  {}",
                target,
                b.base(),
                b.last_value(),
                b.mutation_count()
            ),
            None => println!("  {:20}  {:>12}  {:>12}  -", target, "-", "(not live)"),
        }
    }

    let store = session.store();
    if !store.ui().readouts.is_empty() {
        println!();
        println!("Sources:");
        for (id, readout) in &store.ui().readouts {
            println!(
                "  {:12}  value {:>10.3}  normalized {:.3}",
                id, readout.value, readout.normalized
            );
        }
    }

    if !store.note_log().is_empty() {
        println!();
        println!("Notes:");
        for note in store.note_log() {
            println!("  {}", note);
        }
    }
}
