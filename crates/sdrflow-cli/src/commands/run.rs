//! Demo pipeline command.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Args;
use sdrflow_config::{ConfigError, ControlSchema};
use sdrflow_core::{ControlUpdates, ControlValue, Graph, MetadataPacket};
use tracing::info;

use super::common::{init_tracing, load_config, parse_key_val};
use crate::nodes::{Gain, LevelMeter, ToneSource, demo_controls};

#[derive(Args)]
pub struct RunArgs {
    /// Flow configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Control updates applied after start (e.g., "freq=440")
    #[arg(long = "set", value_parser = parse_key_val, number_of_values = 1)]
    set: Vec<(String, String)>,

    /// Sample rate
    #[arg(long, default_value = "48000")]
    sample_rate: u32,

    /// Samples per block
    #[arg(long, default_value = "1024")]
    block_size: usize,

    /// Initial tone frequency in Hz
    #[arg(long, default_value = "1000")]
    freq: f64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

/// The configured schema plus the demo's own controls where not declared.
fn demo_schema(configured: &ControlSchema, sample_rate: u32) -> ControlSchema {
    let mut schema = configured.clone();
    for (name, spec) in demo_controls(sample_rate) {
        if schema.get(name).is_none() {
            schema.insert(name, spec);
        }
    }
    schema
}

fn parse_updates(
    schema: &ControlSchema,
    pairs: &[(String, String)],
) -> Result<ControlUpdates, ConfigError> {
    pairs
        .iter()
        .map(|(name, raw)| {
            let spec = schema
                .get(name)
                .ok_or_else(|| ConfigError::UnknownParameter(name.clone()))?;
            Ok((name.clone(), spec.parse_value(name, raw)?))
        })
        .collect()
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    let limit = args
        .duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("invalid --duration")?;

    let schema = demo_schema(&config.controls, args.sample_rate);
    let updates = parse_updates(&schema, &args.set)?;

    let mut graph = Graph::with_options(config.engine.graph_options());
    let source = graph.add(ToneSource::new(args.sample_rate, args.block_size, args.freq));
    let gain = graph.add(Gain::new(1.0));
    let (meter, stats) = LevelMeter::new();
    let meter = graph.add(meter);

    graph.connect_queued(source, gain)?;
    graph.connect(gain, meter)?;
    graph.bind::<f64>(source, ToneSource::FREQ, "freq", schema.validator("freq"))?;
    graph.bind::<f64>(gain, Gain::GAIN, "gain", schema.validator("gain"))?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    graph.start()?;
    info!(
        subgraphs = graph.subgraph_count(),
        nodes = graph.node_count(),
        "pipeline running"
    );
    if !updates.is_empty() {
        let batches = graph.post_updates(&updates)?;
        info!(updates = updates.len(), batches, "control updates posted");
    }
    if limit.is_none() {
        eprintln!("Press Ctrl+C to stop...");
    }

    let started = Instant::now();
    while running.load(Ordering::SeqCst) && limit.is_none_or(|l| started.elapsed() < l) {
        thread::sleep(Duration::from_millis(20));
    }
    graph.stop();

    let summary = MetadataPacket::new()
        .with(
            "blocks",
            ControlValue::UInt(u32::try_from(stats.blocks()).unwrap_or(u32::MAX)),
        )
        .with("rms", ControlValue::Double(stats.last_rms()))
        .with("sample_rate", ControlValue::UInt(args.sample_rate))
        .with("elapsed_s", ControlValue::Double(started.elapsed().as_secs_f64()));

    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        println!("Blocks metered: {}", stats.blocks());
        println!("Last RMS:       {:.4}", stats.last_rms());
        println!("Elapsed:        {:.2} s", started.elapsed().as_secs_f64());
    }
    Ok(())
}
