//! Demo nodes for the `run` command.
//!
//! A synthetic tone stands in for a tuner so the pipeline runs without
//! hardware.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sdrflow_config::ControlSpec;
use sdrflow_core::{
    Control, ControlKind, Input, Node, NodeError, NodeResult, Output, PortError, PortMut,
};

/// Peak amplitude of the generated tone.
pub const TONE_AMPLITUDE: f32 = 0.5;

/// A block of samples.
pub type Block = Vec<f32>;

/// Controls the demo pipeline binds, with their ranges.
pub fn demo_controls(sample_rate: u32) -> [(&'static str, ControlSpec); 2] {
    [
        (
            "freq",
            ControlSpec::new(ControlKind::Double).with_range(0.0, f64::from(sample_rate) / 2.0),
        ),
        (
            "gain",
            ControlSpec::new(ControlKind::Double).with_range(0.0, 4.0),
        ),
    ]
}

/// Sine generator paced to real time, one block per cycle.
pub struct ToneSource {
    out: Output<Block>,
    freq: Control<f64>,
    sample_rate: f64,
    block_size: usize,
    phase: f64,
    period: Option<Duration>,
    deadline: Option<Instant>,
}

impl ToneSource {
    /// Port index of the frequency control.
    pub const FREQ: usize = 1;

    /// Creates a source emitting `block_size` samples at `freq` Hz.
    pub fn new(sample_rate: u32, block_size: usize, freq: f64) -> Self {
        let period = Duration::try_from_secs_f64(block_size as f64 / f64::from(sample_rate.max(1))).ok();
        Self {
            out: Output::new(),
            freq: Control::new(freq),
            sample_rate: f64::from(sample_rate.max(1)),
            block_size,
            phase: 0.0,
            period,
            deadline: None,
        }
    }

    fn render(&mut self) -> Block {
        let step = TAU * *self.freq.value() / self.sample_rate;
        (0..self.block_size)
            .map(|_| {
                let sample = self.phase.sin() as f32 * TONE_AMPLITUDE;
                self.phase = (self.phase + step) % TAU;
                sample
            })
            .collect()
    }
}

impl Node for ToneSource {
    fn name(&self) -> &str {
        "tone-source"
    }

    fn port_count(&self) -> usize {
        2
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        match index {
            0 => Some(PortMut::from(&mut self.out)),
            Self::FREQ => Some(PortMut::from(&mut self.freq)),
            _ => None,
        }
    }

    fn init(&mut self) -> NodeResult {
        if self.block_size == 0 {
            return Err(NodeError::failed("block size must be non-zero"));
        }
        if self.period.is_none() {
            return Err(NodeError::failed(format!(
                "block of {} samples is too long to pace",
                self.block_size
            )));
        }
        self.phase = 0.0;
        self.deadline = Some(Instant::now());
        Ok(())
    }

    fn process(&mut self) -> NodeResult {
        let now = Instant::now();
        let deadline = self.deadline.unwrap_or(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        self.deadline = self.period.and_then(|period| deadline.checked_add(period));

        let block = self.render();
        self.out.store(block)?;
        Ok(())
    }
}

/// Multiplies every sample by the gain control.
pub struct Gain {
    input: Input<Block>,
    out: Output<Block>,
    gain: Control<f64>,
}

impl Gain {
    /// Port index of the gain control.
    pub const GAIN: usize = 2;

    /// Creates a gain stage with the given initial factor.
    pub fn new(gain: f64) -> Self {
        Self {
            input: Input::new(),
            out: Output::new(),
            gain: Control::new(gain),
        }
    }
}

impl Node for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn port_count(&self) -> usize {
        3
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        match index {
            0 => Some(PortMut::from(&mut self.input)),
            1 => Some(PortMut::from(&mut self.out)),
            Self::GAIN => Some(PortMut::from(&mut self.gain)),
            _ => None,
        }
    }

    fn process(&mut self) -> NodeResult {
        let block = match self.input.read() {
            Ok(block) => block,
            Err(PortError::NoData) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let gain = *self.gain.value() as f32;
        self.out.store(block.iter().map(|s| s * gain).collect())?;
        Ok(())
    }
}

/// Running totals published by a [`LevelMeter`].
#[derive(Debug, Default)]
pub struct MeterStats {
    blocks: AtomicU64,
    last_rms: AtomicU64,
}

impl MeterStats {
    /// Blocks metered so far.
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// RMS of the most recent block.
    pub fn last_rms(&self) -> f64 {
        f64::from_bits(self.last_rms.load(Ordering::Relaxed))
    }
}

/// Measures the RMS level of each block.
pub struct LevelMeter {
    input: Input<Block>,
    stats: Arc<MeterStats>,
}

impl LevelMeter {
    /// Creates a meter and the handle its readings are published to.
    pub fn new() -> (Self, Arc<MeterStats>) {
        let stats = Arc::new(MeterStats::default());
        let meter = Self {
            input: Input::new(),
            stats: Arc::clone(&stats),
        };
        (meter, stats)
    }
}

impl Node for LevelMeter {
    fn name(&self) -> &str {
        "level-meter"
    }

    fn port_count(&self) -> usize {
        1
    }

    fn port(&mut self, index: usize) -> Option<PortMut<'_>> {
        (index == 0).then(|| PortMut::from(&mut self.input))
    }

    fn process(&mut self) -> NodeResult {
        if !self.input.has_data()? {
            return Ok(());
        }
        let block = self.input.read()?;
        self.stats.last_rms.store(rms(&block).to_bits(), Ordering::Relaxed);
        self.stats.blocks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn rms(block: &[f32]) -> f64 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f64 = block.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / block.len() as f64).sqrt()
}
