use crate::clock::SimClock;
use crate::field::FieldPair;
use crate::render::{self, FrameBuffer};
use crate::{seed, stepper};
use anyhow::Result;
use grayscott_common::{SimParams, SimulationConfig, Snapshot};
use log::{debug, info, trace};
use rand::distr::Uniform;
use rand::prelude::*;

/// Owns the grid state and drives the per-frame cycle: optional reset, a
/// clock-determined number of fixed integration steps, one render.
///
/// External collaborators (UI, CLI) talk to it through `request_reset`,
/// `set_paused`, `set_resolution` and the `SimParams` snapshot passed into
/// every `frame` call; the core never mutates the parameters.
pub struct Simulation {
    config: SimulationConfig,
    fields: FieldPair,
    frame: FrameBuffer,
    clock: SimClock,
    /// Master RNG; the only consumer of entropy, used at initialization time.
    rng: StdRng,
    width: usize,
    height: usize,
    reset_requested: bool,
    paused: bool,
    steps_total: u64,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let width = config.display.width as usize;
        let height = config.display.height as usize;
        let rng = match config.initial_conditions.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut sim = Self {
            config,
            fields: FieldPair::allocate(width, height)?,
            frame: FrameBuffer::new(width, height),
            clock: SimClock::new(),
            rng,
            width,
            height,
            reset_requested: false,
            paused: false,
            steps_total: 0,
            recorded_snapshots: Vec::new(),
        };
        sim.reset(0.0)?;
        Ok(sim)
    }

    /// One-shot flag; the next `frame` call reallocates and reseeds.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// A resolution change implies a reset: the pair is reallocated at the
    /// new size and prior state is forgotten, not resampled.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let (width, height) = (width as usize, height as usize);
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.reset_requested = true;
        }
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn simulated_seconds(&self) -> f64 {
        self.clock.simulated_seconds()
    }

    /// Total integration steps run since construction, across resets.
    pub fn steps_total(&self) -> u64 {
        self.steps_total
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn reset(&mut self, now_seconds: f64) -> Result<()> {
        self.fields = FieldPair::allocate(self.width, self.height)?;
        self.frame = FrameBuffer::new(self.width, self.height);

        let seed_dist = Uniform::new(0.0f32, 1000.0)?;
        let seeds = [self.rng.sample(seed_dist), self.rng.sample(seed_dist)];
        let (_, write) = self.fields.split();
        seed::initialize(write, seeds);
        self.fields.swap();

        self.clock.reset(now_seconds);
        self.reset_requested = false;
        info!(
            "Simulation reset: {}x{} grid, seeds ({:.2}, {:.2}).",
            self.width, self.height, seeds[0], seeds[1]
        );
        Ok(())
    }

    /// Runs one display frame at wall-clock time `now_seconds` and returns
    /// the rendered color buffer. Render always happens, even when paused or
    /// when the clock grants zero steps, so the display stays live.
    pub fn frame(&mut self, now_seconds: f64, params: &SimParams) -> Result<&FrameBuffer> {
        if self.reset_requested {
            self.reset(now_seconds)?;
        }

        if self.paused {
            // Keep the wall reading fresh so resuming does not replay the gap.
            self.clock.touch(now_seconds);
        } else {
            let steps = self.clock.tick(now_seconds, params.time_scale, params.time_step);
            let dt = params.time_step as f32;
            for _ in 0..steps {
                let (read, write) = self.fields.split();
                stepper::step(read, write, dt, params);
                self.fields.swap();
            }
            self.steps_total += steps as u64;
            if steps > 0 {
                trace!(
                    "Ran {} steps, simulated time {:.3} s.",
                    steps,
                    self.clock.simulated_seconds()
                );
            }
        }

        render::render(self.fields.read(), params, &mut self.frame);
        Ok(&self.frame)
    }

    /// Captures summary metrics (and, when configured, the raw channels) of
    /// the current read grid.
    pub fn record_snapshot(&mut self) {
        let field = self.fields.read();
        let (mean_u, min_u, max_u) = channel_stats(field.u());
        let (mean_v, min_v, max_v) = channel_stats(field.v());
        let (u, v) = if self.config.output.save_fields_in_snapshot {
            (Some(field.u().to_vec()), Some(field.v().to_vec()))
        } else {
            (None, None)
        };

        debug!(
            "Recording snapshot at {:.2} s (mean_v {:.4}).",
            self.clock.simulated_seconds(),
            mean_v
        );
        self.recorded_snapshots.push(Snapshot {
            time: self.clock.simulated_seconds() as f32,
            width: self.width as u32,
            height: self.height as u32,
            mean_u,
            min_u,
            max_u,
            mean_v,
            min_v,
            max_v,
            u,
            v,
        });
    }

    pub fn recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }
}

fn channel_stats(data: &[f32]) -> (f32, f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    for &value in data {
        min = min.min(value);
        max = max.max(value);
        sum += value as f64;
    }
    ((sum / data.len() as f64) as f32, min, max)
}
