/// Cap on the real-time delta consumed per frame. A tab-suspend or debugger
/// pause otherwise turns into a burst of thousands of catch-up steps.
pub const MAX_FRAME_DELTA: f64 = 0.2;

/// Converts elapsed real time into a count of fixed-size simulation steps.
///
/// The accounting is deliberately a pure state transition (`advance`), so the
/// catch-up logic is testable without a wall clock; `tick` layers the
/// wall-clock sampling on top.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    simulated_seconds: f64,
    last_real_seconds: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes simulated time and re-bases the wall reading, discarding any
    /// pending step timing.
    pub fn reset(&mut self, now_real_seconds: f64) {
        self.simulated_seconds = 0.0;
        self.last_real_seconds = now_real_seconds;
    }

    /// Simulated seconds accumulated so far. Monotonic between resets.
    pub fn simulated_seconds(&self) -> f64 {
        self.simulated_seconds
    }

    /// Core catch-up rule: cap the real delta, scale it into simulated time,
    /// and report how many whole `time_step`s fit. Simulated time advances by
    /// exactly that many steps; the sub-step remainder is dropped rather than
    /// carried, matching the frame-local accumulation of the display loop.
    ///
    /// The caller must run the stepper exactly the returned number of times.
    pub fn advance(&mut self, real_delta_seconds: f64, time_scale: f64, time_step: f64) -> u32 {
        if time_step <= 0.0 {
            return 0;
        }
        let capped = real_delta_seconds.clamp(0.0, MAX_FRAME_DELTA);
        let target = self.simulated_seconds + time_scale * capped;
        let steps = ((target - self.simulated_seconds) / time_step).floor().max(0.0) as u32;
        self.simulated_seconds += steps as f64 * time_step;
        steps
    }

    /// Samples the wall clock and advances against the previous reading.
    pub fn tick(&mut self, now_real_seconds: f64, time_scale: f64, time_step: f64) -> u32 {
        let delta = now_real_seconds - self.last_real_seconds;
        self.last_real_seconds = now_real_seconds;
        self.advance(delta, time_scale, time_step)
    }

    /// Refreshes the wall reading without stepping. Called while paused so
    /// that resuming does not replay the paused gap as catch-up work.
    pub fn touch(&mut self, now_real_seconds: f64) {
        self.last_real_seconds = now_real_seconds;
    }
}
