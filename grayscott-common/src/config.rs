use crate::sim_params::{RenderMode, RenderTarget, SimParams};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Target resolution of the display surface; the grid is allocated 1:1.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

// Gray-Scott reaction coefficients.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReactionConfig {
    pub diffusion_u: f32,
    pub diffusion_v: f32,
    pub feed: f32,
    pub kill: f32,
}

// Discretization and real-time-to-simulation-time coupling.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IntegrationConfig {
    pub space_step: f32,
    pub time_step: f64,
    pub time_scale: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_render_target")]
    pub target: RenderTarget,
    #[serde(default = "default_render_mode")]
    pub mode: RenderMode,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            target: default_render_target(),
            mode: default_render_mode(),
        }
    }
}

fn default_render_target() -> RenderTarget {
    RenderTarget::U
}

fn default_render_mode() -> RenderMode {
    RenderMode::Relief
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct InitialConditions {
    /// Master RNG seed. Drawn from OS entropy when absent, so restarts
    /// produce fresh patterns unless a run is pinned for reproducibility.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

// Real-time run parameters for the headless engine binary.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub duration_seconds: f64,
    pub target_fps: f64,
    pub record_interval_seconds: f64,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_snapshots: bool,
    /// Include the raw u/v channel data in each snapshot. Required for the
    /// visualizer; metrics-only snapshots are much smaller.
    pub save_fields_in_snapshot: bool,
    pub save_metrics: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub display: DisplayConfig,
    pub reaction: ReactionConfig,
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    pub timing: TimingConfig,
    pub output: OutputConfig,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    ///
    /// Range validation happens here and nowhere else: the core assumes the
    /// parameters it receives were already vetted by this layer.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            anyhow::bail!("display dimensions must be positive.");
        }
        if self.reaction.diffusion_u <= 0.0 || self.reaction.diffusion_v <= 0.0 {
            anyhow::bail!("diffusion coefficients must be positive.");
        }
        if !(0.0..=1.0).contains(&self.reaction.feed) || !(0.0..=1.0).contains(&self.reaction.kill) {
            anyhow::bail!("feed and kill must lie in [0, 1].");
        }
        if self.integration.space_step <= 0.0 {
            anyhow::bail!("space_step must be positive.");
        }
        if self.integration.time_step <= 0.0 {
            anyhow::bail!("time_step must be positive.");
        }
        if self.integration.time_scale < 0.0 {
            anyhow::bail!("time_scale must be non-negative.");
        }
        if self.timing.duration_seconds < 0.0 {
            anyhow::bail!("duration_seconds must be non-negative.");
        }
        if self.timing.target_fps <= 0.0 {
            anyhow::bail!("target_fps must be positive.");
        }
        if self.timing.record_interval_seconds <= 0.0 {
            anyhow::bail!("record_interval_seconds must be positive.");
        }
        Ok(())
    }

    /// Converts the configuration into the runtime parameter snapshot.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            diffusion_u: self.reaction.diffusion_u,
            diffusion_v: self.reaction.diffusion_v,
            feed: self.reaction.feed,
            kill: self.reaction.kill,
            space_step: self.integration.space_step,
            time_step: self.integration.time_step,
            time_scale: self.integration.time_scale,
            render_target: self.render.target,
            render_mode: self.render.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [display]
        width = 256
        height = 192

        [reaction]
        diffusion_u = 0.0009
        diffusion_v = 0.004
        feed = 0.09
        kill = 0.06

        [integration]
        space_step = 0.05
        time_step = 0.1
        time_scale = 200.0

        [render]
        target = "absdiff"
        mode = "flat"

        [timing]
        duration_seconds = 10.0
        target_fps = 60.0
        record_interval_seconds = 0.5

        [output]
        base_filename = "grayscott"
        save_snapshots = true
        save_fields_in_snapshot = true
        save_metrics = true
    "#;

    #[test]
    fn parses_and_derives_params() {
        let config: SimulationConfig = toml::from_str(VALID).unwrap();
        config.validate().unwrap();
        let params = config.get_sim_params();
        assert_eq!(params.render_target, RenderTarget::AbsDiff);
        assert_eq!(params.render_mode, RenderMode::Flat);
        assert!(config.initial_conditions.rng_seed.is_none());
        assert!((params.time_scale - 200.0).abs() < 1e-12);
    }

    #[test]
    fn render_section_is_optional() {
        let stripped: String = VALID
            .lines()
            .filter(|line| {
                let line = line.trim();
                !(line.starts_with("[render]")
                    || line.starts_with("target =")
                    || line.starts_with("mode ="))
            })
            .collect::<Vec<_>>()
            .join("\n");
        let config: SimulationConfig = toml::from_str(&stripped).unwrap();
        assert_eq!(config.render.target, RenderTarget::U);
        assert_eq!(config.render.mode, RenderMode::Relief);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config: SimulationConfig = toml::from_str(VALID).unwrap();
        config.reaction.feed = 1.5;
        assert!(config.validate().is_err());

        let mut config: SimulationConfig = toml::from_str(VALID).unwrap();
        config.integration.time_step = 0.0;
        assert!(config.validate().is_err());

        let mut config: SimulationConfig = toml::from_str(VALID).unwrap();
        config.display.width = 0;
        assert!(config.validate().is_err());
    }
}
