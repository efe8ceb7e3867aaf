use serde::{Deserialize, Serialize};

/// Which scalar the renderer resolves from a field cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderTarget {
    U,
    V,
    AbsDiff,
}

impl RenderTarget {
    /// Integer mapping used by external collaborators (0 = u, 1 = v, 2 = |u - v|).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RenderTarget::U),
            1 => Some(RenderTarget::V),
            2 => Some(RenderTarget::AbsDiff),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            RenderTarget::U => 0,
            RenderTarget::V => 1,
            RenderTarget::AbsDiff => 2,
        }
    }
}

impl std::str::FromStr for RenderTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u" => Ok(RenderTarget::U),
            "v" => Ok(RenderTarget::V),
            "absdiff" | "abs_diff" => Ok(RenderTarget::AbsDiff),
            other => anyhow::bail!("Unknown render target '{}'. Expected u, v, or absdiff.", other),
        }
    }
}

/// How the resolved scalar becomes a color: direct grayscale or relief shading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Flat,
    Relief,
}

impl RenderMode {
    /// Integer mapping used by external collaborators (0 = flat, 1 = relief).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(RenderMode::Flat),
            1 => Some(RenderMode::Relief),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            RenderMode::Flat => 0,
            RenderMode::Relief => 1,
        }
    }
}

impl std::str::FromStr for RenderMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(RenderMode::Flat),
            "relief" => Ok(RenderMode::Relief),
            other => anyhow::bail!("Unknown render mode '{}'. Expected flat or relief.", other),
        }
    }
}

/// Immutable per-frame parameter snapshot, derived from the configuration and
/// passed by reference into the stepper and renderer. The core never mutates
/// it; collaborators (UI, CLI) rebuild it between frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Reaction-diffusion coefficients
    pub diffusion_u: f32,
    pub diffusion_v: f32,
    pub feed: f32,
    pub kill: f32,

    // Discretization
    pub space_step: f32,
    /// Fixed integration increment, in simulated seconds. Kept as f64 so the
    /// clock's step accounting does not drift through repeated f32 rounding.
    pub time_step: f64,
    /// Simulated seconds per real second.
    pub time_scale: f64,

    // Rendering
    pub render_target: RenderTarget,
    pub render_mode: RenderMode,
}
