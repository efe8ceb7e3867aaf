pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    DisplayConfig, InitialConditions, IntegrationConfig, OutputConfig, ReactionConfig,
    RenderConfig, SimulationConfig, TimingConfig,
};
pub use sim_params::{RenderMode, RenderTarget, SimParams};
pub use snapshot::Snapshot;
pub use vecmath::{Vec2, Vec3};
