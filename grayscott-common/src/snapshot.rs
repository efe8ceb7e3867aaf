use serde::{Deserialize, Serialize};

/// Recorded field state and summary metrics at a single simulated instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated seconds at capture time.
    pub time: f32,
    /// Grid dimensions at capture time (a reset may change them mid-run).
    pub width: u32,
    pub height: u32,

    // Per-channel summary metrics, always present.
    pub mean_u: f32,
    pub min_u: f32,
    pub max_u: f32,
    pub mean_v: f32,
    pub min_v: f32,
    pub max_v: f32,

    /// Raw channel data in row-major order. Present only when
    /// `output.save_fields_in_snapshot` is set; the visualizer needs it.
    /// The fields are always serialized (as None when absent) so the binary
    /// snapshot stream stays readable without a schema.
    pub u: Option<Vec<f32>>,
    pub v: Option<Vec<f32>>,
}
