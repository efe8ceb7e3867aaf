pub mod clock;
pub mod field;
pub mod render;
pub mod seed;
pub mod simulation;
pub mod stepper;

// Re-export the core surface for the binary and the visualizer.
pub use clock::{SimClock, MAX_FRAME_DELTA};
pub use field::{Field, FieldPair};
pub use render::FrameBuffer;
pub use simulation::Simulation;
