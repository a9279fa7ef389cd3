pub mod config;
pub mod clock;
pub mod simulation;

pub use config::LoopConfig;
pub use clock::{FrameTime, LoopClock, TickReport};
pub use simulation::Simulation;
