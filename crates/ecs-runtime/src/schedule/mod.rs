pub mod system;
pub mod scheduler;

pub use system::{CalculusFn, Phase, PhaseFn, Placement, System, SystemId};
pub use scheduler::{Scheduler, ORDERING_EPSILON};
