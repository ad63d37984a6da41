pub mod bridge;
pub mod engine;

pub use bridge::{SchedulerBridge, TransitionReporter};
pub use engine::{EngineWorker, LocalEngine, SchedulingEngine, Started};
