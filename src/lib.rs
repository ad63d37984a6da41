pub mod config;
pub mod error;
pub mod fleet;
pub mod lifecycle;
pub mod monitor;
pub mod scheduler;
pub mod shutdown;
pub mod source;
