pub mod signal;
pub mod telemetry;

pub use signal::{Shutdown, ShutdownTrigger};
