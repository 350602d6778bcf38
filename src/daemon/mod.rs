// Daemon module - control loop and self-protection

mod service;

pub use service::PressureMonitor;

use crate::config::Config;
use crate::error::FatalError;

/// Run the daemon with the given configuration until externally terminated
pub fn run(config: Config) -> Result<(), FatalError> {
    PressureMonitor::new(config).run()
}
