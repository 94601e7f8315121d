//! Host startup: logging, shutdown signalling and background reporting

pub mod logging;
pub mod reporter;
pub mod shutdown;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use reporter::spawn_stats_reporter;
pub use shutdown::{ShutdownSignal, wait_for_signal};
