//! Session hooks for a headless run: both only log.

use std::path::Path;

use affix_engine::{ExclusiveProcessing, MediaRegistrar};

/// Logs the start and end of exclusive processing and every produced file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHooks;

impl ExclusiveProcessing for LoggingHooks {
    fn begin(&self) {
        tracing::debug!("Exclusive processing started");
    }

    fn end(&self) {
        tracing::debug!("Exclusive processing ended");
    }
}

impl MediaRegistrar for LoggingHooks {
    fn register(&self, path: &Path) {
        tracing::info!(path = %path.display(), "Registered new image");
    }
}
