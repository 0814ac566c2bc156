//! Lifecycle diagnostics: `tracing` events mirrored to an optional embedder sink.

use std::fmt;
use std::sync::Arc;

/// Embedder-supplied log callback. Receives plain, human-readable messages.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Diagnostics {
    sink: Option<LogSink>,
}

impl Diagnostics {
    pub(crate) fn new(sink: Option<LogSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn debug(&self, message: &str) {
        tracing::debug!(target: "solo", "{message}");
        self.forward(message);
    }

    pub(crate) fn info(&self, message: &str) {
        tracing::info!(target: "solo", "{message}");
        self.forward(message);
    }

    pub(crate) fn warn(&self, message: &str) {
        tracing::warn!(target: "solo", "{message}");
        self.forward(message);
    }

    fn forward(&self, message: &str) {
        if let Some(sink) = &self.sink {
            sink(message);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
