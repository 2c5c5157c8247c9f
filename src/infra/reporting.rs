//! Error reporting sink.

use tracing::error;

use crate::domain::ErrorReporter;

/// Reports captured failures as `error` events under the `error_report` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn capture(&self, context: &str, error: &str) {
        error!(target: "error_report", context = %context, error = %error, "Captured failure");
    }
}
