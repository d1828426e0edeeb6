pub mod console;

pub use console::ConsoleReporter;

use crate::classify::{FlowRecord, SessionStatus};

/// Receives the session status after every observation and on each status tick.
pub trait ReportSink {
    fn report(&mut self, status: &SessionStatus) -> std::io::Result<()>;

    /// Called once at shutdown with the final flow table.
    fn finish(&mut self, _flows: &[&FlowRecord]) -> std::io::Result<()> {
        Ok(())
    }
}
