use std::io::Write;

use serde::Serialize;

use super::ReportSink;
use crate::classify::{FlowRecord, SessionStatus};
use crate::config::{OutputFormat, ReportConfig};
use crate::utils::{flow_table_header, format_flow_row};

#[derive(Serialize)]
struct FlowSummary<'a> {
    flows: &'a [&'a FlowRecord],
}

/// Writes one status line per snapshot, as text or JSON.
pub struct ConsoleReporter<W: Write> {
    out: W,
    format: OutputFormat,
    only_changes: bool,
    last: Option<SessionStatus>,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout(config: &ReportConfig) -> Self {
        Self::new(std::io::stdout(), config)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, config: &ReportConfig) -> Self {
        Self {
            out,
            format: config.format,
            only_changes: config.only_changes,
            last: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleReporter<W> {
    fn report(&mut self, status: &SessionStatus) -> std::io::Result<()> {
        if self.only_changes && self.last.as_ref() == Some(status) {
            return Ok(());
        }
        self.last = Some(*status);

        match self.format {
            OutputFormat::Text => writeln!(self.out, "{}", status)?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, status)?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    fn finish(&mut self, flows: &[&FlowRecord]) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                writeln!(self.out, "{}", flow_table_header())?;
                for flow in flows {
                    writeln!(self.out, "{}", format_flow_row(flow))?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, &FlowSummary { flows })?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }
}
