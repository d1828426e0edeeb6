pub mod pipeline;

pub use pipeline::{run_pipeline, Observation, PipelineOutcome, PipelineSettings};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::capture::{LocalNetworks, PcapEngine};
use crate::classify::MediaMonitor;
use crate::config::Config;
use crate::report::ConsoleReporter;
use crate::utils::{format_bytes, format_duration};

pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> App {
        App { config }
    }

    /// Capture until Ctrl-C, printing a status line per packet and on each status tick.
    pub async fn run(&self) -> Result<()> {
        let filter = self.config.capture_filter();
        let engine = PcapEngine::open(&self.config.capture, &filter)?;
        let local = self.local_networks(&engine)?;

        if local.is_empty() {
            warn!("No local addresses known; every packet will be treated as inbound");
        } else {
            info!("Treating packets from {:?} as outgoing", local.networks());
        }

        let monitor = MediaMonitor::new(self.config.classifier);
        let reporter = ConsoleReporter::stdout(&self.config.report);

        let mut outcome = run_pipeline(
            engine,
            local,
            monitor,
            reporter,
            PipelineSettings::new(self.config.capture.queue_depth)
                .with_status_interval(self.config.report.status_interval()),
            shutdown_signal(),
        )
        .await?;

        let capture = outcome.source.statistics().clone();
        let stats = outcome.monitor.stats();
        info!(
            "Captured {} packets ({}) on {} in {}, {} undecodable, {} dropped by kernel",
            capture.packets_captured,
            format_bytes(capture.bytes_captured),
            capture.interface,
            format_duration(outcome.elapsed.as_secs()),
            capture.packets_undecoded,
            outcome.source.dropped_by_kernel().unwrap_or(0)
        );
        info!(
            "Classified {} of {} flows; {} outgoing, {} inbound, {} rejected packets",
            outcome.monitor.tracker().classified_count(),
            outcome.monitor.tracker().len(),
            stats.accepted,
            stats.ignored_remote,
            stats.rejected
        );
        Ok(())
    }

    fn local_networks(&self, engine: &PcapEngine) -> Result<LocalNetworks> {
        if self.config.capture.local_addresses.is_empty() {
            return Ok(LocalNetworks::from_addresses(engine.interface_addresses()));
        }
        LocalNetworks::from_strings(self.config.capture.local_addresses.as_slice()).context("Invalid local address")
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
