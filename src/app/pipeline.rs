use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::capture::{CaptureError, LocalNetworks, PacketSource, UdpDatagram};
use crate::classify::MediaMonitor;
use crate::report::ReportSink;

/// A packet reduced to what the classifier consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub source_port: u32,
    pub length: u32,
    pub source_is_local: bool,
}

impl Observation {
    pub fn from_datagram(datagram: &UdpDatagram, local: &LocalNetworks) -> Self {
        Self {
            source_port: u32::from(datagram.src_port),
            length: u32::from(datagram.length),
            source_is_local: local.contains(datagram.src_ip),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub queue_depth: usize,
    /// Report status on this period even without traffic. `None` reports only per packet.
    pub status_interval: Option<Duration>,
}

impl PipelineSettings {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            queue_depth,
            status_interval: None,
        }
    }

    pub fn with_status_interval(mut self, interval: Option<Duration>) -> Self {
        self.status_interval = interval;
        self
    }
}

pub struct PipelineOutcome<S> {
    pub monitor: MediaMonitor,
    pub source: S,
    pub elapsed: Duration,
}

/// Raises the capture thread's stop flag however the consumer exits.
struct StopOnDrop(Arc<AtomicBool>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Run capture on a blocking thread and classify on the calling task.
///
/// Observations cross a single bounded queue, so the monitor sees them in
/// arrival order and has exactly one owner. Returns when the source is
/// exhausted or `shutdown` resolves.
pub async fn run_pipeline<S, R, F>(
    mut source: S,
    local: LocalNetworks,
    mut monitor: MediaMonitor,
    mut sink: R,
    settings: PipelineSettings,
    shutdown: F,
) -> Result<PipelineOutcome<S>>
where
    S: PacketSource + Send + 'static,
    R: ReportSink,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let (tx, mut rx) = mpsc::channel::<Observation>(settings.queue_depth.max(1));
    let stop = Arc::new(AtomicBool::new(false));
    let stop_guard = StopOnDrop(Arc::clone(&stop));

    let capture_task = tokio::task::spawn_blocking(move || -> Result<S, CaptureError> {
        while !stop.load(Ordering::Relaxed) {
            match source.next_datagram()? {
                Some(datagram) => {
                    let observation = Observation::from_datagram(&datagram, &local);
                    if tx.blocking_send(observation).is_err() {
                        break;
                    }
                }
                None if source.is_exhausted() => break,
                None => {}
            }
        }
        Ok(source)
    });

    // Without an interval the tick branch never fires.
    let mut ticker = tokio::time::interval(settings.status_interval.unwrap_or(Duration::from_secs(3600)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = ticker.tick(), if settings.status_interval.is_some() => {
                sink.report(&monitor.status(Instant::now()))?;
            }
            received = rx.recv() => {
                let Some(observation) = received else {
                    debug!("Packet source finished");
                    break;
                };
                let now = Instant::now();
                match monitor.observe_at(observation.source_port, observation.length, observation.source_is_local, now) {
                    Ok(_) => sink.report(&monitor.status(now))?,
                    Err(e) => warn!("Skipping packet: {}", e),
                }
            }
        }
    }

    drop(stop_guard);
    // Unblocks a capture thread parked on a full queue.
    drop(rx);
    let source = capture_task.await??;

    sink.finish(&monitor.flows())?;

    Ok(PipelineOutcome {
        monitor,
        source,
        elapsed: started.elapsed(),
    })
}
