//! Scan coordination
//!
//! The engine fans one target per port out across a semaphore-bounded pool
//! of tokio tasks and hands results back through a bounded channel, in
//! completion order. Termination is explicit: the channel closing means
//! every worker finished, while a receive that outlives the wait budget
//! means the stream stalled and the scan gets cancelled.

use crate::config::ScanConfig;
use crate::probe::{ProbeCatalog, Transport};
use crate::scanner::{Prober, ScanResult, ScanStatus, ScanSummary, ScanTarget};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Coordinates one scan over one transport.
///
/// TCP and UDP scans over the same range are two engines with independent
/// pools, channels, and cancellation tokens; they share nothing but the
/// immutable configuration.
pub struct ScanEngine {
    config: Arc<ScanConfig>,
    catalog: Arc<ProbeCatalog>,
    transport: Transport,
}

impl ScanEngine {
    pub fn new(config: Arc<ScanConfig>, transport: Transport) -> crate::Result<Self> {
        config.validate()?;
        let catalog = Arc::new(ProbeCatalog::new(config.dns_id));
        Ok(Self {
            config,
            catalog,
            transport,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Resolve the target, start the worker pool, and hand back the stream.
    ///
    /// Dispatch waits out the configured startup delay first, except for an
    /// empty range, which completes immediately.
    pub async fn start(&self) -> crate::Result<ResultStream> {
        let host = self.config.resolve_target()?;
        let ports: Vec<u16> = self.config.ports().collect();

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        let stream = ResultStream::new(
            rx,
            cancel.clone(),
            self.config.result_wait_duration(),
            self.transport,
        );

        if ports.is_empty() {
            // nothing to dispatch; dropping the sender closes the stream
            drop(tx);
            return Ok(stream);
        }

        tokio::time::sleep(self.config.startup_delay_duration()).await;

        log::info!(
            "dispatching {} {} targets against {} with {} workers",
            ports.len(),
            self.transport,
            host,
            self.config.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let prober = Prober::new(
            self.transport,
            self.catalog.clone(),
            self.config.probe_timeout_duration(),
        );
        let transport = self.transport;
        let dispatch_cancel = cancel.clone();

        tokio::spawn(async move {
            for port in ports {
                if dispatch_cancel.is_cancelled() {
                    break;
                }

                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let target = ScanTarget::new(host, port);
                let tx = tx.clone();
                let worker_cancel = dispatch_cancel.clone();
                let prober = prober.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let started = Instant::now();

                    // racing against the token drops the prober future and
                    // with it any socket it holds
                    let probed = tokio::select! {
                        _ = worker_cancel.cancelled() => return,
                        probed = prober.probe(target) => probed,
                    };

                    match probed {
                        Ok(Some(outcome)) => {
                            let result = ScanResult {
                                port: target.port,
                                label: outcome.label,
                                transport,
                                response_time: started.elapsed(),
                            };
                            let _ = tx.send(Ok(result)).await;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            log::error!("{} worker aborted: {}", transport, err);
                            worker_cancel.cancel();
                            let _ = tx.send(Err(err)).await;
                        }
                    }
                });
            }
            // the dispatcher's sender drops here; workers hold the rest
        });

        Ok(stream)
    }
}

/// Consumer side of a running scan: a timed receive over the worker output.
pub struct ResultStream {
    rx: mpsc::Receiver<crate::Result<ScanResult>>,
    cancel: CancellationToken,
    wait: Duration,
    transport: Transport,
    started: Instant,
    status: Option<ScanStatus>,
}

impl ResultStream {
    fn new(
        rx: mpsc::Receiver<crate::Result<ScanResult>>,
        cancel: CancellationToken,
        wait: Duration,
        transport: Transport,
    ) -> Self {
        Self {
            rx,
            cancel,
            wait,
            transport,
            started: Instant::now(),
            status: None,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Terminal status, set once the stream has ended
    pub fn status(&self) -> Option<ScanStatus> {
        self.status
    }

    /// Next completed result, bounded by the per-item wait budget.
    ///
    /// `Ok(None)` with a `Completed` status is genuine exhaustion: the
    /// dispatcher and every worker dropped their senders. A receive that
    /// outlives the budget cancels the scan, marks the stream `Stalled`,
    /// and also yields `Ok(None)`. A fatal worker error cancels and
    /// propagates.
    pub async fn next_result(&mut self) -> crate::Result<Option<ScanResult>> {
        if self.status.is_some() {
            return Ok(None);
        }

        match timeout(self.wait, self.rx.recv()).await {
            Ok(Some(Ok(result))) => Ok(Some(result)),
            Ok(Some(Err(err))) => {
                self.status = Some(ScanStatus::Failed);
                self.cancel.cancel();
                Err(err)
            }
            Ok(None) => {
                self.status = Some(ScanStatus::Completed);
                Ok(None)
            }
            Err(_) => {
                log::warn!(
                    "{} stream stalled: no result within {:?}, cancelling scan",
                    self.transport,
                    self.wait
                );
                self.status = Some(ScanStatus::Stalled);
                self.cancel.cancel();
                Ok(None)
            }
        }
    }

    /// Drain the stream into a summary
    pub async fn collect(mut self) -> crate::Result<ScanSummary> {
        let mut results = Vec::new();
        while let Some(result) = self.next_result().await? {
            results.push(result);
        }
        Ok(self.finish(results))
    }

    /// Build the summary for results the caller drained itself
    pub fn finish(self, results: Vec<ScanResult>) -> ScanSummary {
        ScanSummary {
            transport: self.transport,
            results,
            status: self.status.unwrap_or(ScanStatus::Completed),
            duration: self.started.elapsed(),
        }
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        // a consumer walking away must not leak in-flight workers
        self.cancel.cancel();
    }
}
