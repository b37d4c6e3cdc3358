// crates/pipeline/src/runtime.rs
//! Runtime - single-consumer event loop around the dispatcher

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use detective_codec::encode_record;
use detective_common::{
    AckSink, DetectiveError, DetectiveResult, PipelineOptions, RawNetwork, ScanSource, Transport,
};

use crate::dispatcher::{Dispatcher, Effect, PipelineSnapshot, ScanReason};

/// Inbound events, processed strictly one at a time.
#[derive(Debug)]
pub enum PipelineEvent {
    Toggle(bool),
    ScanComplete(Vec<RawNetwork>),
    ScanFailed(String),
    Ack,
    Snapshot(oneshot::Sender<PipelineSnapshot>),
    Shutdown,
}

/// Cloneable sender side of the pipeline mailbox.
///
/// Posting never waits, so it is safe from any context.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

/// Receiving side of the pipeline mailbox, consumed by [`PipelineRuntime`].
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::UnboundedReceiver<PipelineEvent>,
}

impl PipelineHandle {
    /// Create the mailbox up front so transports can be given a handle
    /// before the runtime exists.
    pub fn channel() -> (Self, Mailbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, Mailbox { rx })
    }

    fn post(&self, event: PipelineEvent) -> DetectiveResult<()> {
        self.tx
            .send(event)
            .map_err(|_| DetectiveError::PipelineStopped)
    }

    pub fn toggle(&self, active: bool) -> DetectiveResult<()> {
        self.post(PipelineEvent::Toggle(active))
    }

    pub fn scan_complete(&self, networks: Vec<RawNetwork>) -> DetectiveResult<()> {
        self.post(PipelineEvent::ScanComplete(networks))
    }

    pub fn scan_failed(&self, reason: String) -> DetectiveResult<()> {
        self.post(PipelineEvent::ScanFailed(reason))
    }

    pub fn shutdown(&self) -> DetectiveResult<()> {
        self.post(PipelineEvent::Shutdown)
    }

    /// Ask the runtime for its current state.
    pub async fn snapshot(&self) -> DetectiveResult<PipelineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.post(PipelineEvent::Snapshot(reply))?;
        rx.await.map_err(|_| DetectiveError::PipelineStopped)
    }
}

impl AckSink for PipelineHandle {
    fn ack(&self) {
        if self.post(PipelineEvent::Ack).is_err() {
            debug!("Ack dropped, pipeline stopped");
        }
    }
}

/// Owns the dispatcher and its collaborators; runs until shutdown or until
/// the batch limit is reached.
pub struct PipelineRuntime {
    dispatcher: Dispatcher,
    options: PipelineOptions,
    source: Arc<dyn ScanSource>,
    transport: Arc<dyn Transport>,
    handle: PipelineHandle,
    mailbox: Mailbox,
}

impl PipelineRuntime {
    pub fn new(
        options: PipelineOptions,
        source: Arc<dyn ScanSource>,
        transport: Arc<dyn Transport>,
        handle: PipelineHandle,
        mailbox: Mailbox,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(&options),
            options,
            source,
            transport,
            handle,
            mailbox,
        }
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<Result<PipelineSnapshot>> {
        tokio::spawn(self.run())
    }

    /// Main event loop. Returns the final snapshot.
    #[instrument(skip(self), fields(source = %self.source.name(), transport = %self.transport.name()))]
    pub async fn run(mut self) -> Result<PipelineSnapshot> {
        self.source
            .start()
            .await
            .context("Failed to start scan source")?;
        info!("Pipeline runtime started");

        while let Some(event) = self.mailbox.rx.recv().await {
            match event {
                PipelineEvent::Toggle(true) if !self.transport.is_connected() => {
                    warn!("Activation rejected: transport {} not connected", self.transport.name());
                }
                PipelineEvent::Toggle(active) => {
                    for effect in self.dispatcher.on_toggle(active) {
                        self.apply(effect).await;
                    }
                }
                PipelineEvent::ScanComplete(networks) => {
                    debug!("Scan complete: {} networks", networks.len());
                    if let Some(effect) = self.dispatcher.on_scan_complete(&networks) {
                        self.apply(effect).await;
                    }
                }
                PipelineEvent::ScanFailed(reason) => {
                    warn!("Scan failed, waiting for next toggle: {}", reason);
                }
                PipelineEvent::Ack => {
                    if let Some(effect) = self.dispatcher.on_ack() {
                        self.apply(effect).await;
                    }
                }
                PipelineEvent::Snapshot(reply) => {
                    let _ = reply.send(self.dispatcher.snapshot());
                }
                PipelineEvent::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }

            if self.dispatcher.is_finished() {
                break;
            }
        }

        for effect in self.dispatcher.deactivate() {
            self.apply(effect).await;
        }
        if let Err(e) = self.source.stop().await {
            warn!("Scan source {} failed to stop: {:#}", self.source.name(), e);
        }

        self.dispatcher.log_summary();
        Ok(self.dispatcher.snapshot())
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Send(record) => {
                let message = match encode_record(&record) {
                    Ok(message) => message,
                    Err(e) => {
                        // nothing went out, so no ack will come: move on to the next record
                        error!("Dropping unencodable record {}: {}", record, e);
                        self.handle.ack();
                        return;
                    }
                };
                debug!("Sending {} ({} bytes)", record, message.len());
                if let Err(e) = self.transport.send(message).await {
                    warn!("Send via {} failed: {:#}", self.transport.name(), e);
                }
            }
            Effect::RequestScan(reason) => {
                let delay = match reason {
                    ScanReason::Activation => Duration::ZERO,
                    ScanReason::Drained => self.options.rescan_interval,
                };
                self.request_scan(delay);
            }
            Effect::LaunchCompanion => {
                let app = self.options.companion_app;
                if let Err(e) = self.transport.launch_companion(app).await {
                    warn!("Failed to launch companion {}: {:#}", app, e);
                }
            }
            Effect::CloseCompanion => {
                let app = self.options.companion_app;
                if let Err(e) = self.transport.close_companion(app).await {
                    warn!("Failed to close companion {}: {:#}", app, e);
                }
            }
        }
    }

    /// Fire-and-forget scan; the result comes back through the mailbox.
    fn request_scan(&self, delay: Duration) {
        let source = self.source.clone();
        let handle = self.handle.clone();

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let posted = match source.scan().await {
                Ok(networks) => handle.scan_complete(networks),
                Err(e) => handle.scan_failed(format!("{:#}", e)),
            };
            if posted.is_err() {
                debug!("Scan result dropped, pipeline stopped");
            }
        });
    }
}
