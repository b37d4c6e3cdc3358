// runner.rs
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use detective_common::{AckSink, DetectiveError, PipelineOptions, ScanSource, Transport};
use detective_pipeline::{PipelineHandle, PipelineRuntime};
use detective_receiver::{BoardEvent, NetworkBoard, ReceiverServer};
use detective_scan_source::{FixtureScanSource, IwScanSource};
use detective_transport::{LoopbackTransport, TcpTransport};

use crate::output::{print_alert, print_board, print_run_summary};

/// Everything `detective run` was asked to do.
pub struct RunConfig {
    pub source: String,
    pub interface: Option<String>,
    pub dump: bool,
    pub fixture: Option<String>,
    pub transport: String,
    pub connect: Option<String>,
    pub connect_timeout: Duration,
    pub capacity: usize,
    pub rescan_interval: Duration,
    pub batches: Option<u64>,
    pub ack_delay: Duration,
    pub app: Uuid,
    pub output_format: String,
}

impl RunConfig {
    fn options(&self) -> PipelineOptions {
        let options = PipelineOptions::default()
            .with_capacity(self.capacity)
            .with_companion_app(self.app)
            .with_rescan_interval(self.rescan_interval);
        match self.batches {
            Some(limit) => options.with_max_batches(limit),
            None => options,
        }
    }
}

pub async fn run_pipeline(config: RunConfig) -> Result<()> {
    info!("Starting delivery pipeline...");
    info!("Source: {}", config.source);
    info!("Transport: {}", config.transport);
    info!("Queue capacity: {}", config.capacity);
    if let Some(limit) = config.batches {
        info!("Batch limit: {}", limit);
    }

    let source = build_source(&config).await?;
    let (handle, mailbox) = PipelineHandle::channel();
    let acks: Arc<dyn AckSink> = Arc::new(handle.clone());

    let (transport, board): (Arc<dyn Transport>, Option<Arc<Mutex<NetworkBoard>>>) =
        match config.transport.as_str() {
            "loopback" => {
                let receiver = ReceiverServer::new(Arc::new(Mutex::new(NetworkBoard::new())))
                    .with_app(config.app);
                let loopback = LoopbackTransport::new(receiver, acks).with_ack_delay(config.ack_delay);
                let board = loopback.board();
                (Arc::new(loopback), Some(board))
            }
            "tcp" => {
                let addr = config
                    .connect
                    .as_deref()
                    .ok_or_else(|| DetectiveError::Config("--connect is required for the tcp transport".into()))?;
                let tcp = TcpTransport::connect(addr, config.connect_timeout, acks).await?;
                (Arc::new(tcp), None)
            }
            other => return Err(anyhow!("Invalid transport '{}'", other)),
        };

    let runtime = PipelineRuntime::new(config.options(), source, transport, handle.clone(), mailbox);
    let mut task = runtime.spawn();

    let start = Instant::now();
    handle.toggle(true)?;

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping pipeline");
            // the runtime may already be finishing on its own
            let _ = handle.toggle(false);
            let _ = handle.shutdown();
            (&mut task).await
        }
    };
    let snapshot = joined.context("Pipeline task failed")??;
    let duration = start.elapsed();

    let view = board.map(|board| board.lock().view());
    print_run_summary(&snapshot, view.as_ref(), &config.output_format, duration)?;
    Ok(())
}

async fn build_source(config: &RunConfig) -> Result<Arc<dyn ScanSource>> {
    match config.source.as_str() {
        "iw" => {
            let source = match &config.interface {
                Some(interface) => IwScanSource::new(interface.clone()),
                None => IwScanSource::from_env(),
            };
            Ok(Arc::new(source.with_dump(config.dump)))
        }
        "fixture" => {
            let path = config
                .fixture
                .as_deref()
                .ok_or_else(|| DetectiveError::Config("--fixture is required for the fixture source".into()))?;
            let source = FixtureScanSource::from_path(path).await?;
            info!("Loaded {} fixture batch(es) from {}", source.len(), path);
            Ok(Arc::new(source))
        }
        other => Err(anyhow!("Invalid scan source '{}'", other)),
    }
}

pub async fn run_receiver(listen: String, app: Uuid, output_format: String) -> Result<()> {
    let listener = TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to listen on {}", listen))?;

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let server = ReceiverServer::new(Arc::new(Mutex::new(NetworkBoard::new())))
        .with_app(app)
        .with_events(events_tx);
    let board = server.board();

    let serve = tokio::spawn(async move { server.serve(listener).await });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(BoardEvent::Alert(entry)) => print_alert(&entry, &output_format)?,
                Some(BoardEvent::BatchComplete(view)) => print_board(&view, &output_format)?,
                Some(BoardEvent::Launched) => info!("Companion app {} running", app),
                Some(BoardEvent::Closed) => {
                    info!("Companion app {} closed", app);
                    print_board(&board.lock().view(), &output_format)?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping receiver");
                break;
            }
        }
    }

    serve.abort();
    if let Ok(Err(e)) = serve.await {
        warn!("Receiver stopped with error: {:#}", e);
    }
    Ok(())
}
