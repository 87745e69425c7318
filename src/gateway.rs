use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::catalog::CatalogHandle;
use crate::dispatch::{Dispatcher, GatewayStats, StatsSnapshot};
use crate::frame::FrameError;
use crate::message::DecodedMessage;
use crate::sink::OutputSink;
use crate::source::{FrameSource, SourceError, SourceFrame};

/// Runtime settings of a [`Gateway`].
#[derive(Debug, Clone, Builder)]
pub struct GatewayConfig {
    /// Number of decode workers.
    #[builder(default = 4)]
    workers: usize,
    /// Frames waiting for a worker before new frames are dropped.
    #[builder(default = 1024)]
    queue_capacity: usize,
    /// Decoded messages waiting for the sink before new ones are dropped.
    #[builder(default = 1024)]
    output_capacity: usize,
    /// Time allowed for in-flight frames to drain on shutdown.
    #[builder(default = Duration::from_secs(5))]
    shutdown_grace: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    #[must_use]
    pub fn output_capacity(&self) -> usize {
        self.output_capacity
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

/// Cloneable entry point for submitting frames to a running [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayIntake {
    sender: mpsc::Sender<SourceFrame>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl GatewayIntake {
    /// Queues one raw frame for decoding.
    ///
    /// Never waits: returns `false` and counts a drop when the queue is full
    /// or the gateway is stopping.
    pub fn submit(&self, source: impl Into<String>, bytes: Vec<u8>) -> bool {
        if self.cancel.is_cancelled() {
            debug!("gateway is stopping; frame not accepted");
            self.dispatcher.stats().record_dropped();
            return false;
        }
        match self.sender.try_send(SourceFrame::new(source, bytes)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(source = frame.label(), "intake queue full; frame dropped");
                self.dispatcher.stats().record_dropped();
                false
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                warn!(source = frame.label(), "intake queue closed; frame dropped");
                self.dispatcher.stats().record_dropped();
                false
            }
        }
    }

    /// Counts a frame that failed before it could be submitted.
    pub fn reject(&self, source: &str, error: &FrameError) {
        self.dispatcher.reject(source, error, None);
    }

    /// Reads `source` until it is exhausted or the gateway stops, submitting
    /// every frame. Malformed entries are counted and skipped.
    ///
    /// Returns the number of frames accepted into the queue.
    ///
    /// # Errors
    ///
    /// Returns an error when the input itself fails.
    #[instrument(name = "feed_frames", skip_all, level = "info")]
    pub async fn feed<S>(&self, source: &mut S) -> Result<u64, SourceError>
    where
        S: FrameSource + ?Sized,
    {
        let progress = Span::current();
        progress.pb_set_message("decoding");
        let mut accepted = 0_u64;
        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => break,
                next = source.next_frame() => next,
            };
            match next {
                Ok(Some(frame)) => {
                    let (label, bytes) = frame.into_parts();
                    if self.submit(label, bytes) {
                        accepted += 1;
                        progress.pb_inc(1);
                    }
                }
                Ok(None) => break,
                Err(SourceError::Frame { label, source: error, .. }) => {
                    self.reject(&label, &error);
                }
                Err(error) => return Err(error),
            }
        }
        info!(accepted, "frame input finished");
        Ok(accepted)
    }
}

/// Worker pool turning submitted frames into published messages.
///
/// Frames flow from a bounded intake queue through `workers` decode tasks
/// into a bounded output queue drained by a single publisher task.
#[derive(Debug)]
pub struct Gateway {
    intake: GatewayIntake,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    queue: Arc<Mutex<mpsc::Receiver<SourceFrame>>>,
    workers: JoinSet<()>,
    publisher: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl Gateway {
    /// Spawns the workers and the publisher on the current tokio runtime.
    #[instrument(skip_all, level = "info", fields(workers = config.workers()))]
    pub fn start<S>(config: &GatewayConfig, catalog: CatalogHandle, sink: S) -> Self
    where
        S: OutputSink + 'static,
    {
        let dispatcher = Dispatcher::new(catalog);
        let cancel = CancellationToken::new();
        let (intake_tx, intake_rx) = mpsc::channel(config.queue_capacity().max(1));
        let (output_tx, output_rx) = mpsc::channel(config.output_capacity().max(1));
        let intake_rx = Arc::new(Mutex::new(intake_rx));

        let mut workers = JoinSet::new();
        for worker in 0..config.workers().max(1) {
            workers.spawn(run_worker(
                worker,
                Arc::clone(&intake_rx),
                output_tx.clone(),
                dispatcher.clone(),
                cancel.clone(),
            ));
        }
        // Workers own every output sender; the publisher ends once they all exit.
        drop(output_tx);
        let publisher = tokio::spawn(run_publisher(
            output_rx,
            sink,
            Arc::clone(dispatcher.stats()),
        ));

        info!(
            queue_capacity = config.queue_capacity(),
            output_capacity = config.output_capacity(),
            "gateway started"
        );
        Self {
            intake: GatewayIntake {
                sender: intake_tx,
                dispatcher: dispatcher.clone(),
                cancel: cancel.clone(),
            },
            dispatcher,
            cancel,
            queue: intake_rx,
            workers,
            publisher,
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Returns a handle for submitting frames.
    #[must_use]
    pub fn intake(&self) -> GatewayIntake {
        self.intake.clone()
    }

    /// Returns the dispatcher shared by the workers.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns the live counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats().snapshot()
    }

    /// Returns a token that is cancelled when the gateway begins stopping.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops accepting frames, drains queued work within the shutdown grace
    /// period, then aborts whatever is left.
    ///
    /// Frames still queued once the workers are gone count as dropped.
    #[instrument(skip_all, level = "info")]
    pub async fn shutdown(self) -> StatsSnapshot {
        let Self {
            intake,
            dispatcher,
            cancel,
            queue,
            mut workers,
            mut publisher,
            shutdown_grace,
        } = self;
        // An idle worker holds the queue lock until it sees the cancellation.
        cancel.cancel();
        queue.lock().await.close();
        drop(intake);

        let drained = tokio::time::timeout(shutdown_grace, async {
            while workers.join_next().await.is_some() {}
            if let Err(error) = (&mut publisher).await {
                warn!(%error, "publisher task failed");
            }
        })
        .await;
        if drained.is_err() {
            warn!(?shutdown_grace, "shutdown grace elapsed; aborting remaining tasks");
            workers.abort_all();
            publisher.abort();
            while workers.join_next().await.is_some() {}
        }

        let mut leftover = 0_u64;
        {
            let mut receiver = queue.lock().await;
            while receiver.try_recv().is_ok() {
                dispatcher.stats().record_dropped();
                leftover += 1;
            }
        }
        if leftover > 0 {
            warn!(leftover, "frames left unprocessed at shutdown");
        }

        let stats = dispatcher.stats().snapshot();
        info!(
            total = stats.total,
            valid = stats.valid,
            errors = stats.errors,
            published = stats.published,
            dropped = stats.dropped,
            "gateway stopped"
        );
        stats
    }
}

async fn run_worker(
    worker: usize,
    intake: Arc<Mutex<mpsc::Receiver<SourceFrame>>>,
    output: mpsc::Sender<DecodedMessage>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
) {
    debug!(worker, "worker started");
    loop {
        let next = {
            let mut receiver = intake.lock().await;
            tokio::select! {
                biased;
                frame = receiver.recv() => frame,
                // Once stopping, keep taking whatever is already queued.
                () = cancel.cancelled() => receiver.try_recv().ok(),
            }
        };
        let Some(frame) = next else {
            break;
        };

        let Ok(message) = dispatcher.process(frame.label(), frame.bytes()) else {
            continue;
        };
        if let Err(error) = output.try_send(message) {
            warn!(worker, %error, "output queue unavailable; message dropped");
            dispatcher.stats().record_dropped();
        }
    }
    debug!(worker, "worker stopped");
}

async fn run_publisher<S>(
    mut messages: mpsc::Receiver<DecodedMessage>,
    mut sink: S,
    stats: Arc<GatewayStats>,
) where
    S: OutputSink,
{
    while let Some(message) = messages.recv().await {
        if sink.publish(&message).await {
            stats.record_published();
        } else {
            stats.record_dropped();
        }
    }
    sink.flush().await;
}
