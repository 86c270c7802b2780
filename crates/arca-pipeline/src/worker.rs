//! Background worker that drives due documents through ingestion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use arca_core::{defaults, Document, DocumentRepository, Result};

use crate::ingest::IngestionPipeline;

/// Configuration for the ingestion worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds, applied when no documents are due.
    pub poll_interval_ms: u64,
    /// Maximum number of documents processed concurrently.
    pub max_concurrent: usize,
    /// Whether to process documents at all.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::WORKER_POLL_INTERVAL_MS,
            max_concurrent: defaults::WORKER_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ARCA_WORKER_ENABLED` | `true` | Enable/disable processing |
    /// | `ARCA_WORKER_CONCURRENCY` | `4` | Max concurrent documents |
    /// | `ARCA_WORKER_POLL_INTERVAL_MS` | `500` | Poll interval when idle |
    pub fn from_env() -> Self {
        let enabled = std::env::var("ARCA_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = std::env::var("ARCA_WORKER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::WORKER_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("ARCA_WORKER_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::WORKER_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent,
            enabled,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the maximum concurrent documents.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Enable or disable processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the ingestion worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Processing of a document started.
    DocumentStarted { document_id: Uuid, tenant_id: Uuid },
    /// A document reached `Completed`.
    DocumentCompleted { document_id: Uuid, tenant_id: Uuid },
    /// An attempt failed; the document was rescheduled or parked.
    DocumentFailed {
        document_id: Uuid,
        tenant_id: Uuid,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully. In-flight documents
    /// finish their current attempt.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| arca_core::Error::Internal("failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that polls for due documents and runs them through the
/// ingestion pipeline with bounded concurrency.
pub struct IngestWorker {
    documents: Arc<dyn DocumentRepository>,
    pipeline: Arc<IngestionPipeline>,
    config: WorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl IngestWorker {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        pipeline: Arc<IngestionPipeline>,
        config: WorkerConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            documents,
            pipeline,
            config,
            event_tx,
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop.
    ///
    /// Claims up to `max_concurrent` due documents per iteration and
    /// processes them concurrently. Sleeps only when nothing was claimed.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Ingestion worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent,
            "Ingestion worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Ingestion worker received shutdown signal");
                break;
            }

            let claimed = self.claim_batch().await;
            if claimed.is_empty() {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Ingestion worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
                continue;
            }

            debug!(claimed = claimed.len(), "Processing document batch");
            let mut tasks = tokio::task::JoinSet::new();
            for document in claimed {
                let pipeline = self.pipeline.clone();
                let event_tx = self.event_tx.clone();
                tasks.spawn(async move {
                    execute(pipeline, event_tx, document).await;
                });
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    error!(error = ?e, "Document task panicked");
                }
            }
            // No sleep: immediately try to claim more.
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Ingestion worker stopped");
    }

    async fn claim_batch(&self) -> Vec<Document> {
        match self.documents.claim_due(self.config.max_concurrent as i64).await {
            Ok(documents) => documents,
            Err(e) => {
                error!(error = ?e, "Failed to claim due documents");
                Vec::new()
            }
        }
    }
}

/// Process a single claimed document and broadcast the outcome.
async fn execute(
    pipeline: Arc<IngestionPipeline>,
    event_tx: broadcast::Sender<WorkerEvent>,
    document: Document,
) {
    let start = Instant::now();
    let document_id = document.id;
    let tenant_id = document.tenant_id;

    info!(tenant_id = %tenant_id, document_id = %document_id, "Processing document");
    let _ = event_tx.send(WorkerEvent::DocumentStarted {
        document_id,
        tenant_id,
    });

    match pipeline.process(&document).await {
        Ok(()) => {
            info!(
                tenant_id = %tenant_id,
                document_id = %document_id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Document processed"
            );
            let _ = event_tx.send(WorkerEvent::DocumentCompleted {
                document_id,
                tenant_id,
            });
        }
        Err(error) => {
            warn!(
                tenant_id = %tenant_id,
                document_id = %document_id,
                error_msg = %error,
                duration_ms = start.elapsed().as_millis() as u64,
                "Document attempt failed"
            );
            let _ = event_tx.send(WorkerEvent::DocumentFailed {
                document_id,
                tenant_id,
                error: error.to_string(),
            });
        }
    }
}
