//! Persistence gateway - debounced, retried saves of configuration documents.
//!
//! Each document name gets its own writer task fed through an unbounded
//! channel, so saves for one document never overtake each other. Debounced
//! requests arm a quiet window that every newer request re-arms; only the
//! latest document is written when the window elapses. Immediate requests
//! skip the window.

use crate::application::config_repository::ConfigRepository;
use crate::application::lock;
use crate::domain::document::ConfigDocument;
use crate::domain::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const REPORT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    #[default]
    Debounced,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceSettings {
    pub debounce: Duration,
    /// Total attempts per flush, including the first one
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_attempts: 4,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Result of one flush, broadcast to anyone watching durability
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SaveReport {
    Saved {
        name: String,
        revision: u64,
        at: DateTime<Utc>,
    },
    Failed {
        name: String,
        revision: u64,
        attempts: u32,
        retriable: bool,
        error: String,
        at: DateTime<Utc>,
    },
}

impl SaveReport {
    pub fn name(&self) -> &str {
        match self {
            SaveReport::Saved { name, .. } | SaveReport::Failed { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveStatus {
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_saved_revision: Option<u64>,
    /// Set while the most recent flush failed; cleared by the next success
    pub last_error: Option<String>,
}

struct SaveRequest {
    document: Arc<ConfigDocument>,
    revision: u64,
    mode: PersistMode,
}

struct Writer {
    tx: mpsc::UnboundedSender<SaveRequest>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct WriterContext {
    repository: Arc<dyn ConfigRepository>,
    settings: PersistenceSettings,
    reports: broadcast::Sender<SaveReport>,
    statuses: Arc<Mutex<HashMap<String, SaveStatus>>>,
}

pub struct PersistenceGateway {
    context: WriterContext,
    writers: Mutex<HashMap<String, Writer>>,
    runtime: Option<Handle>,
}

impl PersistenceGateway {
    /// Writer tasks run on the runtime this is created in, if any. Without one
    /// the runtime current at the first save of each document is used.
    pub fn new(repository: Arc<dyn ConfigRepository>, settings: PersistenceSettings) -> Self {
        Self::with_runtime(repository, settings, Handle::try_current().ok())
    }

    pub fn with_runtime(
        repository: Arc<dyn ConfigRepository>,
        settings: PersistenceSettings,
        runtime: Option<Handle>,
    ) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            context: WriterContext {
                repository,
                settings,
                reports,
                statuses: Arc::new(Mutex::new(HashMap::new())),
            },
            writers: Mutex::new(HashMap::new()),
            runtime,
        }
    }

    pub async fn load(&self, name: &str) -> Result<Option<ConfigDocument>, PersistenceError> {
        self.context.repository.load(name).await
    }

    /// Queue a save. Never blocks and never panics; with no runtime to write
    /// on, the save is reported as failed and the change stays in memory.
    pub fn schedule(&self, name: &str, document: Arc<ConfigDocument>, revision: u64, mode: PersistMode) {
        let request = SaveRequest {
            document,
            revision,
            mode,
        };

        let mut writers = lock(&self.writers);
        let request = match writers.get(name) {
            Some(writer) => match writer.tx.send(request) {
                Ok(()) => return,
                Err(mpsc::error::SendError(request)) => {
                    tracing::warn!(config = %name, "Writer task for configuration exited, restarting it");
                    request
                }
            },
            None => request,
        };

        let Some(writer) = self.spawn_writer(name) else {
            drop(writers);
            tracing::error!(config = %name, revision, "No async runtime available, save not scheduled");
            self.context.record(SaveReport::Failed {
                name: name.to_string(),
                revision,
                attempts: 0,
                retriable: true,
                error: "no async runtime available to save on".to_string(),
                at: Utc::now(),
            });
            return;
        };
        let _ = writer.tx.send(request);
        writers.insert(name.to_string(), writer);
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<SaveReport> {
        self.context.reports.subscribe()
    }

    pub fn status(&self, name: &str) -> SaveStatus {
        lock(&self.context.statuses)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Close every writer and wait until pending documents are flushed
    pub async fn shutdown(&self) {
        let writers: Vec<(String, Writer)> = lock(&self.writers).drain().collect();
        for (name, writer) in writers {
            drop(writer.tx);
            if let Err(e) = writer.handle.await {
                tracing::error!(config = %name, error = %e, "Writer task failed during shutdown");
            }
        }
    }

    fn spawn_writer(&self, name: &str) -> Option<Writer> {
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok())?;
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = runtime.spawn(run_writer(self.context.clone(), name.to_string(), rx));
        Some(Writer { tx, handle })
    }
}

async fn run_writer(ctx: WriterContext, name: String, mut rx: mpsc::UnboundedReceiver<SaveRequest>) {
    let mut pending: Option<SaveRequest> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(at) => tokio::select! {
                request = rx.recv() => request,
                _ = tokio::time::sleep_until(at) => {
                    deadline = None;
                    if let Some(request) = pending.take() {
                        ctx.flush(&name, request).await;
                    }
                    continue;
                }
            },
            None => rx.recv().await,
        };

        let Some(request) = next else {
            break;
        };

        match request.mode {
            PersistMode::Debounced => {
                deadline = Some(Instant::now() + ctx.settings.debounce);
                pending = Some(request);
            }
            PersistMode::Immediate => {
                deadline = None;
                pending = None;
                ctx.flush(&name, request).await;
            }
        }
    }

    if let Some(request) = pending.take() {
        ctx.flush(&name, request).await;
    }
    tracing::debug!(config = %name, "Writer task stopped");
}

impl WriterContext {
    async fn flush(&self, name: &str, request: SaveRequest) {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.repository.save(name, &request.document).await {
                Ok(()) => {
                    tracing::debug!(config = %name, revision = request.revision, attempt, "Saved configuration");
                    self.record(SaveReport::Saved {
                        name: name.to_string(),
                        revision: request.revision,
                        at: Utc::now(),
                    });
                    return;
                }
                Err(err) if err.is_retriable() && attempt < max_attempts => {
                    let delay = self.settings.backoff.saturating_mul(2u32.saturating_pow(attempt - 1));
                    tracing::warn!(config = %name, attempt, ?delay, error = %err, "Save failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(
                        config = %name,
                        revision = request.revision,
                        attempts = attempt,
                        error = %err,
                        "Giving up on save, change kept in memory only"
                    );
                    self.record(SaveReport::Failed {
                        name: name.to_string(),
                        revision: request.revision,
                        attempts: attempt,
                        retriable: err.is_retriable(),
                        error: err.to_string(),
                        at: Utc::now(),
                    });
                    return;
                }
            }
        }
    }

    fn record(&self, report: SaveReport) {
        {
            let mut statuses = lock(&self.statuses);
            let status = statuses.entry(report.name().to_string()).or_default();
            match &report {
                SaveReport::Saved { revision, at, .. } => {
                    status.last_saved_at = Some(*at);
                    status.last_saved_revision = Some(*revision);
                    status.last_error = None;
                }
                SaveReport::Failed { error, .. } => {
                    status.last_error = Some(error.clone());
                }
            }
        }
        // No receivers is fine, the status map still has the outcome
        let _ = self.reports.send(report);
    }
}
