//! Trailing-debounce autosave for a client session.
//!
//! Every edit calls [`AutosaveScheduler::touch`] with the current document,
//! which (re)starts the pending-write timer. When the timer fires, the latest
//! document is handed to the [`ProgressSink`] exactly once. Bursts of edits
//! therefore collapse into a single write. [`AutosaveScheduler::flush`] writes
//! a pending document immediately, e.g. at logout. A failed write keeps the
//! document pending and re-arms the timer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::CoreError;

/// Quiet period after the last edit before the document is written.
pub const DEFAULT_AUTOSAVE_DELAY: Duration = Duration::from_millis(1500);

/// Destination of autosaved documents (typically encrypt + upload).
///
/// Writes must be idempotent; the scheduler may repeat a write after a
/// failure.
#[async_trait]
pub trait ProgressSink: Send + Sync + 'static {
    async fn write(&self, document: Value) -> Result<(), CoreError>;
}

enum Command {
    Touch(Value),
    Flush(oneshot::Sender<Result<bool, CoreError>>),
}

/// Handle to the background autosave task.
pub struct AutosaveScheduler {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl AutosaveScheduler {
    /// Spawn the autosave task on the current tokio runtime.
    pub fn start<S: ProgressSink>(sink: S, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(sink, delay, rx));
        Self { tx, handle }
    }

    /// Record an edit; restarts the pending-write timer.
    pub fn touch(&self, document: Value) {
        if self.tx.send(Command::Touch(document)).is_err() {
            tracing::warn!("Autosave task has stopped; edit not scheduled");
        }
    }

    /// Write the pending document now, if any.
    ///
    /// Returns `Ok(true)` when a write happened, `Ok(false)` when nothing was
    /// pending.
    pub async fn flush(&self) -> Result<bool, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| CoreError::Internal("Autosave task has stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| CoreError::Internal("Autosave task dropped the flush".into()))?
    }

    /// Flush any pending document, then stop the task.
    pub async fn shutdown(self) -> Result<bool, CoreError> {
        let flushed = self.flush().await;
        drop(self.tx);
        let _ = self.handle.await;
        flushed
    }
}

async fn run<S: ProgressSink>(
    sink: S,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<Value> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Touch(document)) => {
                    pending = Some(document);
                    deadline = Some(Instant::now() + delay);
                }
                Some(Command::Flush(reply)) => {
                    let result = write_pending(&sink, &mut pending).await;
                    deadline = result.is_err().then(|| Instant::now() + delay);
                    let _ = reply.send(result);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                if let Err(e) = write_pending(&sink, &mut pending).await {
                    tracing::warn!(error = %e, "Autosave write failed; retrying after the delay");
                    deadline = Some(Instant::now() + delay);
                }
            }
        }
    }
}

/// Hand the pending document to the sink. On failure it stays pending.
async fn write_pending<S: ProgressSink>(
    sink: &S,
    pending: &mut Option<Value>,
) -> Result<bool, CoreError> {
    let Some(document) = pending.take() else {
        return Ok(false);
    };
    match sink.write(document.clone()).await {
        Ok(()) => Ok(true),
        Err(e) => {
            *pending = Some(document);
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
