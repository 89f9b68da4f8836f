//! Job records and progress fan-out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{debug, warn};

use clipforge_models::{JobId, JobProgress};

use crate::error::{HubError, HubResult};

/// Bounded buffer per attached listener.
pub const LISTENER_BUFFER: usize = 32;

/// How long a full listener may lag before it is detached.
const SLOW_LISTENER_GRACE: Duration = Duration::from_millis(200);

/// One job's record: latest progress, its listener set and cancel flag.
struct JobRecord {
    latest: JobProgress,
    listeners: Vec<mpsc::Sender<JobProgress>>,
    cancel_tx: watch::Sender<bool>,
    terminal: bool,
}

/// Registry of jobs with server-push progress streams.
///
/// Records live until process exit; no persistence.
#[derive(Default)]
pub struct ProgressHub {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<JobRecord>>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a job record and return its id and cancel receiver.
    ///
    /// The id is available synchronously, before any work starts.
    pub async fn create_job(&self, total_clips: u32) -> (JobId, watch::Receiver<bool>) {
        let job_id = JobId::new();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let record = JobRecord {
            latest: JobProgress::queued(total_clips),
            listeners: Vec::new(),
            cancel_tx,
            terminal: false,
        };

        self.jobs
            .write()
            .await
            .insert(job_id.clone(), Arc::new(Mutex::new(record)));
        debug!(job_id = %job_id, total_clips = total_clips, "created job record");
        (job_id, cancel_rx)
    }

    /// Attach a listener to a job, replaying the latest known progress.
    ///
    /// For a terminal job the stream yields the terminal event and closes.
    pub async fn attach(&self, job_id: &JobId) -> HubResult<mpsc::Receiver<JobProgress>> {
        let record = self.record(job_id).await?;
        let mut record = record.lock().await;

        let (tx, rx) = mpsc::channel(LISTENER_BUFFER);
        // Replay cannot fail: the channel is empty
        tx.try_send(record.latest.clone()).ok();

        if !record.terminal {
            record.listeners.push(tx);
        }
        debug!(job_id = %job_id, listeners = record.listeners.len(), "listener attached");
        Ok(rx)
    }

    /// Publish a progress event to every attached listener.
    ///
    /// Events to a single listener stay in publish order. A listener whose
    /// buffer stays full past a short grace window is detached; a terminal
    /// event closes all handles.
    pub async fn publish(&self, job_id: &JobId, progress: JobProgress) -> HubResult<()> {
        let record = self.record(job_id).await?;
        let mut record = record.lock().await;

        if record.terminal {
            warn!(job_id = %job_id, "ignoring publish after terminal event");
            return Ok(());
        }

        // currentClip is monotonic per job
        let mut progress = progress;
        progress.current_clip = progress.current_clip.max(record.latest.current_clip);
        record.latest = progress.clone();

        // Fast pass: non-blocking send, dropping closed handles and
        // remembering full ones
        let mut lagging: Vec<mpsc::Sender<JobProgress>> = Vec::new();
        let mut kept: Vec<mpsc::Sender<JobProgress>> = Vec::new();
        for tx in record.listeners.drain(..) {
            match tx.try_send(progress.clone()) {
                Ok(()) => kept.push(tx),
                Err(mpsc::error::TrySendError::Full(_)) => lagging.push(tx),
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(job_id = %job_id, "detached closed listener");
                }
            }
        }

        // Grace pass for full buffers; failure detaches that handle only
        for tx in lagging {
            match tokio::time::timeout(SLOW_LISTENER_GRACE, tx.send(progress.clone())).await {
                Ok(Ok(())) => kept.push(tx),
                _ => {
                    warn!(job_id = %job_id, "detached slow listener");
                }
            }
        }

        record.listeners = kept;

        if progress.is_terminal() {
            // Dropping the senders closes every stream after the terminal
            // event is consumed
            record.listeners.clear();
            record.terminal = true;
            debug!(job_id = %job_id, status = %progress.status, "job reached terminal state");
        }

        Ok(())
    }

    /// Latest progress snapshot for a job.
    pub async fn latest(&self, job_id: &JobId) -> HubResult<JobProgress> {
        let record = self.record(job_id).await?;
        let record = record.lock().await;
        Ok(record.latest.clone())
    }

    /// Raise the job's cancel flag.
    pub async fn cancel(&self, job_id: &JobId) -> HubResult<()> {
        let record = self.record(job_id).await?;
        let record = record.lock().await;
        record.cancel_tx.send(true).ok();
        debug!(job_id = %job_id, "cancel requested");
        Ok(())
    }

    /// Whether the job exists.
    pub async fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    /// Number of currently attached listeners, for tests and diagnostics.
    pub async fn listener_count(&self, job_id: &JobId) -> HubResult<usize> {
        let record = self.record(job_id).await?;
        let record = record.lock().await;
        Ok(record.listeners.len())
    }

    async fn record(&self, job_id: &JobId) -> HubResult<Arc<Mutex<JobRecord>>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| HubError::JobNotFound(job_id.to_string()))
    }
}
