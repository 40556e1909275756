use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::ingest::{IngestError, Ingestor, WalkReport};
use super::project::LifecycleTracker;

/// Bookkeeping for one running ingestion.
struct RunningJob {
    cancel: Arc<AtomicBool>,
    /// Flips to `true` once the job has reached a terminal status.
    done: watch::Receiver<bool>,
}

/// Runs ingestions as background tasks, one per project, and keeps a
/// cancellation flag for each running one.
pub struct JobRunner {
    ingestor: Arc<Ingestor>,
    tracker: LifecycleTracker,
    running: Mutex<FxHashMap<u64, RunningJob>>,
}

impl JobRunner {
    pub fn new(ingestor: Ingestor, tracker: LifecycleTracker) -> Arc<Self> {
        Arc::new(Self { ingestor: Arc::new(ingestor), tracker, running: Mutex::default() })
    }

    /// Starts ingesting `archive_path` for `project_id` on the blocking pool
    /// and returns immediately. Must be called from within a Tokio runtime.
    ///
    /// The handle resolves once the project has reached a terminal status;
    /// callers that only poll the project status may drop it.
    pub fn spawn(self: &Arc<Self>, project_id: u64, archive_path: PathBuf) -> JoinHandle<Result<WalkReport, IngestError>> {
        let (cancel, done) = self.register(project_id);

        let runner = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let result = runner.ingestor.ingest_path(project_id, &archive_path, &runner.tracker, &cancel);
            runner.unregister(project_id, &cancel);
            done.send_replace(true);
            if let Err(err) = &result {
                error!(project_id, error = %err, "background ingestion ended with an error");
            }
            result
        })
    }

    /// Asks a running ingestion to stop before its next entry. Returns
    /// whether a job was running for the project.
    pub fn cancel(&self, project_id: u64) -> bool {
        match self.registry().get(&project_id) {
            Some(job) => {
                job.cancel.store(true, Ordering::Relaxed);
                info!(project_id, "ingestion cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancels the running ingestion of `project_id`, if any, and waits until
    /// it has stopped writing. Returns whether a job was running.
    pub async fn cancel_and_wait(&self, project_id: u64) -> bool {
        let mut done = {
            let registry = self.registry();
            let Some(job) = registry.get(&project_id) else { return false };
            job.cancel.store(true, Ordering::Relaxed);
            job.done.clone()
        };
        info!(project_id, "ingestion cancellation requested, waiting for the job to stop");

        // A closed channel means the job is gone as well.
        let _ = done.wait_for(|finished| *finished).await;
        true
    }

    pub fn is_running(&self, project_id: u64) -> bool {
        self.registry().contains_key(&project_id)
    }

    fn register(&self, project_id: u64) -> (Arc<AtomicBool>, watch::Sender<bool>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = watch::channel(false);
        self.registry().insert(project_id, RunningJob { cancel: cancel.clone(), done });
        (cancel, done_tx)
    }

    /// Removes the job's entry unless a newer job for the same project has
    /// replaced it.
    fn unregister(&self, project_id: u64, cancel: &Arc<AtomicBool>) {
        let mut registry = self.registry();
        if registry.get(&project_id).is_some_and(|job| Arc::ptr_eq(&job.cancel, cancel)) {
            registry.remove(&project_id);
        }
    }

    fn registry(&self) -> MutexGuard<'_, FxHashMap<u64, RunningJob>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
