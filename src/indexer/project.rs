use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::store::StoreError;

/// Lifecycle of an ingestion job.
///
/// Only forward transitions are legal:
/// `uploaded → processing → {completed, failed}`, plus `uploaded → failed`
/// when ingestion cannot even start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_advance_to(self, next: ProjectStatus) -> bool {
        matches!(
            (self, next),
            (Self::Uploaded, Self::Processing)
                | (Self::Uploaded, Self::Failed)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded archive and the state of its ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub original_filename: String,
    /// Where the uploaded archive is stored.
    pub archive_path: PathBuf,
    pub archive_size: u64,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProject {
    pub user_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub original_filename: String,
    pub archive_path: PathBuf,
    pub archive_size: u64,
}

/// Persistence of project rows.
pub trait ProjectStore: Send + Sync {
    /// Inserts a project with status `uploaded`.
    fn create(&self, project: CreateProject) -> Result<Project, StoreError>;

    fn find_by_id(&self, id: u64) -> Result<Option<Project>, StoreError>;

    /// Projects of one user, newest first.
    fn find_by_user(&self, user_id: u64, limit: usize, offset: usize) -> Result<Vec<Project>, StoreError>;

    fn count_by_user(&self, user_id: u64) -> Result<u64, StoreError>;

    /// Writes `to` only if the stored status is still `from`, as one atomic
    /// step. Transition rules live in [`LifecycleTracker`].
    ///
    /// # Errors
    /// `StoreError::StatusConflict` when the stored status is not `from`.
    fn transition_status(&self, id: u64, from: ProjectStatus, to: ProjectStatus) -> Result<Project, StoreError>;

    /// Returns whether a row was removed.
    fn delete(&self, id: u64) -> Result<bool, StoreError>;
}

pub type SharedProjectStore = Arc<dyn ProjectStore>;

#[derive(Default)]
pub struct MemoryProjectStore {
    projects: Mutex<FxHashMap<u64, Project>>,
    id_counter: AtomicU64,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn projects(&self) -> Result<MutexGuard<'_, FxHashMap<u64, Project>>, StoreError> {
        self.projects.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ProjectStore for MemoryProjectStore {
    fn create(&self, project: CreateProject) -> Result<Project, StoreError> {
        if project.name.trim().is_empty() {
            return Err(StoreError::Constraint("project name must be non-empty".into()));
        }

        let now = Utc::now();
        let stored = Project {
            id: self.id_counter.fetch_add(1, Ordering::Relaxed) + 1,
            user_id: project.user_id,
            name: project.name,
            description: project.description,
            original_filename: project.original_filename,
            archive_path: project.archive_path,
            archive_size: project.archive_size,
            status: ProjectStatus::Uploaded,
            created_at: now,
            updated_at: now,
        };
        self.projects()?.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn find_by_id(&self, id: u64) -> Result<Option<Project>, StoreError> {
        Ok(self.projects()?.get(&id).cloned())
    }

    fn find_by_user(&self, user_id: u64, limit: usize, offset: usize) -> Result<Vec<Project>, StoreError> {
        let projects = self.projects()?;
        let mut owned: Vec<&Project> = projects.values().filter(|p| p.user_id == user_id).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(owned.into_iter().skip(offset).take(limit).cloned().collect())
    }

    fn count_by_user(&self, user_id: u64) -> Result<u64, StoreError> {
        Ok(self.projects()?.values().filter(|p| p.user_id == user_id).count() as u64)
    }

    fn transition_status(&self, id: u64, from: ProjectStatus, to: ProjectStatus) -> Result<Project, StoreError> {
        let mut projects = self.projects()?;
        let project = projects.get_mut(&id).ok_or(StoreError::ProjectNotFound(id))?;
        if project.status != from {
            return Err(StoreError::StatusConflict { project_id: id, expected: from, actual: project.status });
        }
        project.status = to;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    fn delete(&self, id: u64) -> Result<bool, StoreError> {
        Ok(self.projects()?.remove(&id).is_some())
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("project {project_id}: illegal status transition {from} -> {to}")]
    InvalidTransition { project_id: u64, from: ProjectStatus, to: ProjectStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Advances project status, refusing anything but forward transitions.
#[derive(Clone)]
pub struct LifecycleTracker {
    projects: SharedProjectStore,
}

impl LifecycleTracker {
    pub fn new(projects: SharedProjectStore) -> Self {
        Self { projects }
    }

    /// Moves `project_id` to `next` and returns the previous status.
    ///
    /// # Errors
    /// * `LifecycleError::InvalidTransition` – `next` is not reachable from the
    ///   current status; the stored status is left untouched.
    /// * `LifecycleError::Store` – the project does not exist or the store failed.
    pub fn set_status(&self, project_id: u64, next: ProjectStatus) -> Result<ProjectStatus, LifecycleError> {
        let current = self
            .projects
            .find_by_id(project_id)?
            .ok_or(StoreError::ProjectNotFound(project_id))?
            .status;

        if !current.can_advance_to(next) {
            return Err(LifecycleError::InvalidTransition { project_id, from: current, to: next });
        }

        match self.projects.transition_status(project_id, current, next) {
            Ok(_) => {}
            // Another writer moved the project between the read and the write.
            Err(StoreError::StatusConflict { actual, .. }) => {
                return Err(LifecycleError::InvalidTransition { project_id, from: actual, to: next });
            }
            Err(err) => return Err(err.into()),
        }
        debug!(project_id, from = %current, to = %next, "project status updated");
        Ok(current)
    }
}
