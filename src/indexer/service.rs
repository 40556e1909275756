use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ingest::{IngestError, WalkReport};
use super::jobs::JobRunner;
use super::pagination::{PageRequest, Paged};
use super::preview::PREVIEW_BYTES;
use super::project::{CreateProject, Project, SharedProjectStore};
use super::store::{IndexedEntry, SharedIndexStore, StoreError};

/// Text returned for entries that have no preview.
pub const NO_PREVIEW_MESSAGE: &str = "This file does not have a text preview available.";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    /// The project belongs to another user.
    #[error("access denied")]
    AccessDenied,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Default page sizes for the listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub projects: u64,
    pub entries: u64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self { projects: 10, entries: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub description: Option<String>,
    /// Where the upload handler saved the archive.
    pub archive_path: PathBuf,
    /// Name of the file as uploaded; defaults to the stored file name.
    pub original_filename: Option<String>,
}

/// Response of [`ProjectService::file_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub content: String,
    pub file_name: String,
    pub file_type: Option<String>,
    /// The preview stops at the byte budget while the entry is larger.
    pub truncated: bool,
}

/// Project-scoped operations on behalf of an authenticated user.
///
/// Every call takes the verified user id; ownership is checked before any
/// index row is read or removed.
pub struct ProjectService {
    projects: SharedProjectStore,
    index: SharedIndexStore,
    jobs: Arc<JobRunner>,
    defaults: PageDefaults,
}

impl ProjectService {
    pub fn new(projects: SharedProjectStore, index: SharedIndexStore, jobs: Arc<JobRunner>) -> Self {
        Self { projects, index, jobs, defaults: PageDefaults::default() }
    }

    pub fn with_page_defaults(mut self, defaults: PageDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Records a project for an uploaded archive and starts ingesting it in
    /// the background. Returns as soon as the project row exists.
    pub fn upload(
        &self,
        user_id: u64,
        request: UploadRequest,
    ) -> Result<(Project, JoinHandle<Result<WalkReport, IngestError>>), ServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidRequest("project name is required".into()));
        }

        let archive_size = std::fs::metadata(&request.archive_path)?.len();
        let original_filename = request
            .original_filename
            .or_else(|| file_name(&request.archive_path))
            .unwrap_or_default();

        let project = self.projects.create(CreateProject {
            user_id,
            name: name.to_string(),
            description: request.description,
            original_filename,
            archive_path: request.archive_path,
            archive_size,
        })?;
        info!(project_id = project.id, user_id, name = %project.name, "project created");

        let job = self.jobs.spawn(project.id, project.archive_path.clone());
        Ok((project, job))
    }

    pub fn list_projects(&self, user_id: u64, page: Option<u64>, limit: Option<u64>) -> Result<Paged<Project>, ServiceError> {
        let request = PageRequest::new(page, limit, self.defaults.projects);
        let items = self.projects.find_by_user(user_id, request.limit(), request.offset())?;
        let total = self.projects.count_by_user(user_id)?;
        Ok(Paged { items, pagination: request.paginate(total) })
    }

    pub fn get_project(&self, user_id: u64, project_id: u64) -> Result<Project, ServiceError> {
        let project = self.projects.find_by_id(project_id)?.ok_or(ServiceError::NotFound)?;
        if project.user_id != user_id {
            return Err(ServiceError::AccessDenied);
        }
        Ok(project)
    }

    /// Lists the indexed entries of a project, optionally restricted to the
    /// direct children of `directory`. The total matches the filter.
    pub fn list_entries(
        &self,
        user_id: u64,
        project_id: u64,
        directory: Option<&str>,
        page: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Paged<IndexedEntry>, ServiceError> {
        self.get_project(user_id, project_id)?;
        let request = PageRequest::new(page, limit, self.defaults.entries);

        let (items, total) = match directory.filter(|d| !d.is_empty()) {
            Some(dir) => (
                self.index.list_by_project_and_parent(project_id, dir, request.limit(), request.offset())?,
                self.index.count_by_project_and_parent(project_id, dir)?,
            ),
            None => (
                self.index.list_by_project(project_id, request.limit(), request.offset())?,
                self.index.count_by_project(project_id)?,
            ),
        };
        Ok(Paged { items, pagination: request.paginate(total) })
    }

    pub fn directories(&self, user_id: u64, project_id: u64) -> Result<Vec<String>, ServiceError> {
        self.get_project(user_id, project_id)?;
        Ok(self.index.directories_by_project(project_id)?)
    }

    pub fn file_content(&self, user_id: u64, project_id: u64, path: &str) -> Result<FileContent, ServiceError> {
        self.get_project(user_id, project_id)?;
        let entry = self
            .index
            .find_by_project_and_path(project_id, path)?
            .ok_or(ServiceError::NotFound)?;

        Ok(match entry.preview {
            Some(preview) => FileContent {
                truncated: preview.len() >= PREVIEW_BYTES && entry.size.unwrap_or(0) > preview.len() as u64,
                content: preview,
                file_name: entry.name,
                file_type: entry.extension,
            },
            None => FileContent {
                content: NO_PREVIEW_MESSAGE.to_string(),
                file_name: entry.name,
                file_type: entry.extension,
                truncated: false,
            },
        })
    }

    /// Deletes a project, its index rows and its archive file.
    ///
    /// A running ingestion is cancelled and awaited first, so no row can be
    /// written after the project's rows are removed.
    pub async fn delete_project(&self, user_id: u64, project_id: u64) -> Result<(), ServiceError> {
        let project = self.get_project(user_id, project_id)?;
        if self.jobs.cancel_and_wait(project_id).await {
            debug!(project_id, "running ingestion stopped before delete");
        }

        let removed = self.index.delete_all_by_project(project_id)?;
        self.projects.delete(project_id)?;
        remove_archive(&project.archive_path)?;

        info!(project_id, removed, "project deleted");
        Ok(())
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

fn remove_archive(path: &Path) -> Result<(), std::io::Error> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "archive file already gone");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
