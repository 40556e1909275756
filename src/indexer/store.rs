use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::project::ProjectStatus;

/// Error type for the persistence boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store lock poisoned")]
    Poisoned,

    /// A row was rejected by a constraint of the store.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("project {0} not found")]
    ProjectNotFound(u64),

    /// A conditional status write found a different status than expected.
    #[error("project {project_id} is {actual}, expected {expected}")]
    StatusConflict { project_id: u64, expected: ProjectStatus, actual: ProjectStatus },
}

/// One file or directory discovered while walking an archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: u64,
    pub project_id: u64,
    /// Logical path, including any nested-container prefix.
    pub path: String,
    pub name: String,
    /// `None` for directories and for files without a dot in their name.
    pub extension: Option<String>,
    /// Declared uncompressed size; `None` for directories.
    pub size: Option<u64>,
    pub preview: Option<String>,
    pub is_directory: bool,
    /// `None` for top-level entries.
    pub parent_directory: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Row data for [`IndexStore::insert`]; the store assigns the id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIndexedEntry {
    pub project_id: u64,
    pub path: String,
    pub name: String,
    pub extension: Option<String>,
    pub size: Option<u64>,
    pub preview: Option<String>,
    pub is_directory: bool,
    pub parent_directory: Option<String>,
}

/// Append-only index of archive entries, scoped by project.
///
/// Listings are ordered directories first, then by name ascending. Rows are
/// never updated; they are only removed in bulk with their project.
pub trait IndexStore: Send + Sync {
    fn insert(&self, entry: NewIndexedEntry) -> Result<IndexedEntry, StoreError>;

    fn list_by_project(&self, project_id: u64, limit: usize, offset: usize) -> Result<Vec<IndexedEntry>, StoreError>;

    /// Same ordering as [`Self::list_by_project`], restricted to the direct
    /// children of `parent_directory`.
    fn list_by_project_and_parent(
        &self,
        project_id: u64,
        parent_directory: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IndexedEntry>, StoreError>;

    fn count_by_project(&self, project_id: u64) -> Result<u64, StoreError>;

    fn count_by_project_and_parent(&self, project_id: u64, parent_directory: &str) -> Result<u64, StoreError>;

    /// Removes every row of the project and returns how many were removed.
    fn delete_all_by_project(&self, project_id: u64) -> Result<u64, StoreError>;

    /// First row recorded under `path`, if any.
    fn find_by_project_and_path(&self, project_id: u64, path: &str) -> Result<Option<IndexedEntry>, StoreError>;

    /// Distinct parent directories of the project's rows, sorted ascending.
    fn directories_by_project(&self, project_id: u64) -> Result<Vec<String>, StoreError>;
}

pub type SharedIndexStore = Arc<dyn IndexStore>;

/// In-process [`IndexStore`]. Rows are partitioned by project so concurrent
/// walks of different projects only share the lock, never rows.
#[derive(Default)]
pub struct MemoryIndexStore {
    rows: Mutex<FxHashMap<u64, Vec<IndexedEntry>>>,
    id_counter: AtomicU64,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.id_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn rows(&self) -> Result<MutexGuard<'_, FxHashMap<u64, Vec<IndexedEntry>>>, StoreError> {
        self.rows.lock().map_err(|_| StoreError::Poisoned)
    }

    fn page<'a>(
        rows: impl Iterator<Item = &'a IndexedEntry>,
        limit: usize,
        offset: usize,
    ) -> Vec<IndexedEntry> {
        let mut selected: Vec<&IndexedEntry> = rows.collect();
        selected.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        selected.into_iter().skip(offset).take(limit).cloned().collect()
    }
}

impl IndexStore for MemoryIndexStore {
    fn insert(&self, entry: NewIndexedEntry) -> Result<IndexedEntry, StoreError> {
        if entry.path.is_empty() || entry.name.is_empty() {
            return Err(StoreError::Constraint(format!("entry path and name must be non-empty (path {:?})", entry.path)));
        }

        let stored = IndexedEntry {
            id: self.next_id(),
            project_id: entry.project_id,
            path: entry.path,
            name: entry.name,
            extension: entry.extension,
            size: entry.size,
            preview: entry.preview,
            is_directory: entry.is_directory,
            parent_directory: entry.parent_directory,
            created_at: Utc::now(),
        };
        self.rows()?.entry(stored.project_id).or_default().push(stored.clone());
        Ok(stored)
    }

    fn list_by_project(&self, project_id: u64, limit: usize, offset: usize) -> Result<Vec<IndexedEntry>, StoreError> {
        let rows = self.rows()?;
        let project_rows = rows.get(&project_id).map(|v| v.as_slice()).unwrap_or_default();
        Ok(Self::page(project_rows.iter(), limit, offset))
    }

    fn list_by_project_and_parent(
        &self,
        project_id: u64,
        parent_directory: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<IndexedEntry>, StoreError> {
        let rows = self.rows()?;
        let project_rows = rows.get(&project_id).map(|v| v.as_slice()).unwrap_or_default();
        let children = project_rows
            .iter()
            .filter(|row| row.parent_directory.as_deref() == Some(parent_directory));
        Ok(Self::page(children, limit, offset))
    }

    fn count_by_project(&self, project_id: u64) -> Result<u64, StoreError> {
        Ok(self.rows()?.get(&project_id).map_or(0, |v| v.len() as u64))
    }

    fn count_by_project_and_parent(&self, project_id: u64, parent_directory: &str) -> Result<u64, StoreError> {
        let rows = self.rows()?;
        let count = rows.get(&project_id).map_or(0, |v| {
            v.iter()
                .filter(|row| row.parent_directory.as_deref() == Some(parent_directory))
                .count()
        });
        Ok(count as u64)
    }

    fn delete_all_by_project(&self, project_id: u64) -> Result<u64, StoreError> {
        Ok(self.rows()?.remove(&project_id).map_or(0, |v| v.len() as u64))
    }

    fn find_by_project_and_path(&self, project_id: u64, path: &str) -> Result<Option<IndexedEntry>, StoreError> {
        let rows = self.rows()?;
        Ok(rows
            .get(&project_id)
            .and_then(|v| v.iter().find(|row| row.path == path))
            .cloned())
    }

    fn directories_by_project(&self, project_id: u64) -> Result<Vec<String>, StoreError> {
        let rows = self.rows()?;
        let mut dirs: Vec<String> = rows
            .get(&project_id)
            .map(|v| v.iter().filter_map(|row| row.parent_directory.clone()).collect())
            .unwrap_or_default();
        dirs.sort();
        dirs.dedup();
        Ok(dirs)
    }
}
