use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::preview::PreviewExtractor;
use super::project::{LifecycleError, LifecycleTracker, ProjectStatus};
use super::store::{NewIndexedEntry, SharedIndexStore};
use super::zipfs::{resolve, ArchiveEntry, ArchiveError, ArchiveReader, FilterSet, ResolvedPath};

/// Glob selecting the entries that are opened as nested containers.
pub const DEFAULT_CONTAINER_GLOB: &str = "*.jar";

#[derive(Error, Debug)]
pub enum IngestError {
    /// The top-level archive could not be opened.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("ingestion of project {0} was cancelled")]
    Cancelled(u64),
}

/// Limits applied to nested-container expansion.
///
/// `None` means unbounded. Exhausting a limit skips the offending nested
/// container; the rest of the walk carries on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkPolicy {
    /// Maximum nesting level; the top-level archive is level 0.
    pub max_depth: Option<usize>,
    /// Total bytes that may be materialized for nested containers in one walk.
    pub max_nested_bytes: Option<u64>,
    /// Size cap for the top-level archive file.
    pub max_archive_bytes: Option<u64>,
}

/// Outcome counters of one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkReport {
    /// Rows written to the index.
    pub recorded: u64,
    /// Entries whose header or content could not be read.
    pub unreadable_entries: u64,
    /// Rows the index store refused.
    pub failed_writes: u64,
    /// Nested containers walked.
    pub containers_opened: u64,
    /// Nested containers that could not be opened or exceeded a limit.
    pub containers_skipped: u64,
}

impl WalkReport {
    /// Number of entries that did not make it into the index as intended.
    pub fn issues(&self) -> u64 {
        self.unreadable_entries + self.failed_writes + self.containers_skipped
    }
}

/// Recursive ingestion engine: walks an archive, descends into nested
/// containers and writes one index row per file or directory entry.
pub struct Ingestor {
    store: SharedIndexStore,
    previews: PreviewExtractor,
    containers: FilterSet,
    policy: WalkPolicy,
}

impl Ingestor {
    pub fn new(store: SharedIndexStore) -> Self {
        let containers = FilterSet::new()
            .add_glob(DEFAULT_CONTAINER_GLOB)
            .unwrap_or_default();
        Self { store, previews: PreviewExtractor::default(), containers, policy: WalkPolicy::default() }
    }

    pub fn with_policy(mut self, policy: WalkPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the container patterns (`*.jar` by default).
    pub fn with_containers(mut self, containers: FilterSet) -> Self {
        self.containers = containers;
        self
    }

    pub fn policy(&self) -> WalkPolicy {
        self.policy
    }

    /// Runs a full ingestion of the archive at `archive_path`, driving the
    /// project through `processing` and then `completed` or `failed`.
    ///
    /// Individual unreadable entries, refused rows and broken nested
    /// containers do not fail the project; they are counted in the report.
    /// Rows written before a failure are kept.
    pub fn ingest_path(
        &self,
        project_id: u64,
        archive_path: &Path,
        tracker: &LifecycleTracker,
        cancel: &AtomicBool,
    ) -> Result<WalkReport, IngestError> {
        tracker.set_status(project_id, ProjectStatus::Processing)?;
        info!(project_id, path = %archive_path.display(), "starting archive ingestion");

        let outcome = ArchiveReader::open_path(archive_path, self.policy.max_archive_bytes)
            .map_err(IngestError::from)
            .and_then(|mut reader| {
                info!(project_id, entries = reader.len(), "archive opened");
                self.walk(project_id, &mut reader, cancel)
            });

        match outcome {
            Ok(report) => {
                tracker.set_status(project_id, ProjectStatus::Completed)?;
                info!(
                    project_id,
                    recorded = report.recorded,
                    issues = report.issues(),
                    "archive ingestion completed"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(project_id, error = %err, "archive ingestion failed");
                if let Err(status_err) = tracker.set_status(project_id, ProjectStatus::Failed) {
                    warn!(project_id, error = %status_err, "cannot mark project as failed");
                }
                Err(err)
            }
        }
    }

    /// Walks every entry of an already opened archive, recursing into nested
    /// containers. Entries are processed strictly in archive order.
    pub fn walk<R: Read + Seek>(
        &self,
        project_id: u64,
        reader: &mut ArchiveReader<R>,
        cancel: &AtomicBool,
    ) -> Result<WalkReport, IngestError> {
        let mut walk = Walk {
            ingestor: self,
            project_id,
            cancel,
            nested_bytes_left: self.policy.max_nested_bytes,
            report: WalkReport::default(),
        };
        walk.entries(reader, None, 0)?;
        Ok(walk.report)
    }
}

/// State of one walk, shared by every recursion level.
struct Walk<'a> {
    ingestor: &'a Ingestor,
    project_id: u64,
    cancel: &'a AtomicBool,
    nested_bytes_left: Option<u64>,
    report: WalkReport,
}

impl Walk<'_> {
    fn entries<R: Read + Seek>(
        &mut self,
        reader: &mut ArchiveReader<R>,
        base: Option<&str>,
        depth: usize,
    ) -> Result<(), IngestError> {
        while let Some(next) = reader.next_entry() {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(IngestError::Cancelled(self.project_id));
            }

            let mut entry = match next {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(project_id = self.project_id, base = base.unwrap_or(""), error = %err, "skipping unreadable entry");
                    self.report.unreadable_entries += 1;
                    continue;
                }
            };

            let is_dir = entry.is_dir();
            let Some(resolved) = resolve(entry.name(), base, is_dir) else {
                debug!(project_id = self.project_id, raw = entry.name(), "skipping entry with empty name");
                continue;
            };

            if is_dir {
                self.record(NewIndexedEntry {
                    project_id: self.project_id,
                    path: resolved.logical_path,
                    name: resolved.base_name,
                    extension: None,
                    size: None,
                    preview: None,
                    is_directory: true,
                    parent_directory: resolved.parent_directory,
                });
            } else if self.is_container(&resolved) {
                self.container(&mut entry, &resolved.logical_path, depth)?;
            } else {
                self.file(&mut entry, resolved);
            }
        }
        Ok(())
    }

    /// Nested containers are recognized by extension; a bare `.jar` name has
    /// none and is indexed as a plain file.
    fn is_container(&self, resolved: &ResolvedPath) -> bool {
        resolved.extension.is_some() && self.ingestor.containers.matches_name(&resolved.base_name)
    }

    fn file<R: Read>(&mut self, entry: &mut ArchiveEntry<'_, R>, resolved: ResolvedPath) {
        let previews = &self.ingestor.previews;
        let extension = resolved.extension.as_deref();

        let preview = if previews.is_eligible(extension) {
            match entry.read_prefix(previews.budget()) {
                Ok(bytes) => previews.preview(&bytes, extension),
                Err(err) => {
                    warn!(project_id = self.project_id, path = %resolved.logical_path, error = %err, "cannot read entry content, indexing without preview");
                    self.report.unreadable_entries += 1;
                    None
                }
            }
        } else {
            None
        };

        self.record(NewIndexedEntry {
            project_id: self.project_id,
            path: resolved.logical_path,
            name: resolved.base_name,
            extension: resolved.extension,
            size: Some(entry.size()),
            preview,
            is_directory: false,
            parent_directory: resolved.parent_directory,
        });
    }

    /// Opens a nested container and walks it with its own logical path as base.
    /// Any failure here skips the container, never the enclosing walk; only
    /// cancellation propagates.
    fn container<R: Read>(
        &mut self,
        entry: &mut ArchiveEntry<'_, R>,
        logical_path: &str,
        depth: usize,
    ) -> Result<(), IngestError> {
        let project_id = self.project_id;
        let nested_depth = depth + 1;

        if let Some(max_depth) = self.ingestor.policy.max_depth {
            if nested_depth > max_depth {
                warn!(project_id, path = logical_path, max_depth, "nested container exceeds depth limit, skipping");
                self.report.containers_skipped += 1;
                return Ok(());
            }
        }

        if let Some(left) = self.nested_bytes_left {
            if entry.size() > left {
                warn!(project_id, path = logical_path, size = entry.size(), budget_left = left, "nested container exceeds byte budget, skipping");
                self.report.containers_skipped += 1;
                return Ok(());
            }
        }

        let bytes = match entry.read_all() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(project_id, path = logical_path, error = %err, "cannot read nested container, skipping");
                self.report.containers_skipped += 1;
                return Ok(());
            }
        };
        if let Some(left) = self.nested_bytes_left.as_mut() {
            *left = left.saturating_sub(bytes.len() as u64);
        }

        let mut nested = match ArchiveReader::from_bytes(bytes) {
            Ok(nested) => nested,
            Err(err) => {
                warn!(project_id, path = logical_path, error = %err, "cannot open nested container, skipping");
                self.report.containers_skipped += 1;
                return Ok(());
            }
        };

        info!(project_id, path = logical_path, entries = nested.len(), depth = nested_depth, "walking nested container");
        self.report.containers_opened += 1;
        self.entries(&mut nested, Some(logical_path), nested_depth)
    }

    fn record(&mut self, row: NewIndexedEntry) {
        match self.ingestor.store.insert(row) {
            Ok(stored) => {
                debug!(project_id = self.project_id, path = %stored.path, dir = stored.is_directory, "indexed entry");
                self.report.recorded += 1;
            }
            Err(err) => {
                warn!(project_id = self.project_id, error = %err, "failed to write index row, continuing");
                self.report.failed_writes += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::project::{CreateProject, MemoryProjectStore, Project, ProjectStore};
    use crate::indexer::store::{IndexStore, IndexedEntry, MemoryIndexStore, StoreError};
    use crate::indexer::zipfs::tests::{build_zip, corrupt, Item};
    use std::io::Write;
    use std::sync::Arc;

    const PROJECT: u64 = 1;

    fn walk_bytes(ingestor: &Ingestor, bytes: Vec<u8>) -> WalkReport {
        let mut reader = ArchiveReader::from_bytes(bytes).unwrap();
        ingestor.walk(PROJECT, &mut reader, &AtomicBool::new(false)).unwrap()
    }

    fn rows(store: &MemoryIndexStore) -> Vec<IndexedEntry> {
        let mut rows = store.list_by_project(PROJECT, usize::MAX, 0).unwrap();
        rows.sort_by_key(|r| r.id);
        rows
    }

    fn find(store: &MemoryIndexStore, path: &str) -> IndexedEntry {
        store
            .find_by_project_and_path(PROJECT, path)
            .unwrap()
            .unwrap_or_else(|| panic!("{path} not indexed"))
    }

    #[test]
    fn flat_archive_yields_one_top_level_row_per_entry() {
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[
            Item::File("readme.txt", b"hello"),
            Item::File("logo.png", b"\x89PNG"),
            Item::File("Makefile", b"all:"),
        ]));

        assert_eq!(report.recorded, 3);
        let rows = rows(&store);
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["readme.txt", "logo.png", "Makefile"]);
        assert!(rows.iter().all(|r| r.parent_directory.is_none() && !r.is_directory));

        assert_eq!(rows[0].preview.as_deref(), Some("hello"));
        assert_eq!(rows[0].size, Some(5));
        assert_eq!(rows[1].preview, None);
        assert_eq!(rows[2].extension, None);
    }

    #[test]
    fn implicit_directories_are_not_synthesized() {
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        walk_bytes(&ingestor, build_zip(&[Item::File("a/b/c.txt", b"c")]));

        let rows = rows(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].parent_directory.as_deref(), Some("a/b"));
    }

    #[test]
    fn explicit_directories_are_recorded() {
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        walk_bytes(&ingestor, build_zip(&[
            Item::Dir("src/"),
            Item::Dir("src/main/"),
            Item::File("src/main/App.java", b"class App {}"),
        ]));

        let src = find(&store, "src");
        assert!(src.is_directory);
        assert_eq!(src.parent_directory, None);
        assert_eq!(src.extension, None);
        assert_eq!(src.size, None);

        let main = find(&store, "src/main");
        assert_eq!(main.name, "main");
        assert_eq!(main.parent_directory.as_deref(), Some("src"));

        let app = find(&store, "src/main/App.java");
        assert_eq!(app.preview.as_deref(), Some("class App {}"));
    }

    #[test]
    fn nested_container_paths_are_prefixed() {
        let inner = build_zip(&[
            Item::Dir("inner/"),
            Item::File("inner/readme.txt", b"nested"),
        ]);
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[Item::File("outer.jar", &inner)]));

        assert_eq!(report.containers_opened, 1);
        assert!(store.find_by_project_and_path(PROJECT, "outer.jar").unwrap().is_none());

        let dir = find(&store, "outer.jar/inner");
        assert_eq!(dir.parent_directory.as_deref(), Some("outer.jar"));

        let readme = find(&store, "outer.jar/inner/readme.txt");
        assert_eq!(readme.parent_directory.as_deref(), Some("outer.jar/inner"));
        assert_eq!(readme.preview.as_deref(), Some("nested"));
    }

    #[test]
    fn containers_nest_to_any_depth_by_default() {
        let innermost = build_zip(&[Item::File("pkg/App.class", b"\xCA\xFE\xBA\xBE")]);
        let middle = build_zip(&[Item::File("libs/Inner.JAR", &innermost)]);
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[Item::File("outer.jar", &middle)]));

        assert_eq!(report.containers_opened, 2);
        let leaf = find(&store, "outer.jar/libs/Inner.JAR/pkg/App.class");
        assert_eq!(leaf.parent_directory.as_deref(), Some("outer.jar/libs/Inner.JAR/pkg"));
        assert_eq!(leaf.preview, None);
    }

    #[test]
    fn depth_limit_skips_only_the_deep_container() {
        let innermost = build_zip(&[Item::File("deep.txt", b"deep")]);
        let middle = build_zip(&[Item::File("inner.jar", &innermost), Item::File("shallow.txt", b"s")]);
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone())
            .with_policy(WalkPolicy { max_depth: Some(1), ..WalkPolicy::default() });
        let report = walk_bytes(&ingestor, build_zip(&[Item::File("outer.jar", &middle), Item::File("after.txt", b"a")]));

        assert_eq!(report.containers_opened, 1);
        assert_eq!(report.containers_skipped, 1);
        find(&store, "outer.jar/shallow.txt");
        find(&store, "after.txt");
        assert!(store.find_by_project_and_path(PROJECT, "outer.jar/inner.jar/deep.txt").unwrap().is_none());
    }

    #[test]
    fn byte_budget_skips_containers_once_exhausted() {
        let nested = build_zip(&[Item::Stored("payload.txt", &[b'x'; 256])]);
        let budget = nested.len() as u64 + 10;
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone())
            .with_policy(WalkPolicy { max_nested_bytes: Some(budget), ..WalkPolicy::default() });
        let report = walk_bytes(&ingestor, build_zip(&[
            Item::File("first.jar", &nested),
            Item::File("second.jar", &nested),
        ]));

        assert_eq!(report.containers_opened, 1);
        assert_eq!(report.containers_skipped, 1);
        find(&store, "first.jar/payload.txt");
        assert!(store.find_by_project_and_path(PROJECT, "second.jar/payload.txt").unwrap().is_none());
    }

    #[test]
    fn bare_jar_name_is_a_plain_file() {
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[Item::File("lib/.jar", b"not an archive")]));

        assert_eq!(report.containers_skipped, 0);
        assert_eq!(report.recorded, 1);
        let row = find(&store, "lib/.jar");
        assert!(!row.is_directory);
        assert_eq!(row.extension, None);
        assert_eq!(row.parent_directory.as_deref(), Some("lib"));
    }

    #[test]
    fn broken_nested_container_does_not_stop_the_walk() {
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[
            Item::File("broken.jar", b"not a zip at all"),
            Item::File("after.xml", b"<ok/>"),
        ]));

        assert_eq!(report.containers_skipped, 1);
        assert_eq!(report.recorded, 1);
        assert_eq!(find(&store, "after.xml").preview.as_deref(), Some("<ok/>"));
    }

    #[test]
    fn corrupt_entry_is_indexed_without_preview() {
        let mut bytes = build_zip(&[
            Item::Stored("broken.txt", b"CORRUPTED-PAYLOAD"),
            Item::File("fine.txt", b"fine"),
        ]);
        corrupt(&mut bytes, b"CORRUPTED-PAYLOAD", b"XORRUPTED-PAYLOAD");

        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, bytes);

        assert_eq!(report.unreadable_entries, 1);
        assert_eq!(report.recorded, 2);
        assert_eq!(find(&store, "broken.txt").preview, None);
        assert_eq!(find(&store, "fine.txt").preview.as_deref(), Some("fine"));
    }

    /// Index store that refuses rows for one path.
    struct RefusingStore {
        inner: MemoryIndexStore,
        refused: &'static str,
    }

    impl IndexStore for RefusingStore {
        fn insert(&self, entry: NewIndexedEntry) -> Result<IndexedEntry, StoreError> {
            if entry.path == self.refused {
                return Err(StoreError::Constraint("refused".into()));
            }
            self.inner.insert(entry)
        }
        fn list_by_project(&self, p: u64, l: usize, o: usize) -> Result<Vec<IndexedEntry>, StoreError> {
            self.inner.list_by_project(p, l, o)
        }
        fn list_by_project_and_parent(&self, p: u64, d: &str, l: usize, o: usize) -> Result<Vec<IndexedEntry>, StoreError> {
            self.inner.list_by_project_and_parent(p, d, l, o)
        }
        fn count_by_project(&self, p: u64) -> Result<u64, StoreError> {
            self.inner.count_by_project(p)
        }
        fn count_by_project_and_parent(&self, p: u64, d: &str) -> Result<u64, StoreError> {
            self.inner.count_by_project_and_parent(p, d)
        }
        fn delete_all_by_project(&self, p: u64) -> Result<u64, StoreError> {
            self.inner.delete_all_by_project(p)
        }
        fn find_by_project_and_path(&self, p: u64, path: &str) -> Result<Option<IndexedEntry>, StoreError> {
            self.inner.find_by_project_and_path(p, path)
        }
        fn directories_by_project(&self, p: u64) -> Result<Vec<String>, StoreError> {
            self.inner.directories_by_project(p)
        }
    }

    #[test]
    fn refused_write_is_skipped() {
        let store = Arc::new(RefusingStore { inner: MemoryIndexStore::new(), refused: "b.txt" });
        let ingestor = Ingestor::new(store.clone());
        let report = walk_bytes(&ingestor, build_zip(&[
            Item::File("a.txt", b"a"),
            Item::File("b.txt", b"b"),
            Item::File("c.txt", b"c"),
        ]));

        assert_eq!(report.failed_writes, 1);
        assert_eq!(report.recorded, 2);
        assert_eq!(store.count_by_project(PROJECT).unwrap(), 2);
    }

    fn project_on_disk(bytes: &[u8]) -> (tempfile::NamedTempFile, Arc<MemoryProjectStore>, u64) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        let projects = Arc::new(MemoryProjectStore::new());
        let project = projects
            .create(CreateProject {
                user_id: 1,
                name: "upload".into(),
                description: None,
                original_filename: "upload.zip".into(),
                archive_path: file.path().to_path_buf(),
                archive_size: bytes.len() as u64,
            })
            .unwrap();
        (file, projects, project.id)
    }

    #[test]
    fn successful_ingestion_completes_project() {
        let (file, projects, id) = project_on_disk(&build_zip(&[Item::File("a.txt", b"a")]));
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let tracker = LifecycleTracker::new(projects.clone());

        let report = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.recorded, 1);
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Completed);
    }

    #[test]
    fn corrupt_entries_still_complete_project() {
        let mut bytes = build_zip(&[
            Item::Stored("broken.txt", b"CORRUPTED-PAYLOAD"),
            Item::File("fine.txt", b"fine"),
        ]);
        corrupt(&mut bytes, b"CORRUPTED-PAYLOAD", b"XORRUPTED-PAYLOAD");
        let (file, projects, id) = project_on_disk(&bytes);
        let ingestor = Ingestor::new(Arc::new(MemoryIndexStore::new()));
        let tracker = LifecycleTracker::new(projects.clone());

        let report = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(false)).unwrap();
        assert_eq!(report.issues(), 1);
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Completed);
    }

    #[test]
    fn unopenable_archive_fails_project_without_rows() {
        let (file, projects, id) = project_on_disk(b"this is a text file, not an archive");
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let tracker = LifecycleTracker::new(projects.clone());

        let err = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, IngestError::Archive(ArchiveError::Open(_))));
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Failed);
        assert_eq!(store.count_by_project(id).unwrap(), 0);
    }

    /// Project store that cannot record the `failed` status.
    struct NoFailedStatus(Arc<MemoryProjectStore>);

    impl ProjectStore for NoFailedStatus {
        fn create(&self, project: CreateProject) -> Result<Project, StoreError> {
            self.0.create(project)
        }
        fn find_by_id(&self, id: u64) -> Result<Option<Project>, StoreError> {
            self.0.find_by_id(id)
        }
        fn find_by_user(&self, user_id: u64, limit: usize, offset: usize) -> Result<Vec<Project>, StoreError> {
            self.0.find_by_user(user_id, limit, offset)
        }
        fn count_by_user(&self, user_id: u64) -> Result<u64, StoreError> {
            self.0.count_by_user(user_id)
        }
        fn transition_status(&self, id: u64, from: ProjectStatus, to: ProjectStatus) -> Result<Project, StoreError> {
            if to == ProjectStatus::Failed {
                return Err(StoreError::Poisoned);
            }
            self.0.transition_status(id, from, to)
        }
        fn delete(&self, id: u64) -> Result<bool, StoreError> {
            self.0.delete(id)
        }
    }

    #[test]
    fn walk_error_survives_failed_status_write() {
        let (file, projects, id) = project_on_disk(&build_zip(&[Item::File("a.txt", b"a")]));
        let ingestor = Ingestor::new(Arc::new(MemoryIndexStore::new()));
        let tracker = LifecycleTracker::new(Arc::new(NoFailedStatus(projects.clone())));

        let err = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, IngestError::Cancelled(p) if p == id));
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Processing);
    }

    #[test]
    fn cancelled_walk_fails_project() {
        let (file, projects, id) = project_on_disk(&build_zip(&[Item::File("a.txt", b"a")]));
        let store = Arc::new(MemoryIndexStore::new());
        let ingestor = Ingestor::new(store.clone());
        let tracker = LifecycleTracker::new(projects.clone());

        let err = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, IngestError::Cancelled(p) if p == id));
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Failed);
        assert_eq!(store.count_by_project(id).unwrap(), 0);
    }

    #[test]
    fn finished_project_cannot_be_ingested_again() {
        let (file, projects, id) = project_on_disk(&build_zip(&[Item::File("a.txt", b"a")]));
        let ingestor = Ingestor::new(Arc::new(MemoryIndexStore::new()));
        let tracker = LifecycleTracker::new(projects.clone());
        ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(false)).unwrap();

        let err = ingestor.ingest_path(id, file.path(), &tracker, &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, IngestError::Lifecycle(LifecycleError::InvalidTransition { .. })));
        assert_eq!(projects.find_by_id(id).unwrap().unwrap().status, ProjectStatus::Completed);
    }
}
