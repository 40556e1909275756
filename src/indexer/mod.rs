mod zipfs;
mod preview;
mod store;
mod project;
mod ingest;
mod jobs;
mod pagination;
mod service;

pub use zipfs::{ArchiveEntry, ArchiveError, ArchiveReader, FilterSet, ResolvedPath, resolve};
pub use preview::{PreviewExtractor, PREVIEW_BYTES, PREVIEW_EXTENSIONS};
pub use store::{IndexStore, IndexedEntry, MemoryIndexStore, NewIndexedEntry, SharedIndexStore, StoreError};
pub use project::{
    CreateProject, LifecycleError, LifecycleTracker, MemoryProjectStore, Project, ProjectStatus,
    ProjectStore, SharedProjectStore,
};
pub use ingest::{IngestError, Ingestor, WalkPolicy, WalkReport, DEFAULT_CONTAINER_GLOB};
pub use jobs::JobRunner;
pub use pagination::{PageRequest, Paged, Pagination};
pub use service::{FileContent, PageDefaults, ProjectService, ServiceError, UploadRequest, NO_PREVIEW_MESSAGE};
