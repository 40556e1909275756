use std::env;

use crate::indexer::{PageDefaults, WalkPolicy, DEFAULT_CONTAINER_GLOB};

/// Runtime settings, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_depth: Option<usize>,
    pub max_nested_bytes: Option<u64>,
    pub max_archive_bytes: Option<u64>,
    /// Base-name globs of entries opened as nested containers.
    pub container_globs: Vec<String>,
    pub project_page_limit: u64,
    pub file_page_limit: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_nested_bytes: None,
            max_archive_bytes: None,
            container_globs: vec![DEFAULT_CONTAINER_GLOB.to_string()],
            project_page_limit: 10,
            file_page_limit: 50,
        }
    }
}

impl Config {
    const MAX_DEPTH_VARS: [&'static str; 2] = ["ARCHIVE_INDEX_MAX_DEPTH", "INDEXER_MAX_DEPTH"];
    const MAX_NESTED_BYTES_VARS: [&'static str; 2] =
        ["ARCHIVE_INDEX_MAX_NESTED_BYTES", "INDEXER_MAX_NESTED_BYTES"];
    const MAX_ARCHIVE_BYTES_VARS: [&'static str; 2] =
        ["ARCHIVE_INDEX_MAX_ARCHIVE_BYTES", "INDEXER_MAX_ARCHIVE_BYTES"];
    const CONTAINER_GLOBS_VARS: [&'static str; 2] =
        ["ARCHIVE_INDEX_CONTAINER_GLOBS", "INDEXER_CONTAINER_GLOBS"];
    const PROJECT_PAGE_LIMIT_VARS: [&'static str; 1] = ["ARCHIVE_INDEX_PROJECT_PAGE_LIMIT"];
    const FILE_PAGE_LIMIT_VARS: [&'static str; 1] = ["ARCHIVE_INDEX_FILE_PAGE_LIMIT"];

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Unset or
    /// unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let read = |candidates: &[&'static str]| candidates.iter().find_map(|&key| lookup(key));
        let defaults = Self::default();

        let container_globs = read(&Self::CONTAINER_GLOBS_VARS)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|glob| !glob.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|globs| !globs.is_empty())
            .unwrap_or(defaults.container_globs);

        Ok(Self {
            max_depth: read(&Self::MAX_DEPTH_VARS).and_then(|value| value.parse().ok()),
            max_nested_bytes: read(&Self::MAX_NESTED_BYTES_VARS).and_then(|value| value.parse().ok()),
            max_archive_bytes: read(&Self::MAX_ARCHIVE_BYTES_VARS).and_then(|value| value.parse().ok()),
            container_globs,
            project_page_limit: read(&Self::PROJECT_PAGE_LIMIT_VARS)
                .and_then(|value| value.parse().ok())
                .filter(|&limit: &u64| limit > 0)
                .unwrap_or(defaults.project_page_limit),
            file_page_limit: read(&Self::FILE_PAGE_LIMIT_VARS)
                .and_then(|value| value.parse().ok())
                .filter(|&limit: &u64| limit > 0)
                .unwrap_or(defaults.file_page_limit),
        })
    }

    /// Applies command-line values on top of the environment. A non-empty
    /// `container_globs` replaces the configured list.
    pub fn with_overrides(
        mut self,
        max_depth: Option<usize>,
        max_nested_bytes: Option<u64>,
        container_globs: Vec<String>,
    ) -> Self {
        self.max_depth = max_depth.or(self.max_depth);
        self.max_nested_bytes = max_nested_bytes.or(self.max_nested_bytes);
        if !container_globs.is_empty() {
            self.container_globs = container_globs;
        }
        self
    }

    pub fn walk_policy(&self) -> WalkPolicy {
        WalkPolicy {
            max_depth: self.max_depth,
            max_nested_bytes: self.max_nested_bytes,
            max_archive_bytes: self.max_archive_bytes,
        }
    }

    pub fn page_defaults(&self) -> PageDefaults {
        PageDefaults { projects: self.project_page_limit, entries: self.file_page_limit }
    }
}
