use std::sync::Arc;
use rustc_hash::FxHashSet;
use super::path_utils::extension;
use super::ArchiveError;

/// A set of filters that match entry base names, either by exact extension or
/// by glob pattern.
///
/// Matching is case-insensitive: extensions and patterns are lower-cased when
/// added, and names are lower-cased before they are tested. The set is used to
/// pick the entries that get a text preview and the entries that are opened as
/// nested containers.
///
/// # Example
/// ```
/// # use archive_index::FilterSet;
/// # fn main() -> Result<(), archive_index::ArchiveError> {
/// let filter = FilterSet::new()
///     .add_extension(".xml")?
///     .add_glob("*.jar")?;
///
/// assert!( filter.matches_name("Rules.XML"));
/// assert!( filter.matches_name("lib-1.0.jar"));
/// assert!(!filter.matches_name("logo.png"));
/// # Ok(())
/// # }
/// ```
///
/// An empty set matches nothing.
#[derive(Debug, Default, Clone)]
pub struct FilterSet {
    /// Lower-cased extensions, leading dot included.
    extensions: FxHashSet<Arc<str>>,
    /// Lower-cased glob patterns, evaluated in insertion order with
    /// `fast_glob::glob_match`.
    globs: Vec<String>,
}

impl FilterSet {
    /// Creates an empty filter set.
    pub fn new() -> Self { Self::default() }

    /// Builds a set from a trusted list of extensions.
    pub fn from_extensions<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|ext| Arc::from(ext.to_lowercase()))
            .collect();
        Self { extensions, globs: Vec::new() }
    }

    /// Adds an extension (e.g. `".txt"`).
    ///
    /// # Errors
    /// Returns `ArchiveError::InvalidPattern` unless the extension is a dot
    /// followed by at least one character and contains no `/`.
    pub fn add_extension(mut self, ext: &str) -> Result<Self, ArchiveError> {
        if ext.len() < 2 || !ext.starts_with('.') || ext.contains('/') {
            return Err(ArchiveError::InvalidPattern(format!("invalid extension {ext:?}")));
        }
        self.extensions.insert(Arc::from(ext.to_lowercase()));
        Ok(self)
    }

    /// Adds a glob pattern matched against base names (e.g. `"*.jar"`).
    ///
    /// # Errors
    /// Returns `ArchiveError::InvalidPattern` if the pattern is empty or
    /// contains a `/` (patterns never span directories).
    pub fn add_glob(mut self, pattern: &str) -> Result<Self, ArchiveError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ArchiveError::InvalidPattern("empty pattern".into()));
        }
        if pattern.contains('/') {
            return Err(ArchiveError::InvalidPattern(format!("pattern {pattern:?} must not contain '/'")));
        }
        self.globs.push(pattern.to_lowercase());
        Ok(self)
    }

    /// Checks an extension (leading dot included) against the exact set.
    #[inline]
    pub fn matches_extension(&self, ext: &str) -> bool {
        self.extensions.contains(ext.to_lowercase().as_str())
    }

    /// Checks a base name against the extensions, then against each glob.
    #[inline]
    pub fn matches_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        if extension(&lower).is_some_and(|ext| self.extensions.contains(ext)) { return true; }
        self.globs.iter().any(|g| fast_glob::glob_match(g, lower.as_str()))
    }

    /// Returns `true` if no filters have been added to the set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.globs.is_empty()
    }
}
