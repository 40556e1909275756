use std::borrow::Cow;

/// Logical location of an archive entry once nesting prefixes are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Fully-qualified path, including every enclosing container's path.
    pub logical_path: String,
    /// Final path segment.
    pub base_name: String,
    /// `logical_path` without its final segment; `None` at the top level.
    pub parent_directory: Option<String>,
    /// Suffix from the last `.` of `base_name`, dot included, as stored in
    /// the archive (not case-folded). Always `None` for directories.
    pub extension: Option<String>,
}

/// Resolves a raw entry name against the logical path of its enclosing
/// container.
///
/// The trailing slash of directory entries is stripped before joining. The
/// result does not depend on how deep the container is nested: every level
/// contributes its own path segment joined by `/`.
///
/// # Arguments
/// * `raw_name` – name as stored in the container (e.g. `"inner/readme.txt"`).
/// * `base` – logical path of the enclosing container entry, `None` at the
///   top level.
/// * `is_dir` – whether the entry is a directory; directories carry no
///   extension.
///
/// # Returns
/// `None` when nothing is left of the name after stripping the trailing
/// slash (e.g. a bare `"/"` entry).
///
/// # Example
/// ```
/// # use archive_index::resolve;
/// let resolved = resolve("inner/readme.txt", Some("outer.jar"), false).unwrap();
/// assert_eq!(resolved.logical_path, "outer.jar/inner/readme.txt");
/// assert_eq!(resolved.parent_directory.as_deref(), Some("outer.jar/inner"));
/// assert_eq!(resolved.extension.as_deref(), Some(".txt"));
/// ```
pub fn resolve(raw_name: &str, base: Option<&str>, is_dir: bool) -> Option<ResolvedPath> {
    let relative = strip_trailing_slash(raw_name);
    if relative.is_empty() { return None; }

    let logical_path = join_logical(base, relative).into_owned();
    let base_name = base_name(&logical_path).to_string();
    let parent = parent_dir(&logical_path);
    let parent_directory = (!parent.is_empty()).then(|| parent.to_string());
    let extension = if is_dir { None } else { extension(&base_name).map(str::to_string) };

    Some(ResolvedPath { logical_path, base_name, parent_directory, extension })
}

/// Removes the trailing `/` that marks directory entries.
#[inline]
pub fn strip_trailing_slash(name: &str) -> &str {
    name.trim_end_matches('/')
}

/// Joins `relative` under `base`, or returns it unchanged when there is no
/// (or an empty) base.
#[inline]
pub fn join_logical<'a>(base: Option<&str>, relative: &'a str) -> Cow<'a, str> {
    match base {
        Some(base) if !base.is_empty() => format!("{base}/{relative}").into(),
        _ => relative.into(),
    }
}

/// Returns the parent directory of a given path.
///
/// This function extracts the portion of the path before the last `/`
/// separator. If there is no separator, it returns an empty string.
#[inline]
pub fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |pos| &path[..pos])
}

/// Returns the final segment of a `/`-separated path.
#[inline]
pub fn base_name(path: &str) -> &str {
    path.rfind('/').map_or(path, |pos| &path[pos + 1..])
}

/// Returns the extension of a base name, leading dot included.
///
/// A name whose only dot is its first character (`.classpath`) has no
/// extension, and neither has a name without any dot.
#[inline]
pub fn extension(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&name[pos..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_file_has_no_parent() {
        let resolved = resolve("README.md", None, false).unwrap();
        assert_eq!(resolved, ResolvedPath {
            logical_path: "README.md".into(),
            base_name: "README.md".into(),
            parent_directory: None,
            extension: Some(".md".into()),
        });
    }

    #[test]
    fn nested_file_without_directory_entries_keeps_parent() {
        let resolved = resolve("a/b/c.txt", None, false).unwrap();
        assert_eq!(resolved.logical_path, "a/b/c.txt");
        assert_eq!(resolved.base_name, "c.txt");
        assert_eq!(resolved.parent_directory.as_deref(), Some("a/b"));
    }

    #[test]
    fn directory_strips_trailing_slash_and_has_no_extension() {
        let resolved = resolve("src/com.example/", None, true).unwrap();
        assert_eq!(resolved.logical_path, "src/com.example");
        assert_eq!(resolved.base_name, "com.example");
        assert_eq!(resolved.parent_directory.as_deref(), Some("src"));
        assert_eq!(resolved.extension, None);
    }

    #[test]
    fn top_level_entry_of_container_has_container_as_parent() {
        let dir = resolve("META-INF/", Some("lib/outer.jar"), true).unwrap();
        assert_eq!(dir.logical_path, "lib/outer.jar/META-INF");
        assert_eq!(dir.parent_directory.as_deref(), Some("lib/outer.jar"));

        let file = resolve("plugin.xml", Some("outer.jar"), false).unwrap();
        assert_eq!(file.parent_directory.as_deref(), Some("outer.jar"));
    }

    #[test]
    fn two_levels_of_nesting_concatenate_every_segment() {
        let inner = resolve("libs/inner.jar", Some("outer.jar"), false).unwrap();
        let leaf = resolve("pkg/App.class", Some(&inner.logical_path), false).unwrap();
        assert_eq!(leaf.logical_path, "outer.jar/libs/inner.jar/pkg/App.class");
        assert_eq!(leaf.parent_directory.as_deref(), Some("outer.jar/libs/inner.jar/pkg"));
        assert_eq!(leaf.extension.as_deref(), Some(".class"));
    }

    #[test]
    fn empty_names_resolve_to_nothing() {
        assert_eq!(resolve("/", None, true), None);
        assert_eq!(resolve("", Some("outer.jar"), false), None);
    }

    #[test]
    fn extension_rules() {
        assert_eq!(extension("App.JAVA"), Some(".JAVA"));
        assert_eq!(extension("archive.tar.gz"), Some(".gz"));
        assert_eq!(extension(".classpath"), None);
        assert_eq!(extension("Makefile"), None);
        assert_eq!(extension("trailing."), Some("."));
    }

    #[test]
    fn empty_base_behaves_like_top_level() {
        assert_eq!(join_logical(Some(""), "a.txt"), "a.txt");
        assert_eq!(join_logical(None, "a.txt"), "a.txt");
        assert_eq!(join_logical(Some("x.jar"), "a.txt"), "x.jar/a.txt");
    }
}
