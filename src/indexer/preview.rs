use crate::indexer::zipfs::FilterSet;

/// Maximum number of bytes decoded into a preview.
pub const PREVIEW_BYTES: usize = 500;

/// Extensions that get a text preview. Compared case-insensitively.
pub const PREVIEW_EXTENSIONS: [&str; 11] = [
    ".txt", ".xml", ".json", ".js", ".ts", ".html", ".css", ".java", ".py", ".properties", ".class",
];

/// Decodes a bounded text excerpt from entries with a recognized extension.
#[derive(Debug, Clone)]
pub struct PreviewExtractor {
    allowed: FilterSet,
    budget: usize,
}

impl Default for PreviewExtractor {
    fn default() -> Self {
        Self { allowed: FilterSet::from_extensions(PREVIEW_EXTENSIONS), budget: PREVIEW_BYTES }
    }
}

impl PreviewExtractor {
    /// Number of bytes a caller needs to materialize for [`Self::preview`].
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether entries with this extension get a preview at all. Callers use
    /// it to avoid decompressing entries that would be discarded anyway.
    pub fn is_eligible(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| self.allowed.matches_extension(ext))
    }

    /// Returns the text preview of `bytes`, or `None` when the extension is not
    /// recognized or the bytes are not valid UTF-8.
    ///
    /// Only the first [`Self::budget`] bytes are considered. A multi-byte
    /// character cut by that boundary is dropped rather than treated as a
    /// decoding error.
    pub fn preview(&self, bytes: &[u8], extension: Option<&str>) -> Option<String> {
        if !self.is_eligible(extension) { return None; }
        decode_prefix(&bytes[..bytes.len().min(self.budget)])
    }
}

fn decode_prefix(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_owned()),
        // Incomplete sequence at the very end: the budget split a character.
        Err(err) if err.error_len().is_none() => {
            std::str::from_utf8(&bytes[..err.valid_up_to()]).ok().map(str::to_owned)
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_extension_yields_text() {
        let extractor = PreviewExtractor::default();
        let preview = extractor.preview(b"<Application name=\"Claims\"/>", Some(".XML"));
        assert_eq!(preview.as_deref(), Some("<Application name=\"Claims\"/>"));
    }

    #[test]
    fn unrecognized_or_missing_extension_yields_nothing() {
        let extractor = PreviewExtractor::default();
        assert_eq!(extractor.preview(b"plain text", Some(".md")), None);
        assert_eq!(extractor.preview(b"plain text", None), None);
    }

    #[test]
    fn allow_list_membership() {
        let extractor = PreviewExtractor::default();
        for ext in PREVIEW_EXTENSIONS {
            assert!(extractor.is_eligible(Some(ext)), "{ext} should be eligible");
        }
        for ext in [".jar", ".png", ".yaml", ".md", ".sql"] {
            assert!(!extractor.is_eligible(Some(ext)), "{ext} should not be eligible");
        }
    }

    #[test]
    fn preview_is_bounded() {
        let extractor = PreviewExtractor::default();
        let text = "x".repeat(2_000);
        let preview = extractor.preview(text.as_bytes(), Some(".txt")).unwrap();
        assert_eq!(preview.chars().count(), PREVIEW_BYTES);
    }

    #[test]
    fn character_split_at_budget_is_dropped() {
        let extractor = PreviewExtractor::default();
        let mut text = "a".repeat(PREVIEW_BYTES - 1);
        text.push('é');
        let preview = extractor.preview(text.as_bytes(), Some(".txt")).unwrap();
        assert_eq!(preview, "a".repeat(PREVIEW_BYTES - 1));
    }

    #[test]
    fn invalid_encoding_yields_nothing() {
        let extractor = PreviewExtractor::default();
        let class_file: [u8; 8] = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
        assert_eq!(extractor.preview(&class_file, Some(".class")), None);
    }

    #[test]
    fn preview_is_deterministic() {
        let extractor = PreviewExtractor::default();
        let bytes = "{\"key\": \"värde\"}".as_bytes();
        let first = extractor.preview(bytes, Some(".json"));
        assert_eq!(first, extractor.preview(bytes, Some(".json")));
        assert!(first.is_some());
    }
}
