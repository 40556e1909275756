mod filters;
mod path_utils;

pub use filters::FilterSet;
pub use path_utils::{ResolvedPath, resolve};
use std::{fs::File, io::{BufReader, Cursor, Read, Seek, SeekFrom}, path::Path};
use zip::{result::ZipError, ZipArchive, read::ZipFile};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Custom error type (thiserror)
// ---------------------------------------------------------------------------

/// Error type for archive reading operations.
///
/// `Open` and `ArchiveTooLarge` are raised while opening a container and are
/// fatal for that container. `EntryRead` and `EntryIndex` concern a single
/// entry and leave the rest of the container readable.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The byte source is not a readable ZIP structure.
    #[error("cannot open archive: {0}")]
    Open(#[from] ZipError),

    /// The container size exceeds the configured maximum allowed size.
    #[error("archive size {0} exceeds limit {1}")]
    ArchiveTooLarge(u64, u64),

    /// The local header of an entry could not be read.
    #[error("cannot read entry #{index}: {source}")]
    EntryIndex {
        index: usize,
        #[source]
        source: ZipError,
    },

    /// The bytes of an entry could not be decompressed.
    #[error("cannot read entry {name}: {source}")]
    EntryRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The declared size of an entry cannot be buffered in memory.
    #[error("entry {name} declares {size} bytes, which cannot be buffered")]
    EntryTooLarge { name: String, size: u64 },

    /// A filter pattern was invalid (empty, contains a separator, etc.).
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// An I/O error while opening the archive source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// ArchiveReader – sequential, non-restartable view over a ZIP container
// ---------------------------------------------------------------------------

/// Sequential reader over the entries of a ZIP container.
///
/// Entries are yielded in central-directory order, exactly once. Content is
/// never read eagerly: each [`ArchiveEntry`] decompresses its bytes only when
/// asked to, so directories and files without a preview cost nothing beyond
/// the header parse.
///
/// # Example
/// ```no_run
/// # use archive_index::ArchiveReader;
/// # fn main() -> Result<(), archive_index::ArchiveError> {
/// let mut reader = ArchiveReader::open_path("upload.zip", None)?;
/// while let Some(entry) = reader.next_entry() {
///     let entry = entry?;
///     println!("{} ({} bytes)", entry.name(), entry.size());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ArchiveReader<R> {
    archive: ZipArchive<R>,
    /// Index of the next entry to yield.
    cursor: usize,
}

impl ArchiveReader<BufReader<File>> {
    /// Opens the archive stored at `path`.
    ///
    /// # Arguments
    /// * `path` – location of the uploaded archive on disk.
    /// * `max_archive_size` – optional maximum allowed archive size in bytes.
    ///
    /// # Errors
    /// * `ArchiveError::Io` – the file cannot be opened.
    /// * `ArchiveError::ArchiveTooLarge` – the file exceeds the size limit.
    /// * `ArchiveError::Open` – the file is not a valid ZIP container.
    pub fn open_path<P: AsRef<Path>>(path: P, max_archive_size: Option<u64>) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), max_archive_size)
    }
}

impl ArchiveReader<Cursor<Vec<u8>>> {
    /// Opens a container that has already been materialized in memory,
    /// typically the bytes of a nested archive entry.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
        Self::new(Cursor::new(bytes), None)
    }
}

impl<R: Read + Seek> ArchiveReader<R> {
    /// Opens any seekable byte source as a ZIP container.
    ///
    /// # Errors
    /// * `ArchiveError::ArchiveTooLarge` – source exceeds the size limit.
    /// * `ArchiveError::Open` – malformed ZIP structure (bad signature,
    ///   truncated central directory, ...).
    /// * `ArchiveError::Io` – I/O error while measuring the source.
    pub fn new(reader: R, max_archive_size: Option<u64>) -> Result<Self, ArchiveError> {
        let reader = Self::check_archive_size(reader, max_archive_size)?;
        let archive = ZipArchive::new(reader)?;
        Ok(Self { archive, cursor: 0 })
    }

    /// Total number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    /// Yields the next entry, or `None` once every entry has been visited.
    ///
    /// An `Err` item concerns only that entry; the caller may keep calling
    /// `next_entry` to continue with the following ones.
    pub fn next_entry(&mut self) -> Option<Result<ArchiveEntry<'_, R>, ArchiveError>> {
        if self.cursor >= self.archive.len() { return None; }
        let index = self.cursor;
        self.cursor += 1;

        Some(
            self.archive
                .by_index(index)
                .map(|file| ArchiveEntry { file })
                .map_err(|source| ArchiveError::EntryIndex { index, source }),
        )
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Checks whether the source size exceeds the optional limit.
    ///
    /// The reader is seeked to the end to obtain the total size, then rewound
    /// so it can be handed to [`ZipArchive::new`].
    fn check_archive_size(mut reader: R, max_archive_size: Option<u64>) -> Result<R, ArchiveError> {
        if let Some(limit) = max_archive_size {
            let size = reader.seek(SeekFrom::End(0))?;
            if size > limit { return Err(ArchiveError::ArchiveTooLarge(size, limit)); }
        }

        reader.seek(SeekFrom::Start(0))?;
        Ok(reader)
    }
}

// ---------------------------------------------------------------------------
// ArchiveEntry – one file or directory inside a container
// ---------------------------------------------------------------------------

/// A single entry borrowed from an [`ArchiveReader`].
///
/// The entry must be dropped before the reader can yield the next one.
pub struct ArchiveEntry<'a, R: Read> {
    file: ZipFile<'a, R>,
}

impl<R: Read> ArchiveEntry<'_, R> {
    /// Raw name as stored in the container: forward-slash separated,
    /// directories carrying a trailing slash.
    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn is_dir(&self) -> bool {
        self.file.is_dir()
    }

    /// Declared uncompressed size.
    pub fn size(&self) -> u64 {
        self.file.size()
    }

    /// Decompresses the whole entry into memory.
    ///
    /// Capacity is reserved up front from the declared size; a declared size
    /// that cannot be reserved is reported instead of aborting the process.
    ///
    /// # Errors
    /// * `ArchiveError::EntryTooLarge` – the declared size cannot be buffered.
    /// * `ArchiveError::EntryRead` – corrupt data or checksum mismatch.
    pub fn read_all(&mut self) -> Result<Vec<u8>, ArchiveError> {
        let size = self.file.size();
        let too_large = || ArchiveError::EntryTooLarge { name: self.file.name().to_string(), size };
        if size > usize::MAX as u64 { return Err(too_large()); }

        let mut content = Vec::new();
        if content.try_reserve_exact(size as usize).is_err() { return Err(too_large()); }

        self.file
            .read_to_end(&mut content)
            .map_err(|source| ArchiveError::EntryRead { name: self.file.name().to_string(), source })?;
        Ok(content)
    }

    /// Decompresses at most `limit` bytes from the start of the entry.
    ///
    /// For entries shorter than `limit` the stream is read to its end, so a
    /// checksum mismatch is still reported.
    pub fn read_prefix(&mut self, limit: usize) -> Result<Vec<u8>, ArchiveError> {
        let mut content = Vec::with_capacity(limit.min(self.file.size() as usize));
        let read = (&mut self.file).take(limit as u64).read_to_end(&mut content);
        read.map_err(|source| ArchiveError::EntryRead { name: self.file.name().to_string(), source })?;
        Ok(content)
    }
}
