//! Error type for LIB archive operations.

use thiserror::Error;

/// Errors raised while parsing, writing, or lazily loading a LIB archive.
///
/// Detection never produces one of these; it answers `false` instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer is empty or too short to hold even the footer.
    #[error("no archive data: {len} bytes is too short for a LIB archive")]
    InsufficientData {
        /// Length of the rejected buffer.
        len: usize,
    },

    /// The footer or a directory record points outside the payload region.
    #[error("archive is invalid and/or corrupt: {reason}")]
    CorruptDirectory {
        /// What was inconsistent.
        reason: String,
    },

    /// The 16-bit footer cannot describe this many entries.
    #[error("too many entries for a LIB archive: {count} (maximum 65535)")]
    TooManyEntries {
        /// Number of entries in the container.
        count: usize,
    },

    /// Payload offsets would no longer fit the 32-bit directory fields.
    #[error("payload region too large for a LIB archive: {size} bytes")]
    ArchiveTooLarge {
        /// Payload bytes preceding the entry that no longer fits.
        size: u64,
    },

    /// An in-memory payload is longer than a 32-bit size field can record.
    #[error("entry '{name}' is too large for a LIB archive: {len} bytes")]
    EntryTooLarge {
        /// Name of the oversized entry.
        name: String,
        /// Length of its payload.
        len: u64,
    },

    /// An entry index does not exist in the container.
    #[error("entry index {index} out of range")]
    EntryNotFound {
        /// The requested index.
        index: usize,
    },

    /// An unloaded entry needs its bytes but the archive has no file behind it.
    #[error("entry '{name}' is not loaded and the archive has no backing file")]
    NoBackingFile {
        /// Name of the entry that could not be loaded.
        name: String,
    },

    /// An unloaded entry has no stored payload offset to read from.
    #[error("entry '{name}' is not loaded and has no stored offset")]
    NoStoredOffset {
        /// Name of the entry that could not be loaded.
        name: String,
    },

    /// The backing file could not be opened or read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptDirectory {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout `slib_core`.
pub type Result<T> = std::result::Result<T, Error>;
