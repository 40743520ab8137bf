//! Input file abstraction and low-level parsing primitives.
//!
//! This module holds the pieces everything above it is built on:
//!
//! - [`crate::file::File`] - memory-mapped input container bytes
//! - [`crate::file::parser::Parser`] - bounds-checked big-endian cursor
//! - [`crate::file::io`] - byte-order primitives shared by reader and writer
//!
//! The [`File`] type maps the input archive into the address space rather
//! than reading it eagerly; class blobs are sliced out of the mapping on
//! demand during extraction.

pub(crate) mod io;
pub mod parser;

use std::{fs::OpenOptions, path::Path};

use memmap2::Mmap;

use crate::Result;

/// A memory-mapped input file.
///
/// Used for the input archive: the zip directory and entry data are read
/// straight out of the mapping without an intermediate copy.
pub struct File {
    data: Mmap,
}

impl File {
    /// Map the file at `path` into memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// mapped, [`crate::Error::Empty`] for a zero-length file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;

        // Safety: the mapping is read-only and lives as long as `data`.
        let data = unsafe { Mmap::map(&file)? };
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(File { data })
    }

    /// The complete file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Total file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the mapping is empty (never true for a successfully
    /// opened file).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_and_read() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"\xCA\xFE\xBA\xBE").unwrap();

        let file = File::open(tmp.path()).unwrap();
        assert_eq!(file.len(), 4);
        assert_eq!(file.data(), b"\xCA\xFE\xBA\xBE");
    }

    #[test]
    fn open_empty_fails() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(File::open(tmp.path()), Err(crate::Error::Empty)));
    }
}
