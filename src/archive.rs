//! Reading and writing the container archives.
//!
//! Inputs are jar/zip archives; the input file is memory-mapped and the
//! zip directory is read straight out of the mapping. Entries keep their
//! names and order; directory entries are dropped on extraction and the
//! writer recreates none, loaders do not need them.

use std::{
    io::{Cursor, Write},
    path::Path,
};

use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::{file::File, Result};

/// One archive entry, fully materialized.
pub struct ArchiveEntry {
    /// Entry path inside the archive (`com/example/Worker.class`).
    pub name: String,
    /// Entry contents.
    pub data: Vec<u8>,
}

/// Extract all file entries of the archive at `path`, in directory order.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the file cannot be opened,
/// [`crate::Error::Empty`] for an empty file and
/// [`crate::Error::ArchiveError`] for a damaged zip directory.
pub fn extract(path: &Path) -> Result<Vec<ArchiveEntry>> {
    let file = File::open(path)?;
    let mut zip = ZipArchive::new(Cursor::new(file.data()))?;

    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let mut data = Vec::with_capacity(entry.size() as usize);
        std::io::copy(&mut entry, &mut data)?;
        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            data,
        });
    }
    log::debug!("extracted {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Write `entries` as a new archive at `path`, deflated, in order.
///
/// # Errors
/// Returns [`crate::Error::FileError`] if the output cannot be created
/// and [`crate::Error::ArchiveError`] on a zip-level failure.
pub fn pack(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let out = std::fs::File::create(path)?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default();

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.data)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_names_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jar");

        let entries = vec![
            ArchiveEntry {
                name: "META-INF/MANIFEST.MF".to_string(),
                data: b"Manifest-Version: 1.0\n".to_vec(),
            },
            ArchiveEntry {
                name: "demo/App.class".to_string(),
                data: vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52],
            },
        ];
        pack(&path, &entries).unwrap();

        let read = extract(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].name, "META-INF/MANIFEST.MF");
        assert_eq!(read[1].data, entries[1].data);
    }

    #[test]
    fn empty_input_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jar");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(extract(&path), Err(crate::Error::Empty)));
    }

    #[test]
    fn garbage_input_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.jar");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        assert!(matches!(
            extract(&path),
            Err(crate::Error::ArchiveError(_))
        ));
    }
}
