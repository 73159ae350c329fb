//! Storage behind a [`super::File`].
//!
//! Loose class files are small and numerous, so they are read into memory; archives are
//! usually large and only partly inflated, so they are mapped.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::Result;

/// Inputs at least this large are memory-mapped instead of read.
pub const MAP_THRESHOLD: u64 = 64 * 1024;

/// Backing storage of a [`super::File`].
///
/// Implementations must be thread-safe, class inputs are decoded in parallel.
pub trait Backend: Send + Sync {
    /// The complete data.
    fn data(&self) -> &[u8];

    /// Whether the data is a read-only mapping of a file on disk.
    fn is_mapped(&self) -> bool;
}

/// An owned buffer: archive entries, small files and caller supplied class files.
#[derive(Debug)]
pub struct Memory(pub(crate) Vec<u8>);

impl Backend for Memory {
    fn data(&self) -> &[u8] {
        &self.0
    }

    fn is_mapped(&self) -> bool {
        false
    }
}

/// A read-only mapping of a file on disk.
#[derive(Debug)]
pub struct Mapped(Mmap);

impl Backend for Mapped {
    fn data(&self) -> &[u8] {
        &self.0
    }

    fn is_mapped(&self) -> bool {
        true
    }
}

/// Open `path`, mapping it if it is at least [`MAP_THRESHOLD`] bytes long.
///
/// # Errors
/// Returns [`crate::Error::Io`] if the file cannot be read or mapped.
pub fn open(path: &Path) -> Result<Box<dyn Backend>> {
    let file = fs::File::open(path)?;
    if file.metadata()?.len() < MAP_THRESHOLD {
        return Ok(Box::new(Memory(fs::read(path)?)));
    }

    // Inputs are not modified while a run holds them.
    let map = unsafe { Mmap::map(&file) }?;
    Ok(Box::new(Mapped(map)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_small_files_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Main.class");
        std::fs::write(&path, [0xCA, 0xFE, 0xBA, 0xBE]).unwrap();

        let backend = open(&path).unwrap();
        assert!(!backend.is_mapped());
        assert_eq!(backend.data(), &[0xCA, 0xFE, 0xBA, 0xBE]);
    }

    #[test]
    fn test_large_files_are_mapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.jar");
        std::fs::write(&path, vec![0x50; MAP_THRESHOLD as usize]).unwrap();

        let backend = open(&path).unwrap();
        assert!(backend.is_mapped());
        assert_eq!(backend.data().len(), MAP_THRESHOLD as usize);
    }

    #[test]
    fn test_missing_file() {
        let result = open(Path::new("/nonexistent/app/Main.class"));
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
