//! Input abstraction for class files, directories and archives.
//!
//! This module abstracts over the places class file bytes come from. A single
//! [`crate::file::File`] wraps one buffer behind the [`crate::file::Backend`] trait, either a
//! memory-mapped archive on disk or an owned in-memory buffer. [`crate::file::ClassSource`]
//! collects many of them from directories, jar archives and explicit buffers, in a
//! deterministic order.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - One input buffer
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//! - [`crate::file::ClassSource`] - Ordered collection of class inputs plus embedded configuration
//! - [`crate::file::parser::Parser`] - Cursor used by every decoder
//! - [`crate::file::io`] - Big-endian primitive reads
//!
//! # Examples
//!
//! ```rust,no_run
//! use clearwing::file::ClassSource;
//! use std::path::Path;
//!
//! let mut source = ClassSource::new();
//! source.add_path(Path::new("build/classes"))?;
//! source.add_path(Path::new("libs/runtime.jar"))?;
//! println!("{} class files", source.len());
//! # Ok::<(), clearwing::Error>(())
//! ```

pub mod io;
pub mod parser;

mod backend;
mod source;

use std::path::Path;

use crate::Result;
use backend::Memory;

pub use backend::{Backend, MAP_THRESHOLD};
pub use source::{ClassInput, ClassSource};

/// Magic number every class file starts with.
pub const CLASS_MAGIC: u32 = 0xCAFE_BABE;

/// One input buffer.
pub struct File {
    data: Box<dyn Backend>,
}

impl File {
    /// Open a file from disk; large files are mapped, small ones read.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the file cannot be opened or mapped.
    pub fn from_file(path: &Path) -> Result<File> {
        Ok(File {
            data: backend::open(path)?,
        })
    }

    /// Wrap an owned buffer.
    #[must_use]
    pub fn from_mem(data: Vec<u8>) -> File {
        File {
            data: Box::new(Memory(data)),
        }
    }

    /// Length of the input in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Whether the input holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The complete input.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Whether the input is a mapping of a file on disk.
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        self.data.is_mapped()
    }

    /// A bounds-checked range of the input.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the input.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data().get(offset..end))
            .ok_or(out_of_bounds_error!())
    }

    /// Whether the input starts with [`CLASS_MAGIC`].
    #[must_use]
    pub fn is_class_file(&self) -> bool {
        self.data_slice(0, 4)
            .is_ok_and(|magic| magic == CLASS_MAGIC.to_be_bytes())
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
