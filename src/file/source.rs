//! Enumeration of class inputs from directories, archives and buffers.

use std::{
    fs,
    io::{Cursor, Read},
    path::{Path, PathBuf},
};

use log::debug;
use zip::ZipArchive;

use crate::{config::TranspilerConfig, file::File, Result};

/// File name of the configuration that may be embedded in an input archive.
pub const EMBEDDED_CONFIG: &str = "clearwing.json";

/// One class file together with the place it came from.
#[derive(Debug)]
pub struct ClassInput {
    /// Human readable origin, `path` or `archive:entry`
    pub origin: String,
    /// The class file bytes
    pub file: File,
}

/// An ordered set of class inputs.
///
/// Directories are walked recursively with entries sorted by path; archive entries are
/// sorted by name. Multi-release entries under `META-INF/versions/` and `module-info.class`
/// are skipped. Any `clearwing.json` found at the root of an archive is parsed and kept
/// for the caller to merge into the active configuration.
#[derive(Debug, Default)]
pub struct ClassSource {
    inputs: Vec<ClassInput>,
    configs: Vec<TranspilerConfig>,
}

impl ClassSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory, a `.jar`/`.zip` archive or a single `.class` file.
    ///
    /// Other file types are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] or [`crate::Error::Archive`] if the input cannot be read,
    /// and [`crate::Error::Config`] if an embedded configuration is invalid.
    pub fn add_path(&mut self, path: &Path) -> Result<()> {
        if path.is_dir() {
            return self.add_directory(path);
        }

        match path.extension().and_then(|extension| extension.to_str()) {
            Some("class") => {
                self.inputs.push(ClassInput {
                    origin: path.display().to_string(),
                    file: File::from_file(path)?,
                });
                Ok(())
            }
            Some("jar" | "zip") => {
                let archive = File::from_file(path)?;
                self.add_archive(&path.display().to_string(), archive.data())
            }
            _ => {
                debug!("Skipping unsupported input {}", path.display());
                Ok(())
            }
        }
    }

    /// Recursively add every `.class` file below `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if a directory or file cannot be read.
    pub fn add_directory(&mut self, path: &Path) -> Result<()> {
        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        entries.sort();

        for entry in entries {
            if entry.is_dir() {
                self.add_directory(&entry)?;
            } else if entry.extension().is_some_and(|extension| extension == "class") {
                self.inputs.push(ClassInput {
                    origin: entry.display().to_string(),
                    file: File::from_file(&entry)?,
                });
            }
        }

        Ok(())
    }

    /// Add every class file contained in a zip archive held in memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Archive`] if the archive is corrupt and
    /// [`crate::Error::Config`] if its embedded configuration is invalid.
    pub fn add_archive(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        let mut entry_names = Vec::new();
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let entry_name = entry.name().to_string();
            if entry_name == EMBEDDED_CONFIG
                || (entry_name.ends_with(".class")
                    && !entry_name.ends_with("module-info.class")
                    && !entry_name.starts_with("META-INF/versions/"))
            {
                entry_names.push(entry_name);
            }
        }
        entry_names.sort();

        for entry_name in entry_names {
            let mut entry = archive.by_name(&entry_name)?;
            let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
            entry.read_to_end(&mut bytes)?;

            if entry_name == EMBEDDED_CONFIG {
                let text = String::from_utf8_lossy(&bytes);
                debug!("Found embedded configuration in {}", name);
                self.configs.push(TranspilerConfig::from_json(&text)?);
            } else {
                self.inputs.push(ClassInput {
                    origin: format!("{}:{}", name, entry_name),
                    file: File::from_mem(bytes),
                });
            }
        }

        Ok(())
    }

    /// Add a class file held in memory.
    pub fn add_class(&mut self, origin: impl Into<String>, data: Vec<u8>) {
        self.inputs.push(ClassInput {
            origin: origin.into(),
            file: File::from_mem(data),
        });
    }

    /// The collected class inputs in insertion order.
    #[must_use]
    pub fn inputs(&self) -> &[ClassInput] {
        &self.inputs
    }

    /// Configurations found embedded in archives.
    #[must_use]
    pub fn configs(&self) -> &[TranspilerConfig] {
        &self.configs
    }

    /// Number of class inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether no class inputs were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn build_jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_directory_walk_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/Z.class"), [1]).unwrap();
        fs::write(dir.path().join("A.class"), [2]).unwrap();
        fs::write(dir.path().join("notes.txt"), [3]).unwrap();

        let mut source = ClassSource::new();
        source.add_path(dir.path()).unwrap();

        assert_eq!(source.len(), 2);
        assert!(source.inputs()[0].origin.ends_with("A.class"));
        assert!(source.inputs()[1].origin.ends_with("Z.class"));
        assert_eq!(source.inputs()[1].file.data(), &[1]);
    }

    #[test]
    fn test_archive_entries_and_config() {
        let jar = build_jar(&[
            ("b/B.class", &[2]),
            ("a/A.class", &[1]),
            ("module-info.class", &[9]),
            ("META-INF/versions/11/a/A.class", &[9]),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("clearwing.json", br#"{"mainClass": "a.A", "nonOptimized": ["a.**"]}"#),
        ]);

        let mut source = ClassSource::new();
        source.add_archive("app.jar", &jar).unwrap();

        let origins: Vec<&str> = source.inputs().iter().map(|i| i.origin.as_str()).collect();
        assert_eq!(origins, vec!["app.jar:a/A.class", "app.jar:b/B.class"]);
        assert_eq!(source.configs().len(), 1);
        assert_eq!(source.configs()[0].main_class.as_deref(), Some("a.A"));
    }

    #[test]
    fn test_jar_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.jar");
        fs::write(&path, build_jar(&[("x/Y.class", &[7, 7])])).unwrap();

        let mut source = ClassSource::new();
        source.add_path(&path).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(source.inputs()[0].file.data(), &[7, 7]);
    }

    #[test]
    fn test_corrupt_archive() {
        let mut source = ClassSource::new();
        assert!(matches!(
            source.add_archive("bad.jar", &[0, 1, 2, 3]),
            Err(crate::Error::Archive(_))
        ));
    }
}
