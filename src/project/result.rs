//! Transpilation result types and statistics.
//!
//! This module provides the result of a transpilation run, tracking what was parsed,
//! which classes were required, what was written and what went wrong along the way.

use std::{fmt, path::PathBuf};

use crate::{diagnostics::Diagnostics, Error, Result};

/// Result of a transpilation run.
///
/// A run that produced output for only some classes still yields a `TranspileResult`;
/// the classes that failed are listed in [`TranspileResult::failures`] and
/// [`TranspileResult::into_checked`] turns them into an error.
///
/// # Usage
///
/// ```rust,no_run
/// use clearwing::{Transpiler, TranspilerConfig};
/// use std::path::Path;
///
/// # fn main() -> clearwing::Result<()> {
/// let result = Transpiler::new(TranspilerConfig::default())
///     .run(&[Path::new("app.jar")], &[], Path::new("out"))?;
///
/// if result.is_complete_success() {
///     println!("Generated {} files", result.generated_files.len());
/// } else {
///     for (class, message) in &result.failures {
///         eprintln!("{}: {}", class, message);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct TranspileResult {
    /// Number of classes parsed from the inputs, synthesized proxies included
    pub parsed_classes: usize,
    /// Number of classes reachable from the roots
    pub required_classes: usize,
    /// Number of methods removed by trimming
    pub removed_methods: usize,
    /// Every file written, relative to the output directory
    pub generated_files: Vec<PathBuf>,
    /// Referenced classes that were not part of the input
    pub missing_dependencies: Vec<String>,
    /// Classes whose generation failed, with the failure message
    pub failures: Vec<(String, String)>,
    /// The entry point class, if one was found
    pub main_class: Option<String>,
    /// Recoverable problems reported during the run
    pub diagnostics: Diagnostics,
}

impl fmt::Debug for TranspileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranspileResult")
            .field("parsed_classes", &self.parsed_classes)
            .field("required_classes", &self.required_classes)
            .field("removed_methods", &self.removed_methods)
            .field("generated_files", &self.generated_files.len())
            .field("missing_dependencies", &self.missing_dependencies)
            .field("failures", &self.failures)
            .field("main_class", &self.main_class)
            .field("diagnostics", &self.diagnostics.count())
            .finish()
    }
}

impl Default for TranspileResult {
    fn default() -> Self {
        Self::new()
    }
}

impl TranspileResult {
    /// Create an empty result.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsed_classes: 0,
            required_classes: 0,
            removed_methods: 0,
            generated_files: Vec::new(),
            missing_dependencies: Vec::new(),
            failures: Vec::new(),
            main_class: None,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Check if every required class was generated.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Check if any class failed to generate.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Get the number of classes that failed to generate.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Check if an entry point was generated.
    #[must_use]
    pub fn has_entry_point(&self) -> bool {
        self.main_class.is_some()
    }

    /// The result, or [`Error::GenerationFailed`] if any class failed.
    ///
    /// # Errors
    /// Returns [`Error::GenerationFailed`] with the number of failed classes.
    pub fn into_checked(self) -> Result<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::GenerationFailed(self.failures.len()))
        }
    }
}

impl fmt::Display for TranspileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Parsed {} classes, generated {} of {} required classes ({} files)",
            self.parsed_classes,
            self.required_classes - self.failures.len().min(self.required_classes),
            self.required_classes,
            self.generated_files.len()
        )?;
        writeln!(f, "Removed {} unused methods", self.removed_methods)?;
        match &self.main_class {
            Some(main) => writeln!(f, "Entry point: {}", main)?,
            None => writeln!(f, "No entry point")?,
        }
        if !self.missing_dependencies.is_empty() {
            writeln!(f, "Missing dependencies: {}", self.missing_dependencies.len())?;
        }
        for (class, message) in &self.failures {
            writeln!(f, "Failed: {}: {}", class, message)?;
        }
        Ok(())
    }
}
