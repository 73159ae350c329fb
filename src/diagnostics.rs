//! Recoverable problems of a transpilation run.
//!
//! Nothing recorded here aborts a run. Every entry is also logged through the `log`
//! facade when it is reported; the collection exists so that embedders and the command
//! line front end can show warnings after the fact.
//!
//! Entries are appended to a `boxcar::Vec`, so the parallel generation phase reports into
//! the same collection as the serial phases without locking.
//!
//! # Examples
//!
//! ```rust
//! use clearwing::diagnostics::{DiagnosticCategory, Diagnostics};
//!
//! let diagnostics = Diagnostics::new();
//! diagnostics.warning_for(
//!     DiagnosticCategory::Hierarchy,
//!     "app/Child",
//!     "Failed to find parent class: app/Missing",
//! );
//!
//! assert_eq!(diagnostics.warning_count(), 1);
//! assert_eq!(diagnostics.for_class("app/Child").len(), 1);
//! ```

use std::fmt;

use strum::{Display, EnumIter, IntoEnumIterator};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum DiagnosticSeverity {
    /// Progress worth keeping, such as the number of trimmed methods.
    #[strum(serialize = "INFO")]
    Info,
    /// Something was skipped or left out; the output is still usable.
    #[strum(serialize = "WARN")]
    Warning,
    /// A class could not be generated. The run reports it as a failure.
    #[strum(serialize = "ERROR")]
    Error,
}

/// The pipeline step a diagnostic comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum DiagnosticCategory {
    /// A referenced class is not part of the input.
    Dependency,
    /// An intrinsic entry is malformed or names an unknown class or method.
    Intrinsic,
    /// A superclass or interface could not be found.
    Hierarchy,
    /// A native method declaration has no inline body.
    NativeSource,
    /// Generation of a class failed.
    Codegen,
    /// Entry point detection.
    EntryPoint,
}

/// One recorded problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: DiagnosticSeverity,
    /// Reporting step
    pub category: DiagnosticCategory,
    /// Message, identical to the logged line
    pub message: String,
    /// Original name of the affected class, if the problem is about one
    pub class: Option<String>,
}

impl Diagnostic {
    /// A diagnostic not tied to a class.
    pub fn new(severity: DiagnosticSeverity, category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            category,
            message: message.into(),
            class: None,
        }
    }

    /// Attach the affected class.
    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;
        if let Some(class) = &self.class {
            write!(f, " ({})", class)?;
        }
        Ok(())
    }
}

/// Append-only, thread-safe diagnostic collection.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `diagnostic`.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Record an informational entry.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Record a warning.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Warning, category, message));
    }

    /// Record a warning about `class`.
    pub fn warning_for(&self, category: DiagnosticCategory, class: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Warning, category, message).with_class(class));
    }

    /// Record an error.
    pub fn error(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Error, category, message));
    }

    /// Whether anything was recorded.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Number of warnings.
    pub fn warning_count(&self) -> usize {
        self.iter().filter(|entry| entry.severity == DiagnosticSeverity::Warning).count()
    }

    /// Number of errors.
    pub fn error_count(&self) -> usize {
        self.iter().filter(|entry| entry.severity == DiagnosticSeverity::Error).count()
    }

    /// Entries in the order they were recorded.
    ///
    /// Entries reported from the parallel generation phase are ordered by completion.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Entries reported by one step.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.iter().filter(|entry| entry.category == category).collect()
    }

    /// Entries about one class.
    pub fn for_class(&self, class: &str) -> Vec<&Diagnostic> {
        self.iter().filter(|entry| entry.class.as_deref() == Some(class)).collect()
    }

    /// The most severe recorded level.
    pub fn max_severity(&self) -> Option<DiagnosticSeverity> {
        self.iter().map(|entry| entry.severity).max()
    }

    /// Per step counts, for steps with at least one entry.
    pub fn category_counts(&self) -> Vec<(DiagnosticCategory, usize)> {
        DiagnosticCategory::iter()
            .map(|category| (category, self.iter().filter(|entry| entry.category == category).count()))
            .filter(|&(_, count)| count > 0)
            .collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} warning(s), {} error(s)", self.warning_count(), self.error_count())?;
        for entry in self.iter() {
            writeln!(f, "  {}", entry)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_counts_and_queries() {
        let diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_any());
        assert_eq!(diagnostics.max_severity(), None);

        diagnostics.info(DiagnosticCategory::EntryPoint, "Main class: app/Main");
        diagnostics.warning(DiagnosticCategory::Dependency, "Failed to find class dependency: a/B");
        diagnostics.warning_for(DiagnosticCategory::Hierarchy, "a/C", "Failed to find parent class: a/B");
        diagnostics.error(DiagnosticCategory::Codegen, "bad descriptor");

        assert_eq!(diagnostics.count(), 4);
        assert_eq!(diagnostics.warning_count(), 2);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.max_severity(), Some(DiagnosticSeverity::Error));
        assert_eq!(diagnostics.for_class("a/C").len(), 1);
        assert_eq!(
            diagnostics.category_counts(),
            vec![
                (DiagnosticCategory::Dependency, 1),
                (DiagnosticCategory::Hierarchy, 1),
                (DiagnosticCategory::Codegen, 1),
                (DiagnosticCategory::EntryPoint, 1),
            ]
        );
    }

    #[test]
    fn test_parallel_reports() {
        let diagnostics = Arc::new(Diagnostics::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let diagnostics = Arc::clone(&diagnostics);
                thread::spawn(move || {
                    diagnostics.error(DiagnosticCategory::Codegen, format!("class {} failed", i));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(diagnostics.error_count(), 8);
    }

    #[test]
    fn test_display() {
        let entry = Diagnostic::new(
            DiagnosticSeverity::Warning,
            DiagnosticCategory::NativeSource,
            "No native method body for: read",
        )
        .with_class("a/Io");
        assert_eq!(entry.to_string(), "[WARN] NativeSource: No native method body for: read (a/Io)");

        let diagnostics = Diagnostics::new();
        diagnostics.push(entry);
        assert_eq!(
            diagnostics.to_string(),
            "1 warning(s), 0 error(s)\n  [WARN] NativeSource: No native method body for: read (a/Io)\n"
        );
    }
}
