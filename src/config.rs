//! Configuration for a transpilation run.
//!
//! [`TranspilerConfig`] is read from JSON (`camelCase` keys, every key optional) and can be
//! layered: a project file, configurations embedded in input archives and command line
//! overrides are combined with [`TranspilerConfig::merge`].
//!
//! # Examples
//!
//! ```rust
//! use clearwing::TranspilerConfig;
//!
//! let config = TranspilerConfig::from_json(r#"{
//!     "mainClass": "com.example.Main",
//!     "nonOptimized": ["com.example.reflect.**"],
//!     "useLineNumbers": false
//! }"#)?;
//! assert_eq!(config.main_class.as_deref(), Some("com.example.Main"));
//! assert!(!config.has_line_numbers);
//! # Ok::<(), clearwing::Error>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Configuration for a transpilation run.
///
/// All list entries use the glob syntax of [`crate::dependencies::glob`] except
/// `intrinsics`, which holds `class.method(descriptor)` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TranspilerConfig {
    /// Entry point class by original name, `.` or `/` separated.
    pub main_class: Option<String>,

    /// Group instruction runs and emit them on named temporaries (default: false).
    pub use_optimizations: bool,

    /// Classes that are always kept and never trimmed.
    pub non_optimized: Vec<String>,

    /// Legacy name for `nonOptimized`, folded into it on load.
    #[serde(skip_serializing)]
    pub reflective: Vec<String>,

    /// Methods implemented by hand in the runtime, `class.method(desc)`.
    pub intrinsics: Vec<String>,

    /// Classes whose native methods are forwarded to JNI symbols.
    pub jni_classes: Vec<String>,

    /// Classes whose absence is not worth a warning.
    pub warning_ignores: Vec<String>,

    /// Source files excluded from native method scanning.
    pub source_ignores: Vec<String>,

    /// Emit line number tracking (default: true).
    #[serde(rename = "useLineNumbers")]
    pub has_line_numbers: bool,

    /// Emit null, bounds and cast checks (default: true).
    #[serde(rename = "useValueChecks")]
    pub has_value_checks: bool,

    /// Let the runtime replace platform classes (default: false).
    #[serde(rename = "usePlatformOverride")]
    pub has_platform_override: bool,
}

impl Default for TranspilerConfig {
    fn default() -> Self {
        Self {
            main_class: None,
            use_optimizations: false,
            non_optimized: Vec::new(),
            reflective: Vec::new(),
            intrinsics: Vec::new(),
            jni_classes: Vec::new(),
            warning_ignores: Vec::new(),
            source_ignores: Vec::new(),
            has_line_numbers: true,
            has_value_checks: true,
            has_platform_override: false,
        }
    }
}

impl TranspilerConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON text.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: TranspilerConfig = serde_json::from_str(text)?;
        config.normalize();
        Ok(config)
    }

    /// Read a configuration file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the file cannot be read and
    /// [`crate::Error::Config`] if it is not a valid configuration.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Serialize the configuration as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Layer `other` on top of this configuration.
    ///
    /// List entries are appended without duplicates, `main_class` is taken from `other`
    /// when set and the flags are taken from `other`.
    pub fn merge(&mut self, other: &TranspilerConfig) {
        fn append(target: &mut Vec<String>, source: &[String]) {
            for entry in source {
                if !target.contains(entry) {
                    target.push(entry.clone());
                }
            }
        }

        if other.main_class.is_some() {
            self.main_class.clone_from(&other.main_class);
        }
        append(&mut self.non_optimized, &other.non_optimized);
        append(&mut self.non_optimized, &other.reflective);
        append(&mut self.intrinsics, &other.intrinsics);
        append(&mut self.jni_classes, &other.jni_classes);
        append(&mut self.warning_ignores, &other.warning_ignores);
        append(&mut self.source_ignores, &other.source_ignores);
        self.use_optimizations = other.use_optimizations;
        self.has_line_numbers = other.has_line_numbers;
        self.has_value_checks = other.has_value_checks;
        self.has_platform_override = other.has_platform_override;
    }

    /// Set the entry point class.
    #[must_use]
    pub fn with_main_class(mut self, main_class: impl Into<String>) -> Self {
        self.main_class = Some(main_class.into());
        self
    }

    /// Enable or disable instruction grouping.
    #[must_use]
    pub fn with_optimizations(mut self, enabled: bool) -> Self {
        self.use_optimizations = enabled;
        self
    }

    /// The entry point in internal form (`a/b/Main`), if configured.
    #[must_use]
    pub fn main_class_internal(&self) -> Option<String> {
        self.main_class.as_ref().map(|name| name.replace('.', "/"))
    }

    fn normalize(&mut self) {
        let legacy = std::mem::take(&mut self.reflective);
        for entry in legacy {
            if !self.non_optimized.contains(&entry) {
                self.non_optimized.push(entry);
            }
        }
    }
}
