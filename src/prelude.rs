//! # clearwing Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! clearwing library. Import it to get quick access to the pipeline, its configuration and
//! the model types embedders inspect.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all clearwing operations
pub use crate::Error;

/// The result type used throughout clearwing
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Runs the full pipeline
pub use crate::project::Transpiler;

/// Counts, written files and failures of a run
pub use crate::project::TranspileResult;

/// Settings of a run
pub use crate::config::TranspilerConfig;

/// Ordered class inputs from directories, archives and buffers
pub use crate::file::ClassSource;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Diagnostics
// ================================================================================================

/// Recoverable problems collected during a run
pub use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};

// ================================================================================================
// Model
// ================================================================================================

/// Classes and the arena holding them
pub use crate::model::{Class, ClassId, ClassMap};

/// Members
pub use crate::model::{Field, Method};

/// Field and method types
pub use crate::model::types::{JavaType, MethodSignature};

/// Class, field and method access flags
pub use crate::classfile::flags::AccessFlags;

// ================================================================================================
// Phases
// ================================================================================================

/// Lowers class files into the model
pub use crate::loader::ClassLoader;

/// Class name patterns
pub use crate::dependencies::glob::{Glob, GlobSet};

/// Generated files of one class
pub use crate::codegen::{generate_class, GeneratedClass};
