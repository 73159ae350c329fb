//! Pipeline driver and run results.
//!
//! This module ties the phases together: [`Transpiler`] turns class inputs into a directory
//! of C++ sources and reports what happened as a [`TranspileResult`].
//!
//! # Key Components
//!
//! - [`Transpiler`] - Runs the full pipeline for one configuration
//! - [`TranspileResult`] - Counts, written files, failures and diagnostics of a run
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use clearwing::project::Transpiler;
//! use clearwing::TranspilerConfig;
//! use std::path::Path;
//!
//! let transpiler = Transpiler::new(TranspilerConfig::default());
//! let result = transpiler.run(&[Path::new("classes")], &[], Path::new("out"))?;
//!
//! println!("Required {} of {} classes", result.required_classes, result.parsed_classes);
//! for diagnostic in result.diagnostics.iter() {
//!     println!("{}", diagnostic.message);
//! }
//! # Ok::<(), clearwing::Error>(())
//! ```

mod result;
mod transpiler;

pub use result::TranspileResult;
pub use transpiler::Transpiler;
