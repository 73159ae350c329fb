// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # clearwing
//!
//! An ahead-of-time transpiler from JVM class files to C++.
//!
//! `clearwing` reads compiled classes from directories and jar archives, resolves their
//! hierarchy and operand stacks, drops everything the program cannot reach and emits one
//! header and implementation unit per remaining class. The generated code targets a small
//! runtime with a conservative mark-based collector, monitors and explicit vtables.
//!
//! ## Features
//!
//! - **📦 Zero-copy input** - Memory-mapped class files and in-memory archives
//! - **🔍 Complete class file decoding** - Constant pool, attributes, annotations and every opcode
//! - **⚡ Parallel generation** - Classes are generated concurrently, output stays deterministic
//! - **✂️ Tree shaking** - Only reachable classes and methods are emitted
//! - **🧩 Lambdas and string concatenation** - `invokedynamic` call sites become proxy classes and concat instructions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clearwing::{Transpiler, TranspilerConfig};
//! use std::path::Path;
//!
//! let config = TranspilerConfig::default().with_main_class("com.example.Main");
//! let result = Transpiler::new(config).transpile(
//!     &[Path::new("build/classes"), Path::new("libs/runtime.jar")],
//!     &[Path::new("src/main/java")],
//!     Path::new("build/cpp"),
//! )?;
//! println!("{}", result);
//! # Ok::<(), clearwing::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use clearwing::prelude::*;
//!
//! let mut source = ClassSource::new();
//! source.add_path(std::path::Path::new("app.jar"))?;
//! let result = Transpiler::new(TranspilerConfig::default())
//!     .run_source(&source, &[], std::path::Path::new("out"))?;
//! println!("{} warnings", result.diagnostics.warning_count());
//! # Ok::<(), clearwing::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The pipeline runs in phases, each in its own module:
//!
//! - [`file`] - Input buffers, directories and archives
//! - [`classfile`] - Structural class file decoding
//! - [`disassembler`] - Bytecode decoding
//! - [`loader`] - Lowering into the [`ir`], proxy synthesis and dataflow resolution
//! - [`hierarchy`] - Superclass links and vtables
//! - [`dependencies`] - Reachable classes, native sources and method trimming
//! - [`codegen`] - C++ emission
//! - [`project`] - The driver tying the phases together
//!
//! ## Error Handling
//!
//! Fatal problems are reported as [`Error`]. Recoverable ones, such as a dependency that is
//! not part of the input, are logged through the `log` facade and collected in
//! [`Diagnostics`] on the [`TranspileResult`].

#[macro_use]
pub(crate) mod error;

/// Input abstraction for class files, directories and archives.
pub mod file;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use clearwing::prelude::*;
///
/// let config = TranspilerConfig::from_file(std::path::Path::new("clearwing.json"))?;
/// let transpiler = Transpiler::new(config);
/// # Ok::<(), clearwing::Error>(())
/// ```
pub mod prelude;

/// Structural decoding of class files.
///
/// Splits a class file into its constant pool, header, members and raw attributes. Method
/// bodies stay undecoded until the [`loader`] needs them.
pub mod classfile;

/// JVM bytecode decoding.
///
/// # Examples
///
/// ```rust
/// use clearwing::disassembler::decode_stream;
///
/// let instructions = decode_stream(&[0x03, 0xAC])?; // iconst_0, ireturn
/// assert_eq!(instructions.len(), 2);
/// # Ok::<(), clearwing::Error>(())
/// ```
pub mod disassembler;

/// The instruction graph methods are lowered into.
pub mod ir;

/// Class, method and field model shared by every phase.
pub mod model;

/// Lowering of class files into the model.
pub mod loader;

/// Class hierarchy and vtable resolution.
pub mod hierarchy;

/// Dependency collection, native sources and method trimming.
pub mod dependencies;

/// C++ code generation.
pub mod codegen;

/// Transpiler configuration.
pub mod config;

/// Recoverable problems collected during a run.
pub mod diagnostics;

/// The pipeline driver.
pub mod project;

/// `clearwing` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use clearwing::{Result, TranspilerConfig};
///
/// fn load_config(path: &str) -> Result<TranspilerConfig> {
///     TranspilerConfig::from_file(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `clearwing` Error type
///
/// Every fallible operation of the crate reports one of its variants.
pub use error::Error;

/// Low-level big-endian cursor over class file data.
///
/// # Example
///
/// ```rust
/// use clearwing::Parser;
///
/// let mut parser = Parser::new(&[0xCA, 0xFE, 0xBA, 0xBE]);
/// assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
/// # Ok::<(), clearwing::Error>(())
/// ```
pub use file::{parser::Parser, File};

pub use config::TranspilerConfig;
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
pub use project::{TranspileResult, Transpiler};
