//! C++ code generation.
//!
//! Each class that survives dependency collection becomes a header and an implementation
//! unit. Classes are generated independently of each other, so the batch runs on the
//! rayon pool and collects into a concurrent [`GeneratedMap`] keyed by file stem; writing
//! iterates the map in key order, which keeps output deterministic.
//!
//! # Key Components
//!
//! - [`generate_class`] - Header and implementation of one class
//! - [`generate_all`] - Parallel generation over the required classes
//! - [`GeneratedBatch`] - Generated classes and per-class failures
//! - [`context::ClassContext`] - Per-class view of the class map used by every emitter
//! - [`entry`] - `main.cpp` and `Config.h`
//!
//! # Output layout
//!
//! A header declares the instance struct (parent struct first, then `F_` members), the
//! static storage, the `VTABLE_`/`INDEX_` dispatch constants with their `func_` typedefs
//! and every function. The implementation unit defines the static storage, the mark
//! function, the methods, the static initializer, the annotation initializer and finally
//! the reflection tables and the self-registering `Class` record.

pub mod annotations;
pub mod body;
pub mod clinit;
pub mod context;
pub mod entry;
pub mod header;
pub mod instructions;
pub mod mark;
pub mod metadata;
pub mod optimized;
pub mod source;
pub mod writer;

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_skiplist::SkipMap;
use log::{debug, error, info};
use rayon::prelude::*;

use crate::{
    codegen::context::ClassContext,
    config::TranspilerConfig,
    diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    model::{ClassId, ClassMap},
    Error, Result,
};

/// The generated files of one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedClass {
    /// Original class name
    pub name: String,
    /// File stem, the qualified class name
    pub stem: String,
    /// Contents of `<stem>.h`
    pub header: String,
    /// Contents of `<stem>.cpp`
    pub source: String,
}

/// Generated classes keyed by file stem.
pub type GeneratedMap = SkipMap<String, GeneratedClass>;

/// Generate the header and implementation of `id`.
///
/// # Errors
/// Returns [`Error::Codegen`] if any part of the class cannot be translated.
pub fn generate_class(classes: &ClassMap, id: ClassId, config: &TranspilerConfig) -> Result<GeneratedClass> {
    let class = classes
        .get(id)
        .ok_or_else(|| Error::Codegen {
            class: format!("#{}", id.index()),
            message: "Class is not part of the class map".to_string(),
        })?;
    let cx = ClassContext::new(classes, class, config);
    Ok(GeneratedClass {
        name: class.original_name.clone(),
        stem: cx.qualified.clone(),
        header: header::generate(&cx)?,
        source: source::generate(&cx)?,
    })
}

/// Output of a batch generation.
#[derive(Debug, Default)]
pub struct GeneratedBatch {
    /// Generated classes keyed by file stem
    pub classes: GeneratedMap,
    /// Failure messages keyed by original class name
    pub failures: SkipMap<String, String>,
}

impl GeneratedBatch {
    /// The generated classes, if no class failed.
    ///
    /// # Errors
    /// Returns [`Error::GenerationFailed`] with the number of failed classes.
    pub fn into_result(self) -> Result<GeneratedMap> {
        match self.failures.len() {
            0 => Ok(self.classes),
            failed => Err(Error::GenerationFailed(failed)),
        }
    }
}

/// Generate every class in `required` in parallel.
///
/// A class that fails is logged, recorded in `diagnostics` and listed in
/// [`GeneratedBatch::failures`]; the remaining classes are still generated so every
/// failure is reported at once.
pub fn generate_all(
    classes: &ClassMap,
    required: &[ClassId],
    config: &TranspilerConfig,
    diagnostics: &Diagnostics,
) -> GeneratedBatch {
    info!("Generating C++ code for {} classes...", required.len());
    let batch = GeneratedBatch::default();
    let done = AtomicUsize::new(0);

    required.par_iter().for_each(|&id| {
        match generate_class(classes, id, config) {
            Ok(class) => {
                batch.classes.insert(class.stem.clone(), class);
            }
            Err(err) => {
                let name = classes
                    .get(id)
                    .map_or_else(|| format!("#{}", id.index()), |class| class.original_name.clone());
                error!("Failed to generate class {}: {}", name, err);
                diagnostics.push(
                    Diagnostic::new(DiagnosticSeverity::Error, DiagnosticCategory::Codegen, err.to_string())
                        .with_class(name.clone()),
                );
                batch.failures.insert(name, err.to_string());
            }
        }
        let count = done.fetch_add(1, Ordering::Relaxed) + 1;
        if count % 10 == 0 || count == required.len() {
            debug!("Generated {}/{} classes", count, required.len());
        }
    });

    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::flags::AccessFlags,
        hierarchy::vtable::object_vtable,
        model::{Class, VtableSlot},
    };

    #[test]
    fn test_generate_all_in_key_order() {
        let mut classes = ClassMap::new();
        let mut ids = Vec::new();
        for name in ["b/Second", "a/First", "c/Third"] {
            let mut class = Class::new(name, None, &[], AccessFlags::PUBLIC);
            class.vtable = object_vtable();
            ids.push(classes.insert(class));
        }
        let diagnostics = Diagnostics::new();
        let generated = generate_all(&classes, &ids, &TranspilerConfig::default(), &diagnostics)
            .into_result()
            .unwrap();

        let stems: Vec<String> = generated.iter().map(|entry| entry.key().clone()).collect();
        assert_eq!(stems, vec!["a_First", "b_Second", "c_Third"]);
        let first = generated.get("a_First").unwrap();
        assert_eq!(first.value().name, "a/First");
        assert!(first.value().header.starts_with("#ifndef HEADER_a_First\n"));
        assert!(first.value().source.starts_with("#include \"a_First.h\"\n"));
        assert!(!diagnostics.has_any());
    }

    #[test]
    fn test_failures_are_counted() {
        let mut classes = ClassMap::new();
        let mut broken = Class::new("a/Broken", None, &[], AccessFlags::PUBLIC);
        broken.vtable = object_vtable();
        broken.vtable.push(VtableSlot {
            owner: "a/Broken".to_string(),
            name: "bad".to_string(),
            desc: "(Q)V".to_string(),
            is_abstract: false,
        });
        let broken = classes.insert(broken);
        let mut fine = Class::new("a/Fine", None, &[], AccessFlags::PUBLIC);
        fine.vtable = object_vtable();
        let fine = classes.insert(fine);

        let diagnostics = Diagnostics::new();
        let batch = generate_all(&classes, &[broken, fine], &TranspilerConfig::default(), &diagnostics);
        assert!(batch.classes.contains_key("a_Fine"));
        assert!(batch.failures.contains_key("a/Broken"));
        assert!(matches!(batch.into_result(), Err(Error::GenerationFailed(1))));
        let errors = diagnostics.by_category(DiagnosticCategory::Codegen);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].class.as_deref(), Some("a/Broken"));
    }
}
