//! Dependency collection and method trimming.
//!
//! Output only contains the classes reachable from a set of roots: the classes the runtime
//! itself calls into ([`NATIVE_DEPENDENCIES`]), classes matching keep patterns, the entry
//! point, intrinsic owners and classes referenced by native sources. The
//! [`DependencyCollector`] follows every class name a class mentions, from its header,
//! members, method bodies, annotations and vtable.
//!
//! # Key Components
//!
//! - [`DependencyCollector`] - Transitive closure over class references
//! - [`class_dependencies`] - The names one class references
//! - [`glob`] - Class name patterns
//! - [`natives`] - Native method bodies embedded in Java sources
//! - [`trim`] - Removal of methods unreachable from the seed set

pub mod glob;
pub mod natives;
pub mod trim;

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;

use crate::{
    dependencies::glob::GlobSet,
    diagnostics::{DiagnosticCategory, Diagnostics},
    model::{naming::sanitize_name, Class, ClassId, ClassMap, OBJECT},
};

/// Classes the runtime references directly.
pub const NATIVE_DEPENDENCIES: [&str; 47] = [
    "java/lang/ArithmeticException",
    "java/lang/reflect/Array",
    "java/lang/Boolean",
    "java/nio/Buffer",
    "java/lang/Byte",
    "java/lang/Character",
    "java/lang/Class",
    "java/lang/ClassNotFoundException",
    "java/lang/reflect/Constructor",
    "java/lang/reflect/InvocationTargetException",
    "java/lang/reflect/Proxy",
    "java/text/DateFormat",
    "java/lang/Double",
    "java/lang/Enum",
    "java/lang/ExceptionInInitializerError",
    "java/lang/reflect/Field",
    "java/io/File",
    "java/io/FileInputStream",
    "java/io/FileOutputStream",
    "java/lang/Float",
    "java/util/HashMap",
    "java/lang/Integer",
    "java/lang/IllegalMonitorStateException",
    "java/lang/InterruptedException",
    "java/util/Locale",
    "java/lang/Long",
    "java/lang/Math",
    "java/lang/NoSuchMethodError",
    "java/lang/OutOfMemoryError",
    "java/lang/reflect/Method",
    "java/io/NativeOutputStream",
    "java/nio/NativeUtils",
    "java/lang/Runtime",
    "java/lang/Short",
    "java/lang/String",
    "java/lang/StringBuilder",
    "java/lang/StringToReal",
    "java/lang/StackOverflowError",
    "java/lang/System",
    "java/lang/Thread",
    "java/lang/Thread$UncaughtExceptionHandler",
    "java/lang/Throwable",
    "java/util/zip/CRC32",
    "java/util/zip/Deflater",
    "java/util/zip/Inflater",
    "java/lang/ref/WeakReference",
    "java/util/zip/ZipFile",
];

const THROWABLE: &str = "java/lang/Throwable";

/// Every class name `class` references, sanitized.
#[must_use]
pub fn class_dependencies(class: &Class) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    names.insert(class.super_name.clone());
    names.extend(class.interfaces.iter().cloned());
    names.extend(class.outer_class.iter().cloned());
    names.extend(class.inner_classes.iter().cloned());

    for field in &class.fields {
        names.extend(field.ty.class_name().map(str::to_string));
        for annotation in &field.annotations {
            annotation.collect_classes(&mut names);
        }
    }

    for method in &class.methods {
        names.extend(method.sig.classes().map(str::to_string));
        for annotation in &method.annotations {
            annotation.collect_classes(&mut names);
        }
        if let Some(body) = &method.body {
            body.for_each_instruction(|insn| insn.collect_classes(&mut names));
            for frame in &body.frames {
                names.insert(frame.catch_type.clone().unwrap_or_else(|| THROWABLE.to_string()));
            }
        }
    }

    if let Some(defaults) = &class.default_annotation {
        defaults.collect_classes(&mut names);
    }
    for annotation in &class.annotations {
        annotation.collect_classes(&mut names);
    }
    names.extend(class.vtable.iter().map(|slot| slot.owner.clone()));

    names.into_iter().map(|name| sanitize_name(&name)).collect()
}

/// Collects the transitive closure of class references from a set of roots.
///
/// Collecting is idempotent: adding the same roots again leaves the result unchanged.
pub struct DependencyCollector<'a> {
    classes: &'a ClassMap,
    ignores: &'a GlobSet,
    diagnostics: &'a Diagnostics,
    visited: FxHashSet<ClassId>,
    missing: BTreeSet<String>,
}

impl<'a> DependencyCollector<'a> {
    /// A collector over `classes`; missing names matching `ignores` are not reported.
    #[must_use]
    pub fn new(classes: &'a ClassMap, ignores: &'a GlobSet, diagnostics: &'a Diagnostics) -> Self {
        DependencyCollector {
            classes,
            ignores,
            diagnostics,
            visited: FxHashSet::default(),
            missing: BTreeSet::new(),
        }
    }

    fn report_missing(&mut self, name: &str) {
        if name == OBJECT || !self.missing.insert(name.to_string()) {
            return;
        }
        if !self.ignores.matches(name) {
            let message = format!("Failed to find class dependency: {}", name);
            log::warn!("{}", message);
            self.diagnostics.warning(DiagnosticCategory::Dependency, message);
        }
    }

    /// Collect the class called `name` and everything it references.
    pub fn collect_name(&mut self, name: &str) {
        let name = sanitize_name(name);
        match self.classes.lookup(&name) {
            Some(id) => self.collect(id),
            None => self.report_missing(&name),
        }
    }

    /// Collect class `root` and everything it references.
    pub fn collect(&mut self, root: ClassId) {
        let mut worklist = vec![root];
        while let Some(id) = worklist.pop() {
            let class = &self.classes[id];
            if class.has_hierarchy_error() || !self.visited.insert(id) {
                continue;
            }
            for dependency in class_dependencies(class) {
                if dependency == OBJECT {
                    continue;
                }
                match self.classes.lookup(&dependency) {
                    Some(dependency) if !self.visited.contains(&dependency) => worklist.push(dependency),
                    Some(_) => {}
                    None => self.report_missing(&dependency),
                }
            }
        }
    }

    /// Names that were referenced but are not in the class map.
    #[must_use]
    pub fn missing(&self) -> &BTreeSet<String> {
        &self.missing
    }

    /// The collected classes, ordered by name.
    #[must_use]
    pub fn required(&self) -> Vec<ClassId> {
        let mut required: Vec<ClassId> = self.visited.iter().copied().collect();
        required.sort_by(|a, b| self.classes[*a].name.cmp(&self.classes[*b].name));
        required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::flags::AccessFlags, model::Field};

    fn class(name: &str, super_name: &str) -> Class {
        Class::new(name, Some(super_name), &[], AccessFlags::PUBLIC)
    }

    fn sample() -> ClassMap {
        let mut classes = ClassMap::new();
        let mut main = class("a/Main", OBJECT);
        main.fields
            .push(Field::new("helper", "La/Helper;", AccessFlags::PRIVATE).unwrap());
        main.fields
            .push(Field::new("missing", "Lb/Gone;", AccessFlags::PRIVATE).unwrap());
        classes.insert(main);
        classes.insert(class("a/Helper", "a/Base"));
        classes.insert(class("a/Base", OBJECT));
        classes.insert(class("a/Unused", OBJECT));
        classes
    }

    fn names(classes: &ClassMap, ids: &[ClassId]) -> Vec<String> {
        ids.iter().map(|id| classes[*id].name.clone()).collect()
    }

    #[test]
    fn test_transitive_closure() {
        let classes = sample();
        let ignores = GlobSet::default();
        let diagnostics = Diagnostics::new();
        let mut collector = DependencyCollector::new(&classes, &ignores, &diagnostics);
        collector.collect_name("a.Main");

        assert_eq!(
            names(&classes, &collector.required()),
            vec!["a/Base", "a/Helper", "a/Main"]
        );
        assert!(collector.missing().contains("b/Gone"));
        assert_eq!(diagnostics.by_category(DiagnosticCategory::Dependency).len(), 1);
    }

    #[test]
    fn test_idempotent() {
        let classes = sample();
        let ignores = GlobSet::default();
        let diagnostics = Diagnostics::new();
        let mut collector = DependencyCollector::new(&classes, &ignores, &diagnostics);
        collector.collect_name("a/Main");
        let first = collector.required();
        collector.collect_name("a/Main");
        assert_eq!(collector.required(), first);
        assert_eq!(diagnostics.count(), 1);
    }

    #[test]
    fn test_ignored_missing_not_reported() {
        let classes = sample();
        let ignores = GlobSet::new(&["b.**"]).unwrap();
        let diagnostics = Diagnostics::new();
        let mut collector = DependencyCollector::new(&classes, &ignores, &diagnostics);
        collector.collect_name("a/Main");
        assert!(collector.missing().contains("b/Gone"));
        assert_eq!(diagnostics.count(), 0);
    }

    #[test]
    fn test_runtime_roots() {
        let unique: BTreeSet<&str> = NATIVE_DEPENDENCIES.iter().copied().collect();
        assert_eq!(unique.len(), 47);
        assert!(unique.contains("java/util/zip/ZipFile"));
        assert!(unique.contains("java/lang/Thread$UncaughtExceptionHandler"));

        let mut classes = ClassMap::new();
        let zip = classes.insert(class("java/util/zip/ZipFile", OBJECT));
        classes.insert(class("java/util/zip/Unreferenced", OBJECT));
        let ignores = GlobSet::new(&["java.**"]).unwrap();
        let diagnostics = Diagnostics::new();
        let mut collector = DependencyCollector::new(&classes, &ignores, &diagnostics);
        for name in NATIVE_DEPENDENCIES {
            collector.collect_name(name);
        }

        assert_eq!(collector.required(), vec![zip]);
        assert_eq!(collector.missing().len(), 46);
        assert!(!diagnostics.has_any());
    }
}
