//! The transpilation pipeline.
//!
//! [`Transpiler`] drives one run from class inputs to a directory of C++ sources:
//!
//! 1. Enumerate inputs and merge configurations embedded in archives
//! 2. Parse every class file, synthesizing proxy classes for lambda call sites
//! 3. Resolve the hierarchy and vtables of every class
//! 4. Mark intrinsic methods and JNI classes, find the entry point
//! 5. Collect the classes reachable from the roots and translate native sources
//! 6. Trim unreachable methods
//! 7. Generate and write one header and implementation unit per class, `main.cpp`
//!    and `Config.h`
//!
//! Malformed input aborts the run. Missing dependencies, bad intrinsics and a missing
//! entry point are warnings recorded in [`TranspileResult::diagnostics`]; classes that fail
//! to generate are listed in [`TranspileResult::failures`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{error, info, warn};

use crate::{
    codegen::{self, entry},
    config::TranspilerConfig,
    dependencies::{
        glob::GlobSet, natives::NativeScanner, trim::trim_unused_methods, DependencyCollector,
        NATIVE_DEPENDENCIES,
    },
    diagnostics::{DiagnosticCategory, Diagnostics},
    file::ClassSource,
    hierarchy,
    loader::ClassLoader,
    model::{naming::sanitize_name, ClassId, ClassMap},
    project::TranspileResult,
    Error, Result,
};

/// Transpiles class files into C++ sources.
///
/// # Usage
///
/// ```rust,no_run
/// use clearwing::{Transpiler, TranspilerConfig};
/// use std::path::Path;
///
/// let config = TranspilerConfig::default().with_main_class("com.example.Main");
/// let result = Transpiler::new(config).transpile(
///     &[Path::new("app.jar"), Path::new("runtime.jar")],
///     &[Path::new("src/main/java")],
///     Path::new("build/cpp"),
/// )?;
/// print!("{}", result);
/// # Ok::<(), clearwing::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Transpiler {
    config: TranspilerConfig,
}

impl Transpiler {
    /// A transpiler using `config`.
    #[must_use]
    pub fn new(config: TranspilerConfig) -> Self {
        Transpiler { config }
    }

    /// The configuration before embedded configurations are merged.
    #[must_use]
    pub fn config(&self) -> &TranspilerConfig {
        &self.config
    }

    /// Transpile `inputs` into `output`, failing if any class failed to generate.
    ///
    /// `inputs` are directories, archives or class files; `source_dirs` are scanned for
    /// Java sources carrying native method bodies.
    ///
    /// # Errors
    /// Returns the errors of [`Transpiler::run`] and [`Error::GenerationFailed`] if any
    /// class could not be generated.
    pub fn transpile(&self, inputs: &[&Path], source_dirs: &[&Path], output: &Path) -> Result<TranspileResult> {
        self.run(inputs, source_dirs, output)?.into_checked()
    }

    /// Transpile `inputs` into `output`, reporting per-class failures in the result.
    ///
    /// # Errors
    /// Returns [`Error::Io`] or [`Error::Archive`] if an input cannot be read, decoding and
    /// dataflow errors for malformed class files, [`Error::Pattern`] for invalid globs and
    /// [`Error::MultipleMainClasses`] if the entry point is ambiguous.
    pub fn run(&self, inputs: &[&Path], source_dirs: &[&Path], output: &Path) -> Result<TranspileResult> {
        let mut source = ClassSource::new();
        for input in inputs {
            source.add_path(input)?;
        }
        self.run_source(&source, source_dirs, output)
    }

    /// Transpile the classes of an already enumerated `source` into `output`.
    ///
    /// # Errors
    /// Same as [`Transpiler::run`], without the input enumeration errors.
    pub fn run_source(&self, source: &ClassSource, source_dirs: &[&Path], output: &Path) -> Result<TranspileResult> {
        let mut config = self.config.clone();
        for embedded in source.configs() {
            config.merge(embedded);
        }

        let mut result = TranspileResult::new();
        let diagnostics = &result.diagnostics;

        let mut classes = load_classes(source, &config)?;
        result.parsed_classes = classes.len();
        info!("Parsed {} classes", classes.len());

        hierarchy::resolve(&mut classes, diagnostics);

        let intrinsic_owners = mark_intrinsics(&mut classes, &config.intrinsics, diagnostics);

        let jni = GlobSet::new(&config.jni_classes)?;
        for class in classes.iter_mut() {
            if jni.matches(&class.original_name) {
                class.mark_jni();
            }
        }

        let main = find_main_class(&classes, &config)?;
        match main {
            Some(id) => result.main_class = Some(classes[id].original_name.clone()),
            None => {
                let message = "Main class not found, omitting entrypoint";
                warn!("{}", message);
                diagnostics.warning(DiagnosticCategory::EntryPoint, message);
            }
        }

        let warning_ignores = GlobSet::new(&config.warning_ignores)?;
        let non_optimized = GlobSet::new(&config.non_optimized)?;
        let source_ignores = GlobSet::new(&config.source_ignores)?;

        let (required, natives) = {
            let mut collector = DependencyCollector::new(&classes, &warning_ignores, diagnostics);
            for &id in &intrinsic_owners {
                collector.collect(id);
            }
            for name in NATIVE_DEPENDENCIES {
                collector.collect_name(name);
            }
            for (id, class) in classes.iter() {
                if non_optimized.matches(&class.original_name) {
                    collector.collect(id);
                }
            }
            if let Some(id) = main {
                collector.collect(id);
            }

            let dirs: Vec<PathBuf> = source_dirs.iter().map(|dir| dir.to_path_buf()).collect();
            let natives = NativeScanner::new()?.scan(&dirs, &source_ignores, &classes, diagnostics)?;
            for native in &natives {
                for name in &native.classes {
                    collector.collect_name(name);
                }
            }

            result.missing_dependencies = collector.missing().iter().cloned().collect();
            (collector.required(), natives)
        };
        result.required_classes = required.len();

        let kept: Vec<ClassId> = required
            .iter()
            .copied()
            .filter(|&id| non_optimized.matches(&classes[id].original_name))
            .collect();
        info!("Optimizing: trimming unused methods...");
        result.removed_methods = trim_unused_methods(&mut classes, &required, &kept, main);

        let batch = codegen::generate_all(&classes, &required, &config, diagnostics);

        let mut files = Vec::new();
        for native in &natives {
            write_output(output, &Path::new("src").join(&native.path), &native.content, &mut files)?;
        }
        for generated in batch.classes.iter() {
            let generated = generated.value();
            write_output(output, &src_file(&generated.stem, "h"), &generated.header, &mut files)?;
            write_output(output, &src_file(&generated.stem, "cpp"), &generated.source, &mut files)?;
        }
        if let Some(id) = main {
            write_output(
                output,
                Path::new("src/main.cpp"),
                &entry::main_source(&classes[id].name),
                &mut files,
            )?;
        }
        write_output(output, Path::new("src/Config.h"), &entry::config_header(&config), &mut files)?;

        result.generated_files = files;
        result.failures = batch
            .failures
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Ok(result)
    }
}

/// Parse every input of `source` into a class map.
fn load_classes(source: &ClassSource, config: &TranspilerConfig) -> Result<ClassMap> {
    let mut loader = ClassLoader::new(config.use_optimizations);
    let mut classes = ClassMap::new();
    for input in source.inputs() {
        let loaded = loader.load(input.file.data()).map_err(|err| {
            error!("Failed to parse {}: {}", input.origin, err);
            err
        })?;
        for class in loaded {
            classes.insert(class);
        }
    }
    Ok(classes)
}

/// Mark the methods named by `intrinsics`, returning the classes that own them.
///
/// Entries read `class.method(descriptor)`; the class part may use `.` or `/`.
fn mark_intrinsics(classes: &mut ClassMap, intrinsics: &[String], diagnostics: &Diagnostics) -> Vec<ClassId> {
    let report = |message: String| {
        warn!("{}", message);
        diagnostics.warning(DiagnosticCategory::Intrinsic, message);
    };

    let mut owners = Vec::new();
    for intrinsic in intrinsics {
        let Some(desc_index) = intrinsic.find('(') else {
            report(format!("Invalid intrinsic format: '{}'", intrinsic));
            continue;
        };
        let Some(separator) = intrinsic[..desc_index].rfind('.') else {
            report(format!("Invalid intrinsic format: '{}'", intrinsic));
            continue;
        };
        let Some(id) = classes.lookup(&sanitize_name(&intrinsic[..separator])) else {
            report(format!("Failed to find class for intrinsic: '{}'", intrinsic));
            continue;
        };

        let name = &intrinsic[separator + 1..desc_index];
        let desc = &intrinsic[desc_index..];
        match classes[id].find_method_mut(name, desc) {
            Some(method) => method.intrinsic = true,
            None => report(format!("Failed to mark method as intrinsic for: '{}'", intrinsic)),
        }
        if !owners.contains(&id) {
            owners.push(id);
        }
    }
    owners
}

/// The class declaring `main(String[])`, restricted to the configured main class if any.
fn find_main_class(classes: &ClassMap, config: &TranspilerConfig) -> Result<Option<ClassId>> {
    let wanted = config.main_class_internal();
    let mut found: Option<ClassId> = None;
    for (id, class) in classes.iter() {
        if wanted.as_ref().is_some_and(|wanted| *wanted != class.original_name) {
            continue;
        }
        if !class.methods.iter().any(|method| method.is_main()) {
            continue;
        }
        if let Some(previous) = found {
            return Err(Error::MultipleMainClasses(
                classes[previous].original_name.clone(),
                class.original_name.clone(),
            ));
        }
        found = Some(id);
    }
    Ok(found)
}

fn src_file(stem: &str, extension: &str) -> PathBuf {
    Path::new("src").join(format!("{}.{}", stem, extension))
}

/// Write `content` to `output/relative`, creating parent directories.
fn write_output(output: &Path, relative: &Path, content: &str, files: &mut Vec<PathBuf>) -> Result<()> {
    let path = output.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    files.push(relative.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::flags::AccessFlags,
        model::{Class, Method},
    };

    fn class_with(name: &str, methods: &[(&str, &str, AccessFlags)]) -> Class {
        let mut class = Class::new(name, None, &[], AccessFlags::PUBLIC);
        for (method, desc, access) in methods {
            class.methods.push(Method::new(*method, *desc, *access).unwrap());
        }
        class
    }

    fn main_class(name: &str) -> Class {
        class_with(
            name,
            &[("main", "([Ljava/lang/String;)V", AccessFlags::PUBLIC | AccessFlags::STATIC)],
        )
    }

    #[test]
    fn test_mark_intrinsics() {
        let mut classes = ClassMap::new();
        let id = classes.insert(class_with(
            "a/Fast",
            &[("sum", "(II)I", AccessFlags::PUBLIC | AccessFlags::STATIC)],
        ));
        let diagnostics = Diagnostics::new();
        let owners = mark_intrinsics(
            &mut classes,
            &[
                "a.Fast.sum(II)I".to_string(),
                "a/Fast.missing()V".to_string(),
                "a.Gone.run()V".to_string(),
                "nonsense".to_string(),
            ],
            &diagnostics,
        );

        assert_eq!(owners, vec![id]);
        assert!(classes[id].methods[0].intrinsic);
        let warnings = diagnostics.by_category(DiagnosticCategory::Intrinsic);
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0].message, "Failed to mark method as intrinsic for: 'a/Fast.missing()V'");
        assert_eq!(warnings[1].message, "Failed to find class for intrinsic: 'a.Gone.run()V'");
        assert_eq!(warnings[2].message, "Invalid intrinsic format: 'nonsense'");
    }

    #[test]
    fn test_find_main_class() {
        let mut classes = ClassMap::new();
        classes.insert(class_with("a/Lib", &[]));
        let first = classes.insert(main_class("a/First"));
        let second = classes.insert(main_class("a/Second"));

        let config = TranspilerConfig::default().with_main_class("a.Second");
        assert_eq!(find_main_class(&classes, &config).unwrap(), Some(second));

        let config = TranspilerConfig::default().with_main_class("a.Lib");
        assert_eq!(find_main_class(&classes, &config).unwrap(), None);

        match find_main_class(&classes, &TranspilerConfig::default()) {
            Err(Error::MultipleMainClasses(a, b)) => {
                assert_eq!(a, classes[first].original_name);
                assert_eq!(b, "a/Second");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_write_output_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        write_output(dir.path(), &src_file("a_B", "h"), "x", &mut files).unwrap();
        assert_eq!(files, vec![PathBuf::from("src/a_B.h")]);
        assert_eq!(fs::read_to_string(dir.path().join("src/a_B.h")).unwrap(), "x");
    }

    #[test]
    fn test_empty_run_writes_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranspilerConfig {
            warning_ignores: vec!["**".to_string()],
            ..TranspilerConfig::default()
        };
        let result = Transpiler::new(config)
            .run_source(&ClassSource::new(), &[], dir.path())
            .unwrap();

        assert_eq!(result.parsed_classes, 0);
        assert_eq!(result.required_classes, 0);
        assert_eq!(result.generated_files, vec![PathBuf::from("src/Config.h")]);
        assert!(!result.has_entry_point());
        assert_eq!(result.missing_dependencies.len(), NATIVE_DEPENDENCIES.len());
        assert_eq!(result.diagnostics.by_category(DiagnosticCategory::EntryPoint).len(), 1);
        assert_eq!(result.diagnostics.by_category(DiagnosticCategory::Dependency).len(), 0);
    }
}
