use std::path::{Path, PathBuf};

use anyhow::Context;
use clearwing::{file::ClassSource, TranspilerConfig};

use crate::app::ConfigOptions;

/// Enumerate every class input below `paths`.
pub fn load_source(paths: &[PathBuf]) -> anyhow::Result<ClassSource> {
    let mut source = ClassSource::new();
    for path in paths {
        source
            .add_path(path)
            .with_context(|| format!("failed to read input: {}", path.display()))?;
    }
    Ok(source)
}

/// The configuration file, if any, with command line overrides applied.
pub fn load_config(options: &ConfigOptions) -> anyhow::Result<TranspilerConfig> {
    let mut config = match &options.config {
        Some(path) => TranspilerConfig::from_file(path)
            .with_context(|| format!("failed to load configuration: {}", path.display()))?,
        None => TranspilerConfig::default(),
    };
    if let Some(main) = &options.main {
        config.main_class = Some(main.clone());
    }
    if options.optimize {
        config.use_optimizations = true;
    }
    Ok(config)
}

/// Borrow a list of owned paths as the path slices the library takes.
pub fn as_paths(paths: &[PathBuf]) -> Vec<&Path> {
    paths.iter().map(PathBuf::as_path).collect()
}
