use std::path::PathBuf;

use crate::{
    app::ConfigOptions,
    commands::common::{load_config, load_source},
};

pub fn run(inputs: &[PathBuf], options: &ConfigOptions) -> anyhow::Result<()> {
    let mut config = load_config(options)?;
    let source = load_source(inputs)?;
    for embedded in source.configs() {
        config.merge(embedded);
    }
    println!("{}", config.to_json()?);
    Ok(())
}
