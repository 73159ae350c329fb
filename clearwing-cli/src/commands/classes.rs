use std::path::PathBuf;

use anyhow::Context;
use clearwing::{dependencies::glob::GlobSet, loader::ClassLoader, model::Class};
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_source,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct ClassEntry {
    kind: &'static str,
    name: String,
    super_name: String,
    fields: usize,
    methods: usize,
    synthetic: bool,
}

#[derive(Debug, Serialize)]
struct ClassesOutput {
    classes: Vec<ClassEntry>,
    count: usize,
}

fn kind(class: &Class) -> &'static str {
    if class.is_annotation() {
        "annotation"
    } else if class.is_interface() {
        "interface"
    } else if class.is_enum() {
        "enum"
    } else if class.is_abstract() {
        "abstract"
    } else {
        "class"
    }
}

pub fn run(inputs: &[PathBuf], filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let source = load_source(inputs)?;
    let filter = filter
        .map(|pattern| GlobSet::new(&[pattern]))
        .transpose()
        .context("invalid filter pattern")?;

    let mut loader = ClassLoader::new(false);
    let mut entries = Vec::new();
    for input in source.inputs() {
        let classes = loader
            .load(input.file.data())
            .with_context(|| format!("failed to parse {}", input.origin))?;
        for class in classes {
            if filter.as_ref().is_some_and(|filter| !filter.matches(&class.original_name)) {
                continue;
            }
            entries.push(ClassEntry {
                kind: kind(&class),
                name: class.original_name.clone(),
                super_name: class.super_name.clone(),
                fields: class.fields.len(),
                methods: class.methods.len(),
                synthetic: class.is_synthetic(),
            });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let count = entries.len();
    let output = ClassesOutput {
        classes: entries,
        count,
    };

    print_output(&output, opts, |out| {
        let mut tw = TabWriter::new(&[
            ("Kind", Align::Left),
            ("Name", Align::Left),
            ("Super", Align::Left),
            ("Fields", Align::Right),
            ("Methods", Align::Right),
        ]);
        for entry in &out.classes {
            let name = if entry.synthetic {
                format!("{} (synthetic)", entry.name)
            } else {
                entry.name.clone()
            };
            tw.row(vec![
                entry.kind.to_string(),
                name,
                entry.super_name.clone(),
                entry.fields.to_string(),
                entry.methods.to_string(),
            ]);
        }
        tw.print();
        println!("\n{} class(es) listed.", out.count);
    })
}
