//! Program-wide translation units: the entry point and the runtime configuration header.

use crate::{codegen::writer::CodeWriter, config::TranspilerConfig, model::naming::qualified_name};

/// `main.cpp`, starting the VM on `main(String[])` of `main_class`.
#[must_use]
pub fn main_source(main_class: &str) -> String {
    let qualified = qualified_name(main_class);
    let mut w = CodeWriter::new();
    w.line(format!("#include \"{qualified}.h\""));
    w.line("#include \"Clearwing.h\"");
    w.blank();
    w.open("int main() {");
    w.line(format!("runVM(SM_{qualified}_main_Array1_java_lang_String);"));
    w.close("}");
    w.into_string()
}

/// `Config.h`, the runtime feature switches. Each can be overridden by the build.
#[must_use]
pub fn config_header(config: &TranspilerConfig) -> String {
    let mut w = CodeWriter::new();
    w.line("#pragma once");
    w.blank();
    for (name, enabled) in [
        ("USE_LINE_NUMBERS", config.has_line_numbers),
        ("USE_VALUE_CHECKS", config.has_value_checks),
        ("USE_PLATFORM_OVERRIDE", config.has_platform_override),
    ] {
        w.line(format!("#ifndef {name}"));
        w.line(format!("#define {name} {enabled}"));
        w.line("#endif");
        w.blank();
    }
    w.into_string()
}
