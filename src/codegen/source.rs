//! Class implementation units.

use crate::{
    codegen::{
        annotations,
        body::{emit_annotation_accessor, emit_jni, emit_method},
        clinit,
        context::ClassContext,
        mark::TraceLayout,
        metadata,
        writer::CodeWriter,
    },
    dependencies::class_dependencies,
    model::{naming::qualified_name, OBJECT},
    Result,
};

/// Headers `initAnnotations` needs besides the class's own dependencies.
const REFLECTION_HEADERS: [&str; 4] = [
    "java/lang/reflect/Field",
    "java/lang/reflect/Method",
    "java/lang/reflect/Constructor",
    "java/lang/annotation/Annotation",
];

/// Generate the implementation unit of the class in `cx`.
///
/// # Errors
/// Returns [`crate::Error::Codegen`] if a method body cannot be translated.
pub fn generate(cx: &ClassContext<'_>) -> Result<String> {
    let class = cx.class;
    let qualified = &cx.qualified;
    let has_annotations = class.has_annotations();
    let mut w = CodeWriter::new();

    let mut includes = class_dependencies(class);
    includes.retain(|name| *name != class.name && (cx.classes.contains(name) || name == OBJECT));
    if has_annotations {
        includes.extend(REFLECTION_HEADERS.iter().map(|name| (*name).to_string()));
    }
    w.line(format!("#include \"{qualified}.h\""));
    for name in &includes {
        w.line(format!("#include \"{}.h\"", qualified_name(name)));
    }
    w.blank();

    w.line("extern \"C\" {");
    w.blank();
    w.line(format!("bool initialized_{qualified};"));
    w.blank();

    for field in class.fields.iter().filter(|field| field.is_static()) {
        let volatile = if field.is_volatile() { "volatile " } else { "" };
        w.line(format!(
            "{}{} {};",
            volatile,
            field.ty.cpp_type(),
            field.symbol(qualified)
        ));
    }
    w.blank();

    TraceLayout::of(class).emit(&mut w);
    w.blank();

    for method in &class.methods {
        if class.jni && method.is_native() {
            emit_jni(cx, method, &mut w);
        } else if method.has_generated_body() {
            emit_method(cx, method, &mut w)?;
        } else {
            continue;
        }
        w.blank();
    }

    if class.is_annotation_impl() {
        for method in class.methods.iter().filter(|method| !method.is_static()) {
            emit_annotation_accessor(cx, method, &mut w);
            w.blank();
        }
    }

    clinit::emit(cx, &mut w);
    w.blank();

    if has_annotations {
        annotations::emit(cx, &mut w);
        w.blank();
    }

    metadata::emit(cx, has_annotations, &mut w);
    w.blank();
    w.line("}");
    Ok(w.into_string())
}
