//! Class headers.
//!
//! The header of a class declares its instance struct, its static storage, the dispatch
//! constants callers use for virtual and interface calls, and every generated function.

use rustc_hash::FxHashSet;

use crate::{
    codegen::{body::declaration, context::ClassContext, writer::CodeWriter},
    model::{
        naming::{field_symbol, method_suffix, method_symbol, qualified_name},
        types::{JavaType, MethodSignature},
        Class, OBJECT,
    },
    Result,
};

/// `typedef ret (*func_<suffix>)(jcontext ctx, jobject self[, params]);`
fn function_pointer(suffix: &str, sig: &MethodSignature) -> String {
    let params = sig.cpp_params("param");
    let separator = if params.is_empty() { "" } else { ", " };
    format!(
        "typedef {} (*func_{})(jcontext ctx, jobject self{}{});",
        sig.ret.cpp_type(),
        suffix,
        separator,
        params
    )
}

/// Instance struct members of an annotation implementation, one per element.
pub(crate) fn annotation_members(class: &Class) -> impl Iterator<Item = (String, &JavaType)> {
    class
        .methods
        .iter()
        .filter(move |method| class.is_annotation_impl() && !method.is_static() && !method.is_annotation_type())
        .map(|method| (field_symbol(&method.name), &method.sig.ret))
}

/// Whether the class declares a function for `method` in its header.
pub(crate) fn has_declaration(class: &Class, method: &crate::model::Method) -> bool {
    !method.is_static_initializer() && (!method.is_abstract() || class.is_annotation_impl())
}

/// Generate the header of the class in `cx`.
///
/// # Errors
/// Returns [`crate::Error::Codegen`] if a vtable slot carries an invalid descriptor.
pub fn generate(cx: &ClassContext<'_>) -> Result<String> {
    let class = cx.class;
    let qualified = &cx.qualified;
    let mut w = CodeWriter::new();

    w.line(format!("#ifndef HEADER_{qualified}"));
    w.line(format!("#define HEADER_{qualified}"));
    w.blank();
    w.line("#include \"Clearwing.h\"");
    if !class.is_interface() && class.super_name != OBJECT {
        w.line(format!("#include \"{}.h\"", class.qualified_super_name()));
    }
    for interface in &class.interfaces {
        w.line(format!("#include \"{}.h\"", qualified_name(interface)));
    }
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");
    w.blank();

    let parent = if class.is_interface() {
        qualified_name(OBJECT)
    } else {
        class.qualified_super_name()
    };
    w.open(format!("typedef struct {qualified} {{"));
    w.line(format!("{parent} parent;"));
    for field in class.fields.iter().filter(|field| !field.is_static()) {
        let volatile = if field.is_volatile() { "volatile " } else { "" };
        w.line(format!(
            "{}{} {};",
            volatile,
            field.ty.member_type(),
            field.symbol(qualified)
        ));
    }
    for (member, ty) in annotation_members(class) {
        w.line(format!("{} {};", ty.member_type(), member));
    }
    w.close(format!("}} {qualified};"));
    w.blank();

    w.line(format!("extern Class class_{qualified};"));
    w.line(format!("extern bool initialized_{qualified};"));
    for field in class.fields.iter().filter(|field| field.is_static()) {
        let volatile = if field.is_volatile() { "volatile " } else { "" };
        w.line(format!(
            "extern {}{} {};",
            volatile,
            field.ty.cpp_type(),
            field.symbol(qualified)
        ));
    }
    w.blank();

    let mut typedefs = FxHashSet::default();
    if class.is_interface() {
        for (index, method) in class.methods.iter().enumerate() {
            if method.is_static() {
                continue;
            }
            let symbol = method_symbol(qualified, &method.name, &method.sig, false);
            let suffix = method_suffix(&symbol);
            w.line(format!("#define INDEX_{suffix} {index}"));
            if typedefs.insert(suffix.to_string()) {
                w.line(function_pointer(suffix, &method.sig));
            }
        }
        w.blank();
    }
    if class.has_vtable() {
        for (index, slot) in class.vtable.iter().enumerate() {
            let sig = MethodSignature::parse(&slot.desc)
                .map_err(|_| cx.error(format!("Invalid vtable descriptor {}", slot.desc)))?;
            let symbol = method_symbol(qualified, &slot.name, &sig, false);
            let suffix = method_suffix(&symbol);
            w.line(format!("#define VTABLE_{suffix} {index}"));
            if typedefs.insert(suffix.to_string()) {
                w.line(function_pointer(suffix, &sig));
            }
        }
        w.blank();
    }

    w.line(format!(
        "void mark_{qualified}(jobject object, jint mark, jint depth);"
    ));
    w.line(format!("void clinit_{qualified}(jcontext ctx);"));
    for method in &class.methods {
        if has_declaration(class, method) {
            w.line(format!("{};", declaration(method, qualified)));
        }
    }
    w.blank();

    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank();
    w.line("#endif");
    Ok(w.into_string())
}
