//! Class descriptors.
//!
//! Every generated class ends with the static tables the runtime reads for dispatch and
//! reflection, and a `Class` record that registers itself when the object file loads.

use crate::{
    codegen::{
        context::ClassContext,
        writer::{string_literal, CodeWriter},
    },
    model::{
        naming::{method_suffix, method_symbol, qualified_name},
        types::MethodSignature,
        Method, VtableSlot, OBJECT,
    },
};

fn pointer_or_null(present: bool, name: &str) -> String {
    if present {
        name.to_string()
    } else {
        "nullptr".to_string()
    }
}

/// The function filling a vtable slot, `None` when the slot has no implementation.
fn slot_function(cx: &ClassContext<'_>, slot: &VtableSlot) -> Option<String> {
    let sig = MethodSignature::parse(&slot.desc).ok()?;
    let owner = qualified_name(&slot.owner);
    if slot.owner == OBJECT {
        return Some(method_symbol(&owner, &slot.name, &sig, false));
    }
    let class = cx.classes.by_name(&slot.owner)?;
    let method = class.find_method(&slot.name, &slot.desc)?;
    if method.is_abstract() && !class.is_annotation_impl() {
        return None;
    }
    if method.body.is_none() && !method.is_native() && !method.intrinsic && !class.is_annotation_impl() {
        return None;
    }
    Some(method_symbol(&owner, &slot.name, &sig, false))
}

/// Address stored in the method table, `0` for methods without a function.
fn method_address(cx: &ClassContext<'_>, method: &Method) -> String {
    let has_function = if method.is_abstract() {
        cx.class.is_annotation_impl()
    } else {
        !method.is_static_initializer() || method.body.is_some()
    };
    if has_function {
        format!("(intptr_t) {}", method.symbol(&cx.qualified))
    } else {
        "0".to_string()
    }
}

/// Dispatch offset stored in the method table.
fn method_offset(cx: &ClassContext<'_>, method: &Method) -> String {
    if method.is_static() || method.is_constructor() || method.is_static_initializer() {
        return "0".to_string();
    }
    let symbol = method_symbol(&cx.qualified, &method.name, &method.sig, false);
    let prefix = if cx.class.is_interface() && !cx.class.is_annotation_impl() {
        "INDEX_"
    } else {
        "VTABLE_"
    };
    format!("{}{}", prefix, method_suffix(&symbol))
}

/// Emit the vtable, reflection tables, class record and registration.
pub fn emit(cx: &ClassContext<'_>, has_annotations: bool, w: &mut CodeWriter) {
    let class = cx.class;
    let qualified = &cx.qualified;
    let has_vtable = class.has_vtable() && !class.vtable.is_empty();

    if has_vtable {
        w.open(format!("void *vtable_{qualified}[] {{"));
        for slot in &class.vtable {
            let function = slot_function(cx, slot).unwrap_or_else(|| "nullptr".to_string());
            w.line(format!("(void *) {function},"));
        }
        w.close("};");
        w.blank();

        w.open("static VtableEntry vtableEntries[] {");
        for slot in &class.vtable {
            w.line(format!(
                "{{ {}, {} }},",
                string_literal(&slot.name),
                string_literal(&slot.desc)
            ));
        }
        w.close("};");
        w.blank();
    }

    if !class.interfaces.is_empty() {
        let interfaces = class
            .interfaces
            .iter()
            .map(|name| format!("&class_{}, ", qualified_name(name)))
            .collect::<String>();
        w.line(format!("static jclass interfaces[] {{ {interfaces}}};"));
        w.blank();
    }

    if !class.inner_classes.is_empty() {
        w.open("static jclass innerClasses[] {");
        for inner in &class.inner_classes {
            w.line(format!("&class_{},", qualified_name(inner)));
        }
        w.close("};");
        w.blank();
    }

    if !class.fields.is_empty() {
        w.open("static FieldMetadata fields[] {");
        for field in &class.fields {
            let location = if field.is_static() {
                format!("(intptr_t) &{}", field.symbol(qualified))
            } else {
                format!("offsetof({}, {})", qualified, field.symbol(qualified))
            };
            w.line(format!(
                "{{ {}, {}, {}, {}, {} }},",
                string_literal(&field.name),
                field.ty.class_fetch(),
                location,
                string_literal(field.signature.as_deref().unwrap_or("")),
                field.access.bits()
            ));
        }
        w.close("};");
        w.blank();
    }

    if !class.methods.is_empty() {
        w.open("static MethodMetadata methods[] {");
        for method in &class.methods {
            w.line(format!(
                "{{ {}, {}, {}, {}, {} }},",
                string_literal(&method.name),
                method_address(cx, method),
                method_offset(cx, method),
                string_literal(&method.descriptor),
                method.access.bits()
            ));
        }
        w.close("};");
        w.blank();
    }

    let outer = class
        .outer_class
        .as_deref()
        .map_or_else(|| "nullptr".to_string(), |outer| format!("&class_{}", qualified_name(outer)));
    let fields = [
        format!(".nativeName = (intptr_t) {}", string_literal(&class.name)),
        format!(".parentClass = (intptr_t) &class_{}", class.qualified_super_name()),
        format!(".size = sizeof({qualified})"),
        format!(
            ".classVtable = (intptr_t) {}",
            pointer_or_null(has_vtable, &format!("vtable_{qualified}"))
        ),
        format!(".staticInitializer = (intptr_t) clinit_{qualified}"),
        format!(
            ".annotationInitializer = (intptr_t) {}",
            pointer_or_null(has_annotations, "initAnnotations")
        ),
        format!(".markFunction = (intptr_t) mark_{qualified}"),
        ".primitive = false".to_string(),
        ".arrayDimensions = 0".to_string(),
        ".componentClass = (intptr_t) nullptr".to_string(),
        format!(".outerClass = (intptr_t) {outer}"),
        format!(".innerClassCount = {}", class.inner_classes.len()),
        format!(
            ".nativeInnerClasses = (intptr_t) {}",
            pointer_or_null(!class.inner_classes.is_empty(), "innerClasses")
        ),
        format!(".access = {}", class.access.bits()),
        format!(".interfaceCount = {}", class.interfaces.len()),
        format!(
            ".nativeInterfaces = (intptr_t) {}",
            pointer_or_null(!class.interfaces.is_empty(), "interfaces")
        ),
        format!(".fieldCount = {}", class.fields.len()),
        format!(
            ".nativeFields = (intptr_t) {}",
            pointer_or_null(!class.fields.is_empty(), "fields")
        ),
        format!(".methodCount = {}", class.methods.len()),
        format!(
            ".nativeMethods = (intptr_t) {}",
            pointer_or_null(!class.methods.is_empty(), "methods")
        ),
        format!(
            ".vtableSize = {}",
            if has_vtable { class.vtable.len() } else { 0 }
        ),
        format!(
            ".vtableEntries = (intptr_t) {}",
            pointer_or_null(has_vtable, "vtableEntries")
        ),
        format!(".anonymous = {}", class.anonymous),
        format!(".synthetic = {}", class.is_synthetic()),
    ];
    w.open(format!("Class class_{qualified}{{"));
    for field in fields {
        w.line(format!("{field},"));
    }
    w.close("};");
    w.line(format!(
        "static bool registered_{qualified} = registerClass(&class_{qualified});"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::flags::AccessFlags,
        config::TranspilerConfig,
        hierarchy::vtable::object_vtable,
        model::{Class, ClassMap, Field, MethodBody},
    };

    fn render(classes: &ClassMap, name: &str, has_annotations: bool) -> String {
        let config = TranspilerConfig::default();
        let class = classes.by_name(name).unwrap();
        let cx = ClassContext::new(classes, class, &config);
        let mut w = CodeWriter::new();
        emit(&cx, has_annotations, &mut w);
        w.into_string()
    }

    #[test]
    fn test_class_tables() {
        let mut class = Class::new(
            "a/Shape",
            None,
            &["a/Drawable".to_string()],
            AccessFlags::PUBLIC | AccessFlags::ABSTRACT,
        );
        class.fields.push(Field::new("id", "I", AccessFlags::PRIVATE).unwrap());
        class
            .fields
            .push(Field::new("COUNT", "Ljava/lang/String;", AccessFlags::STATIC).unwrap());
        let mut area = Method::new("area", "()D", AccessFlags::PUBLIC | AccessFlags::ABSTRACT).unwrap();
        area.body = None;
        let mut init = Method::new("<init>", "()V", AccessFlags::PUBLIC).unwrap();
        init.body = Some(MethodBody::default());
        class.vtable = object_vtable();
        class.vtable.push(VtableSlot::of("a/Shape", &area));
        class.methods.push(area);
        class.methods.push(init);
        class.add_inner_class("a/Shape$Kind");

        let mut classes = ClassMap::new();
        classes.insert(class);
        let text = render(&classes, "a/Shape", false);

        assert!(text.starts_with("void *vtable_a_Shape[] {\n\t(void *) M_java_lang_Object_hashCode_R_int,\n"));
        assert!(text.contains("\t(void *) nullptr,\n};\n"));
        assert!(text.contains("\t{ \"area\", \"()D\" },\n"));
        assert!(text.contains("static jclass interfaces[] { &class_a_Drawable, };\n"));
        assert!(text.contains("static jclass innerClasses[] {\n\t&class_a_Shape_Kind,\n};\n"));
        assert!(text.contains("\t{ \"id\", &class_int, offsetof(a_Shape, F_id), \"\", 2 },\n"));
        assert!(text.contains(
            "\t{ \"COUNT\", &class_java_lang_String, (intptr_t) &SF_a_Shape_COUNT, \"\", 8 },\n"
        ));
        assert!(text.contains("\t{ \"area\", 0, VTABLE_a_Shape_area_R_double, \"()D\", 1025 },\n"));
        assert!(text.contains("\t{ \"<init>\", (intptr_t) M_a_Shape_init, 0, \"()V\", 1 },\n"));
        assert!(text.contains("\t.parentClass = (intptr_t) &class_java_lang_Object,\n"));
        assert!(text.contains("\t.annotationInitializer = (intptr_t) nullptr,\n"));
        assert!(text.contains("\t.vtableSize = 12,\n"));
        assert!(text.ends_with("};\nstatic bool registered_a_Shape = registerClass(&class_a_Shape);\n"));
    }

    #[test]
    fn test_interface_record() {
        let mut class = Class::new(
            "a/Drawable",
            None,
            &[],
            AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
        );
        class
            .methods
            .push(Method::new("draw", "()V", AccessFlags::PUBLIC | AccessFlags::ABSTRACT).unwrap());
        let mut classes = ClassMap::new();
        classes.insert(class);
        let text = render(&classes, "a/Drawable", true);

        assert!(!text.contains("vtable_a_Drawable[]"));
        assert!(text.contains("\t{ \"draw\", 0, INDEX_a_Drawable_draw, \"()V\", 1025 },\n"));
        assert!(text.contains("\t.classVtable = (intptr_t) nullptr,\n"));
        assert!(text.contains("\t.annotationInitializer = (intptr_t) initAnnotations,\n"));
        assert!(text.contains("\t.nativeInterfaces = (intptr_t) nullptr,\n"));
    }

    #[test]
    fn test_inherited_slot_uses_owner_symbol() {
        let mut base = Class::new("a/Base", None, &[], AccessFlags::PUBLIC);
        let mut run = Method::new("run", "()V", AccessFlags::PUBLIC).unwrap();
        run.body = Some(MethodBody::default());
        base.vtable = object_vtable();
        base.vtable.push(VtableSlot::of("a/Base", &run));
        base.methods.push(run);

        let mut derived = Class::new("a/Derived", Some("a/Base"), &[], AccessFlags::PUBLIC);
        derived.vtable = base.vtable.clone();

        let mut classes = ClassMap::new();
        classes.insert(base);
        classes.insert(derived);
        let text = render(&classes, "a/Derived", false);
        assert!(text.contains("\t(void *) M_a_Base_run,\n"));
        assert!(text.contains("\t.parentClass = (intptr_t) &class_a_Base,\n"));
    }
}
