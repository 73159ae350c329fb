//! Annotation instances.
//!
//! `initAnnotations` runs when reflection first asks a class for annotation data. It builds
//! one instance of the generated annotation implementation per usage, in eternal memory,
//! and stores the arrays in the class record and its reflection objects.

use crate::{
    codegen::{
        context::ClassContext,
        instructions::multi_array_component,
        writer::{double_literal, float_literal, int_literal, long_literal, string_object, CodeWriter},
    },
    model::{
        annotation::{Annotation, AnnotationValue},
        naming::{field_symbol, qualified_name, static_field_symbol},
        types::JavaType,
    },
};

const ANNOTATION_CLASS: &str = "&class_java_lang_annotation_Annotation";

/// Writes annotation instances into one function body.
struct AnnotationWriter<'c, 'a> {
    cx: &'c ClassContext<'a>,
    temps: usize,
}

impl AnnotationWriter<'_, '_> {
    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.temps);
        self.temps += 1;
        name
    }

    fn is_known(&self, annotation: &Annotation) -> bool {
        self.cx.classes.contains(&annotation.type_name)
    }

    /// Emit the construction of `annotation`, returning the variable holding it.
    fn instance(&mut self, annotation: &Annotation, w: &mut CodeWriter) -> Option<String> {
        let cx = self.cx;
        let class = cx.classes.by_name(&annotation.type_name)?;
        let qualified = class.qualified_name();
        let name = self.temp("annotation");
        w.line(format!(
            "auto {name} = ({qualified} *) gcAllocEternal(ctx, &class_{qualified});"
        ));
        for (element, value) in &annotation.values {
            let Some(ty) = class
                .methods
                .iter()
                .find(|method| method.name == *element && method.sig.params.is_empty())
                .map(|method| method.sig.ret.clone())
            else {
                continue;
            };
            let expression = self.value(value, &ty, w);
            let stored = if ty.is_reference() {
                format!("(jref) {expression}")
            } else {
                expression
            };
            w.line(format!("{}->{} = {};", name, field_symbol(element), stored));
        }
        Some(name)
    }

    /// Emit the statements `value` needs, returning an expression of the C++ type of `ty`.
    fn value(&mut self, value: &AnnotationValue, ty: &JavaType, w: &mut CodeWriter) -> String {
        match value {
            AnnotationValue::Byte(value) => int_literal(i32::from(*value)),
            AnnotationValue::Char(value) => int_literal(i32::from(*value)),
            AnnotationValue::Short(value) => int_literal(i32::from(*value)),
            AnnotationValue::Int(value) => int_literal(*value),
            AnnotationValue::Boolean(value) => int_literal(i32::from(*value)),
            AnnotationValue::Long(value) => long_literal(*value),
            AnnotationValue::Float(value) => float_literal(*value),
            AnnotationValue::Double(value) => double_literal(*value),
            AnnotationValue::String(value) => format!("(jobject) {}", string_object(value)),
            AnnotationValue::Class(desc) => JavaType::from_descriptor(desc)
                .map_or_else(|| "nullptr".to_string(), |ty| format!("(jobject) {}", ty.class_fetch())),
            AnnotationValue::Enum { type_desc, name } => {
                let Some(owner) = JavaType::from_descriptor(type_desc)
                    .and_then(|ty| ty.class_name().map(str::to_string))
                else {
                    return "nullptr".to_string();
                };
                let qualified = qualified_name(&owner);
                w.line(format!("CLINIT({qualified});"));
                format!("(jobject) {}", static_field_symbol(&qualified, name))
            }
            AnnotationValue::Annotation(nested) => self
                .instance(nested, w)
                .map_or_else(|| "nullptr".to_string(), |name| format!("(jobject) {name}")),
            AnnotationValue::Array(values) => {
                let element = multi_array_component(ty, 1);
                let array = self.temp("array");
                w.line(format!(
                    "auto {} = createArrayEternal(ctx, {}, {});",
                    array,
                    element.class_fetch(),
                    values.len()
                ));
                if !values.is_empty() {
                    let data = self.temp("data");
                    w.line(format!(
                        "auto {} = ({} *) {}->data;",
                        data,
                        element.cpp_type(),
                        array
                    ));
                    for (index, value) in values.iter().enumerate() {
                        let expression = self.value(value, &element, w);
                        w.line(format!("{data}[{index}] = {expression};"));
                    }
                }
                format!("(jobject) {array}")
            }
        }
    }

    /// Emit an annotation array for `annotations` and store it with `target`.
    fn array(&mut self, label: &str, annotations: &[Annotation], target: &str, w: &mut CodeWriter) {
        let known = annotations
            .iter()
            .filter(|annotation| self.is_known(annotation))
            .collect::<Vec<_>>();
        if known.is_empty() {
            w.line(format!(
                "{target} = (jref) createArrayEternal(ctx, {ANNOTATION_CLASS}, 0);"
            ));
            return;
        }
        w.open(format!("{{ // {label}"));
        w.line(format!(
            "auto annotationArray = createArrayEternal(ctx, {}, {});",
            ANNOTATION_CLASS,
            known.len()
        ));
        w.line(format!("{target} = (jref) annotationArray;"));
        w.line("auto annotations = (jobject *) annotationArray->data;");
        for (index, annotation) in known.into_iter().enumerate() {
            if let Some(name) = self.instance(annotation, w) {
                w.line(format!("annotations[{index}] = (jobject) {name};"));
            }
        }
        w.close("}");
    }
}

/// Emit `initAnnotations` for the class in `cx`.
pub fn emit(cx: &ClassContext<'_>, w: &mut CodeWriter) {
    let class = cx.class;
    let mut writer = AnnotationWriter { cx, temps: 0 };

    w.open("static void initAnnotations(jcontext ctx) {");
    w.line(format!("auto &clazz = class_{};", cx.qualified));
    w.line("auto fields = (java_lang_reflect_Field **) ((jarray) clazz.fields)->data;");
    w.line("auto methods = (java_lang_reflect_Method **) ((jarray) clazz.methods)->data;");
    w.line("auto constructors = (java_lang_reflect_Constructor **) ((jarray) clazz.constructors)->data;");

    if !class.annotations.is_empty() {
        w.blank();
        writer.array("Class", &class.annotations, "clazz.annotations", w);
    }

    for (index, field) in class.fields.iter().enumerate() {
        w.blank();
        writer.array(
            &format!("Field {}", field.name),
            &field.annotations,
            &format!("fields[{index}]->F_annotations"),
            w,
        );
    }

    let mut method_index = 0;
    let mut constructor_index = 0;
    for method in &class.methods {
        let target = if method.is_constructor() {
            constructor_index += 1;
            format!(
                "((java_lang_reflect_Method *) constructors[{}]->F_method)->F_annotations",
                constructor_index - 1
            )
        } else {
            method_index += 1;
            format!("methods[{}]->F_annotations", method_index - 1)
        };
        w.blank();
        writer.array(&format!("Method {}", method.name), &method.annotations, &target, w);
    }
    w.close("}");
}
