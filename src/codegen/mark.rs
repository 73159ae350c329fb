//! Garbage collector mark functions.
//!
//! Every generated class exports `mark_<Q>(object, mark, depth)`. Called with a null
//! object it visits the class's static references, otherwise the references held by the
//! instance. Superclass references are visited by chaining to the superclass's function.

use crate::{
    codegen::writer::CodeWriter,
    model::{naming::field_symbol, Class, OBJECT},
};

/// The references a generated class owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLayout {
    /// Qualified name of the class
    pub class: String,
    /// Qualified superclass name when its mark function must run first
    pub parent: Option<String>,
    /// Instance struct members holding references
    pub fields: Vec<String>,
    /// Static storage symbols holding references
    pub statics: Vec<String>,
}

impl TraceLayout {
    /// Collect the owned references of `class`.
    #[must_use]
    pub fn of(class: &Class) -> Self {
        let qualified = class.qualified_name();
        let mut fields = Vec::new();
        let mut statics = Vec::new();
        for field in &class.fields {
            if !field.ty.is_reference() {
                continue;
            }
            if field.is_static() {
                statics.push(field.symbol(&qualified));
            } else {
                fields.push(field.symbol(&qualified));
            }
        }

        // Element values of annotation instances
        if class.is_annotation_impl() {
            fields.extend(
                class
                    .methods
                    .iter()
                    .filter(|method| {
                        !method.is_static()
                            && !method.is_annotation_type()
                            && method.sig.ret.is_reference()
                    })
                    .map(|method| field_symbol(&method.name)),
            );
        }

        TraceLayout {
            class: qualified,
            parent: (class.super_name != OBJECT && !class.is_interface())
                .then(|| class.qualified_super_name()),
            fields,
            statics,
        }
    }

    /// Emit the definition of `mark_<Q>`.
    pub fn emit(&self, w: &mut CodeWriter) {
        w.open(format!(
            "void mark_{}(jobject object, jint mark, jint depth) {{",
            self.class
        ));

        w.open("if (!object) {");
        for symbol in &self.statics {
            w.open(format!("if ({symbol})"));
            w.line(visit(symbol));
            w.dedent();
        }
        w.line("return;");
        w.close("}");

        w.open("if (depth > GC_DEPTH_ALWAYS && (object->gcMark < GC_MARK_START || object->gcMark == mark))");
        w.line("return;");
        w.dedent();
        w.open("if (depth > MAX_GC_MARK_DEPTH) {");
        w.line("markDeepObject(object);");
        w.line("return;");
        w.close("}");

        if let Some(parent) = &self.parent {
            w.line(format!("mark_{parent}(object, mark, depth);"));
        }
        w.open("if (object->gcMark >= GC_MARK_START)");
        w.line("object->gcMark = mark;");
        w.dedent();

        if !self.fields.is_empty() {
            w.line(format!("auto self = ({} *) object;", self.class));
            for member in &self.fields {
                let value = format!("self->{member}");
                w.open(format!("if ({value})"));
                w.line(visit(&value));
                w.dedent();
            }
        }
        w.close("}");
    }
}

/// Call the mark function of the object referenced by `value`.
fn visit(value: &str) -> String {
    format!(
        "((gc_mark_ptr) ((jclass) ((jobject) {value})->clazz)->markFunction)((jobject) {value}, mark, depth + 1);"
    )
}
