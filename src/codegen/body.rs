//! Method definitions.
//!
//! A generated method owns a `frame` array holding its locals followed by its operand
//! stack, registers a `FrameInfo` with the runtime for stack traces and exception
//! dispatch, and then runs its instructions. Exception handlers are reached through the
//! `METHOD_EXCEPTION_HANDLING_START` switch, keyed by the position of the region in the
//! exception table plus one.

use crate::{
    codegen::{
        context::ClassContext,
        instructions, optimized,
        writer::{string_literal, CodeWriter},
    },
    ir::Instruction,
    model::{
        naming::{field_symbol, jni_symbol, qualified_name},
        Method,
    },
    Result,
};

/// `ret symbol(jcontext ctx[, jobject self][, params])`
#[must_use]
pub fn declaration(method: &Method, qualified: &str) -> String {
    let mut params = vec!["jcontext ctx".to_string()];
    if !method.is_static() {
        params.push("jobject self".to_string());
    }
    let declared = method.sig.cpp_params("param");
    if !declared.is_empty() {
        params.push(declared);
    }
    format!(
        "{} {}({})",
        method.sig.ret.cpp_type(),
        method.symbol(qualified),
        params.join(", ")
    )
}

/// Emit the definition of a method with a lowered body.
///
/// # Errors
/// Propagates instruction emission failures.
pub fn emit_method(cx: &ClassContext<'_>, method: &Method, w: &mut CodeWriter) -> Result<()> {
    let Some(body) = &method.body else {
        return Ok(());
    };
    let qualified = &cx.qualified;
    let prefix = if method.is_static_initializer() { "static " } else { "" };
    w.open(format!("{}{} {{", prefix, declaration(method, qualified)));

    if !method.is_static() {
        w.line("NULL_CHECK(self);");
    }
    let size = body.frame_size();
    if size > 0 {
        w.line(format!("jtype frame[{size}];"));
        w.line(format!("auto stack = &frame[{}];", body.max_locals));
        w.line("jtype *sp = stack;");
    }

    if !body.locations.is_empty() {
        let locations = body
            .locations
            .iter()
            .map(|line| format!("{{ {line} }}"))
            .collect::<Vec<_>>();
        w.line(format!(
            "static constexpr FrameLocation frameLocations[] {{ {} }};",
            locations.join(", ")
        ));
    }
    if !body.frames.is_empty() {
        w.open("static constexpr ExceptionScope exceptionScopes[] {");
        for frame in &body.frames {
            let start = frame.start_location.unwrap_or(0);
            let end = frame
                .end_location
                .map_or(start, |end| end.saturating_sub(1).max(start));
            let clazz = frame
                .catch_type
                .as_deref()
                .map_or_else(|| "nullptr".to_string(), |name| format!("&class_{}", qualified_name(name)));
            w.line(format!("{{ {start}, {end}, {clazz} }},"));
        }
        w.close("};");
    }
    w.line(format!(
        "FrameInfo frameInfo {{ {}, {}, {}, {}, {}, {} }};",
        string_literal(&method.display_name(&cx.class.name)),
        size,
        body.locations.len(),
        if body.locations.is_empty() { "nullptr" } else { "frameLocations" },
        body.frames.len(),
        if body.frames.is_empty() { "nullptr" } else { "exceptionScopes" },
    ));
    w.line(format!(
        "FrameGuard frameRef{{ ctx, &frameInfo, {} }};",
        if size > 0 { "frame" } else { "nullptr" }
    ));
    if method.is_synchronized() {
        let monitor = if method.is_static() {
            format!("(jobject) &class_{qualified}")
        } else {
            "self".to_string()
        };
        w.line(format!("MonitorGuard monitorGuard{{ ctx, {monitor} }};"));
    }
    if (method.is_static() && !method.is_static_initializer()) || method.is_constructor() {
        w.line(format!("CLINIT({qualified});"));
    }
    w.blank();

    if !body.frames.is_empty() {
        w.open("METHOD_EXCEPTION_HANDLING_START(");
        for frame in &body.frames {
            w.line(format!("case {}: goto label_{};", frame.index + 1, frame.handler));
        }
        w.close(");");
    }

    if body.max_locals > 0 {
        let mut local = 0;
        if !method.is_static() {
            w.line("frame[0].o = self;");
            local = 1;
        }
        for (index, param) in method.sig.params.iter().enumerate() {
            w.line(format!(
                "frame[{}].{} = param{};",
                local,
                instructions::stack_type(param).slot(),
                index
            ));
            local += param.slots();
        }
    }

    for node in &body.nodes {
        match &node.insn {
            Instruction::Group(members) => optimized::emit_group(cx, method, body, members, w)?,
            _ => instructions::emit(cx, method, body, node, w)?,
        }
    }

    if !body.frames.is_empty() {
        w.line("METHOD_EXCEPTION_HANDLING_END();");
    }
    w.close("}");
    Ok(())
}

/// Emit a native method forwarding to its JNI symbol.
pub fn emit_jni(cx: &ClassContext<'_>, method: &Method, w: &mut CodeWriter) {
    let qualified = &cx.qualified;
    let ret = method.sig.ret.cpp_type();
    let symbol = jni_symbol(qualified, &method.name);

    let mut types = vec!["void *", "void *"];
    types.extend(method.sig.params.iter().map(|param| param.cpp_type()));
    w.line(format!("extern \"C\" {} {}({});", ret, symbol, types.join(", ")));

    let mut args = vec![
        "ctx".to_string(),
        string_literal(&method.display_name(&cx.class.name)),
        format!("(void *) &{symbol}"),
        if method.is_static() {
            format!("(jobject) &class_{qualified}")
        } else {
            "self".to_string()
        },
    ];
    args.extend((0..method.sig.params.len()).map(|index| format!("param{index}")));

    w.open(format!("{} {{", declaration(method, qualified)));
    let call = format!("invokeJni<{}>({})", ret, args.join(", "));
    if method.sig.ret.is_void() {
        w.line(format!("{call};"));
    } else {
        w.line(format!("return {call};"));
    }
    w.close("}");
}

/// Emit the element accessor of an annotation implementation.
pub fn emit_annotation_accessor(cx: &ClassContext<'_>, method: &Method, w: &mut CodeWriter) {
    let qualified = &cx.qualified;
    w.open(format!("{} {{", declaration(method, qualified)));
    if method.is_annotation_type() {
        w.line(format!("return (jobject) &class_{qualified};"));
    } else {
        w.line(format!(
            "return ({}) (({} *) self)->{};",
            method.sig.ret.cpp_type(),
            qualified,
            field_symbol(&method.name)
        ));
    }
    w.close("}");
}
