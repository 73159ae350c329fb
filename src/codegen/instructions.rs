//! Instruction emission on the explicit operand stack.
//!
//! Every instruction reads its inputs from and pushes its outputs to the `sp` stack
//! pointer of the method frame, mostly through the `INST_*` macros of the runtime.

use crate::{
    classfile::constant_pool::handle_kind,
    codegen::{
        context::{adapt, boxed, ClassContext},
        writer::{
            double_literal, float_literal, int_literal, long_literal, string_literal,
            string_object, CodeWriter,
        },
    },
    ir::{ConstValue, FieldKind, FieldRef, Instruction, InvokeKind, JumpKind, LambdaTarget, MethodRef, Node},
    model::{
        naming::{field_symbol, method_symbol, qualified_name},
        types::{BasicType, JavaType, MethodSignature},
        Method, MethodBody,
    },
    Result,
};

/// Opcode prefix letter of a stack type (`I`, `L`, `F`, `D`, `A`).
#[must_use]
pub fn type_prefix(ty: BasicType) -> char {
    match ty {
        BasicType::Int => 'I',
        BasicType::Long => 'L',
        BasicType::Float => 'F',
        BasicType::Double => 'D',
        BasicType::Object => 'A',
    }
}

/// Stack type of a field or parameter type.
#[must_use]
pub fn stack_type(ty: &JavaType) -> BasicType {
    ty.basic().unwrap_or(BasicType::Object)
}

/// `goto label_<target>;`
#[must_use]
pub fn goto(target: u32) -> String {
    format!("goto label_{target};")
}

/// The branch statement of a conditional jump over already evaluated operands.
#[must_use]
pub fn branch(kind: JumpKind, target: u32, operands: &[String]) -> String {
    let first = operands.first().map_or("", String::as_str);
    let second = operands.get(1).map_or("", String::as_str);
    match kind {
        JumpKind::Goto => goto(target),
        JumpKind::If(condition) => {
            format!("if ({} {} 0) {}", first, condition.operator(), goto(target))
        }
        JumpKind::IfICmp(condition) | JumpKind::IfACmp(condition) => {
            format!("if ({} {} {}) {}", first, condition.operator(), second, goto(target))
        }
        JumpKind::IfNull => format!("if (!{}) {}", first, goto(target)),
        JumpKind::IfNonNull => format!("if ({}) {}", first, goto(target)),
    }
}

/// Lines of a `switch` dispatching `value` to labels.
#[must_use]
pub fn switch(value: &str, keys: &[i32], targets: &[u32], default: u32) -> Vec<String> {
    let mut lines = Vec::with_capacity(keys.len() + 3);
    lines.push(format!("switch ({value}) {{"));
    for (key, target) in keys.iter().zip(targets) {
        lines.push(format!("\tcase {}: {}", int_literal(*key), goto(*target)));
    }
    lines.push(format!("\tdefault: {}", goto(default)));
    lines.push("}".to_string());
    lines
}

/// Array class expression for `multianewarray` of `ty` popping `dims` lengths.
///
/// The runtime expects the component type left after the allocated dimensions.
#[must_use]
pub fn multi_array_component(ty: &JavaType, dims: u8) -> JavaType {
    match ty {
        JavaType::Array {
            dims: total,
            component,
        } if *total > dims => JavaType::Array {
            dims: total - dims,
            component: component.clone(),
        },
        JavaType::Array { component, .. } => (**component).clone(),
        other => other.clone(),
    }
}

/// Statements reading a field onto the stack or writing it from the stack.
fn field_access(cx: &ClassContext<'_>, kind: FieldKind, field: &FieldRef, resolved: Option<&str>, w: &mut CodeWriter) {
    let slot = stack_type(&field.ty).slot();
    let reference = field.ty.is_reference();
    match kind {
        FieldKind::GetStatic | FieldKind::PutStatic => {
            let owner = ClassContext::field_owner(field, resolved);
            if let Some(guard) = cx.clinit_guard(owner) {
                w.line(guard);
            }
            let symbol = ClassContext::static_field(field, resolved);
            if kind.is_get() {
                w.line(format!("(sp++)->{slot} = {symbol};"));
            } else {
                w.line(format!("{symbol} = (--sp)->{slot};"));
            }
        }
        FieldKind::GetField => {
            let member = ClassContext::instance_field(field, resolved, "sp[-1].o");
            let cast = if reference { "(jobject) " } else { "" };
            w.line(format!("sp[-1].{slot} = {cast}{member};"));
        }
        FieldKind::PutField => {
            let member = ClassContext::instance_field(field, resolved, "sp[0].o");
            let cast = if reference { "(jref) " } else { "" };
            w.line("sp -= 2;");
            w.line(format!("{member} = {cast}sp[1].{slot};"));
        }
    }
}

/// Argument expressions of a call whose operands start at `sp[0]`.
fn stack_arguments(method: &MethodRef, has_receiver: bool) -> Vec<String> {
    let mut args = Vec::with_capacity(method.sig.params.len() + 1);
    if has_receiver {
        args.push("sp[0].o".to_string());
    }
    for param in &method.sig.params {
        args.push(format!("sp[{}].{}", args.len(), stack_type(param).slot()));
    }
    args
}

fn invoke(
    cx: &ClassContext<'_>,
    kind: InvokeKind,
    method: &MethodRef,
    resolved: Option<&str>,
    w: &mut CodeWriter,
) -> Result<()> {
    let args = stack_arguments(method, kind != InvokeKind::Static);
    let call = cx.call(kind, method, resolved, &args)?;
    let count = args.len();
    match method.sig.ret.basic() {
        None => {
            if count > 0 {
                w.line(format!("sp -= {count};"));
            }
            w.line(format!("{call};"));
        }
        Some(ret) if count == 0 => {
            w.line(format!("(sp++)->{} = {};", ret.slot(), call));
        }
        Some(ret) => {
            w.line(format!("sp -= {count};"));
            w.line(format!("sp[0].{} = {};", ret.slot(), call));
            w.line("sp++;");
        }
    }
    Ok(())
}

fn constant(value: &ConstValue) -> String {
    match value {
        ConstValue::Null => "INST_ACONST_NULL();".to_string(),
        ConstValue::Int(value) => format!("INST_ICONST({});", int_literal(*value)),
        ConstValue::Long(value) => format!("INST_LCONST({});", long_literal(*value)),
        ConstValue::Float(value) => format!("INST_FCONST({});", float_literal(*value)),
        ConstValue::Double(value) => format!("INST_DCONST({});", double_literal(*value)),
        ConstValue::String(value) => format!("PUSH_OBJECT((jobject) {});", string_object(value)),
        ConstValue::Class(ty) => format!("PUSH_OBJECT((jobject) {});", ty.class_fetch()),
    }
}

/// Allocate a lambda proxy and move the captured values into it.
fn invoke_dynamic(proxy: &str, captures: &[JavaType], w: &mut CodeWriter) {
    let qualified = qualified_name(proxy);
    w.line(format!("CLINIT({qualified});"));
    if captures.is_empty() {
        w.line(format!("PUSH_OBJECT(gcAlloc(ctx, &class_{qualified}));"));
        return;
    }

    w.open("{");
    w.line(format!(
        "auto proxy = ({qualified} *) gcAlloc(ctx, &class_{qualified});"
    ));
    w.line(format!("sp -= {};", captures.len()));
    for (index, ty) in captures.iter().enumerate() {
        let cast = if ty.is_reference() { "(jref) " } else { "" };
        w.line(format!(
            "proxy->{} = {}sp[{}].{};",
            field_symbol(&format!("field{index}")),
            cast,
            index,
            stack_type(ty).slot()
        ));
    }
    w.line("PUSH_OBJECT((jobject) proxy);");
    w.close("}");
}

/// The body of a lambda proxy method: forward captures and parameters to the target.
fn lambda_proxy(
    cx: &ClassContext<'_>,
    target: &LambdaTarget,
    captures: &[JavaType],
    sam: &MethodSignature,
    w: &mut CodeWriter,
) -> Result<()> {
    if !captures.is_empty() {
        w.line(format!("auto proxy = ({} *) self;", cx.qualified));
    }
    let mut sources = captures
        .iter()
        .enumerate()
        .map(|(index, ty)| {
            let member = format!("proxy->{}", field_symbol(&format!("field{index}")));
            let value = if ty.is_reference() { format!("(jobject) {member}") } else { member };
            (value, ty.clone())
        })
        .chain(
            sam.params
                .iter()
                .enumerate()
                .map(|(index, ty)| (format!("param{index}"), ty.clone())),
        );

    let method = &target.method;
    let owner = cx.lambda_owner(method);
    let has_receiver = matches!(
        target.kind,
        handle_kind::INVOKE_VIRTUAL | handle_kind::INVOKE_SPECIAL | handle_kind::INVOKE_INTERFACE
    );
    let mut args = Vec::with_capacity(method.sig.params.len() + 1);
    if has_receiver {
        let (receiver, _) = sources
            .next()
            .ok_or_else(|| cx.error(format!("Lambda target {} has no receiver", method.name)))?;
        args.push(receiver);
    }
    for param in &method.sig.params {
        let (value, ty) = sources.next().ok_or_else(|| {
            cx.error(format!("Lambda target {}{} lacks arguments", method.name, method.desc))
        })?;
        args.push(adapt(&value, &ty, param));
    }

    let (call, produced) = match target.kind {
        handle_kind::NEW_INVOKE_SPECIAL => {
            let qualified = qualified_name(&owner);
            let constructor = method_symbol(&qualified, &method.name, &method.sig, false);
            let mut params = vec!["ctx".to_string()];
            params.extend(args);
            (
                format!(
                    "constructObject<&class_{}, {}>({})",
                    qualified,
                    constructor,
                    params.join(", ")
                ),
                JavaType::Object(owner.clone()),
            )
        }
        handle_kind::INVOKE_STATIC => (
            cx.call(InvokeKind::Static, method, Some(&owner), &args)?,
            method.sig.ret.clone(),
        ),
        handle_kind::INVOKE_SPECIAL => (
            cx.call(InvokeKind::Special, method, Some(&owner), &args)?,
            method.sig.ret.clone(),
        ),
        handle_kind::INVOKE_VIRTUAL => (
            cx.call(InvokeKind::Virtual, method, Some(&owner), &args)?,
            method.sig.ret.clone(),
        ),
        handle_kind::INVOKE_INTERFACE => (
            cx.call(InvokeKind::Interface, method, Some(&owner), &args)?,
            method.sig.ret.clone(),
        ),
        other => return Err(cx.error(format!("Unsupported method handle kind {other}"))),
    };

    if sam.ret.is_void() {
        w.line(format!("{call};"));
    } else if produced.is_void() {
        return Err(cx.error(format!(
            "Lambda target {}{} returns no value",
            method.name, method.desc
        )));
    } else {
        w.line(format!("return {};", adapt(&call, &produced, &sam.ret)));
    }
    Ok(())
}

fn string_concat(recipe: &str, args: &[JavaType], w: &mut CodeWriter) {
    let recipe = string_literal(recipe);
    if args.is_empty() {
        w.line(format!(
            "(sp++)->o = (jobject) concatStringsRecipe(ctx, {recipe}, 0);"
        ));
        return;
    }
    let values = args
        .iter()
        .enumerate()
        .map(|(index, ty)| boxed(&format!("sp[{}].{}", index, stack_type(ty).slot()), ty))
        .collect::<Vec<_>>();
    w.line(format!("sp -= {};", args.len()));
    w.line(format!(
        "sp[0].o = (jobject) concatStringsRecipe(ctx, {}, {}, {});",
        recipe,
        args.len(),
        values.join(", ")
    ));
    w.line("sp++;");
}

/// Line number bookkeeping for a new frame location.
fn location_marker(body: &MethodBody, location: u32) -> String {
    if body.frames.is_empty() {
        let line = body.locations.get(location as usize).copied().unwrap_or(0);
        format!("LINE_NUMBER({line}, {location});")
    } else {
        format!("FRAME_LOCATION({location});")
    }
}

/// Emit one instruction of `method` on the explicit stack.
///
/// # Errors
/// Returns [`crate::Error::Codegen`] for calls that cannot be bound and for instruction
/// groups, which are emitted by [`crate::codegen::optimized`].
pub fn emit(
    cx: &ClassContext<'_>,
    method: &Method,
    body: &MethodBody,
    node: &Node,
    w: &mut CodeWriter,
) -> Result<()> {
    match &node.insn {
        Instruction::Label { id, location } => {
            w.label(*id);
            if let Some(location) = location {
                w.line(location_marker(body, *location));
            }
        }
        Instruction::LineNumber { line, location } => {
            if let Some(location) = location {
                w.line(format!("LINE_NUMBER({line}, {location});"));
            }
        }
        Instruction::Try { frame } => {
            w.line(format!("// Begin try-{frame}"));
            if let Some(location) = body.frames.get(*frame).and_then(|frame| frame.start_location) {
                w.line(format!("FRAME_LOCATION({location});"));
            }
        }
        Instruction::Catch { frame } => {
            w.line(format!("// End try-{frame}"));
            if let Some(location) = body.frames.get(*frame).and_then(|frame| frame.end_location) {
                w.line(format!("FRAME_LOCATION({location});"));
            }
        }
        Instruction::Nop => {
            w.line("INST_NOP();");
        }
        Instruction::Const(value) => {
            w.line(constant(value));
        }
        Instruction::Load { ty, local } => {
            w.line(format!("INST_{}LOAD({});", type_prefix(*ty), local));
        }
        Instruction::Store { ty, local } => {
            w.line(format!("INST_{}STORE({});", type_prefix(*ty), local));
        }
        Instruction::Increment { local, amount } => {
            w.line(format!("INST_IINC({local}, {amount});"));
        }
        Instruction::ArrayLoad(kind) => {
            w.line(format!("INST_{}ALOAD();", kind.prefix()));
        }
        Instruction::ArrayStore(kind) => {
            w.line(format!("INST_{}ASTORE();", kind.prefix()));
        }
        Instruction::Stack(op) => {
            w.line(format!("{}();", op.macro_name(node.inputs())));
        }
        Instruction::Arithmetic { op, ty } => {
            w.line(format!("INST_{}{}();", type_prefix(*ty), op.mnemonic()));
        }
        Instruction::Convert(conversion) => {
            w.line(format!("INST_{}();", conversion.mnemonic()));
        }
        Instruction::Compare(compare) => {
            w.line(format!("INST_{}();", compare.mnemonic()));
        }
        Instruction::Jump { kind, target } => match kind {
            JumpKind::Goto => {
                w.line(goto(*target));
            }
            JumpKind::If(_) => {
                w.line(branch(*kind, *target, &["(--sp)->i".to_string()]));
            }
            JumpKind::IfNull | JumpKind::IfNonNull => {
                w.line(branch(*kind, *target, &["(--sp)->o".to_string()]));
            }
            JumpKind::IfICmp(_) | JumpKind::IfACmp(_) => {
                let slot = if matches!(kind, JumpKind::IfICmp(_)) { "i" } else { "o" };
                w.line("sp -= 2;");
                w.line(branch(
                    *kind,
                    *target,
                    &[format!("sp[0].{slot}"), format!("sp[1].{slot}")],
                ));
            }
        },
        Instruction::Switch {
            keys,
            targets,
            default,
        } => {
            w.lines(switch("(--sp)->i", keys, targets, *default));
        }
        Instruction::Return(None) => {
            w.line("INST_RETURN();");
        }
        Instruction::Return(Some(ty)) => {
            w.line(format!("INST_{}RETURN();", type_prefix(*ty)));
        }
        Instruction::Throw => {
            w.line("INST_ATHROW();");
        }
        Instruction::Field {
            kind,
            field,
            resolved,
        } => field_access(cx, *kind, field, resolved.as_deref(), w),
        Instruction::Invoke {
            kind,
            method: callee,
            resolved,
        } => invoke(cx, *kind, callee, resolved.as_deref(), w)?,
        Instruction::New(name) => {
            w.line(format!(
                "PUSH_OBJECT(gcAlloc(ctx, &class_{}));",
                qualified_name(name)
            ));
        }
        Instruction::NewArray(element) | Instruction::ANewArray(element) => {
            let prefix = if matches!(node.insn, Instruction::NewArray(_)) { "" } else { "A" };
            w.line(format!("INST_{}NEWARRAY({});", prefix, element.class_fetch()));
        }
        Instruction::MultiNewArray { ty, dims } => {
            w.line(format!(
                "INST_MULTIANEWARRAY({}, {});",
                multi_array_component(ty, *dims).class_fetch(),
                dims
            ));
        }
        Instruction::ArrayLength => {
            w.line("INST_ARRAYLENGTH();");
        }
        Instruction::CheckCast(ty) => {
            w.line(format!("INST_CHECKCAST({});", ty.class_fetch()));
        }
        Instruction::InstanceOf(ty) => {
            w.line(format!("INST_INSTANCEOF({});", ty.class_fetch()));
        }
        Instruction::MonitorEnter => {
            w.line("INST_MONITORENTER();");
        }
        Instruction::MonitorExit => {
            w.line("INST_MONITOREXIT();");
        }
        Instruction::InvokeDynamic { proxy, captures } => invoke_dynamic(proxy, captures, w),
        Instruction::LambdaProxy {
            target,
            captures,
            sam,
        } => lambda_proxy(cx, target, captures, sam, w)?,
        Instruction::StringConcat { recipe, args } => string_concat(recipe, args, w),
        Instruction::Group(_) => {
            return Err(cx.error(format!(
                "Nested instruction group in {}",
                method.display_name(&cx.class.name)
            )));
        }
    }
    Ok(())
}
