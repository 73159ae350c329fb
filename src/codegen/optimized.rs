//! Instruction groups emitted on named temporaries.
//!
//! Inside a group, primitive values flow through C++ locals named `t<id>` after their
//! stack entry instead of going through the frame stack. References always stay on the
//! frame stack where the collector sees them. A member that produces a reference, or
//! consumes entries in an order the temporaries cannot provide, first spills every live
//! temporary and then runs on the explicit stack. Each group is wrapped in its own block
//! so jumps never cross the temporaries' initializations.

use crate::{
    codegen::{
        context::ClassContext,
        instructions::{self, branch, switch},
        writer::{double_literal, float_literal, int_literal, long_literal, CodeWriter},
    },
    ir::{ArithOp, CompareOp, ConstValue, Conversion, FieldKind, Instruction, Node, Operand},
    model::{types::BasicType, Method, MethodBody},
    Result,
};

/// C++ produced for one group member.
#[derive(Debug, Default)]
struct Lowered {
    /// Checks and class initialization that precede the member
    pre: Vec<String>,
    /// Statements with side effects
    effect: Vec<String>,
    /// Expression of each output entry
    outputs: Vec<String>,
}

impl Lowered {
    fn value(expression: String) -> Self {
        Lowered {
            outputs: vec![expression],
            ..Lowered::default()
        }
    }

    fn statement(statement: String) -> Self {
        Lowered {
            effect: vec![statement],
            ..Lowered::default()
        }
    }

    fn with_pre(mut self, pre: Option<String>) -> Self {
        self.pre.extend(pre);
        self
    }
}

fn temporary(entry: &Operand) -> String {
    format!("t{}", entry.id)
}

fn arithmetic(op: ArithOp, ty: BasicType, a: &str, b: &str) -> Lowered {
    let wide = ty == BasicType::Long;
    let expression = match op {
        ArithOp::Add => format!("{a} + {b}"),
        ArithOp::Sub => format!("{a} - {b}"),
        ArithOp::Mul => format!("{a} * {b}"),
        ArithOp::Div => format!("{a} / {b}"),
        ArithOp::Rem => match ty {
            BasicType::Float => format!("fmodf({a}, {b})"),
            BasicType::Double => format!("fmod({a}, {b})"),
            _ => format!("{a} % {b}"),
        },
        ArithOp::Neg => format!("-{a}"),
        ArithOp::Shl => format!("{a} << {b}"),
        ArithOp::Shr => format!("{a} >> {b}"),
        ArithOp::Ushr if wide => format!("(jlong) ((uint64_t) {a} >> {b})"),
        ArithOp::Ushr => format!("(jint) ((uint32_t) {a} >> {b})"),
        ArithOp::And => format!("{a} & {b}"),
        ArithOp::Or => format!("{a} | {b}"),
        ArithOp::Xor => format!("{a} ^ {b}"),
    };
    let integral = matches!(ty, BasicType::Int | BasicType::Long);
    let check = (integral && matches!(op, ArithOp::Div | ArithOp::Rem))
        .then(|| format!("if ({b} == 0) throwDivisionByZero(ctx);"));
    Lowered::value(expression).with_pre(check)
}

fn conversion(conversion: Conversion, value: &str) -> String {
    match conversion {
        Conversion::I2B => format!("(jint) (jbyte) ({value} & 0xFF)"),
        Conversion::I2C => format!("{value} & 0xFFFF"),
        Conversion::I2S => format!("(jint) (jshort) ({value} & 0xFFFF)"),
        other => format!("({}) {}", other.types().1.cpp_type(), value),
    }
}

fn comparison(op: CompareOp, a: &str, b: &str) -> String {
    match op {
        CompareOp::Lcmp => format!("longCompare({a}, {b})"),
        CompareOp::Fcmpl => format!("floatCompare({a}, {b}, -1)"),
        CompareOp::Fcmpg => format!("floatCompare({a}, {b}, 1)"),
        CompareOp::Dcmpl => format!("doubleCompare({a}, {b}, -1)"),
        CompareOp::Dcmpg => format!("doubleCompare({a}, {b}, 1)"),
    }
}

struct GroupEmitter<'c, 'a> {
    cx: &'c ClassContext<'a>,
    /// Live temporaries, deepest first
    temps: Vec<Operand>,
}

impl GroupEmitter<'_, '_> {
    /// Push the live temporaries below the top `keep` onto the frame stack.
    fn spill(&mut self, keep: usize, w: &mut CodeWriter) {
        let keep = keep.min(self.temps.len());
        let kept = self.temps.split_off(self.temps.len() - keep);
        for entry in self.temps.drain(..) {
            w.line(format!("(sp++)->{} = {};", entry.ty.slot(), temporary(&entry)));
        }
        self.temps = kept;
    }

    /// The C++ for `insn` over `args`, `None` if it must run on the frame stack.
    fn lower(&self, insn: &Instruction, inputs: &[Operand], outputs: &[Operand], args: &[String]) -> Result<Option<Lowered>> {
        if outputs.iter().any(|entry| entry.ty == BasicType::Object) {
            return Ok(None);
        }
        let arg = |index: usize| args.get(index).map_or("", String::as_str);

        let lowered = match insn {
            Instruction::Nop => Lowered::default(),
            Instruction::Const(value) => Lowered::value(match value {
                ConstValue::Int(value) => int_literal(*value),
                ConstValue::Long(value) => long_literal(*value),
                ConstValue::Float(value) => float_literal(*value),
                ConstValue::Double(value) => double_literal(*value),
                _ => return Ok(None),
            }),
            Instruction::Load { ty, local } => Lowered::value(format!("frame[{}].{}", local, ty.slot())),
            Instruction::Store { ty, local } => {
                Lowered::statement(format!("frame[{}].{} = {};", local, ty.slot(), arg(0)))
            }
            Instruction::Increment { local, amount } => {
                Lowered::statement(format!("frame[{local}].i += {amount};"))
            }
            Instruction::ArrayLoad(kind) => Lowered::value(format!(
                "ARRAY_ACCESS({}, {}, {})",
                kind.cpp_type(),
                arg(0),
                arg(1)
            )),
            Instruction::ArrayStore(kind) => Lowered::statement(format!(
                "ARRAY_ACCESS({}, {}, {}) = {};",
                kind.cpp_type(),
                arg(0),
                arg(1),
                arg(2)
            )),
            Instruction::Stack(op) => {
                let (_, order) = op.shuffle(inputs);
                Lowered {
                    outputs: order.iter().map(|index| arg(*index).to_string()).collect(),
                    ..Lowered::default()
                }
            }
            Instruction::Arithmetic { op, ty } => arithmetic(*op, *ty, arg(0), arg(1)),
            Instruction::Convert(kind) => Lowered::value(conversion(*kind, arg(0))),
            Instruction::Compare(op) => Lowered::value(comparison(*op, arg(0), arg(1))),
            Instruction::Jump { kind, target } => Lowered::statement(branch(*kind, *target, args)),
            Instruction::Switch {
                keys,
                targets,
                default,
            } => Lowered {
                effect: switch(arg(0), keys, targets, *default),
                ..Lowered::default()
            },
            Instruction::Return(None) => Lowered::statement("return;".to_string()),
            Instruction::Return(Some(_)) => Lowered::statement(format!("return {};", arg(0))),
            Instruction::Throw => Lowered::statement(format!("throwException(ctx, {});", arg(0))),
            Instruction::Field {
                kind,
                field,
                resolved,
            } => {
                let resolved = resolved.as_deref();
                match kind {
                    FieldKind::GetStatic => {
                        Lowered::value(ClassContext::static_field(field, resolved)).with_pre(
                            self.cx.clinit_guard(ClassContext::field_owner(field, resolved)),
                        )
                    }
                    FieldKind::PutStatic => Lowered::statement(format!(
                        "{} = {};",
                        ClassContext::static_field(field, resolved),
                        arg(0)
                    ))
                    .with_pre(self.cx.clinit_guard(ClassContext::field_owner(field, resolved))),
                    FieldKind::GetField => {
                        Lowered::value(ClassContext::instance_field(field, resolved, arg(0)))
                    }
                    FieldKind::PutField => {
                        let cast = if field.ty.is_reference() { "(jref) " } else { "" };
                        Lowered::statement(format!(
                            "{} = {}{};",
                            ClassContext::instance_field(field, resolved, arg(0)),
                            cast,
                            arg(1)
                        ))
                    }
                }
            }
            Instruction::Invoke {
                kind,
                method,
                resolved,
            } => {
                let call = self.cx.call(*kind, method, resolved.as_deref(), args)?;
                if method.sig.ret.is_void() {
                    Lowered::statement(format!("{call};"))
                } else {
                    Lowered::value(call)
                }
            }
            Instruction::ArrayLength => {
                Lowered::value(format!("NULL_CHECK((jarray) {})->length", arg(0)))
            }
            Instruction::InstanceOf(ty) => Lowered::value(format!(
                "isInstance(ctx, {}, {})",
                arg(0),
                ty.class_fetch()
            )),
            Instruction::MonitorEnter => Lowered::statement(format!("monitorEnter(ctx, {});", arg(0))),
            Instruction::MonitorExit => Lowered::statement(format!("monitorExit(ctx, {});", arg(0))),
            _ => return Ok(None),
        };
        Ok(Some(lowered))
    }

    fn member(&mut self, method: &Method, body: &MethodBody, node: &Node, w: &mut CodeWriter) -> Result<()> {
        if node.insn.is_pseudo() {
            return instructions::emit(self.cx, method, body, node, w);
        }

        let inputs = node.inputs();
        let outputs = node.outputs();
        let from_temps = inputs
            .iter()
            .rev()
            .zip(self.temps.iter().rev())
            .take_while(|(input, temp)| input.id == temp.id)
            .count();
        let from_stack = inputs.len() - from_temps;
        // Stack entries lie below every temporary
        let ordered = from_stack == 0 || from_temps == self.temps.len();

        let mut args = Vec::with_capacity(inputs.len());
        for (index, entry) in inputs.iter().enumerate() {
            if index < from_stack {
                args.push(format!("sp[{}].{}", index, entry.ty.slot()));
            } else {
                args.push(temporary(entry));
            }
        }

        let lowered = if ordered {
            self.lower(&node.insn, inputs, outputs, &args)?
        } else {
            None
        };
        let Some(lowered) = lowered else {
            self.spill(0, w);
            return instructions::emit(self.cx, method, body, node, w);
        };

        if node.insn.is_jump() {
            self.spill(from_temps, w);
        }
        self.temps.truncate(self.temps.len() - from_temps.min(self.temps.len()));
        if from_stack > 0 {
            w.line(format!("sp -= {from_stack};"));
        }
        w.lines(&lowered.pre);
        w.lines(&lowered.effect);
        for (entry, expression) in outputs.iter().zip(&lowered.outputs) {
            w.line(format!(
                "{} {} = {};",
                entry.ty.cpp_type(),
                temporary(entry),
                expression
            ));
            self.temps.push(*entry);
        }
        Ok(())
    }
}

/// Emit the members of one instruction group.
///
/// # Errors
/// Propagates call binding failures of the members.
pub fn emit_group(
    cx: &ClassContext<'_>,
    method: &Method,
    body: &MethodBody,
    members: &[Node],
    w: &mut CodeWriter,
) -> Result<()> {
    let mut group = GroupEmitter {
        cx,
        temps: Vec::new(),
    };
    w.open("{");
    for member in members {
        group.member(method, body, member, w)?;
    }
    group.spill(0, w);
    w.close("}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classfile::flags::AccessFlags,
        config::TranspilerConfig,
        ir::{Io, JumpKind, Condition},
        model::{Class, ClassMap},
    };

    fn node(insn: Instruction, depth: usize, inputs: &[Operand], outputs: &[Operand]) -> Node {
        Node {
            insn,
            io: Some(Io {
                depth,
                inputs: inputs.to_vec(),
                outputs: outputs.to_vec(),
            }),
        }
    }

    fn int(id: u32) -> Operand {
        Operand {
            id,
            ty: BasicType::Int,
        }
    }

    fn render(members: Vec<Node>) -> String {
        let mut classes = ClassMap::new();
        let id = classes.insert(Class::new("a/Main", None, &[], AccessFlags::PUBLIC));
        let config = TranspilerConfig::default();
        let cx = ClassContext::new(&classes, &classes[id], &config);
        let method = Method::new("run", "()V", AccessFlags::STATIC).unwrap();
        let body = MethodBody::default();
        let mut w = CodeWriter::new();
        emit_group(&cx, &method, &body, &members, &mut w).unwrap();
        w.into_string()
    }

    #[test]
    fn test_arithmetic_on_temporaries() {
        let text = render(vec![
            node(Instruction::Load { ty: BasicType::Int, local: 0 }, 0, &[], &[int(1)]),
            node(Instruction::Const(ConstValue::Int(2)), 1, &[], &[int(2)]),
            node(
                Instruction::Arithmetic { op: ArithOp::Mul, ty: BasicType::Int },
                2,
                &[int(1), int(2)],
                &[int(3)],
            ),
            node(Instruction::Store { ty: BasicType::Int, local: 1 }, 1, &[int(3)], &[]),
        ]);
        assert_eq!(
            text,
            "{\n\tjint t1 = frame[0].i;\n\tjint t2 = 2;\n\tjint t3 = t1 * t2;\n\tframe[1].i = t3;\n}\n"
        );
    }

    #[test]
    fn test_division_checks_zero() {
        let text = render(vec![
            node(Instruction::Load { ty: BasicType::Int, local: 0 }, 0, &[], &[int(1)]),
            node(Instruction::Load { ty: BasicType::Int, local: 1 }, 1, &[], &[int(2)]),
            node(
                Instruction::Arithmetic { op: ArithOp::Rem, ty: BasicType::Int },
                2,
                &[int(1), int(2)],
                &[int(3)],
            ),
        ]);
        assert!(text.contains("\tif (t2 == 0) throwDivisionByZero(ctx);\n\tjint t3 = t1 % t2;\n"));
        assert!(text.ends_with("\t(sp++)->i = t3;\n}\n"));
    }

    #[test]
    fn test_stack_inputs_below_temporaries() {
        let text = render(vec![
            node(Instruction::Const(ConstValue::Int(1)), 1, &[], &[int(5)]),
            node(
                Instruction::Arithmetic { op: ArithOp::Add, ty: BasicType::Int },
                2,
                &[int(0), int(5)],
                &[int(6)],
            ),
            node(Instruction::Store { ty: BasicType::Int, local: 2 }, 1, &[int(6)], &[]),
        ]);
        assert!(text.contains("\tsp -= 1;\n\tjint t6 = sp[0].i + t5;\n"));
    }

    #[test]
    fn test_reference_output_spills() {
        let text = render(vec![
            node(Instruction::Const(ConstValue::Int(3)), 0, &[], &[int(1)]),
            node(
                Instruction::NewArray(crate::model::types::JavaType::Int),
                1,
                &[int(1)],
                &[Operand {
                    id: 2,
                    ty: BasicType::Object,
                }],
            ),
            node(Instruction::Stack(crate::ir::StackOp::Pop), 1, &[Operand { id: 2, ty: BasicType::Object }], &[]),
        ]);
        assert_eq!(
            text,
            "{\n\tjint t1 = 3;\n\t(sp++)->i = t1;\n\tINST_NEWARRAY(&class_int);\n\tsp -= 1;\n}\n"
        );
    }

    #[test]
    fn test_branch_spills_unconsumed() {
        let text = render(vec![
            node(Instruction::Const(ConstValue::Int(7)), 0, &[], &[int(1)]),
            node(Instruction::Load { ty: BasicType::Int, local: 0 }, 1, &[], &[int(2)]),
            node(
                Instruction::Jump {
                    kind: JumpKind::If(Condition::Eq),
                    target: 12,
                },
                2,
                &[int(2)],
                &[],
            ),
        ]);
        assert!(text.contains("\t(sp++)->i = t1;\n\tif (t2 == 0) goto label_12;\n"));
    }
}
