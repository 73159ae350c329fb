//! Lowering of decoded bytecode into IR.

use crate::{
    classfile::{
        attributes::{BootstrapMethod, CodeAttribute},
        constant_pool::{ConstantPool, Loadable},
    },
    disassembler::{self, implicit_local, OffsetSet, Operand},
    ir::{
        ArithOp, ArrayKind, CompareOp, Condition, ConstValue, Conversion, FieldKind, FieldRef,
        Instruction, InvokeKind, JumpKind, MethodRef, Node, StackOp,
    },
    loader::{invokedynamic::lower_invoke_dynamic, LoaderContext},
    model::{
        naming::{is_array_name, sanitize_name},
        types::{BasicType, JavaType, MethodSignature},
        Class, ExceptionFrame, MethodBody, OBJECT,
    },
    Error, Result,
};

const LOCAL_TYPES: [BasicType; 5] = [
    BasicType::Int,
    BasicType::Long,
    BasicType::Float,
    BasicType::Double,
    BasicType::Object,
];

const ARRAY_KINDS: [ArrayKind; 8] = [
    ArrayKind::Int,
    ArrayKind::Long,
    ArrayKind::Float,
    ArrayKind::Double,
    ArrayKind::Object,
    ArrayKind::Byte,
    ArrayKind::Char,
    ArrayKind::Short,
];

const CONDITIONS: [Condition; 6] = [
    Condition::Eq,
    Condition::Ne,
    Condition::Lt,
    Condition::Ge,
    Condition::Gt,
    Condition::Le,
];

const CONVERSIONS: [Conversion; 15] = [
    Conversion::I2L,
    Conversion::I2F,
    Conversion::I2D,
    Conversion::L2I,
    Conversion::L2F,
    Conversion::L2D,
    Conversion::F2I,
    Conversion::F2L,
    Conversion::F2D,
    Conversion::D2I,
    Conversion::D2L,
    Conversion::D2F,
    Conversion::I2B,
    Conversion::I2C,
    Conversion::I2S,
];

/// Lowers the code of the methods of one class.
pub(crate) struct BodyBuilder<'a> {
    /// Sanitized name of the class being loaded
    pub class_name: &'a str,
    pub pool: &'a ConstantPool,
    pub bootstraps: &'a [BootstrapMethod],
    pub context: &'a mut LoaderContext,
    /// Proxy classes synthesized for lambda call sites
    pub proxies: &'a mut Vec<Class>,
}

fn owner_name(name: &str) -> String {
    if is_array_name(name) {
        OBJECT.to_string()
    } else {
        sanitize_name(name)
    }
}

fn class_type(name: &str) -> Result<JavaType> {
    JavaType::from_class_ref(name).ok_or_else(|| malformed_error!("Invalid class reference {}", name))
}

impl BodyBuilder<'_> {
    /// Lower `code` into a method body with labels, line numbers and exception frames.
    ///
    /// The body is not resolved yet; see [`crate::loader::frames`] and
    /// [`crate::loader::resolver`].
    pub fn build(&mut self, code: &CodeAttribute<'_>) -> Result<MethodBody> {
        let decoded = disassembler::decode_stream(code.code)?;

        let mut labels = OffsetSet::new(code.code.len() + 1);
        for insn in &decoded {
            for target in insn.branch_targets() {
                labels.insert(target as usize);
            }
        }
        for entry in &code.exception_table {
            labels.insert(usize::from(entry.start_pc));
            labels.insert(usize::from(entry.end_pc));
            labels.insert(usize::from(entry.handler_pc));
        }
        for line in &code.line_numbers {
            labels.insert(usize::from(line.start_pc));
        }

        let mut nodes = Vec::with_capacity(decoded.len() * 2);
        let mut lines = code.line_numbers.iter().peekable();
        for insn in &decoded {
            let offset = insn.offset;
            if labels.contains(offset as usize) {
                nodes.push(Node::new(Instruction::Label {
                    id: offset,
                    location: None,
                }));
            }
            while let Some(line) = lines.next_if(|line| u32::from(line.start_pc) <= offset) {
                nodes.push(Node::new(Instruction::LineNumber {
                    line: u32::from(line.line),
                    location: None,
                }));
            }
            nodes.push(Node::new(self.lower(insn)?));
        }
        if labels.contains(code.code.len()) {
            nodes.push(Node::new(Instruction::Label {
                id: code.code.len() as u32,
                location: None,
            }));
        }

        let frames = code
            .exception_table
            .iter()
            .enumerate()
            .map(|(index, entry)| ExceptionFrame {
                index,
                start: u32::from(entry.start_pc),
                end: u32::from(entry.end_pc),
                handler: u32::from(entry.handler_pc),
                catch_type: entry.catch_type.as_deref().map(sanitize_name),
                start_location: None,
                end_location: None,
            })
            .collect();

        Ok(MethodBody {
            max_stack: usize::from(code.max_stack),
            max_locals: usize::from(code.max_locals),
            nodes,
            frames,
            locations: Vec::new(),
        })
    }

    fn constant(&self, operand: &Operand) -> Result<u16> {
        match operand {
            Operand::Constant(index) => Ok(*index),
            other => Err(malformed_error!("Expected constant operand, found {:?}", other)),
        }
    }

    fn local(insn: &disassembler::Instruction) -> Result<u16> {
        match insn.operand {
            Operand::Local(local) => Ok(local),
            _ => implicit_local(insn.opcode)
                .ok_or_else(|| malformed_error!("Missing local operand for {}", insn.mnemonic)),
        }
    }

    fn branch(insn: &disassembler::Instruction) -> Result<u32> {
        match insn.operand {
            Operand::Branch(target) => Ok(target),
            _ => Err(malformed_error!("Missing branch target for {}", insn.mnemonic)),
        }
    }

    fn load_constant(&self, index: u16) -> Result<ConstValue> {
        Ok(match self.pool.loadable(index)? {
            Loadable::Int(value) => ConstValue::Int(value),
            Loadable::Float(value) => ConstValue::Float(value),
            Loadable::Long(value) => ConstValue::Long(value),
            Loadable::Double(value) => ConstValue::Double(value),
            Loadable::String(value) => ConstValue::String(value),
            Loadable::Class(name) => ConstValue::Class(class_type(&name)?),
            other => return Err(Error::Unsupported(format!("ldc of {}", other))),
        })
    }

    fn field(&self, kind: FieldKind, index: u16) -> Result<Instruction> {
        let member = self.pool.member_ref(index)?;
        let ty = JavaType::from_descriptor(&member.descriptor)
            .filter(|ty| !ty.is_void())
            .ok_or_else(|| malformed_error!("Invalid field descriptor {}", member.descriptor))?;
        Ok(Instruction::Field {
            kind,
            field: FieldRef {
                owner: sanitize_name(&member.owner),
                name: member.name,
                desc: member.descriptor,
                ty,
            },
            resolved: None,
        })
    }

    fn invoke(&self, kind: InvokeKind, index: u16) -> Result<Instruction> {
        let member = self.pool.member_ref(index)?;
        Ok(Instruction::Invoke {
            kind,
            method: MethodRef {
                owner: owner_name(&member.owner),
                sig: MethodSignature::parse(&member.descriptor)?,
                name: member.name,
                desc: member.descriptor,
                interface: member.interface,
            },
            resolved: None,
        })
    }

    fn lower(&mut self, insn: &disassembler::Instruction) -> Result<Instruction> {
        let op = insn.opcode;
        Ok(match op {
            0 => Instruction::Nop,
            1 => Instruction::Const(ConstValue::Null),
            2..=8 => Instruction::Const(ConstValue::Int(i32::from(op) - 3)),
            9 | 10 => Instruction::Const(ConstValue::Long(i64::from(op - 9))),
            11..=13 => Instruction::Const(ConstValue::Float(f32::from(op - 11))),
            14 | 15 => Instruction::Const(ConstValue::Double(f64::from(op - 14))),
            16 => match insn.operand {
                Operand::Byte(value) => Instruction::Const(ConstValue::Int(i32::from(value))),
                _ => return Err(malformed_error!("Invalid bipush operand")),
            },
            17 => match insn.operand {
                Operand::Short(value) => Instruction::Const(ConstValue::Int(i32::from(value))),
                _ => return Err(malformed_error!("Invalid sipush operand")),
            },
            18..=20 => Instruction::Const(self.load_constant(self.constant(&insn.operand)?)?),
            21..=25 => Instruction::Load {
                ty: LOCAL_TYPES[usize::from(op - 21)],
                local: Self::local(insn)?,
            },
            26..=45 => Instruction::Load {
                ty: LOCAL_TYPES[usize::from((op - 26) / 4)],
                local: Self::local(insn)?,
            },
            46..=53 => Instruction::ArrayLoad(ARRAY_KINDS[usize::from(op - 46)]),
            54..=58 => Instruction::Store {
                ty: LOCAL_TYPES[usize::from(op - 54)],
                local: Self::local(insn)?,
            },
            59..=78 => Instruction::Store {
                ty: LOCAL_TYPES[usize::from((op - 59) / 4)],
                local: Self::local(insn)?,
            },
            79..=86 => Instruction::ArrayStore(ARRAY_KINDS[usize::from(op - 79)]),
            87 => Instruction::Stack(StackOp::Pop),
            88 => Instruction::Stack(StackOp::Pop2),
            89 => Instruction::Stack(StackOp::Dup),
            90 => Instruction::Stack(StackOp::DupX1),
            91 => Instruction::Stack(StackOp::DupX2),
            92 => Instruction::Stack(StackOp::Dup2),
            93 => Instruction::Stack(StackOp::Dup2X1),
            94 => Instruction::Stack(StackOp::Dup2X2),
            95 => Instruction::Stack(StackOp::Swap),
            96..=115 => {
                const OPS: [ArithOp; 5] = [ArithOp::Add, ArithOp::Sub, ArithOp::Mul, ArithOp::Div, ArithOp::Rem];
                Instruction::Arithmetic {
                    op: OPS[usize::from((op - 96) / 4)],
                    ty: LOCAL_TYPES[usize::from((op - 96) % 4)],
                }
            }
            116..=119 => Instruction::Arithmetic {
                op: ArithOp::Neg,
                ty: LOCAL_TYPES[usize::from(op - 116)],
            },
            120..=131 => {
                const OPS: [ArithOp; 6] = [
                    ArithOp::Shl,
                    ArithOp::Shr,
                    ArithOp::Ushr,
                    ArithOp::And,
                    ArithOp::Or,
                    ArithOp::Xor,
                ];
                Instruction::Arithmetic {
                    op: OPS[usize::from((op - 120) / 2)],
                    ty: if (op - 120) % 2 == 0 { BasicType::Int } else { BasicType::Long },
                }
            }
            132 => match insn.operand {
                Operand::Increment { local, amount } => Instruction::Increment { local, amount },
                _ => return Err(malformed_error!("Invalid iinc operand")),
            },
            133..=147 => Instruction::Convert(CONVERSIONS[usize::from(op - 133)]),
            148 => Instruction::Compare(CompareOp::Lcmp),
            149 => Instruction::Compare(CompareOp::Fcmpl),
            150 => Instruction::Compare(CompareOp::Fcmpg),
            151 => Instruction::Compare(CompareOp::Dcmpl),
            152 => Instruction::Compare(CompareOp::Dcmpg),
            153..=158 => Instruction::Jump {
                kind: JumpKind::If(CONDITIONS[usize::from(op - 153)]),
                target: Self::branch(insn)?,
            },
            159..=164 => Instruction::Jump {
                kind: JumpKind::IfICmp(CONDITIONS[usize::from(op - 159)]),
                target: Self::branch(insn)?,
            },
            165 | 166 => Instruction::Jump {
                kind: JumpKind::IfACmp(CONDITIONS[usize::from(op - 165)]),
                target: Self::branch(insn)?,
            },
            167 | 200 => Instruction::Jump {
                kind: JumpKind::Goto,
                target: Self::branch(insn)?,
            },
            170 | 171 => match &insn.operand {
                Operand::Table {
                    default,
                    low,
                    targets,
                } => Instruction::Switch {
                    keys: (0..targets.len()).map(|offset| low.wrapping_add(offset as i32)).collect(),
                    targets: targets.clone(),
                    default: *default,
                },
                Operand::Lookup { default, pairs } => Instruction::Switch {
                    keys: pairs.iter().map(|(key, _)| *key).collect(),
                    targets: pairs.iter().map(|(_, target)| *target).collect(),
                    default: *default,
                },
                _ => return Err(malformed_error!("Invalid switch operand")),
            },
            172..=176 => Instruction::Return(Some(LOCAL_TYPES[usize::from(op - 172)])),
            177 => Instruction::Return(None),
            178 => self.field(FieldKind::GetStatic, self.constant(&insn.operand)?)?,
            179 => self.field(FieldKind::PutStatic, self.constant(&insn.operand)?)?,
            180 => self.field(FieldKind::GetField, self.constant(&insn.operand)?)?,
            181 => self.field(FieldKind::PutField, self.constant(&insn.operand)?)?,
            182 => self.invoke(InvokeKind::Virtual, self.constant(&insn.operand)?)?,
            183 => self.invoke(InvokeKind::Special, self.constant(&insn.operand)?)?,
            184 => self.invoke(InvokeKind::Static, self.constant(&insn.operand)?)?,
            185 => match insn.operand {
                Operand::InvokeInterface { index, .. } => self.invoke(InvokeKind::Interface, index)?,
                _ => return Err(malformed_error!("Invalid invokeinterface operand")),
            },
            186 => match insn.operand {
                Operand::InvokeDynamic(index) => lower_invoke_dynamic(self, index)?,
                _ => return Err(malformed_error!("Invalid invokedynamic operand")),
            },
            187 => Instruction::New(sanitize_name(self.pool.class_name(self.constant(&insn.operand)?)?)),
            188 => match insn.operand {
                Operand::NewArray(code) => Instruction::NewArray(
                    JavaType::from_newarray_code(code)
                        .ok_or_else(|| malformed_error!("Invalid newarray type {}", code))?,
                ),
                _ => return Err(malformed_error!("Invalid newarray operand")),
            },
            189 => Instruction::ANewArray(class_type(self.pool.class_name(self.constant(&insn.operand)?)?)?),
            190 => Instruction::ArrayLength,
            191 => Instruction::Throw,
            192 => Instruction::CheckCast(class_type(self.pool.class_name(self.constant(&insn.operand)?)?)?),
            193 => Instruction::InstanceOf(class_type(self.pool.class_name(self.constant(&insn.operand)?)?)?),
            194 => Instruction::MonitorEnter,
            195 => Instruction::MonitorExit,
            197 => match insn.operand {
                Operand::MultiNewArray { index, dims } => Instruction::MultiNewArray {
                    ty: class_type(self.pool.class_name(index)?)?,
                    dims,
                },
                _ => return Err(malformed_error!("Invalid multianewarray operand")),
            },
            198 => Instruction::Jump {
                kind: JumpKind::IfNull,
                target: Self::branch(insn)?,
            },
            199 => Instruction::Jump {
                kind: JumpKind::IfNonNull,
                target: Self::branch(insn)?,
            },
            _ => {
                return Err(Error::Unsupported(format!(
                    "{} at offset {}",
                    insn.mnemonic, insn.offset
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{classfile::attributes::ExceptionEntry, classfile::attributes::LineNumber};

    fn build(code: &[u8], exceptions: Vec<ExceptionEntry>, lines: Vec<LineNumber>) -> MethodBody {
        let pool = ConstantPool::default();
        let mut context = LoaderContext::new();
        let mut proxies = Vec::new();
        let mut builder = BodyBuilder {
            class_name: "a/Test",
            pool: &pool,
            bootstraps: &[],
            context: &mut context,
            proxies: &mut proxies,
        };
        let attribute = CodeAttribute {
            max_stack: 2,
            max_locals: 2,
            code,
            exception_table: exceptions,
            line_numbers: lines,
        };
        builder.build(&attribute).unwrap()
    }

    #[test]
    fn test_lowering_with_labels() {
        // iload_1; ifeq +5; iconst_1; ireturn; iconst_0; ireturn
        let body = build(&[0x1B, 0x99, 0x00, 0x05, 0x04, 0xAC, 0x03, 0xAC], vec![], vec![]);
        let insns: Vec<&Instruction> = body.nodes.iter().map(|node| &node.insn).collect();
        assert_eq!(
            insns,
            [
                &Instruction::Load {
                    ty: BasicType::Int,
                    local: 1
                },
                &Instruction::Jump {
                    kind: JumpKind::If(Condition::Eq),
                    target: 6
                },
                &Instruction::Const(ConstValue::Int(1)),
                &Instruction::Return(Some(BasicType::Int)),
                &Instruction::Label { id: 6, location: None },
                &Instruction::Const(ConstValue::Int(0)),
                &Instruction::Return(Some(BasicType::Int)),
            ]
        );
    }

    #[test]
    fn test_line_numbers_follow_labels() {
        // iconst_0; istore_1; return
        let body = build(
            &[0x03, 0x3C, 0xB1],
            vec![],
            vec![
                LineNumber { start_pc: 0, line: 10 },
                LineNumber { start_pc: 2, line: 11 },
            ],
        );
        assert!(matches!(body.nodes[0].insn, Instruction::Label { id: 0, .. }));
        assert!(matches!(body.nodes[1].insn, Instruction::LineNumber { line: 10, .. }));
        assert!(matches!(body.nodes[4].insn, Instruction::Label { id: 2, .. }));
        assert!(matches!(body.nodes[5].insn, Instruction::LineNumber { line: 11, .. }));
        assert!(matches!(body.nodes[6].insn, Instruction::Return(None)));
    }

    #[test]
    fn test_exception_frames_and_end_label() {
        // aconst_null; athrow
        let body = build(
            &[0x01, 0xBF],
            vec![ExceptionEntry {
                start_pc: 0,
                end_pc: 2,
                handler_pc: 1,
                catch_type: Some("java/lang/Exception".to_string()),
            }],
            vec![],
        );
        assert_eq!(body.frames.len(), 1);
        assert_eq!(body.frames[0].handler, 1);
        assert_eq!(body.frames[0].catch_type.as_deref(), Some("java/lang/Exception"));
        assert!(matches!(
            body.nodes.last().map(|node| &node.insn),
            Some(Instruction::Label { id: 2, .. })
        ));
    }

    #[test]
    fn test_ldc_invalid_constant() {
        let pool = ConstantPool::default();
        let mut context = LoaderContext::new();
        let mut proxies = Vec::new();
        let builder = BodyBuilder {
            class_name: "a/Test",
            pool: &pool,
            bootstraps: &[],
            context: &mut context,
            proxies: &mut proxies,
        };
        assert!(builder.load_constant(1).is_err());
    }
}
