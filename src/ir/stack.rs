//! Stack effects of instructions.
//!
//! [`Instruction::stack_effect`] answers how many entries an instruction consumes and
//! what it produces, given the abstract stack in front of it. Most instructions have a
//! fixed effect; the `pop2`/`dup2` family depends on whether the top entries are wide.

use crate::{
    ir::instruction::{ArithOp, FieldKind, Instruction, InvokeKind, Operand, StackOp},
    model::types::BasicType,
};

/// What an instruction does to the operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Consume `inputs` entries and push new entries of the given types
    Produce {
        /// Consumed entry count
        inputs: usize,
        /// Types of the produced entries, deepest first
        outputs: Vec<BasicType>,
    },
    /// Consume `inputs` entries and push copies of them, by input position
    Shuffle {
        /// Consumed entry count
        inputs: usize,
        /// Input position of each produced entry, deepest first
        order: Vec<usize>,
    },
}

impl Effect {
    fn produce(inputs: usize, outputs: &[BasicType]) -> Effect {
        Effect::Produce {
            inputs,
            outputs: outputs.to_vec(),
        }
    }

    /// Number of consumed entries.
    #[must_use]
    pub fn inputs(&self) -> usize {
        match self {
            Effect::Produce { inputs, .. } | Effect::Shuffle { inputs, .. } => *inputs,
        }
    }
}

fn wide_at(stack: &[Operand], from_top: usize) -> bool {
    stack.len() >= from_top && stack[stack.len() - from_top].ty.is_wide()
}

impl StackOp {
    /// Consumed entry count and output order for the stack in front of the operation.
    #[must_use]
    pub fn shuffle(self, stack: &[Operand]) -> (usize, Vec<usize>) {
        match self {
            StackOp::Pop => (1, vec![]),
            StackOp::Pop2 if wide_at(stack, 1) => (1, vec![]),
            StackOp::Pop2 => (2, vec![]),
            StackOp::Dup => (1, vec![0, 0]),
            StackOp::DupX1 => (2, vec![1, 0, 1]),
            StackOp::DupX2 if wide_at(stack, 2) => (2, vec![1, 0, 1]),
            StackOp::DupX2 => (3, vec![2, 0, 1, 2]),
            StackOp::Dup2 if wide_at(stack, 1) => (1, vec![0, 0]),
            StackOp::Dup2 => (2, vec![0, 1, 0, 1]),
            StackOp::Dup2X1 if wide_at(stack, 1) => (2, vec![1, 0, 1]),
            StackOp::Dup2X1 => (3, vec![1, 2, 0, 1, 2]),
            StackOp::Dup2X2 if wide_at(stack, 1) && wide_at(stack, 2) => (2, vec![1, 0, 1]),
            StackOp::Dup2X2 if wide_at(stack, 1) => (3, vec![2, 0, 1, 2]),
            StackOp::Dup2X2 if wide_at(stack, 3) => (3, vec![1, 2, 0, 1, 2]),
            StackOp::Dup2X2 => (4, vec![2, 3, 0, 1, 2, 3]),
            StackOp::Swap => (2, vec![1, 0]),
        }
    }

    /// Name of the runtime macro implementing the operation for the resolved inputs.
    #[must_use]
    pub fn macro_name(self, inputs: &[Operand]) -> &'static str {
        let top_wide = inputs.last().is_some_and(|entry| entry.ty.is_wide());
        match (self, inputs.len()) {
            (StackOp::Pop, _) => "INST_POP",
            (StackOp::Pop2, 2) => "INST_POP2_1",
            (StackOp::Pop2, _) => "INST_POP2_2",
            (StackOp::Dup, _) => "INST_DUP",
            (StackOp::DupX1, _) => "INST_DUP_X1",
            (StackOp::DupX2, 3) => "INST_DUP_X2_1",
            (StackOp::DupX2, _) => "INST_DUP_X2_2",
            (StackOp::Dup2, 2) => "INST_DUP2_1",
            (StackOp::Dup2, _) => "INST_DUP2_2",
            (StackOp::Dup2X1, 3) => "INST_DUP2_X1_1",
            (StackOp::Dup2X1, _) => "INST_DUP2_X1_2",
            (StackOp::Dup2X2, 4) => "INST_DUP2_X2_1",
            (StackOp::Dup2X2, 3) if top_wide => "INST_DUP2_X2_2",
            (StackOp::Dup2X2, 3) => "INST_DUP2_X2_3",
            (StackOp::Dup2X2, _) => "INST_DUP2_X2_4",
            (StackOp::Swap, _) => "INST_SWAP",
        }
    }
}

impl Instruction {
    /// The stack effect of the instruction in front of `stack` (top entry last).
    ///
    /// `stack` is only inspected by the `pop2`/`dup2` family; every other instruction has
    /// a fixed effect. The caller checks the consumed count against the depth.
    #[must_use]
    pub fn stack_effect(&self, stack: &[Operand]) -> Effect {
        use BasicType::{Int, Object};

        match self {
            Instruction::Label { .. }
            | Instruction::LineNumber { .. }
            | Instruction::Try { .. }
            | Instruction::Catch { .. }
            | Instruction::Nop
            | Instruction::Increment { .. }
            | Instruction::LambdaProxy { .. }
            | Instruction::Group(_) => Effect::produce(0, &[]),
            Instruction::Const(value) => Effect::produce(0, &[value.basic()]),
            Instruction::Load { ty, .. } => Effect::produce(0, &[*ty]),
            Instruction::Store { .. } => Effect::produce(1, &[]),
            Instruction::ArrayLoad(kind) => Effect::produce(2, &[kind.basic()]),
            Instruction::ArrayStore(_) => Effect::produce(3, &[]),
            Instruction::Stack(op) => {
                let (inputs, order) = op.shuffle(stack);
                Effect::Shuffle { inputs, order }
            }
            Instruction::Arithmetic { op, ty } => {
                let inputs = if *op == ArithOp::Neg { 1 } else { 2 };
                Effect::produce(inputs, &[*ty])
            }
            Instruction::Convert(conversion) => Effect::produce(1, &[conversion.types().1]),
            Instruction::Compare(_) => Effect::produce(2, &[Int]),
            Instruction::Jump { kind, .. } => Effect::produce(kind.operand_types().len(), &[]),
            Instruction::Switch { .. } => Effect::produce(1, &[]),
            Instruction::Return(ty) => Effect::produce(usize::from(ty.is_some()), &[]),
            Instruction::Throw | Instruction::MonitorEnter | Instruction::MonitorExit => {
                Effect::produce(1, &[])
            }
            Instruction::Field { kind, field, .. } => {
                let value = field.ty.basic().unwrap_or(Object);
                match kind {
                    FieldKind::GetStatic => Effect::produce(0, &[value]),
                    FieldKind::PutStatic => Effect::produce(1, &[]),
                    FieldKind::GetField => Effect::produce(1, &[value]),
                    FieldKind::PutField => Effect::produce(2, &[]),
                }
            }
            Instruction::Invoke { kind, method, .. } => {
                let receiver = usize::from(*kind != InvokeKind::Static);
                let outputs: Vec<BasicType> = method.sig.ret.basic().into_iter().collect();
                Effect::Produce {
                    inputs: method.sig.params.len() + receiver,
                    outputs,
                }
            }
            Instruction::New(_) => Effect::produce(0, &[Object]),
            Instruction::NewArray(_) | Instruction::ANewArray(_) => Effect::produce(1, &[Object]),
            Instruction::MultiNewArray { dims, .. } => Effect::produce(usize::from(*dims), &[Object]),
            Instruction::ArrayLength => Effect::produce(1, &[Int]),
            Instruction::CheckCast(_) => Effect::produce(1, &[Object]),
            Instruction::InstanceOf(_) => Effect::produce(1, &[Int]),
            Instruction::InvokeDynamic { captures, .. } => Effect::produce(captures.len(), &[Object]),
            Instruction::StringConcat { args, .. } => Effect::produce(args.len(), &[Object]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::instruction::MethodRef,
        model::types::MethodSignature,
    };

    fn entries(types: &[BasicType]) -> Vec<Operand> {
        types
            .iter()
            .enumerate()
            .map(|(id, ty)| Operand { id: id as u32, ty: *ty })
            .collect()
    }

    #[test]
    fn test_dup2_forms() {
        let narrow = entries(&[BasicType::Int, BasicType::Int]);
        assert_eq!(StackOp::Dup2.shuffle(&narrow), (2, vec![0, 1, 0, 1]));
        assert_eq!(StackOp::Dup2.macro_name(&narrow), "INST_DUP2_1");

        let wide = entries(&[BasicType::Long]);
        assert_eq!(StackOp::Dup2.shuffle(&wide), (1, vec![0, 0]));
        assert_eq!(StackOp::Dup2.macro_name(&wide), "INST_DUP2_2");
        assert_eq!(StackOp::Pop2.shuffle(&wide), (1, vec![]));
        assert_eq!(StackOp::Pop2.macro_name(&wide), "INST_POP2_2");
    }

    #[test]
    fn test_dup2_x2_forms() {
        let form1 = entries(&[BasicType::Int; 4]);
        assert_eq!(StackOp::Dup2X2.shuffle(&form1).0, 4);
        assert_eq!(StackOp::Dup2X2.macro_name(&form1), "INST_DUP2_X2_1");

        let form2 = entries(&[BasicType::Int, BasicType::Int, BasicType::Double]);
        assert_eq!(StackOp::Dup2X2.shuffle(&form2), (3, vec![2, 0, 1, 2]));
        assert_eq!(StackOp::Dup2X2.macro_name(&form2), "INST_DUP2_X2_2");

        let form3 = entries(&[BasicType::Long, BasicType::Int, BasicType::Int]);
        assert_eq!(StackOp::Dup2X2.shuffle(&form3), (3, vec![1, 2, 0, 1, 2]));
        assert_eq!(StackOp::Dup2X2.macro_name(&form3), "INST_DUP2_X2_3");

        let form4 = entries(&[BasicType::Long, BasicType::Long]);
        assert_eq!(StackOp::Dup2X2.shuffle(&form4), (2, vec![1, 0, 1]));
        assert_eq!(StackOp::Dup2X2.macro_name(&form4), "INST_DUP2_X2_4");
    }

    #[test]
    fn test_invoke_effect() {
        let method = MethodRef {
            owner: "a/B".to_string(),
            name: "get".to_string(),
            desc: "(IJ)D".to_string(),
            sig: MethodSignature::parse("(IJ)D").unwrap(),
            interface: false,
        };
        let virtual_call = Instruction::Invoke {
            kind: InvokeKind::Virtual,
            method: method.clone(),
            resolved: None,
        };
        assert_eq!(
            virtual_call.stack_effect(&[]),
            Effect::Produce {
                inputs: 3,
                outputs: vec![BasicType::Double]
            }
        );

        let static_call = Instruction::Invoke {
            kind: InvokeKind::Static,
            method,
            resolved: None,
        };
        assert_eq!(static_call.stack_effect(&[]).inputs(), 2);
    }
}
