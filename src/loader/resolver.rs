//! Dataflow resolution of operand stack entries.
//!
//! The resolver walks the control flow graph of a method body with an abstract operand
//! stack, starting at the first instruction with an empty stack. Each instruction is
//! resolved once: its depth is recorded and its consumed and produced entries are attached
//! as an [`Io`]. Branches continue with a copy of the stack at every target, and an
//! exception region start continues at its handler with a single reference entry (the
//! caught exception). Reaching an already resolved instruction with a different depth is an
//! error, as is consuming more entries than the stack holds.
//!
//! Every produced entry gets a fresh id, unique within the method. The grouping pass uses
//! these ids to track values between instructions.

use rustc_hash::FxHashMap;

use crate::{
    ir::{Effect, Instruction, Io, Node, Operand},
    model::{types::BasicType, MethodBody},
    Error, Result,
};

struct Resolver<'a> {
    class: &'a str,
    method: &'a str,
    labels: FxHashMap<u32, usize>,
    next_id: u32,
}

impl Resolver<'_> {
    fn fresh(&mut self, ty: BasicType) -> Operand {
        let id = self.next_id;
        self.next_id += 1;
        Operand { id, ty }
    }

    fn label(&self, label: u32) -> Result<usize> {
        self.labels
            .get(&label)
            .copied()
            .ok_or_else(|| Error::MissingLabel {
                method: self.method.to_string(),
                label,
            })
    }

    /// Resolve the straight-line run starting at `index`, returning the branches it spawns.
    fn walk(
        &mut self,
        body: &mut MethodBody,
        mut index: usize,
        mut stack: Vec<Operand>,
    ) -> Result<Vec<(usize, Vec<Operand>)>> {
        let mut pending = Vec::new();

        while index < body.nodes.len() {
            let node = &body.nodes[index];
            if let Some(io) = &node.io {
                if io.depth != stack.len() {
                    return Err(Error::StackMismatch {
                        class: self.class.to_string(),
                        method: self.method.to_string(),
                        index,
                        expected: io.depth,
                        found: stack.len(),
                    });
                }
                break;
            }

            let effect = node.insn.stack_effect(&stack);
            let needed = effect.inputs();
            if needed > stack.len() {
                return Err(Error::StackUnderflow {
                    class: self.class.to_string(),
                    method: self.method.to_string(),
                    index,
                    needed,
                    available: stack.len(),
                });
            }

            let depth = stack.len();
            let inputs = stack.split_off(depth - needed);
            let outputs: Vec<Operand> = match effect {
                Effect::Produce { outputs, .. } => {
                    outputs.into_iter().map(|ty| self.fresh(ty)).collect()
                }
                Effect::Shuffle { order, .. } => order
                    .into_iter()
                    .map(|position| self.fresh(inputs[position].ty))
                    .collect(),
            };
            stack.extend_from_slice(&outputs);

            let node = &mut body.nodes[index];
            node.io = Some(Io {
                depth,
                inputs,
                outputs,
            });

            match &node.insn {
                Instruction::Try { frame } => {
                    let handler = body.frames[*frame].handler;
                    let caught = self.fresh(BasicType::Object);
                    pending.push((self.label(handler)?, vec![caught]));
                }
                insn if insn.is_jump() => {
                    for target in insn.jump_targets() {
                        pending.push((self.label(target)?, stack.clone()));
                    }
                }
                _ => {}
            }

            if body.nodes[index].insn.is_terminal() {
                break;
            }
            index += 1;
        }

        Ok(pending)
    }
}

fn labels(nodes: &[Node]) -> FxHashMap<u32, usize> {
    let mut labels = FxHashMap::default();
    for (index, node) in nodes.iter().enumerate() {
        if let Instruction::Label { id, .. } = node.insn {
            labels.entry(id).or_insert(index);
        }
    }
    labels
}

/// Resolve the stack effect of every reachable instruction in `body`.
///
/// `class` and `method` only name the method in errors.
///
/// # Errors
/// Returns [`Error::StackUnderflow`] or [`Error::StackMismatch`] for inconsistent stack
/// shapes, [`Error::MissingLabel`] for branches to unknown labels and
/// [`Error::DataflowUnresolved`] if an instruction other than a label, line number or
/// region marker is unreachable.
pub fn resolve(body: &mut MethodBody, class: &str, method: &str) -> Result<()> {
    let mut resolver = Resolver {
        class,
        method,
        labels: labels(&body.nodes),
        next_id: 0,
    };

    let mut worklist = vec![(0, Vec::new())];
    while let Some((index, stack)) = worklist.pop() {
        let spawned = resolver.walk(body, index, stack)?;
        worklist.extend(spawned.into_iter().rev());
    }

    if let Some(index) = body
        .nodes
        .iter()
        .position(|node| node.io.is_none() && !node.insn.is_pseudo())
    {
        return Err(Error::DataflowUnresolved {
            class: class.to_string(),
            method: method.to_string(),
            index,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{ArithOp, ConstValue, Condition, JumpKind, StackOp},
        model::ExceptionFrame,
    };

    fn body(insns: Vec<Instruction>) -> MethodBody {
        MethodBody {
            nodes: insns.into_iter().map(Node::new).collect(),
            ..MethodBody::default()
        }
    }

    fn label(id: u32) -> Instruction {
        Instruction::Label { id, location: None }
    }

    fn load(local: u16) -> Instruction {
        Instruction::Load {
            ty: BasicType::Int,
            local,
        }
    }

    #[test]
    fn test_linear_resolution() {
        let mut body = body(vec![
            load(0),
            load(1),
            Instruction::Arithmetic {
                op: ArithOp::Add,
                ty: BasicType::Int,
            },
            Instruction::Return(Some(BasicType::Int)),
        ]);
        resolve(&mut body, "a/Foo", "a/Foo:add").unwrap();

        let add = body.nodes[2].io.as_ref().unwrap();
        assert_eq!(add.depth, 2);
        assert_eq!(add.inputs.len(), 2);
        assert_eq!(add.inputs[0].id, body.nodes[0].outputs()[0].id);
        assert_eq!(add.inputs[1].id, body.nodes[1].outputs()[0].id);
        assert_eq!(body.nodes[3].inputs()[0].id, add.outputs[0].id);
    }

    #[test]
    fn test_branches_resolved_with_stack_copy() {
        let mut body = body(vec![
            load(0),
            Instruction::Jump {
                kind: JumpKind::If(Condition::Eq),
                target: 9,
            },
            Instruction::Const(ConstValue::Int(1)),
            Instruction::Return(Some(BasicType::Int)),
            label(9),
            Instruction::Const(ConstValue::Int(0)),
            Instruction::Return(Some(BasicType::Int)),
        ]);
        resolve(&mut body, "a/Foo", "a/Foo:test").unwrap();
        assert!(body.nodes.iter().all(|node| node.io.is_some()));
        assert_eq!(body.nodes[4].io.as_ref().unwrap().depth, 0);
    }

    #[test]
    fn test_handler_receives_exception() {
        let mut body = body(vec![
            label(0),
            Instruction::Try { frame: 0 },
            Instruction::Const(ConstValue::Null),
            Instruction::Throw,
            label(2),
            Instruction::Catch { frame: 0 },
            label(3),
            Instruction::Stack(StackOp::Pop),
            Instruction::Return(None),
        ]);
        body.frames.push(ExceptionFrame {
            index: 0,
            start: 0,
            end: 2,
            handler: 3,
            catch_type: None,
            start_location: None,
            end_location: None,
        });
        resolve(&mut body, "a/Foo", "a/Foo:run").unwrap();

        assert_eq!(body.nodes[6].io.as_ref().unwrap().depth, 1);
        assert_eq!(body.nodes[7].inputs()[0].ty, BasicType::Object);
        assert!(body.nodes[4].io.is_none());
        assert!(body.nodes[5].io.is_none());
    }

    #[test]
    fn test_stack_underflow() {
        let mut body = body(vec![Instruction::Stack(StackOp::Pop), Instruction::Return(None)]);
        assert!(matches!(
            resolve(&mut body, "a/Foo", "a/Foo:bad"),
            Err(Error::StackUnderflow {
                index: 0,
                needed: 1,
                available: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_stack_mismatch() {
        let mut body = body(vec![
            load(0),
            Instruction::Jump {
                kind: JumpKind::If(Condition::Ne),
                target: 5,
            },
            load(1),
            label(5),
            Instruction::Return(None),
        ]);
        assert!(matches!(
            resolve(&mut body, "a/Foo", "a/Foo:bad"),
            Err(Error::StackMismatch { .. })
        ));
    }

    #[test]
    fn test_unreachable_instruction() {
        let mut body = body(vec![Instruction::Return(None), Instruction::Nop]);
        assert!(matches!(
            resolve(&mut body, "a/Foo", "a/Foo:dead"),
            Err(Error::DataflowUnresolved { index: 1, .. })
        ));
    }

    #[test]
    fn test_dup_gets_fresh_entries() {
        let mut body = body(vec![
            load(0),
            Instruction::Stack(StackOp::Dup),
            Instruction::Arithmetic {
                op: ArithOp::Mul,
                ty: BasicType::Int,
            },
            Instruction::Return(Some(BasicType::Int)),
        ]);
        resolve(&mut body, "a/Foo", "a/Foo:square").unwrap();
        let dup = body.nodes[1].io.as_ref().unwrap();
        assert_eq!(dup.inputs.len(), 1);
        assert_eq!(dup.outputs.len(), 2);
        assert_ne!(dup.outputs[0].id, dup.outputs[1].id);
    }
}
