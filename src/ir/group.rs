//! Grouping of straight-line instruction runs.
//!
//! A group is a run of at least three instructions that starts with a value producer and
//! contains no label or exception region boundary. A jump may close a group as its last
//! member. Code generation keeps the values flowing inside a group in C++ locals instead
//! of the frame's operand stack, and spills the live ones before a closing jump.

use crate::ir::instruction::{Instruction, Io, Node};

/// Minimum number of members for a run to become a group.
pub const MIN_GROUP_LEN: usize = 3;

fn starts_group(node: &Node) -> bool {
    !node.outputs().is_empty()
        && !node.insn.is_jump()
        && !matches!(
            node.insn,
            Instruction::Label { .. } | Instruction::Try { .. } | Instruction::Catch { .. }
        )
}

fn is_boundary(node: &Node) -> bool {
    matches!(
        node.insn,
        Instruction::Label { .. } | Instruction::Try { .. } | Instruction::Catch { .. }
    )
}

fn ends_group(node: &Node) -> bool {
    node.insn.is_terminal() || node.insn.is_jump()
}

/// Replace every eligible run in `nodes` with a [`Instruction::Group`] node.
#[must_use]
pub fn group_instructions(nodes: Vec<Node>) -> Vec<Node> {
    let mut spans = Vec::new();
    let mut index = 0;
    while index < nodes.len() {
        if starts_group(&nodes[index]) {
            let mut last = index;
            while last + 1 < nodes.len() && !ends_group(&nodes[last]) && !is_boundary(&nodes[last + 1]) {
                last += 1;
            }
            if last + 1 - index >= MIN_GROUP_LEN {
                spans.push((index, last));
                index = last + 1;
                continue;
            }
        }
        index += 1;
    }

    if spans.is_empty() {
        return nodes;
    }

    let mut grouped = Vec::with_capacity(nodes.len());
    let mut spans = spans.into_iter().peekable();
    let mut members = Vec::new();
    for (index, node) in nodes.into_iter().enumerate() {
        match spans.peek() {
            Some(&(start, end)) if index >= start => {
                members.push(node);
                if index == end {
                    let depth = members.first().and_then(|first| first.io.as_ref()).map_or(0, |io| io.depth);
                    grouped.push(Node {
                        insn: Instruction::Group(std::mem::take(&mut members)),
                        io: Some(Io {
                            depth,
                            inputs: Vec::new(),
                            outputs: Vec::new(),
                        }),
                    });
                    spans.next();
                }
            }
            _ => grouped.push(node),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::instruction::{ArithOp, Condition, ConstValue, JumpKind, Operand},
        model::types::BasicType,
    };

    fn node(insn: Instruction, inputs: &[u32], outputs: &[u32]) -> Node {
        let entry = |id: &u32| Operand {
            id: *id,
            ty: BasicType::Int,
        };
        Node {
            insn,
            io: Some(Io {
                depth: 0,
                inputs: inputs.iter().map(entry).collect(),
                outputs: outputs.iter().map(entry).collect(),
            }),
        }
    }

    fn label(id: u32) -> Node {
        Node::new(Instruction::Label { id, location: None })
    }

    #[test]
    fn test_groups_straight_line_run() {
        let nodes = vec![
            label(0),
            node(Instruction::Const(ConstValue::Int(1)), &[], &[1]),
            node(Instruction::Const(ConstValue::Int(2)), &[], &[2]),
            node(
                Instruction::Arithmetic {
                    op: ArithOp::Add,
                    ty: BasicType::Int,
                },
                &[1, 2],
                &[3],
            ),
            node(Instruction::Return(Some(BasicType::Int)), &[3], &[]),
            label(5),
        ];

        let grouped = group_instructions(nodes);
        assert_eq!(grouped.len(), 3);
        match &grouped[1].insn {
            Instruction::Group(members) => assert_eq!(members.len(), 4),
            other => panic!("expected group, found {other:?}"),
        }
    }

    #[test]
    fn test_short_runs_stay() {
        let nodes = vec![
            node(Instruction::Const(ConstValue::Int(1)), &[], &[1]),
            node(Instruction::Return(Some(BasicType::Int)), &[1], &[]),
            label(2),
            node(Instruction::Const(ConstValue::Int(1)), &[], &[2]),
            node(Instruction::Const(ConstValue::Int(1)), &[], &[3]),
        ];
        let grouped = group_instructions(nodes.clone());
        assert_eq!(grouped, nodes);
    }

    #[test]
    fn test_group_stops_before_label() {
        let nodes = vec![
            node(Instruction::Const(ConstValue::Int(1)), &[], &[1]),
            node(Instruction::Const(ConstValue::Int(2)), &[], &[2]),
            node(Instruction::Stack(crate::ir::StackOp::Pop), &[2], &[]),
            label(3),
            node(Instruction::Return(Some(BasicType::Int)), &[1], &[]),
        ];
        let grouped = group_instructions(nodes);
        assert_eq!(grouped.len(), 3);
        assert!(matches!(grouped[0].insn, Instruction::Group(_)));
        assert!(matches!(grouped[1].insn, Instruction::Label { id: 3, .. }));
    }

    #[test]
    fn test_jump_closes_group() {
        let nodes = vec![
            node(Instruction::Const(ConstValue::Int(1)), &[], &[1]),
            node(Instruction::Const(ConstValue::Int(2)), &[], &[2]),
            node(
                Instruction::Jump {
                    kind: JumpKind::IfICmp(Condition::Lt),
                    target: 4,
                },
                &[1, 2],
                &[],
            ),
            node(Instruction::Const(ConstValue::Int(3)), &[], &[3]),
            node(Instruction::Return(Some(BasicType::Int)), &[3], &[]),
            label(4),
        ];
        let grouped = group_instructions(nodes);
        assert_eq!(grouped.len(), 4);
        match &grouped[0].insn {
            Instruction::Group(members) => {
                assert_eq!(members.len(), 3);
                assert!(members[2].insn.is_jump());
            }
            other => panic!("expected group, found {other:?}"),
        }
        assert!(matches!(grouped[1].insn, Instruction::Const(ConstValue::Int(3))));
    }
}
