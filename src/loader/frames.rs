//! Exception region markers and frame locations.
//!
//! Every exception table row gets a [`Instruction::Try`] right after its start label and a
//! [`Instruction::Catch`] right after its end label. Afterwards the body is split into
//! frame locations: each marker and each line number opens a new location, so the runtime
//! can tell from the current location which source line is executing and which regions are
//! active. Labels reached by a jump from a different location restore their own location.

use rustc_hash::FxHashMap;

use crate::{
    ir::{Instruction, Node},
    model::MethodBody,
    Error, Result,
};

fn label_positions(nodes: &[Node]) -> FxHashMap<u32, usize> {
    let mut positions = FxHashMap::default();
    for (index, node) in nodes.iter().enumerate() {
        if let Instruction::Label { id, .. } = node.insn {
            positions.entry(id).or_insert(index);
        }
    }
    positions
}

fn set_label_location(nodes: &mut [Node], index: usize, value: u32) {
    if let Instruction::Label { location, .. } = &mut nodes[index].insn {
        *location = Some(value);
    }
}

/// Insert region markers and assign frame locations in `body`.
///
/// # Errors
/// Returns [`Error::MissingLabel`] if an exception table row points at an offset without a
/// label.
pub fn materialize(body: &mut MethodBody, method: &str) -> Result<()> {
    let missing = |label: u32| Error::MissingLabel {
        method: method.to_string(),
        label,
    };

    for frame in &body.frames {
        let start = body.find_label(frame.start).ok_or_else(|| missing(frame.start))?;
        body.nodes
            .insert(start + 1, Node::new(Instruction::Try { frame: frame.index }));

        let end = body.nodes[start..]
            .iter()
            .position(|node| matches!(node.insn, Instruction::Label { id, .. } if id == frame.end))
            .map(|offset| start + offset)
            .ok_or_else(|| missing(frame.end))?;
        body.nodes
            .insert(end + 1, Node::new(Instruction::Catch { frame: frame.index }));
    }

    let labels = label_positions(&body.nodes);
    let label_at = |id: u32| labels.get(&id).copied().ok_or_else(|| missing(id));
    let mut instruction_locations = Vec::with_capacity(body.nodes.len());
    let mut current_line = 0;
    let mut current: Option<u32> = None;
    for index in 0..body.nodes.len() {
        let (starts, ends, line) = match body.nodes[index].insn {
            Instruction::Try { frame } => (Some(frame), None, None),
            Instruction::Catch { frame } => (None, Some(frame), None),
            Instruction::LineNumber { line, .. } => (None, None, Some(line)),
            _ => {
                instruction_locations.push(current);
                continue;
            }
        };

        let location = body.locations.len() as u32;
        if let Some(line) = line {
            current_line = line;
        }
        body.locations.push(current_line);
        current = Some(location);

        if let Some(frame) = starts {
            body.frames[frame].start_location = Some(location);
            set_label_location(&mut body.nodes, label_at(body.frames[frame].start)?, location);
        }
        if let Some(frame) = ends {
            body.frames[frame].end_location = Some(location);
            set_label_location(&mut body.nodes, label_at(body.frames[frame].end)?, location);
        }
        if let Instruction::LineNumber { location: slot, .. } = &mut body.nodes[index].insn {
            *slot = Some(location);
        }
        instruction_locations.push(current);
    }

    for index in 0..body.nodes.len() {
        let targets = match &body.nodes[index].insn {
            Instruction::Try { frame } => vec![body.frames[*frame].handler],
            insn => insn.jump_targets(),
        };
        for target in targets {
            let label = label_at(target)?;
            let unset = matches!(body.nodes[label].insn, Instruction::Label { location: None, .. });
            if let Some(location) = instruction_locations[label] {
                if unset && instruction_locations[index] != instruction_locations[label] {
                    set_label_location(&mut body.nodes, label, location);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{ConstValue, JumpKind},
        model::ExceptionFrame,
    };

    fn label(id: u32) -> Node {
        Node::new(Instruction::Label { id, location: None })
    }

    fn frame(start: u32, end: u32, handler: u32) -> ExceptionFrame {
        ExceptionFrame {
            index: 0,
            start,
            end,
            handler,
            catch_type: None,
            start_location: None,
            end_location: None,
        }
    }

    #[test]
    fn test_try_catch_markers() {
        let mut body = MethodBody {
            nodes: vec![
                label(1),
                Node::new(Instruction::Const(ConstValue::Null)),
                Node::new(Instruction::Throw),
                label(2),
                Node::new(Instruction::Return(None)),
                label(3),
                Node::new(Instruction::Stack(crate::ir::StackOp::Pop)),
                Node::new(Instruction::Return(None)),
            ],
            frames: vec![frame(1, 2, 3)],
            ..MethodBody::default()
        };
        materialize(&mut body, "a/Foo:run").unwrap();

        let tries: Vec<usize> = body
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node.insn, Instruction::Try { frame: 0 }))
            .map(|(index, _)| index)
            .collect();
        assert_eq!(tries, vec![1]);
        assert!(matches!(body.nodes[5].insn, Instruction::Catch { frame: 0 }));
        assert!(matches!(body.nodes[4].insn, Instruction::Label { id: 2, .. }));
        assert_eq!(body.frames[0].handler, 3);

        assert_eq!(body.frames[0].start_location, Some(0));
        assert_eq!(body.frames[0].end_location, Some(1));
        assert_eq!(body.locations, vec![0, 0]);
        assert!(matches!(body.nodes[0].insn, Instruction::Label { location: Some(0), .. }));
    }

    #[test]
    fn test_jump_into_other_location() {
        let mut body = MethodBody {
            nodes: vec![
                Node::new(Instruction::LineNumber {
                    line: 10,
                    location: None,
                }),
                Node::new(Instruction::Jump {
                    kind: JumpKind::Goto,
                    target: 7,
                }),
                Node::new(Instruction::LineNumber {
                    line: 11,
                    location: None,
                }),
                label(7),
                Node::new(Instruction::Return(None)),
            ],
            ..MethodBody::default()
        };
        materialize(&mut body, "a/Foo:run").unwrap();

        assert_eq!(body.locations, vec![10, 11]);
        assert!(matches!(
            body.nodes[2].insn,
            Instruction::LineNumber {
                line: 11,
                location: Some(1)
            }
        ));
        assert!(matches!(body.nodes[3].insn, Instruction::Label { id: 7, location: Some(1) }));
    }

    #[test]
    fn test_missing_label() {
        let mut body = MethodBody {
            nodes: vec![label(0), Node::new(Instruction::Return(None))],
            frames: vec![frame(0, 5, 0)],
            ..MethodBody::default()
        };
        assert!(matches!(
            materialize(&mut body, "a/Foo:run"),
            Err(Error::MissingLabel { label: 5, .. })
        ));
    }
}
