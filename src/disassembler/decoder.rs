//! Table-driven bytecode decoder.

use std::fmt;

use crate::{
    disassembler::{
        offsets::OffsetSet,
        opcodes::{code, lookup, FlowType, OperandType},
    },
    file::parser::Parser,
    Error, Result,
};

/// Immediate operands of a decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// No operands
    None,
    /// `bipush` value
    Byte(i8),
    /// `sipush` value
    Short(i16),
    /// Local variable index
    Local(u16),
    /// `iinc` local and increment
    Increment {
        /// Local variable index
        local: u16,
        /// Signed increment
        amount: i16,
    },
    /// Constant pool index
    Constant(u16),
    /// `invokeinterface` reference and argument slot count
    InvokeInterface {
        /// Constant pool index of the method reference
        index: u16,
        /// Argument slots including the receiver
        count: u8,
    },
    /// `invokedynamic` call site index
    InvokeDynamic(u16),
    /// `newarray` primitive type code
    NewArray(u8),
    /// `multianewarray` class and dimension count
    MultiNewArray {
        /// Constant pool index of the array class
        index: u16,
        /// Number of dimensions to allocate
        dims: u8,
    },
    /// Absolute branch target
    Branch(u32),
    /// `tableswitch` with absolute targets
    Table {
        /// Default target
        default: u32,
        /// Key of the first target
        low: i32,
        /// Targets for keys `low..`
        targets: Vec<u32>,
    },
    /// `lookupswitch` with absolute targets
    Lookup {
        /// Default target
        default: u32,
        /// `(key, target)` pairs in ascending key order
        pairs: Vec<(i32, u32)>,
    },
}

/// One decoded bytecode instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Offset of the opcode within the code array
    pub offset: u32,
    /// Encoded length in bytes, including a `wide` prefix
    pub size: u32,
    /// Opcode, the modified opcode for `wide` forms
    pub opcode: u8,
    /// Lowercase mnemonic
    pub mnemonic: &'static str,
    /// Control flow behaviour
    pub flow: FlowType,
    /// Immediate operands
    pub operand: Operand,
}

impl Instruction {
    /// Every offset this instruction may transfer control to, excluding fall-through.
    #[must_use]
    pub fn branch_targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Branch(target) => vec![*target],
            Operand::Table {
                default, targets, ..
            } => std::iter::once(*default)
                .chain(targets.iter().copied())
                .collect(),
            Operand::Lookup { default, pairs } => std::iter::once(*default)
                .chain(pairs.iter().map(|(_, target)| *target))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether execution can continue with the next instruction.
    #[must_use]
    pub fn falls_through(&self) -> bool {
        matches!(
            self.flow,
            FlowType::Sequential | FlowType::ConditionalBranch
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}: {}", self.offset, self.mnemonic)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Byte(value) => write!(f, " {}", value),
            Operand::Short(value) => write!(f, " {}", value),
            Operand::Local(local) => write!(f, " {}", local),
            Operand::Increment { local, amount } => write!(f, " {} {}", local, amount),
            Operand::Constant(index) | Operand::InvokeDynamic(index) => write!(f, " #{}", index),
            Operand::InvokeInterface { index, count } => write!(f, " #{} {}", index, count),
            Operand::NewArray(kind) => write!(f, " {}", kind),
            Operand::MultiNewArray { index, dims } => write!(f, " #{} {}", index, dims),
            Operand::Branch(target) => write!(f, " {}", target),
            Operand::Table {
                default,
                low,
                targets,
            } => write!(f, " {}..: {:?} default {}", low, targets, default),
            Operand::Lookup { default, pairs } => write!(f, " {:?} default {}", pairs, default),
        }
    }
}

fn relative(base: u32, delta: i32) -> Result<u32> {
    let target = i64::from(base) + i64::from(delta);
    u32::try_from(target).map_err(|_| malformed_error!("Branch target {} out of range", target))
}

/// Decode the instruction at the current parser position.
///
/// The parser must be positioned relative to the start of the code array, so that the
/// switch padding can be computed from its position.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for undefined opcodes, [`crate::Error::Unsupported`]
/// for `jsr`, `jsr_w` and `ret`, and [`crate::Error::OutOfBounds`] for truncated operands.
pub fn decode_instruction(parser: &mut Parser) -> Result<Instruction> {
    let start = parser.pos();
    let offset = u32::try_from(start).map_err(|_| malformed_error!("Code too large"))?;
    let mut opcode = parser.read_be::<u8>()?;

    let Some(mut info) = lookup(opcode) else {
        return Err(malformed_error!(
            "Invalid opcode {:#04x} at offset {}",
            opcode,
            offset
        ));
    };

    if info.flow == FlowType::Subroutine {
        return Err(Error::Unsupported(format!(
            "{} at offset {}",
            info.mnemonic, offset
        )));
    }

    let mut wide = false;
    if info.operands == OperandType::Wide {
        opcode = parser.read_be::<u8>()?;
        info = match lookup(opcode) {
            Some(modified) if matches!(modified.operands, OperandType::Local | OperandType::Increment) => {
                modified
            }
            _ => {
                return Err(malformed_error!(
                    "Invalid wide opcode {:#04x} at offset {}",
                    opcode,
                    offset
                ))
            }
        };
        if info.flow == FlowType::Subroutine {
            return Err(Error::Unsupported(format!("wide ret at offset {}", offset)));
        }
        wide = true;
    }

    let operand = match info.operands {
        OperandType::None | OperandType::Wide => Operand::None,
        OperandType::Byte => Operand::Byte(parser.read_be::<i8>()?),
        OperandType::Short => Operand::Short(parser.read_be::<i16>()?),
        OperandType::Local => Operand::Local(if wide {
            parser.read_be::<u16>()?
        } else {
            u16::from(parser.read_be::<u8>()?)
        }),
        OperandType::Increment => {
            if wide {
                Operand::Increment {
                    local: parser.read_be::<u16>()?,
                    amount: parser.read_be::<i16>()?,
                }
            } else {
                Operand::Increment {
                    local: u16::from(parser.read_be::<u8>()?),
                    amount: i16::from(parser.read_be::<i8>()?),
                }
            }
        }
        OperandType::ConstantByte => Operand::Constant(u16::from(parser.read_be::<u8>()?)),
        OperandType::Constant => Operand::Constant(parser.read_be::<u16>()?),
        OperandType::InvokeInterface => {
            let index = parser.read_be::<u16>()?;
            let count = parser.read_be::<u8>()?;
            parser.advance_by(1)?;
            Operand::InvokeInterface { index, count }
        }
        OperandType::InvokeDynamic => {
            let index = parser.read_be::<u16>()?;
            parser.advance_by(2)?;
            Operand::InvokeDynamic(index)
        }
        OperandType::ArrayType => Operand::NewArray(parser.read_be::<u8>()?),
        OperandType::MultiArray => Operand::MultiNewArray {
            index: parser.read_be::<u16>()?,
            dims: parser.read_be::<u8>()?,
        },
        OperandType::Branch => Operand::Branch(relative(
            offset,
            i32::from(parser.read_be::<i16>()?),
        )?),
        OperandType::BranchWide => Operand::Branch(relative(offset, parser.read_be::<i32>()?)?),
        OperandType::TableSwitch => {
            parser.align(4)?;
            let default = relative(offset, parser.read_be::<i32>()?)?;
            let low = parser.read_be::<i32>()?;
            let high = parser.read_be::<i32>()?;
            if high < low {
                return Err(malformed_error!(
                    "Invalid tableswitch range {}..{} at offset {}",
                    low,
                    high,
                    offset
                ));
            }
            let count = usize::try_from(i64::from(high) - i64::from(low) + 1)
                .map_err(|_| malformed_error!("Invalid tableswitch range"))?;
            if count > parser.len() {
                return Err(out_of_bounds_error!());
            }
            let mut targets = Vec::with_capacity(count);
            for _ in 0..count {
                targets.push(relative(offset, parser.read_be::<i32>()?)?);
            }
            Operand::Table {
                default,
                low,
                targets,
            }
        }
        OperandType::LookupSwitch => {
            parser.align(4)?;
            let default = relative(offset, parser.read_be::<i32>()?)?;
            let count = parser.read_be::<i32>()?;
            let count = usize::try_from(count)
                .map_err(|_| malformed_error!("Negative lookupswitch count at offset {}", offset))?;
            if count > parser.len() {
                return Err(out_of_bounds_error!());
            }
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let key = parser.read_be::<i32>()?;
                pairs.push((key, relative(offset, parser.read_be::<i32>()?)?));
            }
            Operand::Lookup { default, pairs }
        }
    };

    let size = u32::try_from(parser.pos() - start).map_err(|_| malformed_error!("Code too large"))?;

    Ok(Instruction {
        offset,
        size,
        opcode,
        mnemonic: info.mnemonic,
        flow: info.flow,
        operand,
    })
}

/// Decode a complete code array.
///
/// Every branch target must be the start of an instruction.
///
/// # Errors
/// Returns the errors of [`decode_instruction`], and [`crate::Error::Malformed`] for
/// branches into the middle of an instruction or past the end of the code.
pub fn decode_stream(code: &[u8]) -> Result<Vec<Instruction>> {
    let mut parser = Parser::new(code);
    let mut boundaries = OffsetSet::new(code.len());
    let mut instructions = Vec::new();

    while parser.has_more_data() {
        boundaries.insert(parser.pos());
        instructions.push(decode_instruction(&mut parser)?);
    }

    for instruction in &instructions {
        for target in instruction.branch_targets() {
            if !boundaries.contains(target as usize) {
                return Err(malformed_error!(
                    "Branch from {} to {} does not start an instruction",
                    instruction.offset,
                    target
                ));
            }
        }
    }

    if let Some(last) = instructions.last() {
        if last.falls_through() {
            return Err(malformed_error!(
                "Execution falls off the end of the code at offset {}",
                last.offset
            ));
        }
    }

    Ok(instructions)
}

/// Whether `opcode` is a load or store with the local index folded into the opcode.
#[must_use]
pub fn implicit_local(opcode: u8) -> Option<u16> {
    match opcode {
        code::ILOAD_0..=code::ALOAD_3 => Some(u16::from((opcode - code::ILOAD_0) % 4)),
        code::ISTORE_0..=code::ASTORE_3 => Some(u16::from((opcode - code::ISTORE_0) % 4)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Instruction {
        decode_instruction(&mut Parser::new(bytes)).unwrap()
    }

    #[test]
    fn test_simple_operands() {
        assert_eq!(decode(&[0x10, 0xFF]).operand, Operand::Byte(-1));
        assert_eq!(decode(&[0x11, 0x01, 0x00]).operand, Operand::Short(256));
        assert_eq!(decode(&[0x15, 0x07]).operand, Operand::Local(7));
        assert_eq!(decode(&[0x12, 0x05]).operand, Operand::Constant(5));
        assert_eq!(
            decode(&[0x84, 0x01, 0xFE]).operand,
            Operand::Increment {
                local: 1,
                amount: -2
            }
        );
        assert_eq!(
            decode(&[0xB9, 0x00, 0x09, 0x02, 0x00]).operand,
            Operand::InvokeInterface { index: 9, count: 2 }
        );
        assert_eq!(decode(&[0xBA, 0x00, 0x03, 0x00, 0x00]).size, 5);
    }

    #[test]
    fn test_wide() {
        let insn = decode(&[0xC4, 0x15, 0x01, 0x00]);
        assert_eq!(insn.opcode, 0x15);
        assert_eq!(insn.mnemonic, "iload");
        assert_eq!(insn.operand, Operand::Local(256));
        assert_eq!(insn.size, 4);

        let insn = decode(&[0xC4, 0x84, 0x00, 0x02, 0x10, 0x00]);
        assert_eq!(
            insn.operand,
            Operand::Increment {
                local: 2,
                amount: 4096
            }
        );

        assert!(decode_instruction(&mut Parser::new(&[0xC4, 0x60])).is_err());
    }

    #[test]
    fn test_branches() {
        let code = [0x00, 0xA7, 0xFF, 0xFF];
        let mut parser = Parser::new(&code);
        parser.advance_by(1).unwrap();
        let insn = decode_instruction(&mut parser).unwrap();
        assert_eq!(insn.operand, Operand::Branch(0));
        assert_eq!(insn.branch_targets(), vec![0]);
        assert!(!insn.falls_through());
    }

    #[test]
    fn test_tableswitch_padding() {
        // iload_0; tableswitch at offset 1, padded to 4; targets relative to 1
        let code = [
            0x1A, 0xAA, 0x00, 0x00, // opcode + 2 pad bytes
            0x00, 0x00, 0x00, 0x17, // default -> 24
            0x00, 0x00, 0x00, 0x01, // low
            0x00, 0x00, 0x00, 0x02, // high
            0x00, 0x00, 0x00, 0x17, // 1 -> 24
            0x00, 0x00, 0x00, 0x17, // 2 -> 24
            0xB1, // return
        ];
        let instructions = decode_stream(&code).unwrap();
        assert_eq!(instructions.len(), 3);
        match &instructions[1].operand {
            Operand::Table {
                default,
                low,
                targets,
            } => {
                assert_eq!(*default, 24);
                assert_eq!(*low, 1);
                assert_eq!(targets, &vec![24, 24]);
            }
            other => panic!("unexpected operand {other:?}"),
        }
        assert_eq!(instructions[2].offset, 24);
    }

    #[test]
    fn test_lookupswitch() {
        let code = [
            0x1A, 0xAB, 0x00, 0x00, // iload_0, lookupswitch, pad
            0x00, 0x00, 0x00, 0x13, // default -> 20
            0x00, 0x00, 0x00, 0x01, // one pair
            0x00, 0x00, 0x00, 0x2A, // key 42
            0x00, 0x00, 0x00, 0x13, // -> 20
            0xB1, // return at 20
        ];
        let instructions = decode_stream(&code).unwrap();
        assert_eq!(
            instructions[1].operand,
            Operand::Lookup {
                default: 20,
                pairs: vec![(42, 20)]
            }
        );
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(
            decode_instruction(&mut Parser::new(&[0xA8, 0x00, 0x03])),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            decode_instruction(&mut Parser::new(&[0xA9, 0x01])),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            decode_instruction(&mut Parser::new(&[0xCA])),
            Err(Error::Malformed { .. })
        ));
        assert!(matches!(
            decode_instruction(&mut Parser::new(&[0x11, 0x00])),
            Err(Error::OutOfBounds)
        ));
    }

    #[test]
    fn test_stream_validation() {
        // goto into the middle of sipush
        assert!(decode_stream(&[0xA7, 0x00, 0x04, 0x11, 0x00, 0x01, 0xB1]).is_err());
        // falls off the end
        assert!(decode_stream(&[0x00]).is_err());
        assert_eq!(decode_stream(&[0x00, 0xB1]).unwrap().len(), 2);
    }

    #[test]
    fn test_implicit_local() {
        assert_eq!(implicit_local(0x1A), Some(0));
        assert_eq!(implicit_local(0x2D), Some(3));
        assert_eq!(implicit_local(0x3F), Some(0));
        assert_eq!(implicit_local(0x15), None);
    }
}
