//! JVM bytecode disassembler.
//!
//! This module decodes the `code` array of a `Code` attribute into a flat list of
//! instructions. Decoding is driven by a static opcode table that describes the immediate
//! operand layout and control flow of every defined opcode; the decoder itself only knows
//! how to read each operand layout.
//!
//! # Key Types
//! - [`Instruction`] - A decoded instruction with absolute branch targets
//! - [`Operand`] - Immediate operands (locals, constants, targets, switch tables)
//! - [`FlowType`] - How instructions affect control flow
//! - [`OffsetSet`] - Bitfield set of code offsets
//!
//! # Main Functions
//! - [`decode_instruction`] - Decode a single instruction
//! - [`decode_stream`] - Decode and validate a complete code array
//!
//! # Example
//! ```rust
//! use clearwing::disassembler::{decode_stream, Operand};
//!
//! let code = &[0x1A, 0x9A, 0x00, 0x04, 0x04, 0xAC]; // iload_0, ifne +4, iconst_1, ireturn
//! let instructions = decode_stream(code)?;
//! assert_eq!(instructions[1].mnemonic, "ifne");
//! assert_eq!(instructions[1].operand, Operand::Branch(5));
//! # Ok::<(), clearwing::Error>(())
//! ```

mod decoder;
mod offsets;
pub mod opcodes;

pub use decoder::{decode_instruction, decode_stream, implicit_local, Instruction, Operand};
pub use offsets::OffsetSet;
pub use opcodes::{FlowType, OpcodeInfo, OperandType};
