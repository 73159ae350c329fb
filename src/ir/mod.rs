//! Intermediate representation of method bodies.
//!
//! The loader lowers decoded bytecode into a flat list of [`Node`]s per method, the
//! dataflow resolver fills in every node's [`Io`], and the optional grouping pass folds
//! straight-line runs into [`Instruction::Group`] nodes before code generation.
//!
//! # Key Components
//!
//! - [`Instruction`] - Closed set of lowered operations and pseudo-instructions
//! - [`Node`] / [`Io`] / [`Operand`] - Instructions with their resolved stack effect
//! - [`Effect`] - Stack effect computation used by the resolver
//! - [`group_instructions`] - The grouping pass

mod group;
mod instruction;
mod stack;

pub use group::{group_instructions, MIN_GROUP_LEN};
pub use instruction::{
    ArithOp, ArrayKind, CompareOp, Condition, ConstValue, Conversion, EntryId, FieldKind, FieldRef,
    Instruction, InvokeKind, Io, JumpKind, LambdaTarget, MethodRef, Node, Operand, StackOp,
};
pub use stack::Effect;
