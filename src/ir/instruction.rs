//! The instruction set of lowered method bodies.
//!
//! Every bytecode maps onto exactly one [`Instruction`] variant; families of opcodes that
//! only differ in operand type share a variant (`iload`..`aload` become [`Instruction::Load`]).
//! Labels, line numbers and exception region markers are pseudo-instructions without a
//! stack effect. Call sites of `invokedynamic` lower to [`Instruction::InvokeDynamic`] and
//! [`Instruction::StringConcat`], and the synthesized proxy methods use
//! [`Instruction::LambdaProxy`] as their whole body.

use std::collections::BTreeSet;

use crate::model::types::{BasicType, JavaType, MethodSignature};

/// Id of an operand stack entry, unique within one method.
pub type EntryId = u32;

/// An abstract operand stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    /// Entry id, names the temporary in grouped code
    pub id: EntryId,
    /// Computational type
    pub ty: BasicType,
}

/// Stack effect of a resolved instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Io {
    /// Stack depth before the instruction, in entries
    pub depth: usize,
    /// Consumed entries, deepest first
    pub inputs: Vec<Operand>,
    /// Produced entries, deepest first
    pub outputs: Vec<Operand>,
}

/// An instruction together with its resolved stack effect.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The instruction
    pub insn: Instruction,
    /// Stack effect, `None` until the dataflow resolver reached the instruction
    pub io: Option<Io>,
}

impl Node {
    /// An unresolved node.
    #[must_use]
    pub fn new(insn: Instruction) -> Self {
        Node { insn, io: None }
    }

    /// Consumed entries, empty when unresolved.
    #[must_use]
    pub fn inputs(&self) -> &[Operand] {
        self.io.as_ref().map_or(&[], |io| io.inputs.as_slice())
    }

    /// Produced entries, empty when unresolved.
    #[must_use]
    pub fn outputs(&self) -> &[Operand] {
        self.io.as_ref().map_or(&[], |io| io.outputs.as_slice())
    }
}

/// A constant pushed by `aconst_null`, `xconst_n`, `bipush`, `sipush` or `ldc`.
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum ConstValue {
    Null,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Class(JavaType),
}

impl ConstValue {
    /// Stack type of the constant.
    #[must_use]
    pub fn basic(&self) -> BasicType {
        match self {
            ConstValue::Int(_) => BasicType::Int,
            ConstValue::Long(_) => BasicType::Long,
            ConstValue::Float(_) => BasicType::Float,
            ConstValue::Double(_) => BasicType::Double,
            ConstValue::Null | ConstValue::String(_) | ConstValue::Class(_) => BasicType::Object,
        }
    }
}

/// Element kind of an array load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ArrayKind {
    Int,
    Long,
    Float,
    Double,
    Object,
    /// `byte` and `boolean` arrays
    Byte,
    Char,
    Short,
}

impl ArrayKind {
    /// Stack type of an element.
    #[must_use]
    pub fn basic(self) -> BasicType {
        match self {
            ArrayKind::Long => BasicType::Long,
            ArrayKind::Float => BasicType::Float,
            ArrayKind::Double => BasicType::Double,
            ArrayKind::Object => BasicType::Object,
            ArrayKind::Int | ArrayKind::Byte | ArrayKind::Char | ArrayKind::Short => BasicType::Int,
        }
    }

    /// C++ type of an element in array storage.
    #[must_use]
    pub fn cpp_type(self) -> &'static str {
        match self {
            ArrayKind::Int => "jint",
            ArrayKind::Long => "jlong",
            ArrayKind::Float => "jfloat",
            ArrayKind::Double => "jdouble",
            ArrayKind::Object => "jobject",
            ArrayKind::Byte => "jbyte",
            ArrayKind::Char => "jchar",
            ArrayKind::Short => "jshort",
        }
    }

    /// Opcode prefix letter (`IALOAD`, `AASTORE`, ...).
    #[must_use]
    pub fn prefix(self) -> char {
        match self {
            ArrayKind::Int => 'I',
            ArrayKind::Long => 'L',
            ArrayKind::Float => 'F',
            ArrayKind::Double => 'D',
            ArrayKind::Object => 'A',
            ArrayKind::Byte => 'B',
            ArrayKind::Char => 'C',
            ArrayKind::Short => 'S',
        }
    }
}

/// Operand stack manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum StackOp {
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
}

/// Binary and unary arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Shl,
    Shr,
    Ushr,
    And,
    Or,
    Xor,
}

impl ArithOp {
    /// Opcode mnemonic without the type prefix.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
            ArithOp::Rem => "REM",
            ArithOp::Neg => "NEG",
            ArithOp::Shl => "SHL",
            ArithOp::Shr => "SHR",
            ArithOp::Ushr => "USHR",
            ArithOp::And => "AND",
            ArithOp::Or => "OR",
            ArithOp::Xor => "XOR",
        }
    }

    /// Whether the operation is a shift, whose second operand is always an int.
    #[must_use]
    pub fn is_shift(self) -> bool {
        matches!(self, ArithOp::Shl | ArithOp::Shr | ArithOp::Ushr)
    }
}

/// Primitive conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Conversion {
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
}

impl Conversion {
    /// Source and result stack types.
    #[must_use]
    pub fn types(self) -> (BasicType, BasicType) {
        use BasicType::{Double, Float, Int, Long};
        match self {
            Conversion::I2L => (Int, Long),
            Conversion::I2F => (Int, Float),
            Conversion::I2D => (Int, Double),
            Conversion::L2I => (Long, Int),
            Conversion::L2F => (Long, Float),
            Conversion::L2D => (Long, Double),
            Conversion::F2I => (Float, Int),
            Conversion::F2L => (Float, Long),
            Conversion::F2D => (Float, Double),
            Conversion::D2I => (Double, Int),
            Conversion::D2L => (Double, Long),
            Conversion::D2F => (Double, Float),
            Conversion::I2B | Conversion::I2C | Conversion::I2S => (Int, Int),
        }
    }

    /// Opcode mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            Conversion::I2L => "I2L",
            Conversion::I2F => "I2F",
            Conversion::I2D => "I2D",
            Conversion::L2I => "L2I",
            Conversion::L2F => "L2F",
            Conversion::L2D => "L2D",
            Conversion::F2I => "F2I",
            Conversion::F2L => "F2L",
            Conversion::F2D => "F2D",
            Conversion::D2I => "D2I",
            Conversion::D2L => "D2L",
            Conversion::D2F => "D2F",
            Conversion::I2B => "I2B",
            Conversion::I2C => "I2C",
            Conversion::I2S => "I2S",
        }
    }
}

/// Three-way comparison of longs, floats and doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CompareOp {
    Lcmp,
    Fcmpl,
    Fcmpg,
    Dcmpl,
    Dcmpg,
}

impl CompareOp {
    /// Type of both operands.
    #[must_use]
    pub fn operand_type(self) -> BasicType {
        match self {
            CompareOp::Lcmp => BasicType::Long,
            CompareOp::Fcmpl | CompareOp::Fcmpg => BasicType::Float,
            CompareOp::Dcmpl | CompareOp::Dcmpg => BasicType::Double,
        }
    }

    /// Opcode mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        match self {
            CompareOp::Lcmp => "LCMP",
            CompareOp::Fcmpl => "FCMPL",
            CompareOp::Fcmpg => "FCMPG",
            CompareOp::Dcmpl => "DCMPL",
            CompareOp::Dcmpg => "DCMPG",
        }
    }
}

/// Condition of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Condition {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl Condition {
    /// The C++ comparison operator.
    #[must_use]
    pub fn operator(self) -> &'static str {
        match self {
            Condition::Eq => "==",
            Condition::Ne => "!=",
            Condition::Lt => "<",
            Condition::Ge => ">=",
            Condition::Gt => ">",
            Condition::Le => "<=",
        }
    }
}

/// Branch flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Unconditional
    Goto,
    /// Compare an int against zero
    If(Condition),
    /// Compare two ints
    IfICmp(Condition),
    /// Compare two references (`Eq` or `Ne`)
    IfACmp(Condition),
    /// Branch if null
    IfNull,
    /// Branch if not null
    IfNonNull,
}

impl JumpKind {
    /// Types of the consumed operands, deepest first.
    #[must_use]
    pub fn operand_types(self) -> &'static [BasicType] {
        match self {
            JumpKind::Goto => &[],
            JumpKind::If(_) => &[BasicType::Int],
            JumpKind::IfICmp(_) => &[BasicType::Int, BasicType::Int],
            JumpKind::IfACmp(_) => &[BasicType::Object, BasicType::Object],
            JumpKind::IfNull | JumpKind::IfNonNull => &[BasicType::Object],
        }
    }
}

/// Field access flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum FieldKind {
    GetStatic,
    PutStatic,
    GetField,
    PutField,
}

impl FieldKind {
    /// Whether the access targets a static field.
    #[must_use]
    pub fn is_static(self) -> bool {
        matches!(self, FieldKind::GetStatic | FieldKind::PutStatic)
    }

    /// Whether the access reads the field.
    #[must_use]
    pub fn is_get(self) -> bool {
        matches!(self, FieldKind::GetStatic | FieldKind::GetField)
    }
}

/// Method invocation flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// A field referenced by an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Sanitized owner from the constant pool
    pub owner: String,
    /// Field name
    pub name: String,
    /// Field descriptor
    pub desc: String,
    /// Parsed descriptor
    pub ty: JavaType,
}

/// A method referenced by an instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    /// Sanitized owner from the constant pool, `java/lang/Object` for array owners
    pub owner: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub desc: String,
    /// Parsed descriptor
    pub sig: MethodSignature,
    /// Whether the owner is an interface
    pub interface: bool,
}

/// The implementation a lambda proxy forwards to.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaTarget {
    /// Method handle kind (`REF_invokeVirtual` .. `REF_invokeInterface`)
    pub kind: u8,
    /// The referenced method
    pub method: MethodRef,
}

/// A lowered instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Jump target and region boundary; `location` is set when a jump enters a new frame location
    Label {
        /// Bytecode offset the label marks
        id: u32,
        /// Frame location to restore when the label is reached
        location: Option<u32>,
    },
    /// Start of a source line
    LineNumber {
        /// Source line
        line: u32,
        /// Frame location starting here
        location: Option<u32>,
    },
    /// Start of the exception region `frame`
    Try {
        /// Index into the method's exception frames
        frame: usize,
    },
    /// End of the exception region `frame`
    Catch {
        /// Index into the method's exception frames
        frame: usize,
    },
    /// No operation
    Nop,
    /// Push a constant
    Const(ConstValue),
    /// Push a local variable
    Load {
        /// Stack type
        ty: BasicType,
        /// Local slot
        local: u16,
    },
    /// Pop into a local variable
    Store {
        /// Stack type
        ty: BasicType,
        /// Local slot
        local: u16,
    },
    /// `iinc`
    Increment {
        /// Local slot
        local: u16,
        /// Signed increment
        amount: i16,
    },
    /// Load an array element
    ArrayLoad(ArrayKind),
    /// Store an array element
    ArrayStore(ArrayKind),
    /// Pop, dup and swap family
    Stack(StackOp),
    /// Arithmetic on the given stack type
    Arithmetic {
        /// Operation
        op: ArithOp,
        /// Result and first operand type
        ty: BasicType,
    },
    /// Primitive conversion
    Convert(Conversion),
    /// Three-way comparison
    Compare(CompareOp),
    /// Conditional or unconditional branch
    Jump {
        /// Branch flavor
        kind: JumpKind,
        /// Target label
        target: u32,
    },
    /// `tableswitch` and `lookupswitch`
    Switch {
        /// Case keys
        keys: Vec<i32>,
        /// Target label per key
        targets: Vec<u32>,
        /// Default target label
        default: u32,
    },
    /// Return, with the returned stack type
    Return(Option<BasicType>),
    /// `athrow`
    Throw,
    /// Field access
    Field {
        /// Access flavor
        kind: FieldKind,
        /// Referenced field
        field: FieldRef,
        /// Class that declares the field, found by hierarchy resolution
        resolved: Option<String>,
    },
    /// Method call
    Invoke {
        /// Invocation flavor
        kind: InvokeKind,
        /// Referenced method
        method: MethodRef,
        /// Class that declares the called method, found by hierarchy resolution
        resolved: Option<String>,
    },
    /// Allocate an instance of the named class
    New(String),
    /// Allocate a primitive array
    NewArray(JavaType),
    /// Allocate a reference array with the given element type
    ANewArray(JavaType),
    /// Allocate a multi-dimensional array
    MultiNewArray {
        /// The array type
        ty: JavaType,
        /// Dimensions popped from the stack
        dims: u8,
    },
    /// `arraylength`
    ArrayLength,
    /// `checkcast`
    CheckCast(JavaType),
    /// `instanceof`
    InstanceOf(JavaType),
    /// `monitorenter`
    MonitorEnter,
    /// `monitorexit`
    MonitorExit,
    /// Allocate a lambda proxy capturing the top `captures.len()` entries
    InvokeDynamic {
        /// Name of the synthesized proxy class
        proxy: String,
        /// Types of the captured values
        captures: Vec<JavaType>,
    },
    /// Body of a lambda proxy method
    LambdaProxy {
        /// Forwarding target
        target: LambdaTarget,
        /// Types of the captured fields
        captures: Vec<JavaType>,
        /// Signature of the implemented interface method
        sam: MethodSignature,
    },
    /// String concatenation through a recipe
    StringConcat {
        /// Recipe with constants inlined, `\u{1}` marks an argument
        recipe: String,
        /// Argument types
        args: Vec<JavaType>,
    },
    /// Consecutive instructions emitted with named temporaries
    Group(Vec<Node>),
}

impl Instruction {
    /// Whether the instruction has no stack effect and only marks a position.
    #[must_use]
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self,
            Instruction::Label { .. }
                | Instruction::LineNumber { .. }
                | Instruction::Try { .. }
                | Instruction::Catch { .. }
        )
    }

    /// Whether the instruction transfers control to labels.
    #[must_use]
    pub fn is_jump(&self) -> bool {
        matches!(self, Instruction::Jump { .. } | Instruction::Switch { .. })
    }

    /// Whether execution never falls through to the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Instruction::Jump {
                kind: JumpKind::Goto,
                ..
            } | Instruction::Switch { .. }
                | Instruction::Return(_)
                | Instruction::Throw
                | Instruction::LambdaProxy { .. }
        )
    }

    /// Labels this instruction may jump to.
    #[must_use]
    pub fn jump_targets(&self) -> Vec<u32> {
        match self {
            Instruction::Jump { target, .. } => vec![*target],
            Instruction::Switch {
                targets, default, ..
            } => {
                let mut all = targets.clone();
                all.push(*default);
                all
            }
            _ => Vec::new(),
        }
    }

    /// The called method and the class declaring it, for call graph construction.
    #[must_use]
    pub fn call_target(&self) -> Option<(&str, &MethodRef)> {
        match self {
            Instruction::Invoke {
                method, resolved, ..
            } => Some((resolved.as_deref().unwrap_or(&method.owner), method)),
            Instruction::LambdaProxy { target, .. } => Some((&target.method.owner, &target.method)),
            _ => None,
        }
    }

    /// Add every class this instruction references to `classes`.
    pub fn collect_classes(&self, classes: &mut BTreeSet<String>) {
        fn add_type(ty: &JavaType, classes: &mut BTreeSet<String>) {
            if let Some(name) = ty.class_name() {
                classes.insert(name.to_string());
            }
        }

        match self {
            Instruction::Const(ConstValue::Class(ty)) => add_type(ty, classes),
            Instruction::Const(ConstValue::String(_)) | Instruction::StringConcat { .. } => {
                classes.insert("java/lang/String".to_string());
            }
            Instruction::Field {
                field, resolved, ..
            } => {
                classes.insert(field.owner.clone());
                if let Some(resolved) = resolved {
                    classes.insert(resolved.clone());
                }
                add_type(&field.ty, classes);
            }
            Instruction::Invoke {
                method, resolved, ..
            } => {
                classes.insert(method.owner.clone());
                if let Some(resolved) = resolved {
                    classes.insert(resolved.clone());
                }
                classes.extend(method.sig.classes().map(str::to_string));
            }
            Instruction::New(name) => {
                classes.insert(name.clone());
            }
            Instruction::NewArray(ty)
            | Instruction::ANewArray(ty)
            | Instruction::CheckCast(ty)
            | Instruction::InstanceOf(ty)
            | Instruction::MultiNewArray { ty, .. } => add_type(ty, classes),
            Instruction::InvokeDynamic { proxy, captures } => {
                classes.insert(proxy.clone());
                for ty in captures {
                    add_type(ty, classes);
                }
            }
            Instruction::LambdaProxy {
                target,
                captures,
                sam,
            } => {
                classes.insert(target.method.owner.clone());
                classes.extend(target.method.sig.classes().map(str::to_string));
                classes.extend(sam.classes().map(str::to_string));
                for ty in captures {
                    add_type(ty, classes);
                }
                let boxed = target
                    .method
                    .sig
                    .params
                    .iter()
                    .chain(sam.params.iter())
                    .chain([&target.method.sig.ret, &sam.ret])
                    .filter_map(JavaType::box_name);
                classes.extend(boxed.map(|name| format!("java/lang/{}", name)));
            }
            Instruction::Group(nodes) => {
                for node in nodes {
                    node.insn.collect_classes(classes);
                }
            }
            _ => {}
        }
    }
}
