//! The JVM opcode table.
//!
//! Every defined opcode `0x00..=0xC9` has an entry describing its mnemonic, the shape of
//! its immediate operands and how it affects control flow. The decoder drives operand
//! parsing entirely from this table.

/// Layout of the immediate operands following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operands
    None,
    /// Signed byte (`bipush`)
    Byte,
    /// Signed short (`sipush`)
    Short,
    /// Unsigned byte local variable index, widened by `wide`
    Local,
    /// Local index and signed byte increment (`iinc`), widened by `wide`
    Increment,
    /// Unsigned byte constant pool index (`ldc`)
    ConstantByte,
    /// Unsigned short constant pool index
    Constant,
    /// Constant pool index plus count and a zero byte (`invokeinterface`)
    InvokeInterface,
    /// Constant pool index plus two zero bytes (`invokedynamic`)
    InvokeDynamic,
    /// Primitive array type code (`newarray`)
    ArrayType,
    /// Constant pool index plus dimension count (`multianewarray`)
    MultiArray,
    /// Signed 16-bit branch offset
    Branch,
    /// Signed 32-bit branch offset
    BranchWide,
    /// `tableswitch` payload
    TableSwitch,
    /// `lookupswitch` payload
    LookupSwitch,
    /// The `wide` prefix
    Wide,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Either branches or falls through
    ConditionalBranch,
    /// Always branches
    UnconditionalBranch,
    /// Multi-way branch
    Switch,
    /// Leaves the method normally
    Return,
    /// Leaves through an exception
    Throw,
    /// Subroutine call or return (`jsr`, `ret`)
    Subroutine,
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Lowercase mnemonic as used in JVMS
    pub mnemonic: &'static str,
    /// Immediate operand layout
    pub operands: OperandType,
    /// Control flow behaviour
    pub flow: FlowType,
}

const fn op(mnemonic: &'static str, operands: OperandType, flow: FlowType) -> OpcodeInfo {
    OpcodeInfo {
        mnemonic,
        operands,
        flow,
    }
}

const fn seq(mnemonic: &'static str) -> OpcodeInfo {
    op(mnemonic, OperandType::None, FlowType::Sequential)
}

const fn branch(mnemonic: &'static str) -> OpcodeInfo {
    op(mnemonic, OperandType::Branch, FlowType::ConditionalBranch)
}

const fn ret(mnemonic: &'static str) -> OpcodeInfo {
    op(mnemonic, OperandType::None, FlowType::Return)
}

use FlowType as F;
use OperandType as O;

/// Opcode table indexed by opcode value.
pub static OPCODES: [OpcodeInfo; 202] = [
    seq("nop"),                                            // 0x00
    seq("aconst_null"),                                    // 0x01
    seq("iconst_m1"),                                      // 0x02
    seq("iconst_0"),                                       // 0x03
    seq("iconst_1"),                                       // 0x04
    seq("iconst_2"),                                       // 0x05
    seq("iconst_3"),                                       // 0x06
    seq("iconst_4"),                                       // 0x07
    seq("iconst_5"),                                       // 0x08
    seq("lconst_0"),                                       // 0x09
    seq("lconst_1"),                                       // 0x0A
    seq("fconst_0"),                                       // 0x0B
    seq("fconst_1"),                                       // 0x0C
    seq("fconst_2"),                                       // 0x0D
    seq("dconst_0"),                                       // 0x0E
    seq("dconst_1"),                                       // 0x0F
    op("bipush", O::Byte, F::Sequential),                  // 0x10
    op("sipush", O::Short, F::Sequential),                 // 0x11
    op("ldc", O::ConstantByte, F::Sequential),             // 0x12
    op("ldc_w", O::Constant, F::Sequential),               // 0x13
    op("ldc2_w", O::Constant, F::Sequential),              // 0x14
    op("iload", O::Local, F::Sequential),                  // 0x15
    op("lload", O::Local, F::Sequential),                  // 0x16
    op("fload", O::Local, F::Sequential),                  // 0x17
    op("dload", O::Local, F::Sequential),                  // 0x18
    op("aload", O::Local, F::Sequential),                  // 0x19
    seq("iload_0"),                                        // 0x1A
    seq("iload_1"),                                        // 0x1B
    seq("iload_2"),                                        // 0x1C
    seq("iload_3"),                                        // 0x1D
    seq("lload_0"),                                        // 0x1E
    seq("lload_1"),                                        // 0x1F
    seq("lload_2"),                                        // 0x20
    seq("lload_3"),                                        // 0x21
    seq("fload_0"),                                        // 0x22
    seq("fload_1"),                                        // 0x23
    seq("fload_2"),                                        // 0x24
    seq("fload_3"),                                        // 0x25
    seq("dload_0"),                                        // 0x26
    seq("dload_1"),                                        // 0x27
    seq("dload_2"),                                        // 0x28
    seq("dload_3"),                                        // 0x29
    seq("aload_0"),                                        // 0x2A
    seq("aload_1"),                                        // 0x2B
    seq("aload_2"),                                        // 0x2C
    seq("aload_3"),                                        // 0x2D
    seq("iaload"),                                         // 0x2E
    seq("laload"),                                         // 0x2F
    seq("faload"),                                         // 0x30
    seq("daload"),                                         // 0x31
    seq("aaload"),                                         // 0x32
    seq("baload"),                                         // 0x33
    seq("caload"),                                         // 0x34
    seq("saload"),                                         // 0x35
    op("istore", O::Local, F::Sequential),                 // 0x36
    op("lstore", O::Local, F::Sequential),                 // 0x37
    op("fstore", O::Local, F::Sequential),                 // 0x38
    op("dstore", O::Local, F::Sequential),                 // 0x39
    op("astore", O::Local, F::Sequential),                 // 0x3A
    seq("istore_0"),                                       // 0x3B
    seq("istore_1"),                                       // 0x3C
    seq("istore_2"),                                       // 0x3D
    seq("istore_3"),                                       // 0x3E
    seq("lstore_0"),                                       // 0x3F
    seq("lstore_1"),                                       // 0x40
    seq("lstore_2"),                                       // 0x41
    seq("lstore_3"),                                       // 0x42
    seq("fstore_0"),                                       // 0x43
    seq("fstore_1"),                                       // 0x44
    seq("fstore_2"),                                       // 0x45
    seq("fstore_3"),                                       // 0x46
    seq("dstore_0"),                                       // 0x47
    seq("dstore_1"),                                       // 0x48
    seq("dstore_2"),                                       // 0x49
    seq("dstore_3"),                                       // 0x4A
    seq("astore_0"),                                       // 0x4B
    seq("astore_1"),                                       // 0x4C
    seq("astore_2"),                                       // 0x4D
    seq("astore_3"),                                       // 0x4E
    seq("iastore"),                                        // 0x4F
    seq("lastore"),                                        // 0x50
    seq("fastore"),                                        // 0x51
    seq("dastore"),                                        // 0x52
    seq("aastore"),                                        // 0x53
    seq("bastore"),                                        // 0x54
    seq("castore"),                                        // 0x55
    seq("sastore"),                                        // 0x56
    seq("pop"),                                            // 0x57
    seq("pop2"),                                           // 0x58
    seq("dup"),                                            // 0x59
    seq("dup_x1"),                                         // 0x5A
    seq("dup_x2"),                                         // 0x5B
    seq("dup2"),                                           // 0x5C
    seq("dup2_x1"),                                        // 0x5D
    seq("dup2_x2"),                                        // 0x5E
    seq("swap"),                                           // 0x5F
    seq("iadd"),                                           // 0x60
    seq("ladd"),                                           // 0x61
    seq("fadd"),                                           // 0x62
    seq("dadd"),                                           // 0x63
    seq("isub"),                                           // 0x64
    seq("lsub"),                                           // 0x65
    seq("fsub"),                                           // 0x66
    seq("dsub"),                                           // 0x67
    seq("imul"),                                           // 0x68
    seq("lmul"),                                           // 0x69
    seq("fmul"),                                           // 0x6A
    seq("dmul"),                                           // 0x6B
    seq("idiv"),                                           // 0x6C
    seq("ldiv"),                                           // 0x6D
    seq("fdiv"),                                           // 0x6E
    seq("ddiv"),                                           // 0x6F
    seq("irem"),                                           // 0x70
    seq("lrem"),                                           // 0x71
    seq("frem"),                                           // 0x72
    seq("drem"),                                           // 0x73
    seq("ineg"),                                           // 0x74
    seq("lneg"),                                           // 0x75
    seq("fneg"),                                           // 0x76
    seq("dneg"),                                           // 0x77
    seq("ishl"),                                           // 0x78
    seq("lshl"),                                           // 0x79
    seq("ishr"),                                           // 0x7A
    seq("lshr"),                                           // 0x7B
    seq("iushr"),                                          // 0x7C
    seq("lushr"),                                          // 0x7D
    seq("iand"),                                           // 0x7E
    seq("land"),                                           // 0x7F
    seq("ior"),                                            // 0x80
    seq("lor"),                                            // 0x81
    seq("ixor"),                                           // 0x82
    seq("lxor"),                                           // 0x83
    op("iinc", O::Increment, F::Sequential),               // 0x84
    seq("i2l"),                                            // 0x85
    seq("i2f"),                                            // 0x86
    seq("i2d"),                                            // 0x87
    seq("l2i"),                                            // 0x88
    seq("l2f"),                                            // 0x89
    seq("l2d"),                                            // 0x8A
    seq("f2i"),                                            // 0x8B
    seq("f2l"),                                            // 0x8C
    seq("f2d"),                                            // 0x8D
    seq("d2i"),                                            // 0x8E
    seq("d2l"),                                            // 0x8F
    seq("d2f"),                                            // 0x90
    seq("i2b"),                                            // 0x91
    seq("i2c"),                                            // 0x92
    seq("i2s"),                                            // 0x93
    seq("lcmp"),                                           // 0x94
    seq("fcmpl"),                                          // 0x95
    seq("fcmpg"),                                          // 0x96
    seq("dcmpl"),                                          // 0x97
    seq("dcmpg"),                                          // 0x98
    branch("ifeq"),                                        // 0x99
    branch("ifne"),                                        // 0x9A
    branch("iflt"),                                        // 0x9B
    branch("ifge"),                                        // 0x9C
    branch("ifgt"),                                        // 0x9D
    branch("ifle"),                                        // 0x9E
    branch("if_icmpeq"),                                   // 0x9F
    branch("if_icmpne"),                                   // 0xA0
    branch("if_icmplt"),                                   // 0xA1
    branch("if_icmpge"),                                   // 0xA2
    branch("if_icmpgt"),                                   // 0xA3
    branch("if_icmple"),                                   // 0xA4
    branch("if_acmpeq"),                                   // 0xA5
    branch("if_acmpne"),                                   // 0xA6
    op("goto", O::Branch, F::UnconditionalBranch),         // 0xA7
    op("jsr", O::Branch, F::Subroutine),                   // 0xA8
    op("ret", O::Local, F::Subroutine),                    // 0xA9
    op("tableswitch", O::TableSwitch, F::Switch),          // 0xAA
    op("lookupswitch", O::LookupSwitch, F::Switch),        // 0xAB
    ret("ireturn"),                                        // 0xAC
    ret("lreturn"),                                        // 0xAD
    ret("freturn"),                                        // 0xAE
    ret("dreturn"),                                        // 0xAF
    ret("areturn"),                                        // 0xB0
    ret("return"),                                         // 0xB1
    op("getstatic", O::Constant, F::Sequential),           // 0xB2
    op("putstatic", O::Constant, F::Sequential),           // 0xB3
    op("getfield", O::Constant, F::Sequential),            // 0xB4
    op("putfield", O::Constant, F::Sequential),            // 0xB5
    op("invokevirtual", O::Constant, F::Sequential),       // 0xB6
    op("invokespecial", O::Constant, F::Sequential),       // 0xB7
    op("invokestatic", O::Constant, F::Sequential),        // 0xB8
    op("invokeinterface", O::InvokeInterface, F::Sequential), // 0xB9
    op("invokedynamic", O::InvokeDynamic, F::Sequential),  // 0xBA
    op("new", O::Constant, F::Sequential),                 // 0xBB
    op("newarray", O::ArrayType, F::Sequential),           // 0xBC
    op("anewarray", O::Constant, F::Sequential),           // 0xBD
    seq("arraylength"),                                    // 0xBE
    op("athrow", O::None, F::Throw),                       // 0xBF
    op("checkcast", O::Constant, F::Sequential),           // 0xC0
    op("instanceof", O::Constant, F::Sequential),          // 0xC1
    seq("monitorenter"),                                   // 0xC2
    seq("monitorexit"),                                    // 0xC3
    op("wide", O::Wide, F::Sequential),                    // 0xC4
    op("multianewarray", O::MultiArray, F::Sequential),    // 0xC5
    branch("ifnull"),                                      // 0xC6
    branch("ifnonnull"),                                   // 0xC7
    op("goto_w", O::BranchWide, F::UnconditionalBranch),   // 0xC8
    op("jsr_w", O::BranchWide, F::Subroutine),             // 0xC9
];

/// Opcode values referenced by name in the loader.
#[allow(missing_docs)]
pub mod code {
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_M1: u8 = 0x02;
    pub const ICONST_5: u8 = 0x08;
    pub const LCONST_0: u8 = 0x09;
    pub const LCONST_1: u8 = 0x0A;
    pub const FCONST_0: u8 = 0x0B;
    pub const FCONST_2: u8 = 0x0D;
    pub const DCONST_0: u8 = 0x0E;
    pub const DCONST_1: u8 = 0x0F;
    pub const BIPUSH: u8 = 0x10;
    pub const SIPUSH: u8 = 0x11;
    pub const LDC: u8 = 0x12;
    pub const LDC_W: u8 = 0x13;
    pub const LDC2_W: u8 = 0x14;
    pub const ILOAD: u8 = 0x15;
    pub const ALOAD: u8 = 0x19;
    pub const ILOAD_0: u8 = 0x1A;
    pub const ALOAD_3: u8 = 0x2D;
    pub const IALOAD: u8 = 0x2E;
    pub const SALOAD: u8 = 0x35;
    pub const ISTORE: u8 = 0x36;
    pub const ASTORE: u8 = 0x3A;
    pub const ISTORE_0: u8 = 0x3B;
    pub const ASTORE_3: u8 = 0x4E;
    pub const IASTORE: u8 = 0x4F;
    pub const SASTORE: u8 = 0x56;
    pub const POP: u8 = 0x57;
    pub const POP2: u8 = 0x58;
    pub const DUP: u8 = 0x59;
    pub const DUP_X1: u8 = 0x5A;
    pub const DUP_X2: u8 = 0x5B;
    pub const DUP2: u8 = 0x5C;
    pub const DUP2_X1: u8 = 0x5D;
    pub const DUP2_X2: u8 = 0x5E;
    pub const SWAP: u8 = 0x5F;
    pub const IADD: u8 = 0x60;
    pub const DNEG: u8 = 0x77;
    pub const ISHL: u8 = 0x78;
    pub const LXOR: u8 = 0x83;
    pub const IINC: u8 = 0x84;
    pub const I2L: u8 = 0x85;
    pub const I2S: u8 = 0x93;
    pub const LCMP: u8 = 0x94;
    pub const FCMPL: u8 = 0x95;
    pub const FCMPG: u8 = 0x96;
    pub const DCMPL: u8 = 0x97;
    pub const DCMPG: u8 = 0x98;
    pub const IFEQ: u8 = 0x99;
    pub const IF_ACMPNE: u8 = 0xA6;
    pub const GOTO: u8 = 0xA7;
    pub const JSR: u8 = 0xA8;
    pub const RET: u8 = 0xA9;
    pub const TABLESWITCH: u8 = 0xAA;
    pub const LOOKUPSWITCH: u8 = 0xAB;
    pub const IRETURN: u8 = 0xAC;
    pub const RETURN: u8 = 0xB1;
    pub const GETSTATIC: u8 = 0xB2;
    pub const PUTSTATIC: u8 = 0xB3;
    pub const GETFIELD: u8 = 0xB4;
    pub const PUTFIELD: u8 = 0xB5;
    pub const INVOKEVIRTUAL: u8 = 0xB6;
    pub const INVOKESPECIAL: u8 = 0xB7;
    pub const INVOKESTATIC: u8 = 0xB8;
    pub const INVOKEINTERFACE: u8 = 0xB9;
    pub const INVOKEDYNAMIC: u8 = 0xBA;
    pub const NEW: u8 = 0xBB;
    pub const NEWARRAY: u8 = 0xBC;
    pub const ANEWARRAY: u8 = 0xBD;
    pub const ARRAYLENGTH: u8 = 0xBE;
    pub const ATHROW: u8 = 0xBF;
    pub const CHECKCAST: u8 = 0xC0;
    pub const INSTANCEOF: u8 = 0xC1;
    pub const MONITORENTER: u8 = 0xC2;
    pub const MONITOREXIT: u8 = 0xC3;
    pub const WIDE: u8 = 0xC4;
    pub const MULTIANEWARRAY: u8 = 0xC5;
    pub const IFNULL: u8 = 0xC6;
    pub const IFNONNULL: u8 = 0xC7;
    pub const GOTO_W: u8 = 0xC8;
    pub const JSR_W: u8 = 0xC9;
}

/// Table entry for `opcode`, `None` for reserved and undefined values.
#[must_use]
pub fn lookup(opcode: u8) -> Option<&'static OpcodeInfo> {
    OPCODES.get(opcode as usize)
}
