//! Architecture-neutral macro-assembly IR.
//!
//! The IR is produced upstream (parser / builder, out of scope here) and
//! is read-only input to the backend. The only node-producing activity
//! inside the backend is the immediate legalizer, which inserts synthetic
//! `move` instructions; it never mutates an existing node.

use crate::span::Span;

/// Symbolic general-purpose register from the fixed vocabulary.
///
/// `t*` are temporaries, `a*` argument registers, `r*` return registers,
/// `csr*` callee-saved slots, plus the frame and stack pointers. Which
/// names are valid, and what they map to, depends on the active target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gpr {
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    A0,
    A1,
    A2,
    A3,
    R0,
    R1,
    Csr0,
    Csr1,
    Csr2,
    Csr3,
    Csr4,
    Csr5,
    Csr6,
    Cfr,
    Sp,
}

impl Gpr {
    /// Symbolic name as written in the macro-assembly source.
    pub fn name(self) -> &'static str {
        match self {
            Gpr::T0 => "t0",
            Gpr::T1 => "t1",
            Gpr::T2 => "t2",
            Gpr::T3 => "t3",
            Gpr::T4 => "t4",
            Gpr::T5 => "t5",
            Gpr::A0 => "a0",
            Gpr::A1 => "a1",
            Gpr::A2 => "a2",
            Gpr::A3 => "a3",
            Gpr::R0 => "r0",
            Gpr::R1 => "r1",
            Gpr::Csr0 => "csr0",
            Gpr::Csr1 => "csr1",
            Gpr::Csr2 => "csr2",
            Gpr::Csr3 => "csr3",
            Gpr::Csr4 => "csr4",
            Gpr::Csr5 => "csr5",
            Gpr::Csr6 => "csr6",
            Gpr::Cfr => "cfr",
            Gpr::Sp => "sp",
        }
    }
}

/// Symbolic floating-point register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fpr {
    Ft0,
    Ft1,
    Ft2,
    Ft3,
    Ft4,
    Ft5,
    Fa0,
    Fa1,
    Fa2,
    Fa3,
    Fr,
}

impl Fpr {
    pub fn name(self) -> &'static str {
        match self {
            Fpr::Ft0 => "ft0",
            Fpr::Ft1 => "ft1",
            Fpr::Ft2 => "ft2",
            Fpr::Ft3 => "ft3",
            Fpr::Ft4 => "ft4",
            Fpr::Ft5 => "ft5",
            Fpr::Fa0 => "fa0",
            Fpr::Fa1 => "fa1",
            Fpr::Fa2 => "fa2",
            Fpr::Fa3 => "fa3",
            Fpr::Fr => "fr",
        }
    }
}

/// Index scaling factor for base-index addressing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    One,
    Two,
    Four,
    Eight,
}

impl Scale {
    pub fn value(self) -> u8 {
        match self {
            Scale::One => 1,
            Scale::Two => 2,
            Scale::Four => 4,
            Scale::Eight => 8,
        }
    }
}

/// One IR operand. A closed set: the renderer matches exhaustively, so
/// "every operand variant handled" is a compile-time property.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Symbolic general-purpose register, ABI-mapped at render time.
    Reg(Gpr),
    /// Symbolic floating-point register.
    FpReg(Fpr),
    /// The reserved architecture scratch register (64-bit only). Never
    /// ABI-mapped; holds no logical program value across instructions.
    Scratch,
    Imm(i64),
    /// base + offset memory reference.
    Addr { base: Gpr, offset: i64 },
    /// base + index × scale + offset memory reference.
    BaseIndex {
        base: Gpr,
        index: Gpr,
        scale: Scale,
        offset: i64,
    },
    AbsoluteAddr(i64),
    /// Reference to a global label. Loads through it are rendered
    /// position-independently; the translation records each use so the
    /// embedder can emit indirection stubs.
    LabelRef { name: String, offset: i64 },
    /// Reference to a function-local label; renders as the bare name.
    LocalLabelRef { name: String },
}

impl Operand {
    pub fn label(name: impl Into<String>) -> Self {
        Operand::LabelRef {
            name: name.into(),
            offset: 0,
        }
    }

    pub fn local_label(name: impl Into<String>) -> Self {
        Operand::LocalLabelRef { name: name.into() }
    }

    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }
}

/// Width / encoding selector for rendering one operand. Orthogonal to the
/// operand variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandKind {
    Byte,
    Half,
    Int,
    Ptr,
    Quad,
    Double,
}

/// One abstract instruction: opcode from the fixed vocabulary plus its
/// ordered operands. Immutable once built.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub opcode: String,
    pub operands: Vec<Operand>,
    pub annotation: Option<String>,
    pub span: Span,
}

impl Instruction {
    pub fn new(opcode: impl Into<String>, operands: Vec<Operand>, span: Span) -> Self {
        Self {
            opcode: opcode.into(),
            operands,
            annotation: None,
            span,
        }
    }

    /// Instruction with no source position (legalizer inserts, tests).
    pub fn synthetic(opcode: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self::new(opcode, operands, Span::dummy())
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

/// One node of the input sequence.
#[derive(Clone, Debug)]
pub enum Node {
    Instr(Instruction),
    /// Global label definition.
    Label(String),
    /// Function-local label definition.
    LocalLabel(String),
    /// Inert marker; emits nothing.
    Skip,
}
