//! Dialect-aware operand rendering.
//!
//! AT&T: `%`-prefixed registers, `$`-prefixed immediates, `off(base,
//! index, scale)` addressing, source before destination, width suffix on
//! the mnemonic. Intel: bare registers and immediates, `size ptr [...]`
//! addressing, destination before source, no mnemonic suffix.

use super::{regs, LowerCtx};
use crate::diagnostic::Diagnostic;
use crate::ir::{Operand, OperandKind};
use crate::span::Span;

impl<'a> LowerCtx<'a> {
    /// Dialect-specific register spelling.
    pub(crate) fn reg(&self, name: &str) -> String {
        if self.target.is_intel() {
            name.to_string()
        } else {
            format!("%{}", name)
        }
    }

    /// Dialect-specific literal spelling, for immediates written out as
    /// text (decimal or hex).
    pub(crate) fn lit(&self, text: &str) -> String {
        if self.target.is_intel() {
            text.to_string()
        } else {
            format!("${}", text)
        }
    }

    pub(crate) fn imm(&self, value: i64) -> String {
        self.lit(&value.to_string())
    }

    /// `off(reg)` or `[off + reg]`.
    pub(crate) fn offset_register(&self, offset: i64, reg: &str) -> String {
        if self.target.is_intel() {
            format!("[{} + {}]", offset, reg)
        } else {
            format!("{}({})", offset, reg)
        }
    }

    /// Indirection prefix for call/jump through a register or memory
    /// operand.
    pub(crate) fn call_prefix(&self) -> &'static str {
        if self.target.is_intel() {
            ""
        } else {
            "*"
        }
    }

    /// `opA, opB` in AT&T order, `opB, opA` in Intel order.
    pub(crate) fn order_operands(&self, op_a: &str, op_b: &str) -> String {
        if self.target.is_intel() {
            format!("{}, {}", op_b, op_a)
        } else {
            format!("{}, {}", op_a, op_b)
        }
    }

    /// Memory-operand size keyword, Intel only.
    pub(crate) fn size_keyword(&self, kind: OperandKind) -> &'static str {
        if !self.target.is_intel() {
            return "";
        }
        match kind {
            OperandKind::Byte => "byte ptr ",
            OperandKind::Half => "word ptr ",
            OperandKind::Int => "dword ptr ",
            OperandKind::Ptr => {
                if self.target.is_64() {
                    "qword ptr "
                } else {
                    "dword ptr "
                }
            }
            OperandKind::Quad | OperandKind::Double => "qword ptr ",
        }
    }

    /// Render one operand for the given kind.
    pub(crate) fn render(
        &self,
        operand: &Operand,
        kind: OperandKind,
        span: Span,
    ) -> Result<String, Diagnostic> {
        match operand {
            Operand::Reg(reg) => {
                let base = regs::map_gpr(*reg, self.target, span)?;
                Ok(self.reg(&regs::gpr_name(base, kind, self.target, span)?))
            }
            Operand::FpReg(reg) => {
                if kind != OperandKind::Double {
                    return Err(Diagnostic::unsupported_operand(
                        format!(
                            "floating register '{}' only supports double kind",
                            reg.name()
                        ),
                        span,
                    ));
                }
                Ok(self.reg(regs::map_fpr(*reg)))
            }
            Operand::Scratch => Ok(self.reg(&regs::scratch_name(kind, self.target, span)?)),
            Operand::Imm(value) => Ok(self.imm(*value)),
            Operand::Addr { .. } => {
                let address = self.address_operand(operand, OperandKind::Ptr, span)?;
                Ok(format!("{}{}", self.size_keyword(kind), address))
            }
            Operand::BaseIndex {
                base,
                index,
                scale,
                offset,
            } => {
                if self.target.is_intel() {
                    let base = self.render(&Operand::Reg(*base), OperandKind::Ptr, span)?;
                    let index = self.render(&Operand::Reg(*index), OperandKind::Ptr, span)?;
                    Ok(format!(
                        "{}[{} + {} + {} * {}]",
                        self.size_keyword(kind),
                        offset,
                        base,
                        index,
                        scale.value()
                    ))
                } else {
                    self.address_operand(operand, OperandKind::Ptr, span)
                }
            }
            Operand::AbsoluteAddr(value) => Ok(format!("{}", value)),
            Operand::LabelRef { name, .. } => Err(Diagnostic::unsupported_operand(
                format!(
                    "label reference '{}' is only valid as a load source or branch target",
                    name
                ),
                span,
            )),
            Operand::LocalLabelRef { name } => Ok(name.clone()),
        }
    }

    /// Render a memory operand as a bare address expression, with base
    /// and index registers at the given kind (used by `lea`).
    pub(crate) fn address_operand(
        &self,
        operand: &Operand,
        addr_kind: OperandKind,
        span: Span,
    ) -> Result<String, Diagnostic> {
        match operand {
            Operand::Addr { base, offset } => {
                let base = self.render(&Operand::Reg(*base), addr_kind, span)?;
                Ok(self.offset_register(*offset, &base))
            }
            Operand::BaseIndex {
                base,
                index,
                scale,
                offset,
            } => {
                let base = self.render(&Operand::Reg(*base), addr_kind, span)?;
                let index = self.render(&Operand::Reg(*index), addr_kind, span)?;
                if self.target.is_intel() {
                    Ok(format!(
                        "{}[{} + {} + {} * {}]",
                        self.size_keyword(addr_kind),
                        offset,
                        base,
                        index,
                        scale.value()
                    ))
                } else {
                    Ok(format!("{}({}, {}, {})", offset, base, index, scale.value()))
                }
            }
            Operand::AbsoluteAddr(value) => Ok(format!("{}", value)),
            _ => Err(Diagnostic::unsupported_operand(
                "expected an address operand".to_string(),
                span,
            )),
        }
    }

    /// Render a load source. Global label references load the label's
    /// address position-independently into the destination register
    /// first, then address through it.
    pub(crate) fn render_load(
        &mut self,
        src: &Operand,
        kind: OperandKind,
        dst: &Operand,
        span: Span,
    ) -> Result<String, Diagnostic> {
        match src {
            Operand::LabelRef { name, offset } => {
                let dst_ptr = self.render(dst, OperandKind::Ptr, span)?;
                if self.target.is_intel() {
                    self.asm.puts(format!("lea {}, {}", dst_ptr, name));
                } else {
                    self.asm
                        .puts(format!("movq {}@GOTPCREL({}), {}", name, self.reg("rip"), dst_ptr));
                }
                self.mark_label_used(name);
                let dst = self.render(dst, kind, span)?;
                Ok(self.offset_register(*offset, &dst))
            }
            _ => self.render(src, kind, span),
        }
    }

    /// Label text for a branch target operand.
    pub(crate) fn branch_label(&mut self, operand: &Operand, span: Span) -> Result<String, Diagnostic> {
        match operand {
            Operand::LabelRef { name, .. } => {
                self.mark_label_used(name);
                Ok(name.clone())
            }
            Operand::LocalLabelRef { name } => Ok(name.clone()),
            other => Err(Diagnostic::unsupported_operand(
                format!("expected a label operand, got {:?}", other),
                span,
            )),
        }
    }

    /// Render a call/jump target. Labels are direct; registers and memory
    /// operands get the dialect's indirection prefix. Call targets are
    /// never partial registers.
    pub(crate) fn call_target(&mut self, operand: &Operand, span: Span) -> Result<String, Diagnostic> {
        match operand {
            Operand::LabelRef { name, .. } => {
                self.mark_label_used(name);
                Ok(name.clone())
            }
            Operand::LocalLabelRef { name } => Ok(name.clone()),
            Operand::Imm(value) => Ok(format!("{}", value)),
            Operand::Reg(_) => {
                let reg = self.render(operand, OperandKind::Ptr, span)?;
                Ok(format!("{}{}", self.call_prefix(), reg))
            }
            Operand::Scratch => {
                let reg = self.render(operand, OperandKind::Quad, span)?;
                Ok(format!("{}{}", self.call_prefix(), reg))
            }
            Operand::FpReg(_) => {
                let reg = self.render(operand, OperandKind::Double, span)?;
                Ok(format!("{}{}", self.call_prefix(), reg))
            }
            Operand::Addr { .. } | Operand::BaseIndex { .. } => {
                let mem = self.render(operand, OperandKind::Ptr, span)?;
                Ok(format!("{}{}", self.call_prefix(), mem))
            }
            Operand::AbsoluteAddr(value) => Ok(format!("{}{}", self.call_prefix(), value)),
        }
    }
}
