//! Opcode lowering engine.
//!
//! Maps each abstract instruction to a deterministic sequence of 1–5
//! concrete lines. The dispatch is exhaustive over the fixed opcode
//! vocabulary; anything else is a producer/backend contract violation
//! and aborts the translation.

use super::{regs, LowerCtx};
use crate::diagnostic::Diagnostic;
use crate::ir::OperandKind::{Byte, Double, Half, Int, Ptr, Quad};
use crate::ir::{Gpr, Instruction, Operand, OperandKind};

impl<'a> LowerCtx<'a> {
    pub(crate) fn lower_instruction(&mut self, instr: &Instruction) -> Result<(), Diagnostic> {
        self.dispatch(instr)
            .map_err(|diag| diag.or_opcode(&instr.opcode))
    }

    // --- Shared emission helpers ---

    /// AT&T width suffix for a mnemonic; empty under Intel syntax.
    fn suffix(&self, kind: OperandKind, instr: &Instruction) -> Result<&'static str, Diagnostic> {
        if self.target.is_intel() {
            return Ok("");
        }
        match kind {
            Byte => Ok("b"),
            Half => Ok("w"),
            Int => Ok("l"),
            Ptr => Ok(if self.target.is_64() { "q" } else { "l" }),
            Quad => {
                if self.target.is_64() {
                    Ok("q")
                } else {
                    Err(Diagnostic::unsupported_opcode(
                        format!("'{}' needs a 64-bit target", instr.opcode),
                        instr.span,
                    ))
                }
            }
            Double => Ok("sd"),
        }
    }

    fn operand<'i>(
        &self,
        instr: &'i Instruction,
        index: usize,
    ) -> Result<&'i Operand, Diagnostic> {
        instr.operands.get(index).ok_or_else(|| {
            Diagnostic::unsupported_operand(
                format!(
                    "'{}' is missing operand {} (has {})",
                    instr.opcode,
                    index,
                    instr.operands.len()
                ),
                instr.span,
            )
        })
    }

    /// All operands rendered and joined, reversed under Intel syntax.
    fn operands_text(
        &self,
        instr: &Instruction,
        kinds: &[OperandKind],
    ) -> Result<String, Diagnostic> {
        if kinds.len() != instr.operands.len() {
            return Err(Diagnostic::unsupported_operand(
                format!(
                    "'{}' expects {} operands, got {}",
                    instr.opcode,
                    kinds.len(),
                    instr.operands.len()
                ),
                instr.span,
            ));
        }
        let mut parts = Vec::with_capacity(kinds.len());
        for position in 0..kinds.len() {
            let index = if self.target.is_intel() {
                kinds.len() - position - 1
            } else {
                position
            };
            let text = self
                .render(&instr.operands[index], kinds[index], instr.span)
                .map_err(|diag| diag.or_operand_index(index))?;
            parts.push(text);
        }
        Ok(parts.join(", "))
    }

    /// Source (possibly a position-independent label load) and
    /// destination, dialect-ordered.
    fn load_operands(
        &mut self,
        instr: &Instruction,
        src_kind: OperandKind,
        dst_kind: OperandKind,
    ) -> Result<String, Diagnostic> {
        let src_op = self.operand(instr, 0)?;
        let dst_op = self.operand(instr, 1)?;
        let src = self.render_load(src_op, src_kind, dst_op, instr.span)?;
        let dst = self.render(dst_op, dst_kind, instr.span)?;
        Ok(self.order_operands(&src, &dst))
    }

    /// 2-operand in-place form, or the 3-operand expansion: aliasing
    /// forms collapse to one op, the general form is mov + op so no
    /// source is clobbered before it is read.
    fn handle_op_with_operands(
        &mut self,
        instr: &Instruction,
        op_text: &str,
        kind: OperandKind,
        num_operands: usize,
    ) -> Result<(), Diagnostic> {
        if num_operands == 3 {
            let op0 = self.operand(instr, 0)?;
            let op1 = self.operand(instr, 1)?;
            let op2 = self.operand(instr, 2)?;
            let dst = self.render(op2, kind, instr.span)?;
            if op0 == op2 {
                let src = self.render(op1, kind, instr.span)?;
                let line = format!("{} {}", op_text, self.order_operands(&src, &dst));
                self.asm.puts(line);
            } else if op1 == op2 {
                let src = self.render(op0, kind, instr.span)?;
                let line = format!("{} {}", op_text, self.order_operands(&src, &dst));
                self.asm.puts(line);
            } else {
                let src0 = self.render(op0, kind, instr.span)?;
                let src1 = self.render(op1, kind, instr.span)?;
                let mov = format!(
                    "mov{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&src0, &dst)
                );
                self.asm.puts(mov);
                let line = format!("{} {}", op_text, self.order_operands(&src1, &dst));
                self.asm.puts(line);
            }
        } else {
            let src = self.render(self.operand(instr, 0)?, kind, instr.span)?;
            let dst = self.render(self.operand(instr, 1)?, kind, instr.span)?;
            let line = format!("{} {}", op_text, self.order_operands(&src, &dst));
            self.asm.puts(line);
        }
        Ok(())
    }

    fn handle_op(
        &mut self,
        instr: &Instruction,
        op_text: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_op_with_operands(instr, op_text, kind, instr.operands.len())
    }

    /// Shift-amount operands must be immediate or already live in the
    /// fixed shift-count register; anything else temporarily relocates
    /// through it: exchange, shift, exchange back, exactly three lines.
    fn handle_shift(
        &mut self,
        instr: &Instruction,
        base_op: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        let op_text = format!("{}{}", base_op, self.suffix(kind, instr)?);
        let count = self.operand(instr, 0)?;
        let value = self.operand(instr, 1)?;
        let count_in_ecx = match count {
            Operand::Reg(reg) => regs::map_gpr(*reg, self.target, instr.span)? == "ecx",
            _ => false,
        };
        let dst = self.render(value, kind, instr.span)?;
        if count.is_imm() || count_in_ecx {
            let amount = self.render(count, Byte, instr.span)?;
            let line = format!("{} {}", op_text, self.order_operands(&amount, &dst));
            self.asm.puts(line);
        } else {
            let count_ptr = self.render(count, Ptr, instr.span)?;
            let ecx = self.reg(&regs::gpr_name("ecx", Ptr, self.target, instr.span)?);
            let cl = self.reg("cl");
            let xchg = format!("xchg{} {}, {}", self.suffix(Ptr, instr)?, count_ptr, ecx);
            self.asm.puts(xchg.clone());
            let line = format!("{} {}", op_text, self.order_operands(&cl, &dst));
            self.asm.puts(line);
            self.asm.puts(xchg);
        }
        Ok(())
    }

    /// Unordered-aware compare plus the variant's conditional jump.
    fn handle_double_branch(
        &mut self,
        instr: &Instruction,
        branch: &str,
        reverse: bool,
    ) -> Result<(), Diagnostic> {
        let op0 = self.render(self.operand(instr, 0)?, Double, instr.span)?;
        let op1 = self.render(self.operand(instr, 1)?, Double, instr.span)?;
        let compare = if reverse {
            self.order_operands(&op0, &op1)
        } else {
            self.order_operands(&op1, &op0)
        };
        self.asm.puts(format!("ucomisd {}", compare));
        let label = self.branch_label(self.operand(instr, 2)?, instr.span)?;
        self.asm.puts(format!("{} {}", branch, label));
        Ok(())
    }

    /// Compare step shared by branches and boolean sets. Equality
    /// predicates against zero on a register prefer the self-test idiom.
    fn handle_int_compare(
        &mut self,
        instr: &Instruction,
        cond: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        let op0 = self.operand(instr, 0)?;
        let op1 = self.operand(instr, 1)?;
        let equality = cond == "e" || cond == "ne";
        if equality && *op0 == Operand::Imm(0) && matches!(op1, Operand::Reg(_)) {
            let reg = self.render(op1, kind, instr.span)?;
            let line = format!(
                "test{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&reg, &reg)
            );
            self.asm.puts(line);
        } else if equality && *op1 == Operand::Imm(0) && matches!(op0, Operand::Reg(_)) {
            let reg = self.render(op0, kind, instr.span)?;
            let line = format!(
                "test{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&reg, &reg)
            );
            self.asm.puts(line);
        } else {
            let lhs = self.render(op1, kind, instr.span)?;
            let rhs = self.render(op0, kind, instr.span)?;
            let line = format!(
                "cmp{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&lhs, &rhs)
            );
            self.asm.puts(line);
        }
        Ok(())
    }

    fn handle_int_branch(
        &mut self,
        instr: &Instruction,
        cond: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_int_compare(instr, cond, kind)?;
        let label = self.branch_label(self.operand(instr, 2)?, instr.span)?;
        self.asm.puts(format!("j{} {}", cond, label));
        Ok(())
    }

    fn operand_supports_byte(
        &self,
        operand: &Operand,
        instr: &Instruction,
    ) -> Result<bool, Diagnostic> {
        match operand {
            Operand::Reg(reg) => Ok(regs::supports_byte(regs::map_gpr(
                *reg,
                self.target,
                instr.span,
            )?)),
            Operand::Scratch => Ok(false),
            Operand::Addr { .. } | Operand::BaseIndex { .. } | Operand::AbsoluteAddr(_) => Ok(true),
            other => Err(Diagnostic::unsupported_operand(
                format!("cannot store a condition into {:?}", other),
                instr.span,
            )),
        }
    }

    fn zero_extend_byte_mnemonic(&self) -> &'static str {
        if self.target.is_intel() {
            "movzx"
        } else {
            "movzbl"
        }
    }

    /// Conditional set into a byte destination plus zero-extension. A
    /// destination without byte addressability is temporarily relocated
    /// into the accumulator.
    fn handle_set(
        &mut self,
        instr: &Instruction,
        set_op: &str,
        operand_index: usize,
    ) -> Result<(), Diagnostic> {
        let operand = self.operand(instr, operand_index)?;
        if self.operand_supports_byte(operand, instr)? {
            let byte = self.render(operand, Byte, instr.span)?;
            self.asm.puts(format!("{} {}", set_op, byte));
            let int = self.render(operand, Int, instr.span)?;
            let line = format!(
                "{} {}",
                self.zero_extend_byte_mnemonic(),
                self.order_operands(&byte, &int)
            );
            self.asm.puts(line);
        } else {
            let accumulator = Operand::Reg(Gpr::R0);
            let operand_ptr = self.render(operand, Ptr, instr.span)?;
            let acc_ptr = self.render(&accumulator, Ptr, instr.span)?;
            let acc_byte = self.render(&accumulator, Byte, instr.span)?;
            let acc_int = self.render(&accumulator, Int, instr.span)?;
            let xchg = format!(
                "xchg{} {}, {}",
                self.suffix(Ptr, instr)?,
                operand_ptr,
                acc_ptr
            );
            self.asm.puts(xchg.clone());
            self.asm.puts(format!("{} {}", set_op, acc_byte));
            let extend = format!(
                "{} {}",
                self.zero_extend_byte_mnemonic(),
                self.order_operands(&acc_byte, &acc_int)
            );
            self.asm.puts(extend);
            self.asm.puts(xchg);
        }
        Ok(())
    }

    fn handle_compare_set(
        &mut self,
        instr: &Instruction,
        cond: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_int_compare(instr, cond, kind)?;
        self.handle_set(instr, &format!("set{}", cond), 2)
    }

    /// Bit-test with an implicit all-ones mask, or a masked test.
    fn handle_test(&mut self, instr: &Instruction, kind: OperandKind) -> Result<(), Diagnostic> {
        let value = self.operand(instr, 0)?;
        let mask = match instr.operands.len() {
            2 => Operand::Imm(-1),
            3 => self.operand(instr, 1)?.clone(),
            other => {
                return Err(Diagnostic::unsupported_operand(
                    format!("'{}' expects 2 or 3 operands, got {}", instr.opcode, other),
                    instr.span,
                ))
            }
        };

        if mask == Operand::Imm(-1) {
            if matches!(value, Operand::Reg(_)) {
                let reg = self.render(value, kind, instr.span)?;
                let line = format!(
                    "test{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&reg, &reg)
                );
                self.asm.puts(line);
            } else {
                let zero = self.lit("0");
                let rendered = self.render(value, kind, instr.span)?;
                let line = format!(
                    "cmp{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&zero, &rendered)
                );
                self.asm.puts(line);
            }
        } else {
            let mask_text = self.render(&mask, kind, instr.span)?;
            let value_text = self.render(value, kind, instr.span)?;
            let line = format!(
                "test{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&mask_text, &value_text)
            );
            self.asm.puts(line);
        }
        Ok(())
    }

    fn handle_branch_test(
        &mut self,
        instr: &Instruction,
        cond: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_test(instr, kind)?;
        let last = instr.operands.len() - 1;
        let label = self.branch_label(self.operand(instr, last)?, instr.span)?;
        self.asm.puts(format!("j{} {}", cond, label));
        Ok(())
    }

    fn handle_set_test(
        &mut self,
        instr: &Instruction,
        cond: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_test(instr, kind)?;
        self.handle_set(instr, &format!("set{}", cond), instr.operands.len() - 1)
    }

    /// Arithmetic fused with a flag branch: the op's expansion followed
    /// by the jump to the final label operand.
    fn handle_op_branch(
        &mut self,
        instr: &Instruction,
        op_text: &str,
        jump: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        self.handle_op_with_operands(instr, op_text, kind, instr.operands.len() - 1)?;
        self.emit_fused_jump(instr, jump)
    }

    fn emit_fused_jump(&mut self, instr: &Instruction, jump: &str) -> Result<(), Diagnostic> {
        let target_index = match instr.operands.len() {
            4 => 3,
            3 => 2,
            other => {
                return Err(Diagnostic::unsupported_operand(
                    format!("'{}' expects 3 or 4 operands, got {}", instr.opcode, other),
                    instr.span,
                ))
            }
        };
        let label = self.branch_label(self.operand(instr, target_index)?, instr.span)?;
        self.asm.puts(format!("{} {}", jump, label));
        Ok(())
    }

    fn handle_sub_branch(
        &mut self,
        instr: &Instruction,
        jump: &str,
        kind: OperandKind,
    ) -> Result<(), Diagnostic> {
        if instr.operands.len() == 4 && self.operand(instr, 1)? == self.operand(instr, 2)? {
            // a - b with b as destination: negate and add, flags match.
            let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
            let neg = format!("neg{} {}", self.suffix(kind, instr)?, dst);
            self.asm.puts(neg);
            let src = self.render(self.operand(instr, 0)?, kind, instr.span)?;
            let add = format!(
                "add{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&src, &dst)
            );
            self.asm.puts(add);
        } else {
            let op_text = format!("sub{}", self.suffix(kind, instr)?);
            self.handle_op_with_operands(instr, &op_text, kind, instr.operands.len() - 1)?;
        }
        self.emit_fused_jump(instr, jump)
    }

    /// Non-aliasing 3-operand adds become address computations so no
    /// source is clobbered before being read.
    fn handle_add(&mut self, instr: &Instruction, kind: OperandKind) -> Result<(), Diagnostic> {
        let count = instr.operands.len();
        if count == 3 && self.operand(instr, 1)? == self.operand(instr, 2)? {
            if *self.operand(instr, 0)? != Operand::Imm(0) {
                let src = self.render(self.operand(instr, 0)?, kind, instr.span)?;
                let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
                let line = format!(
                    "add{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&src, &dst)
                );
                self.asm.puts(line);
            }
        } else if count == 3 && self.operand(instr, 0)?.is_imm() {
            let value = match self.operand(instr, 0)? {
                Operand::Imm(value) => *value,
                _ => unreachable!(),
            };
            self.expect_reg(instr, 1)?;
            self.expect_reg(instr, 2)?;
            if value == 0 {
                if self.operand(instr, 1)? != self.operand(instr, 2)? {
                    let src = self.render(self.operand(instr, 1)?, kind, instr.span)?;
                    let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
                    let line = format!(
                        "mov{} {}",
                        self.suffix(kind, instr)?,
                        self.order_operands(&src, &dst)
                    );
                    self.asm.puts(line);
                }
            } else {
                let base = self.render(self.operand(instr, 1)?, kind, instr.span)?;
                let address = self.offset_register(value, &base);
                let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
                let line = format!(
                    "lea{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&address, &dst)
                );
                self.asm.puts(line);
            }
        } else if count == 3 && matches!(self.operand(instr, 0)?, Operand::Reg(_)) {
            self.expect_reg(instr, 1)?;
            self.expect_reg(instr, 2)?;
            let src0 = self.render(self.operand(instr, 0)?, kind, instr.span)?;
            let src1 = self.render(self.operand(instr, 1)?, kind, instr.span)?;
            let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
            if self.operand(instr, 0)? == self.operand(instr, 2)? {
                let line = format!(
                    "add{} {}",
                    self.suffix(kind, instr)?,
                    self.order_operands(&src1, &dst)
                );
                self.asm.puts(line);
            } else if self.target.is_intel() {
                self.asm
                    .puts(format!("lea {}, [{} + {}]", dst, src0, src1));
            } else {
                self.asm.puts(format!(
                    "lea{} ({}, {}), {}",
                    self.suffix(kind, instr)?,
                    src0,
                    src1,
                    dst
                ));
            }
        } else if *self.operand(instr, 0)? != Operand::Imm(0) {
            let op_text = format!("add{}", self.suffix(kind, instr)?);
            let line = format!("{} {}", op_text, self.operands_text(instr, &[kind, kind])?);
            self.asm.puts(line);
        }
        Ok(())
    }

    fn expect_reg(&self, instr: &Instruction, index: usize) -> Result<(), Diagnostic> {
        match self.operand(instr, index)? {
            Operand::Reg(_) => Ok(()),
            other => Err(Diagnostic::unsupported_operand(
                format!("'{}' expects a register, got {:?}", instr.opcode, other),
                instr.span,
            )
            .with_operand_index(index)),
        }
    }

    fn handle_sub(&mut self, instr: &Instruction, kind: OperandKind) -> Result<(), Diagnostic> {
        if instr.operands.len() == 3 {
            if *self.operand(instr, 1)? == Operand::Imm(0) {
                self.expect_reg(instr, 0)?;
                self.expect_reg(instr, 2)?;
                if self.operand(instr, 0)? != self.operand(instr, 2)? {
                    let src = self.render(self.operand(instr, 0)?, kind, instr.span)?;
                    let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
                    let line = format!(
                        "mov{} {}",
                        self.suffix(kind, instr)?,
                        self.order_operands(&src, &dst)
                    );
                    self.asm.puts(line);
                }
                return Ok(());
            }
            if self.operand(instr, 1)? == self.operand(instr, 2)? {
                let dst = self.render(self.operand(instr, 2)?, kind, instr.span)?;
                self.asm
                    .puts(format!("neg{} {}", self.suffix(kind, instr)?, dst));
                if *self.operand(instr, 0)? != Operand::Imm(0) {
                    let src = self.render(self.operand(instr, 0)?, kind, instr.span)?;
                    let line = format!(
                        "add{} {}",
                        self.suffix(kind, instr)?,
                        self.order_operands(&src, &dst)
                    );
                    self.asm.puts(line);
                }
                return Ok(());
            }
        }

        if instr.operands.len() == 2 && *self.operand(instr, 0)? == Operand::Imm(0) {
            return Ok(());
        }

        let op_text = format!("sub{}", self.suffix(kind, instr)?);
        self.handle_op(instr, &op_text, kind)
    }

    fn handle_mul(&mut self, instr: &Instruction, kind: OperandKind) -> Result<(), Diagnostic> {
        if instr.operands.len() == 3 && self.operand(instr, 0)?.is_imm() {
            let line = format!(
                "imul{} {}",
                self.suffix(kind, instr)?,
                self.operands_text(instr, &[kind, kind, kind])?
            );
            self.asm.puts(line);
            return Ok(());
        }

        if instr.operands.len() == 2 {
            if let Operand::Imm(value) = self.operand(instr, 0)? {
                // Multiplying by a power of two is a left shift.
                if *value > 0 && value.count_ones() == 1 {
                    let amount = self.imm(value.trailing_zeros() as i64);
                    let dst = self.render(self.operand(instr, 1)?, kind, instr.span)?;
                    let line = format!(
                        "sal{} {}",
                        self.suffix(kind, instr)?,
                        self.order_operands(&amount, &dst)
                    );
                    self.asm.puts(line);
                    return Ok(());
                }
            }
        }

        let op_text = format!("imul{}", self.suffix(kind, instr)?);
        self.handle_op(instr, &op_text, kind)
    }

    fn stack_slot(&self, instr: &Instruction, index: usize) -> Result<String, Diagnostic> {
        let slot = match self.operand(instr, index)? {
            Operand::Imm(value) => *value,
            other => {
                return Err(Diagnostic::unsupported_operand(
                    format!("'{}' expects an immediate slot index, got {:?}", instr.opcode, other),
                    instr.span,
                )
                .with_operand_index(index))
            }
        };
        let sp = self.render(&Operand::Reg(Gpr::Sp), Ptr, instr.span)?;
        Ok(self.offset_register(slot * self.target.pointer_bytes(), &sp))
    }

    fn handle_peek(&mut self, instr: &Instruction) -> Result<(), Diagnostic> {
        let src = self.stack_slot(instr, 0)?;
        let dst = self.render(self.operand(instr, 1)?, Ptr, instr.span)?;
        let line = format!(
            "mov{} {}",
            self.suffix(Ptr, instr)?,
            self.order_operands(&src, &dst)
        );
        self.asm.puts(line);
        Ok(())
    }

    fn handle_poke(&mut self, instr: &Instruction) -> Result<(), Diagnostic> {
        let src = self.render(self.operand(instr, 0)?, Ptr, instr.span)?;
        let dst = self.stack_slot(instr, 1)?;
        let line = format!(
            "mov{} {}",
            self.suffix(Ptr, instr)?,
            self.order_operands(&src, &dst)
        );
        self.asm.puts(line);
        Ok(())
    }

    /// Full-register-width move. Zero immediates into registers become a
    /// self-clear; identical source and destination emit nothing.
    fn handle_move(&mut self, instr: &Instruction) -> Result<(), Diagnostic> {
        let wide = if self.target.is_64() { Quad } else { Ptr };
        let op0 = self.operand(instr, 0)?;
        let op1 = self.operand(instr, 1)?;
        if *op0 == Operand::Imm(0) && matches!(op1, Operand::Reg(_)) {
            let dst = self.render(op1, wide, instr.span)?;
            self.asm
                .puts(format!("xor{} {}, {}", self.suffix(wide, instr)?, dst, dst));
        } else if op0 != op1 {
            let line = format!(
                "mov{} {}",
                self.suffix(wide, instr)?,
                self.operands_text(instr, &[wide, wide])?
            );
            self.asm.puts(line);
        }
        Ok(())
    }

    fn emit_lea(&mut self, instr: &Instruction, kind: OperandKind) -> Result<(), Diagnostic> {
        let src = self.operand(instr, 0)?;
        let dst = self.operand(instr, 1)?;
        if let Operand::LabelRef { name, .. } = src {
            let dst_ptr = self.render(dst, Ptr, instr.span)?;
            if self.target.is_intel() {
                self.asm.puts(format!("lea {}, {}", dst_ptr, name));
            } else {
                self.asm
                    .puts(format!("movq {}@GOTPCREL({}), {}", name, self.reg("rip"), dst_ptr));
            }
            let name = name.clone();
            self.mark_label_used(&name);
        } else {
            let address = self.address_operand(src, kind, instr.span)?;
            let dst = self.render(dst, kind, instr.span)?;
            let line = format!(
                "lea{} {}",
                self.suffix(kind, instr)?,
                self.order_operands(&address, &dst)
            );
            self.asm.puts(line);
        }
        Ok(())
    }

    fn fp_scratch(&self) -> String {
        self.reg("xmm7")
    }

    // --- Dispatch ---

    fn dispatch(&mut self, instr: &Instruction) -> Result<(), Diagnostic> {
        let span = instr.span;
        match instr.opcode.as_str() {
            "addi" => self.handle_add(instr, Int),
            "addp" => self.handle_add(instr, Ptr),
            "addq" => self.handle_add(instr, Quad),
            "andi" => {
                let op = format!("and{}", self.suffix(Int, instr)?);
                self.handle_op(instr, &op, Int)
            }
            "andp" => {
                let op = format!("and{}", self.suffix(Ptr, instr)?);
                self.handle_op(instr, &op, Ptr)
            }
            "andq" => {
                let op = format!("and{}", self.suffix(Quad, instr)?);
                self.handle_op(instr, &op, Quad)
            }
            "lshifti" => self.handle_shift(instr, "sal", Int),
            "lshiftp" => self.handle_shift(instr, "sal", Ptr),
            "lshiftq" => self.handle_shift(instr, "sal", Quad),
            "muli" => self.handle_mul(instr, Int),
            "mulp" => self.handle_mul(instr, Ptr),
            "mulq" => self.handle_mul(instr, Quad),
            "negi" => {
                let line = format!(
                    "neg{} {}",
                    self.suffix(Int, instr)?,
                    self.operands_text(instr, &[Int])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "negp" => {
                let line = format!(
                    "neg{} {}",
                    self.suffix(Ptr, instr)?,
                    self.operands_text(instr, &[Ptr])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "negq" => {
                let line = format!(
                    "neg{} {}",
                    self.suffix(Quad, instr)?,
                    self.operands_text(instr, &[Quad])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "noti" => {
                let line = format!(
                    "not{} {}",
                    self.suffix(Int, instr)?,
                    self.operands_text(instr, &[Int])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "notp" => {
                let line = format!(
                    "not{} {}",
                    self.suffix(Ptr, instr)?,
                    self.operands_text(instr, &[Ptr])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "notq" => {
                let line = format!(
                    "not{} {}",
                    self.suffix(Quad, instr)?,
                    self.operands_text(instr, &[Quad])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "ori" => {
                let op = format!("or{}", self.suffix(Int, instr)?);
                self.handle_op(instr, &op, Int)
            }
            "orp" => {
                let op = format!("or{}", self.suffix(Ptr, instr)?);
                self.handle_op(instr, &op, Ptr)
            }
            "orq" => {
                let op = format!("or{}", self.suffix(Quad, instr)?);
                self.handle_op(instr, &op, Quad)
            }
            "rshifti" => self.handle_shift(instr, "sar", Int),
            "rshiftp" => self.handle_shift(instr, "sar", Ptr),
            "rshiftq" => self.handle_shift(instr, "sar", Quad),
            "urshifti" => self.handle_shift(instr, "shr", Int),
            "urshiftp" => self.handle_shift(instr, "shr", Ptr),
            "urshiftq" => self.handle_shift(instr, "shr", Quad),
            "subi" => self.handle_sub(instr, Int),
            "subp" => self.handle_sub(instr, Ptr),
            "subq" => self.handle_sub(instr, Quad),
            "xori" => {
                let op = format!("xor{}", self.suffix(Int, instr)?);
                self.handle_op(instr, &op, Int)
            }
            "xorp" => {
                let op = format!("xor{}", self.suffix(Ptr, instr)?);
                self.handle_op(instr, &op, Ptr)
            }
            "xorq" => {
                let op = format!("xor{}", self.suffix(Quad, instr)?);
                self.handle_op(instr, &op, Quad)
            }
            "leai" => {
                let src = self.operand(instr, 0)?;
                let address = self.address_operand(src, Int, span)?;
                let dst = self.render(self.operand(instr, 1)?, Int, span)?;
                let line = format!(
                    "lea{} {}",
                    self.suffix(Int, instr)?,
                    self.order_operands(&address, &dst)
                );
                self.asm.puts(line);
                Ok(())
            }
            "leap" => self.emit_lea(instr, Ptr),

            // --- Loads and stores ---
            "loadi" => {
                let operands = self.load_operands(instr, Int, Int)?;
                let line = format!("mov{} {}", self.suffix(Int, instr)?, operands);
                self.asm.puts(line);
                Ok(())
            }
            "storei" => {
                let line = format!(
                    "mov{} {}",
                    self.suffix(Int, instr)?,
                    self.operands_text(instr, &[Int, Int])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "loadis" => {
                if self.target.is_64() {
                    let operands = self.load_operands(instr, Int, Quad)?;
                    let mnemonic = if self.target.is_intel() {
                        "movsxd"
                    } else {
                        "movslq"
                    };
                    self.asm.puts(format!("{} {}", mnemonic, operands));
                } else {
                    let operands = self.load_operands(instr, Int, Int)?;
                    let line = format!("mov{} {}", self.suffix(Int, instr)?, operands);
                    self.asm.puts(line);
                }
                Ok(())
            }
            "loadp" => {
                let operands = self.load_operands(instr, Ptr, Ptr)?;
                let line = format!("mov{} {}", self.suffix(Ptr, instr)?, operands);
                self.asm.puts(line);
                Ok(())
            }
            "storep" => {
                let line = format!(
                    "mov{} {}",
                    self.suffix(Ptr, instr)?,
                    self.operands_text(instr, &[Ptr, Ptr])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "loadq" => {
                let operands = self.load_operands(instr, Quad, Quad)?;
                let line = format!("mov{} {}", self.suffix(Quad, instr)?, operands);
                self.asm.puts(line);
                Ok(())
            }
            "storeq" => {
                let line = format!(
                    "mov{} {}",
                    self.suffix(Quad, instr)?,
                    self.operands_text(instr, &[Quad, Quad])?
                );
                self.asm.puts(line);
                Ok(())
            }
            "loadb" => {
                let operands = self.load_operands(instr, Byte, Int)?;
                let mnemonic = if self.target.is_intel() {
                    "movzx"
                } else {
                    "movzbl"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "loadbsi" => {
                let operands = self.load_operands(instr, Byte, Int)?;
                let mnemonic = if self.target.is_intel() {
                    "movsx"
                } else {
                    "movsbl"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "loadbsq" => {
                let operands = self.load_operands(instr, Byte, Quad)?;
                let mnemonic = if self.target.is_intel() {
                    "movsx"
                } else {
                    "movsbq"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "loadh" => {
                let operands = self.load_operands(instr, Half, Int)?;
                let mnemonic = if self.target.is_intel() {
                    "movzx"
                } else {
                    "movzwl"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "loadhsi" => {
                let operands = self.load_operands(instr, Half, Int)?;
                let mnemonic = if self.target.is_intel() {
                    "movsx"
                } else {
                    "movswl"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "loadhsq" => {
                let operands = self.load_operands(instr, Half, Quad)?;
                let mnemonic = if self.target.is_intel() {
                    "movsx"
                } else {
                    "movswq"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "storeb" => {
                let line = format!(
                    "mov{} {}",
                    self.suffix(Byte, instr)?,
                    self.operands_text(instr, &[Byte, Byte])?
                );
                self.asm.puts(line);
                Ok(())
            }

            // --- Floating point ---
            "loadd" | "moved" | "stored" => {
                let line = format!("movsd {}", self.operands_text(instr, &[Double, Double])?);
                self.asm.puts(line);
                Ok(())
            }
            "addd" => {
                let line = format!("addsd {}", self.operands_text(instr, &[Double, Double])?);
                self.asm.puts(line);
                Ok(())
            }
            "muld" => {
                let line = format!("mulsd {}", self.operands_text(instr, &[Double, Double])?);
                self.asm.puts(line);
                Ok(())
            }
            "subd" => {
                let line = format!("subsd {}", self.operands_text(instr, &[Double, Double])?);
                self.asm.puts(line);
                Ok(())
            }
            "divd" => {
                let line = format!("divsd {}", self.operands_text(instr, &[Double, Double])?);
                self.asm.puts(line);
                Ok(())
            }
            "sqrtd" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let dst = self.render(self.operand(instr, 1)?, Double, span)?;
                self.asm
                    .puts(format!("sqrtsd {}", self.order_operands(&src, &dst)));
                Ok(())
            }
            "ci2d" => {
                let src = self.render(self.operand(instr, 0)?, Int, span)?;
                let dst = self.render(self.operand(instr, 1)?, Double, span)?;
                self.asm
                    .puts(format!("cvtsi2sd {}", self.order_operands(&src, &dst)));
                Ok(())
            }
            "movdz" => {
                let dst = self.render(self.operand(instr, 0)?, Double, span)?;
                self.asm.puts(format!("xorpd {}, {}", dst, dst));
                Ok(())
            }

            // --- Double-precision branches ---
            "bdeq" => {
                let op0 = self.render(self.operand(instr, 0)?, Double, span)?;
                let op1 = self.render(self.operand(instr, 1)?, Double, span)?;
                self.asm
                    .puts(format!("ucomisd {}", self.order_operands(&op0, &op1)));
                if self.operand(instr, 0)? == self.operand(instr, 1)? {
                    // Statically equal modulo NaN: equal iff ordered.
                    let label = self.branch_label(self.operand(instr, 2)?, span)?;
                    self.asm.puts(format!("jnp {}", label));
                } else {
                    let unordered = self.fresh_local_label("bdeq");
                    self.asm.puts(format!("jp {}", unordered));
                    let label = self.branch_label(self.operand(instr, 2)?, span)?;
                    self.asm.puts(format!("je {}", label));
                    self.asm.label(&unordered);
                }
                Ok(())
            }
            "bdneq" => self.handle_double_branch(instr, "jne", false),
            "bdgt" => self.handle_double_branch(instr, "ja", false),
            "bdgteq" => self.handle_double_branch(instr, "jae", false),
            "bdlt" => self.handle_double_branch(instr, "ja", true),
            "bdlteq" => self.handle_double_branch(instr, "jae", true),
            "bdequn" => self.handle_double_branch(instr, "je", false),
            "bdnequn" => {
                let op0 = self.render(self.operand(instr, 0)?, Double, span)?;
                let op1 = self.render(self.operand(instr, 1)?, Double, span)?;
                self.asm
                    .puts(format!("ucomisd {}", self.order_operands(&op0, &op1)));
                if self.operand(instr, 0)? == self.operand(instr, 1)? {
                    // Statically equal modulo NaN: unequal iff unordered.
                    let label = self.branch_label(self.operand(instr, 2)?, span)?;
                    self.asm.puts(format!("jp {}", label));
                } else {
                    let unordered = self.fresh_local_label("bdnequn");
                    let equal = self.fresh_local_label("bdnequn");
                    self.asm.puts(format!("jp {}", unordered));
                    self.asm.puts(format!("je {}", equal));
                    self.asm.label(&unordered);
                    let label = self.branch_label(self.operand(instr, 2)?, span)?;
                    self.asm.puts(format!("jmp {}", label));
                    self.asm.label(&equal);
                }
                Ok(())
            }
            "bdgtun" => self.handle_double_branch(instr, "jb", true),
            "bdgtequn" => self.handle_double_branch(instr, "jbe", true),
            "bdltun" => self.handle_double_branch(instr, "jb", false),
            "bdltequn" => self.handle_double_branch(instr, "jbe", false),

            // --- Truncating conversions ---
            "td2i" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let dst = self.render(self.operand(instr, 1)?, Int, span)?;
                self.asm
                    .puts(format!("cvttsd2si {}", self.order_operands(&src, &dst)));
                Ok(())
            }
            "btd2i" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let dst = self.render(self.operand(instr, 1)?, Int, span)?;
                self.asm
                    .puts(format!("cvttsd2si {}", self.order_operands(&src, &dst)));
                // The reserved invalid-result pattern of cvttsd2si.
                let sentinel = self.lit("0x80000000");
                let compare = format!(
                    "cmp{} {}",
                    self.suffix(Int, instr)?,
                    self.order_operands(&sentinel, &dst)
                );
                self.asm.puts(compare);
                let label = self.branch_label(self.operand(instr, 2)?, span)?;
                self.asm.puts(format!("je {}", label));
                Ok(())
            }
            "bcd2i" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let dst = self.render(self.operand(instr, 1)?, Int, span)?;
                self.asm
                    .puts(format!("cvttsd2si {}", self.order_operands(&src, &dst)));
                let test = format!("test{} {}, {}", self.suffix(Int, instr)?, dst, dst);
                self.asm.puts(test);
                let label = self.branch_label(self.operand(instr, 2)?, span)?;
                self.asm.puts(format!("je {}", label));
                // NaN-safe round trip: convert back and require exact
                // equality, rejecting unordered.
                let scratch = self.fp_scratch();
                self.asm.puts(format!(
                    "cvtsi2sd {}",
                    self.order_operands(&dst, &scratch)
                ));
                self.asm
                    .puts(format!("ucomisd {}", self.order_operands(&src, &scratch)));
                self.asm.puts(format!("jp {}", label));
                self.asm.puts(format!("jne {}", label));
                Ok(())
            }

            // --- 64-bit double pack/unpack ---
            "fii2d" => {
                let lo = self.render(self.operand(instr, 0)?, Int, span)?;
                let hi = self.render(self.operand(instr, 1)?, Int, span)?;
                let dst = self.render(self.operand(instr, 2)?, Double, span)?;
                let scratch = self.fp_scratch();
                self.asm
                    .puts(format!("movd {}", self.order_operands(&lo, &dst)));
                self.asm
                    .puts(format!("movd {}", self.order_operands(&hi, &scratch)));
                let shift = self.lit("32");
                self.asm
                    .puts(format!("psllq {}", self.order_operands(&shift, &scratch)));
                self.asm
                    .puts(format!("por {}", self.order_operands(&scratch, &dst)));
                Ok(())
            }
            "fd2ii" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let lo = self.render(self.operand(instr, 1)?, Int, span)?;
                let hi = self.render(self.operand(instr, 2)?, Int, span)?;
                let scratch = self.fp_scratch();
                self.asm
                    .puts(format!("movd {}", self.order_operands(&src, &lo)));
                self.asm
                    .puts(format!("movsd {}", self.order_operands(&src, &scratch)));
                let shift = self.lit("32");
                self.asm
                    .puts(format!("psrlq {}", self.order_operands(&shift, &scratch)));
                self.asm
                    .puts(format!("movd {}", self.order_operands(&scratch, &hi)));
                Ok(())
            }
            "fq2d" => {
                let src = self.render(self.operand(instr, 0)?, Quad, span)?;
                let dst = self.render(self.operand(instr, 1)?, Double, span)?;
                if self.target.is_intel() {
                    // MASM rejects movq between register classes; movd
                    // moves a qword there.
                    self.asm.puts(format!("movd {}, {}", dst, src));
                } else {
                    self.asm.puts(format!("movq {}, {}", src, dst));
                }
                Ok(())
            }
            "fd2q" => {
                let src = self.render(self.operand(instr, 0)?, Double, span)?;
                let dst = self.render(self.operand(instr, 1)?, Quad, span)?;
                if self.target.is_intel() {
                    self.asm.puts(format!("movd {}, {}", dst, src));
                } else {
                    self.asm.puts(format!("movq {}, {}", src, dst));
                }
                Ok(())
            }

            // --- Moves, extensions, stack ---
            "move" => self.handle_move(instr),
            "sxi2q" => {
                let operands = {
                    let src = self.render(self.operand(instr, 0)?, Int, span)?;
                    let dst = self.render(self.operand(instr, 1)?, Quad, span)?;
                    self.order_operands(&src, &dst)
                };
                let mnemonic = if self.target.is_intel() {
                    "movsxd"
                } else {
                    "movslq"
                };
                self.asm.puts(format!("{} {}", mnemonic, operands));
                Ok(())
            }
            "zxi2q" => {
                // A 32-bit move zero-extends implicitly.
                let src = self.render(self.operand(instr, 0)?, Int, span)?;
                let dst = self.render(self.operand(instr, 1)?, Int, span)?;
                let line = format!(
                    "mov{} {}",
                    self.suffix(Int, instr)?,
                    self.order_operands(&src, &dst)
                );
                self.asm.puts(line);
                Ok(())
            }
            "pop" => {
                for index in 0..instr.operands.len() {
                    let operand = self.render(self.operand(instr, index)?, Ptr, span)?;
                    self.asm.puts(format!("pop {}", operand));
                }
                Ok(())
            }
            "push" => {
                for index in 0..instr.operands.len() {
                    let operand = self.render(self.operand(instr, index)?, Ptr, span)?;
                    self.asm.puts(format!("push {}", operand));
                }
                Ok(())
            }
            "peek" => self.handle_peek(instr),
            "poke" => self.handle_poke(instr),

            // --- Integer compare-branches ---
            "bieq" => self.handle_int_branch(instr, "e", Int),
            "bpeq" => self.handle_int_branch(instr, "e", Ptr),
            "bqeq" => self.handle_int_branch(instr, "e", Quad),
            "bineq" => self.handle_int_branch(instr, "ne", Int),
            "bpneq" => self.handle_int_branch(instr, "ne", Ptr),
            "bqneq" => self.handle_int_branch(instr, "ne", Quad),
            "bia" => self.handle_int_branch(instr, "a", Int),
            "bpa" => self.handle_int_branch(instr, "a", Ptr),
            "bqa" => self.handle_int_branch(instr, "a", Quad),
            "biaeq" => self.handle_int_branch(instr, "ae", Int),
            "bpaeq" => self.handle_int_branch(instr, "ae", Ptr),
            "bqaeq" => self.handle_int_branch(instr, "ae", Quad),
            "bib" => self.handle_int_branch(instr, "b", Int),
            "bpb" => self.handle_int_branch(instr, "b", Ptr),
            "bqb" => self.handle_int_branch(instr, "b", Quad),
            "bibeq" => self.handle_int_branch(instr, "be", Int),
            "bpbeq" => self.handle_int_branch(instr, "be", Ptr),
            "bqbeq" => self.handle_int_branch(instr, "be", Quad),
            "bigt" => self.handle_int_branch(instr, "g", Int),
            "bpgt" => self.handle_int_branch(instr, "g", Ptr),
            "bqgt" => self.handle_int_branch(instr, "g", Quad),
            "bigteq" => self.handle_int_branch(instr, "ge", Int),
            "bpgteq" => self.handle_int_branch(instr, "ge", Ptr),
            "bqgteq" => self.handle_int_branch(instr, "ge", Quad),
            "bilt" => self.handle_int_branch(instr, "l", Int),
            "bplt" => self.handle_int_branch(instr, "l", Ptr),
            "bqlt" => self.handle_int_branch(instr, "l", Quad),
            "bilteq" => self.handle_int_branch(instr, "le", Int),
            "bplteq" => self.handle_int_branch(instr, "le", Ptr),
            "bqlteq" => self.handle_int_branch(instr, "le", Quad),
            "bbeq" => self.handle_int_branch(instr, "e", Byte),
            "bbneq" => self.handle_int_branch(instr, "ne", Byte),
            "bba" => self.handle_int_branch(instr, "a", Byte),
            "bbaeq" => self.handle_int_branch(instr, "ae", Byte),
            "bbb" => self.handle_int_branch(instr, "b", Byte),
            "bbbeq" => self.handle_int_branch(instr, "be", Byte),
            "bbgt" => self.handle_int_branch(instr, "g", Byte),
            "bbgteq" => self.handle_int_branch(instr, "ge", Byte),
            "bblt" => self.handle_int_branch(instr, "l", Byte),
            "bblteq" => self.handle_int_branch(instr, "le", Byte),

            // --- Test-branches ---
            "btis" => self.handle_branch_test(instr, "s", Int),
            "btps" => self.handle_branch_test(instr, "s", Ptr),
            "btqs" => self.handle_branch_test(instr, "s", Quad),
            "btiz" => self.handle_branch_test(instr, "z", Int),
            "btpz" => self.handle_branch_test(instr, "z", Ptr),
            "btqz" => self.handle_branch_test(instr, "z", Quad),
            "btinz" => self.handle_branch_test(instr, "nz", Int),
            "btpnz" => self.handle_branch_test(instr, "nz", Ptr),
            "btqnz" => self.handle_branch_test(instr, "nz", Quad),
            "btbs" => self.handle_branch_test(instr, "s", Byte),
            "btbz" => self.handle_branch_test(instr, "z", Byte),
            "btbnz" => self.handle_branch_test(instr, "nz", Byte),

            // --- Flag branches ---
            "bo" => {
                let label = self.branch_label(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("jo {}", label));
                Ok(())
            }
            "bs" => {
                let label = self.branch_label(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("js {}", label));
                Ok(())
            }
            "bz" => {
                let label = self.branch_label(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("jz {}", label));
                Ok(())
            }
            "bnz" => {
                let label = self.branch_label(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("jnz {}", label));
                Ok(())
            }
            "jmp" => {
                let target = self.call_target(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("jmp {}", target));
                Ok(())
            }

            // --- Arithmetic fused with flag branches ---
            "baddio" => {
                let op = format!("add{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jo", Int)
            }
            "baddpo" => {
                let op = format!("add{}", self.suffix(Ptr, instr)?);
                self.handle_op_branch(instr, &op, "jo", Ptr)
            }
            "baddqo" => {
                let op = format!("add{}", self.suffix(Quad, instr)?);
                self.handle_op_branch(instr, &op, "jo", Quad)
            }
            "baddis" => {
                let op = format!("add{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "js", Int)
            }
            "baddps" => {
                let op = format!("add{}", self.suffix(Ptr, instr)?);
                self.handle_op_branch(instr, &op, "js", Ptr)
            }
            "baddqs" => {
                let op = format!("add{}", self.suffix(Quad, instr)?);
                self.handle_op_branch(instr, &op, "js", Quad)
            }
            "baddiz" => {
                let op = format!("add{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jz", Int)
            }
            "baddpz" => {
                let op = format!("add{}", self.suffix(Ptr, instr)?);
                self.handle_op_branch(instr, &op, "jz", Ptr)
            }
            "baddqz" => {
                let op = format!("add{}", self.suffix(Quad, instr)?);
                self.handle_op_branch(instr, &op, "jz", Quad)
            }
            "baddinz" => {
                let op = format!("add{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jnz", Int)
            }
            "baddpnz" => {
                let op = format!("add{}", self.suffix(Ptr, instr)?);
                self.handle_op_branch(instr, &op, "jnz", Ptr)
            }
            "baddqnz" => {
                let op = format!("add{}", self.suffix(Quad, instr)?);
                self.handle_op_branch(instr, &op, "jnz", Quad)
            }
            "bsubio" => self.handle_sub_branch(instr, "jo", Int),
            "bsubis" => self.handle_sub_branch(instr, "js", Int),
            "bsubiz" => self.handle_sub_branch(instr, "jz", Int),
            "bsubinz" => self.handle_sub_branch(instr, "jnz", Int),
            "bmulio" => {
                let op = format!("imul{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jo", Int)
            }
            "bmulis" => {
                let op = format!("imul{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "js", Int)
            }
            "bmuliz" => {
                let op = format!("imul{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jz", Int)
            }
            "bmulinz" => {
                let op = format!("imul{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jnz", Int)
            }
            "borio" => {
                let op = format!("or{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jo", Int)
            }
            "boris" => {
                let op = format!("or{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "js", Int)
            }
            "boriz" => {
                let op = format!("or{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jz", Int)
            }
            "borinz" => {
                let op = format!("or{}", self.suffix(Int, instr)?);
                self.handle_op_branch(instr, &op, "jnz", Int)
            }

            // --- Calls and miscellaneous ---
            "break" => {
                self.asm.puts(format!("int {}", self.lit("3")));
                Ok(())
            }
            "call" => {
                let target = self.call_target(self.operand(instr, 0)?, span)?;
                self.asm.puts(format!("call {}", target));
                Ok(())
            }
            "ret" => {
                self.asm.puts("ret");
                Ok(())
            }
            "nop" => {
                self.asm.puts("nop");
                Ok(())
            }
            "cdqi" => {
                self.asm.puts("cdq");
                Ok(())
            }
            "idivi" => {
                let operand = self.render(self.operand(instr, 0)?, Int, span)?;
                self.asm
                    .puts(format!("idiv{} {}", self.suffix(Int, instr)?, operand));
                Ok(())
            }
            "memfence" => {
                if self.target.is_intel() {
                    self.asm.puts("mfence");
                } else {
                    // No mfence spelling here; a locked no-op store is a
                    // full fence.
                    let sp = self.render(&Operand::Reg(Gpr::Sp), Ptr, span)?;
                    self.asm.puts(format!("lock; orl $0, ({})", sp));
                }
                Ok(())
            }

            // --- Integer compare-to-boolean ---
            "cieq" => self.handle_compare_set(instr, "e", Int),
            "cbeq" => self.handle_compare_set(instr, "e", Byte),
            "cpeq" => self.handle_compare_set(instr, "e", Ptr),
            "cqeq" => self.handle_compare_set(instr, "e", Quad),
            "cineq" => self.handle_compare_set(instr, "ne", Int),
            "cbneq" => self.handle_compare_set(instr, "ne", Byte),
            "cpneq" => self.handle_compare_set(instr, "ne", Ptr),
            "cqneq" => self.handle_compare_set(instr, "ne", Quad),
            "cia" => self.handle_compare_set(instr, "a", Int),
            "cba" => self.handle_compare_set(instr, "a", Byte),
            "cpa" => self.handle_compare_set(instr, "a", Ptr),
            "cqa" => self.handle_compare_set(instr, "a", Quad),
            "ciaeq" => self.handle_compare_set(instr, "ae", Int),
            "cbaeq" => self.handle_compare_set(instr, "ae", Byte),
            "cpaeq" => self.handle_compare_set(instr, "ae", Ptr),
            "cqaeq" => self.handle_compare_set(instr, "ae", Quad),
            "cib" => self.handle_compare_set(instr, "b", Int),
            "cbb" => self.handle_compare_set(instr, "b", Byte),
            "cpb" => self.handle_compare_set(instr, "b", Ptr),
            "cqb" => self.handle_compare_set(instr, "b", Quad),
            "cibeq" => self.handle_compare_set(instr, "be", Int),
            "cbbeq" => self.handle_compare_set(instr, "be", Byte),
            "cpbeq" => self.handle_compare_set(instr, "be", Ptr),
            "cqbeq" => self.handle_compare_set(instr, "be", Quad),
            "cigt" => self.handle_compare_set(instr, "g", Int),
            "cbgt" => self.handle_compare_set(instr, "g", Byte),
            "cpgt" => self.handle_compare_set(instr, "g", Ptr),
            "cqgt" => self.handle_compare_set(instr, "g", Quad),
            "cigteq" => self.handle_compare_set(instr, "ge", Int),
            "cbgteq" => self.handle_compare_set(instr, "ge", Byte),
            "cpgteq" => self.handle_compare_set(instr, "ge", Ptr),
            "cqgteq" => self.handle_compare_set(instr, "ge", Quad),
            "cilt" => self.handle_compare_set(instr, "l", Int),
            "cblt" => self.handle_compare_set(instr, "l", Byte),
            "cplt" => self.handle_compare_set(instr, "l", Ptr),
            "cqlt" => self.handle_compare_set(instr, "l", Quad),
            "cilteq" => self.handle_compare_set(instr, "le", Int),
            "cblteq" => self.handle_compare_set(instr, "le", Byte),
            "cplteq" => self.handle_compare_set(instr, "le", Ptr),
            "cqlteq" => self.handle_compare_set(instr, "le", Quad),

            // --- Test-to-boolean ---
            "tis" => self.handle_set_test(instr, "s", Int),
            "tiz" => self.handle_set_test(instr, "z", Int),
            "tinz" => self.handle_set_test(instr, "nz", Int),
            "tps" => self.handle_set_test(instr, "s", Ptr),
            "tpz" => self.handle_set_test(instr, "z", Ptr),
            "tpnz" => self.handle_set_test(instr, "nz", Ptr),
            "tqs" => self.handle_set_test(instr, "s", Quad),
            "tqz" => self.handle_set_test(instr, "z", Quad),
            "tqnz" => self.handle_set_test(instr, "nz", Quad),
            "tbs" => self.handle_set_test(instr, "s", Byte),
            "tbz" => self.handle_set_test(instr, "z", Byte),
            "tbnz" => self.handle_set_test(instr, "nz", Byte),

            other => Err(Diagnostic::unsupported_opcode(
                format!("unknown opcode '{}'", other),
                span,
            )
            .with_opcode(other)),
        }
    }
}
