//! Immediate legalization pass.
//!
//! 64-bit targets restrict in-place immediates to a 32-bit signed range.
//! This pass scans the whole sequence in order and, for every instruction
//! other than `move`, replaces the first out-of-range immediate with the
//! reserved scratch register, inserting a synthetic `move` of the
//! immediate into the scratch right before the rewritten instruction.
//! Input nodes are never mutated.

use std::borrow::Cow;

use crate::diagnostic::Diagnostic;
use crate::ir::{Instruction, Node, Operand};
use crate::target::TargetConfig;

/// Whether an immediate is encodable in place on a 64-bit target.
fn encodable_in_place(value: i64) -> bool {
    (-0x8000_0000..=0x7fff_ffff).contains(&value)
}

/// Rewrite a sequence so every remaining immediate is encodable in place.
/// Identity on 32-bit targets, which have no immediate range limit.
pub fn legalize_sequence<'n>(
    nodes: &'n [Node],
    target: &TargetConfig,
) -> Result<Cow<'n, [Node]>, Diagnostic> {
    if !target.is_64() {
        return Ok(Cow::Borrowed(nodes));
    }

    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            // `move` takes a full-width immediate; everything else gets
            // at most one scratch substitution.
            Node::Instr(instr) if instr.opcode != "move" => {
                let mut used_scratch = false;
                let mut operands = instr.operands.clone();
                for (index, operand) in instr.operands.iter().enumerate() {
                    let value = match operand {
                        Operand::Imm(value) if !encodable_in_place(*value) => *value,
                        _ => continue,
                    };
                    if used_scratch {
                        return Err(Diagnostic::encoding_range(
                            format!(
                                "immediate {} cannot be legalized: scratch register \
                                 already reserved for this instruction",
                                value
                            ),
                            instr.span,
                        )
                        .with_opcode(&instr.opcode)
                        .with_operand_index(index));
                    }
                    out.push(Node::Instr(Instruction::new(
                        "move",
                        vec![Operand::Imm(value), Operand::Scratch],
                        instr.span,
                    )));
                    operands[index] = Operand::Scratch;
                    used_scratch = true;
                }
                if used_scratch {
                    let mut rewritten =
                        Instruction::new(instr.opcode.clone(), operands, instr.span);
                    rewritten.annotation = instr.annotation.clone();
                    out.push(Node::Instr(rewritten));
                } else {
                    out.push(node.clone());
                }
            }
            _ => out.push(node.clone()),
        }
    }
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;
    use crate::ir::Gpr;

    fn addq(imm: i64) -> Node {
        Node::Instr(Instruction::synthetic(
            "addq",
            vec![Operand::Imm(imm), Operand::Reg(Gpr::T0)],
        ))
    }

    #[test]
    fn test_in_range_untouched() {
        let nodes = vec![addq(42), addq(-0x8000_0000)];
        let out = legalize_sequence(&nodes, &TargetConfig::x86_64()).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_out_of_range_substituted() {
        let nodes = vec![addq(0x1_0000_0000)];
        let out = legalize_sequence(&nodes, &TargetConfig::x86_64()).unwrap();
        assert_eq!(out.len(), 2);
        match &out[0] {
            Node::Instr(instr) => {
                assert_eq!(instr.opcode, "move");
                assert_eq!(instr.operands[0], Operand::Imm(0x1_0000_0000));
                assert_eq!(instr.operands[1], Operand::Scratch);
            }
            other => panic!("expected inserted move, got {:?}", other),
        }
        match &out[1] {
            Node::Instr(instr) => {
                assert_eq!(instr.opcode, "addq");
                assert_eq!(instr.operands[0], Operand::Scratch);
            }
            other => panic!("expected rewritten addq, got {:?}", other),
        }
    }

    #[test]
    fn test_move_exempt() {
        let nodes = vec![Node::Instr(Instruction::synthetic(
            "move",
            vec![Operand::Imm(i64::MAX), Operand::Reg(Gpr::T0)],
        ))];
        let out = legalize_sequence(&nodes, &TargetConfig::x86_64()).unwrap();
        assert_eq!(out.len(), 1);
        match &out[0] {
            Node::Instr(instr) => assert_eq!(instr.operands[0], Operand::Imm(i64::MAX)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_second_substitution_fails() {
        let nodes = vec![Node::Instr(Instruction::synthetic(
            "addq",
            vec![
                Operand::Imm(0x1_0000_0000),
                Operand::Imm(-0x1_0000_0000),
                Operand::Reg(Gpr::T0),
            ],
        ))];
        let err = legalize_sequence(&nodes, &TargetConfig::x86_64()).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::EncodingRange);
        assert_eq!(err.opcode.as_deref(), Some("addq"));
        assert_eq!(err.operand_index, Some(1));
    }

    #[test]
    fn test_32_bit_pass_through() {
        let nodes = vec![addq(0x1_0000_0000)];
        let out = legalize_sequence(&nodes, &TargetConfig::x86()).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_structural_nodes_pass_through() {
        let nodes = vec![
            Node::Label("entry".to_string()),
            addq(0x1_0000_0000),
            Node::LocalLabel("_loop".to_string()),
            Node::Skip,
        ];
        let out = legalize_sequence(&nodes, &TargetConfig::x86_64()).unwrap();
        assert_eq!(out.len(), 5);
        assert!(matches!(&out[0], Node::Label(name) if name == "entry"));
        assert!(matches!(&out[3], Node::LocalLabel(name) if name == "_loop"));
        assert!(matches!(&out[4], Node::Skip));
    }
}
