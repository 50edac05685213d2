//! Whole-pipeline lowering tests: one instruction (or short sequence) in,
//! exact emitted lines out, across targets and dialects.

use super::lower;
use crate::diagnostic::DiagnosticKind;
use crate::ir::{Fpr, Gpr, Instruction, Node, Operand, Scale};
use crate::target::{Dialect, TargetConfig};

fn x86_64_intel() -> TargetConfig {
    TargetConfig::resolve("x86_64", Some(Dialect::Intel)).unwrap()
}

fn lower_one(opcode: &str, operands: Vec<Operand>, target: &TargetConfig) -> Vec<String> {
    let nodes = vec![Node::Instr(Instruction::synthetic(opcode, operands))];
    lower(&nodes, target)
        .unwrap_or_else(|diag| panic!("'{}' should lower: {}", opcode, diag.message))
        .lines
}

fn reg(gpr: Gpr) -> Operand {
    Operand::Reg(gpr)
}

fn fp(fpr: Fpr) -> Operand {
    Operand::FpReg(fpr)
}

fn addr(base: Gpr, offset: i64) -> Operand {
    Operand::Addr { base, offset }
}

// --- Moves ---

#[test]
fn test_move_immediate() {
    let lines = lower_one(
        "move",
        vec![Operand::Imm(5), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movq $5, %rax"]);

    let lines = lower_one("move", vec![Operand::Imm(5), reg(Gpr::T0)], &TargetConfig::x86());
    assert_eq!(lines, ["movl $5, %eax"]);

    let lines = lower_one("move", vec![Operand::Imm(5), reg(Gpr::T0)], &x86_64_intel());
    assert_eq!(lines, ["mov rax, 5"]);
}

#[test]
fn test_move_zero_uses_xor() {
    let lines = lower_one(
        "move",
        vec![Operand::Imm(0), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["xorq %rax, %rax"]);

    // Zero into memory is still a plain store.
    let lines = lower_one(
        "move",
        vec![Operand::Imm(0), addr(Gpr::T1, 8)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movq $0, 8(%rsi)"]);
}

#[test]
fn test_move_same_register_elided() {
    let lines = lower_one(
        "move",
        vec![reg(Gpr::T0), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert!(lines.is_empty());
}

#[test]
fn test_move_full_width_immediate() {
    let lines = lower_one(
        "move",
        vec![Operand::Imm(0x1_0000_0000), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movq $4294967296, %rax"]);
}

#[test]
fn test_windows_abi_mapping_flows_through() {
    let lines = lower_one(
        "move",
        vec![reg(Gpr::T5), reg(Gpr::T0)],
        &TargetConfig::x86_64_win(),
    );
    assert_eq!(lines, ["movq %rcx, %rax"]);

    let lines = lower_one(
        "move",
        vec![reg(Gpr::A0), reg(Gpr::T0)],
        &TargetConfig::x86_64_win(),
    );
    assert_eq!(lines, ["movq %rcx, %rax"]);
}

// --- Add family ---

#[test]
fn test_add_two_operand() {
    let lines = lower_one(
        "addi",
        vec![reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["addl %esi, %eax"]);
}

#[test]
fn test_add_zero_elided() {
    let lines = lower_one(
        "addi",
        vec![Operand::Imm(0), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert!(lines.is_empty());
}

#[test]
fn test_add_three_operand_immediate_is_lea() {
    let lines = lower_one(
        "addi",
        vec![Operand::Imm(4), reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["leal 4(%esi), %eax"]);

    let lines = lower_one(
        "addp",
        vec![Operand::Imm(4), reg(Gpr::T1), reg(Gpr::T0)],
        &x86_64_intel(),
    );
    assert_eq!(lines, ["lea rax, [4 + rsi]"]);

    let lines = lower_one(
        "addi",
        vec![Operand::Imm(4), reg(Gpr::T0), reg(Gpr::T1)],
        &TargetConfig::x86(),
    );
    assert_eq!(lines, ["leal 4(%eax), %edx"]);
}

#[test]
fn test_add_three_operand_registers_is_lea() {
    let lines = lower_one(
        "addq",
        vec![reg(Gpr::T0), reg(Gpr::T1), reg(Gpr::T2)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["leaq (%rax, %rsi), %rdx"]);

    let lines = lower_one(
        "addq",
        vec![reg(Gpr::T0), reg(Gpr::T1), reg(Gpr::T2)],
        &x86_64_intel(),
    );
    assert_eq!(lines, ["lea rdx, [rax + rsi]"]);
}

#[test]
fn test_add_three_operand_aliasing_dst() {
    let lines = lower_one(
        "addi",
        vec![reg(Gpr::T1), reg(Gpr::T0), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["addl %esi, %eax"]);
}

// --- Sub family ---

#[test]
fn test_sub_reversed_destination_negates() {
    let lines = lower_one(
        "subi",
        vec![reg(Gpr::T0), reg(Gpr::T1), reg(Gpr::T1)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["negl %esi", "addl %eax, %esi"]);
}

#[test]
fn test_sub_zero_is_mov() {
    let lines = lower_one(
        "subi",
        vec![reg(Gpr::T0), Operand::Imm(0), reg(Gpr::T1)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movl %eax, %esi"]);
}

#[test]
fn test_sub_general_three_operand() {
    let lines = lower_one(
        "subi",
        vec![reg(Gpr::T0), reg(Gpr::T1), reg(Gpr::T2)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movl %eax, %edx", "subl %esi, %edx"]);
}

// --- Mul and shifts ---

#[test]
fn test_mul_power_of_two_is_shift() {
    let lines = lower_one(
        "muli",
        vec![Operand::Imm(8), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["sall $3, %eax"]);
}

#[test]
fn test_mul_three_operand_immediate() {
    let lines = lower_one(
        "muli",
        vec![Operand::Imm(5), reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["imull $5, %esi, %eax"]);
}

#[test]
fn test_mul_non_power_of_two() {
    let lines = lower_one(
        "muli",
        vec![Operand::Imm(3), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["imull $3, %eax"]);
}

#[test]
fn test_shift_immediate_count() {
    let lines = lower_one(
        "lshifti",
        vec![Operand::Imm(5), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["sall $5, %eax"]);
}

#[test]
fn test_shift_count_already_in_cl() {
    // t3 maps to ecx on the 64-bit default ABI.
    let lines = lower_one(
        "urshifti",
        vec![reg(Gpr::T3), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["shrl %cl, %eax"]);
}

#[test]
fn test_shift_count_relocates_through_cl() {
    let lines = lower_one(
        "rshiftq",
        vec![reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["xchgq %rsi, %rcx", "sarq %cl, %rax", "xchgq %rsi, %rcx"]
    );
}

// --- Bitwise and unary ---

#[test]
fn test_bitwise_ops() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("andi", vec![reg(Gpr::T1), reg(Gpr::T0)], &t64),
        ["andl %esi, %eax"]
    );
    assert_eq!(
        lower_one("orq", vec![reg(Gpr::T1), reg(Gpr::T0)], &t64),
        ["orq %rsi, %rax"]
    );
    assert_eq!(
        lower_one("xori", vec![Operand::Imm(1), reg(Gpr::T0)], &t64),
        ["xorl $1, %eax"]
    );
    assert_eq!(lower_one("negq", vec![reg(Gpr::T0)], &t64), ["negq %rax"]);
    assert_eq!(lower_one("noti", vec![reg(Gpr::T0)], &t64), ["notl %eax"]);
}

// --- Loads and stores ---

#[test]
fn test_loads_and_stores() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("loadi", vec![addr(Gpr::T0, 8), reg(Gpr::T1)], &t64),
        ["movl 8(%rax), %esi"]
    );
    assert_eq!(
        lower_one("storep", vec![reg(Gpr::T1), addr(Gpr::T0, 8)], &t64),
        ["movq %rsi, 8(%rax)"]
    );
    assert_eq!(
        lower_one("storeb", vec![reg(Gpr::T0), addr(Gpr::T1, 0)], &t64),
        ["movb %al, 0(%rsi)"]
    );
}

#[test]
fn test_base_index_addressing() {
    let element = Operand::BaseIndex {
        base: Gpr::T0,
        index: Gpr::T1,
        scale: Scale::Eight,
        offset: 16,
    };
    let lines = lower_one(
        "loadq",
        vec![element.clone(), reg(Gpr::T2)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["movq 16(%rax, %rsi, 8), %rdx"]);

    let lines = lower_one("loadq", vec![element, reg(Gpr::T2)], &x86_64_intel());
    assert_eq!(lines, ["mov rdx, qword ptr [16 + rax + rsi * 8]"]);
}

#[test]
fn test_extending_loads() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("loadb", vec![addr(Gpr::T0, 1), reg(Gpr::T1)], &t64),
        ["movzbl 1(%rax), %esi"]
    );
    assert_eq!(
        lower_one("loadbsi", vec![addr(Gpr::T0, 1), reg(Gpr::T1)], &t64),
        ["movsbl 1(%rax), %esi"]
    );
    assert_eq!(
        lower_one("loadbsq", vec![addr(Gpr::T0, 1), reg(Gpr::T1)], &t64),
        ["movsbq 1(%rax), %rsi"]
    );
    assert_eq!(
        lower_one("loadh", vec![addr(Gpr::T0, 2), reg(Gpr::T1)], &t64),
        ["movzwl 2(%rax), %esi"]
    );
    assert_eq!(
        lower_one("loadhsq", vec![addr(Gpr::T0, 2), reg(Gpr::T1)], &t64),
        ["movswq 2(%rax), %rsi"]
    );

    let lines = lower_one("loadb", vec![addr(Gpr::T0, 1), reg(Gpr::T1)], &x86_64_intel());
    assert_eq!(lines, ["movzx esi, byte ptr [1 + rax]"]);
}

#[test]
fn test_loadis_sign_extends_on_64_bit() {
    assert_eq!(
        lower_one(
            "loadis",
            vec![addr(Gpr::T0, 4), reg(Gpr::T1)],
            &TargetConfig::x86_64()
        ),
        ["movslq 4(%rax), %rsi"]
    );
    assert_eq!(
        lower_one(
            "loadis",
            vec![addr(Gpr::T0, 4), reg(Gpr::T1)],
            &TargetConfig::x86()
        ),
        ["movl 4(%eax), %edx"]
    );
    assert_eq!(
        lower_one("loadis", vec![addr(Gpr::T0, 4), reg(Gpr::T1)], &x86_64_intel()),
        ["movsxd rsi, dword ptr [4 + rax]"]
    );
}

#[test]
fn test_label_load_is_position_independent() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "loadp",
        vec![
            Operand::LabelRef {
                name: "_table".to_string(),
                offset: 8,
            },
            reg(Gpr::T0),
        ],
    ))];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert_eq!(
        translation.lines,
        ["movq _table@GOTPCREL(%rip), %rax", "movq 8(%rax), %rax"]
    );
    assert_eq!(translation.used_labels, ["_table"]);
}

#[test]
fn test_lea() {
    assert_eq!(
        lower_one(
            "leap",
            vec![addr(Gpr::T0, 32), reg(Gpr::T1)],
            &TargetConfig::x86_64()
        ),
        ["leaq 32(%rax), %rsi"]
    );
    assert_eq!(
        lower_one(
            "leai",
            vec![addr(Gpr::T0, 32), reg(Gpr::T1)],
            &TargetConfig::x86_64()
        ),
        ["leal 32(%eax), %esi"]
    );
}

#[test]
fn test_extensions() {
    assert_eq!(
        lower_one(
            "sxi2q",
            vec![reg(Gpr::T0), reg(Gpr::T1)],
            &TargetConfig::x86_64()
        ),
        ["movslq %eax, %rsi"]
    );
    assert_eq!(
        lower_one(
            "zxi2q",
            vec![reg(Gpr::T0), reg(Gpr::T1)],
            &TargetConfig::x86_64()
        ),
        ["movl %eax, %esi"]
    );
}

// --- Compare-branches ---

#[test]
fn test_branch_equal_zero_uses_self_test() {
    let lines = lower_one(
        "bieq",
        vec![
            Operand::Imm(0),
            reg(Gpr::T0),
            Operand::local_label("_done"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["testl %eax, %eax", "je _done"]);

    // Zero on either side triggers the idiom, but only for equality.
    let lines = lower_one(
        "bineq",
        vec![
            reg(Gpr::T0),
            Operand::Imm(0),
            Operand::local_label("_done"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["testl %eax, %eax", "jne _done"]);

    let lines = lower_one(
        "bigt",
        vec![
            reg(Gpr::T0),
            Operand::Imm(0),
            Operand::local_label("_done"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["cmpl $0, %eax", "jg _done"]);
}

#[test]
fn test_branch_compare_operand_order() {
    let lines = lower_one(
        "bilt",
        vec![reg(Gpr::T0), reg(Gpr::T1), Operand::local_label("_less")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["cmpl %esi, %eax", "jl _less"]);

    let lines = lower_one(
        "bilt",
        vec![reg(Gpr::T0), reg(Gpr::T1), Operand::local_label("_less")],
        &x86_64_intel(),
    );
    assert_eq!(lines, ["cmp eax, esi", "jl _less"]);
}

#[test]
fn test_byte_branch() {
    let lines = lower_one(
        "bbaeq",
        vec![reg(Gpr::T0), reg(Gpr::T1), Operand::local_label("_ok")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["cmpb %sil, %al", "jae _ok"]);
}

#[test]
fn test_global_branch_target_recorded() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "bieq",
        vec![reg(Gpr::T0), reg(Gpr::T1), Operand::label("_slow_path")],
    ))];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert_eq!(translation.lines, ["cmpl %esi, %eax", "je _slow_path"]);
    assert_eq!(translation.used_labels, ["_slow_path"]);
}

// --- Test-branches ---

#[test]
fn test_branch_test_implicit_mask() {
    let lines = lower_one(
        "btiz",
        vec![reg(Gpr::T0), Operand::local_label("_zero")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["testl %eax, %eax", "jz _zero"]);

    let lines = lower_one(
        "btqnz",
        vec![addr(Gpr::T0, 8), Operand::local_label("_nonzero")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["cmpq $0, 8(%rax)", "jnz _nonzero"]);
}

#[test]
fn test_branch_test_explicit_mask() {
    let lines = lower_one(
        "btis",
        vec![
            reg(Gpr::T0),
            Operand::Imm(0xff),
            Operand::local_label("_signed"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["testl $255, %eax", "js _signed"]);
}

// --- Compare-to-boolean and test-to-boolean ---

#[test]
fn test_compare_set() {
    let lines = lower_one(
        "cieq",
        vec![reg(Gpr::T1), reg(Gpr::T2), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["cmpl %edx, %esi", "sete %al", "movzbl %al, %eax"]
    );

    let lines = lower_one(
        "cieq",
        vec![reg(Gpr::T1), reg(Gpr::T2), reg(Gpr::T0)],
        &x86_64_intel(),
    );
    assert_eq!(lines, ["cmp esi, edx", "sete al", "movzx eax, al"]);
}

#[test]
fn test_set_into_non_byte_register_goes_through_rax() {
    // t4 maps to r8, which has no byte form.
    let lines = lower_one(
        "cqeq",
        vec![reg(Gpr::T0), reg(Gpr::T1), reg(Gpr::T4)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        [
            "cmpq %rsi, %rax",
            "xchgq %r8, %rax",
            "sete %al",
            "movzbl %al, %eax",
            "xchgq %r8, %rax",
        ]
    );
}

#[test]
fn test_set_test() {
    let lines = lower_one(
        "tiz",
        vec![reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["testl %esi, %esi", "setz %al", "movzbl %al, %eax"]
    );

    let lines = lower_one(
        "tbnz",
        vec![reg(Gpr::T0), Operand::Imm(1), reg(Gpr::T1)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["testb $1, %al", "setnz %sil", "movzbl %sil, %esi"]
    );
}

// --- Fused arithmetic branches ---

#[test]
fn test_add_branch_overflow() {
    let lines = lower_one(
        "baddio",
        vec![reg(Gpr::T1), reg(Gpr::T0), Operand::local_label("_ovf")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["addl %esi, %eax", "jo _ovf"]);
}

#[test]
fn test_add_branch_three_operand() {
    let lines = lower_one(
        "baddiz",
        vec![
            reg(Gpr::T1),
            reg(Gpr::T2),
            reg(Gpr::T0),
            Operand::local_label("_zero"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["movl %esi, %eax", "addl %edx, %eax", "jz _zero"]
    );
}

#[test]
fn test_sub_branch_reversed_destination() {
    let lines = lower_one(
        "bsubis",
        vec![
            reg(Gpr::T1),
            reg(Gpr::T0),
            reg(Gpr::T0),
            Operand::local_label("_neg"),
        ],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["negl %eax", "addl %esi, %eax", "js _neg"]);
}

#[test]
fn test_mul_and_or_branches() {
    let lines = lower_one(
        "bmulio",
        vec![reg(Gpr::T1), reg(Gpr::T0), Operand::local_label("_ovf")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["imull %esi, %eax", "jo _ovf"]);

    let lines = lower_one(
        "borinz",
        vec![reg(Gpr::T1), reg(Gpr::T0), Operand::local_label("_set")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["orl %esi, %eax", "jnz _set"]);
}

#[test]
fn test_flag_branches() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("bo", vec![Operand::local_label("_l")], &t64),
        ["jo _l"]
    );
    assert_eq!(
        lower_one("bnz", vec![Operand::local_label("_l")], &t64),
        ["jnz _l"]
    );
}

// --- Floating point ---

#[test]
fn test_double_arithmetic() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("addd", vec![fp(Fpr::Ft1), fp(Fpr::Ft0)], &t64),
        ["addsd %xmm1, %xmm0"]
    );
    assert_eq!(
        lower_one("loadd", vec![addr(Gpr::T0, 8), fp(Fpr::Ft0)], &t64),
        ["movsd 8(%rax), %xmm0"]
    );
    assert_eq!(
        lower_one("sqrtd", vec![fp(Fpr::Ft0), fp(Fpr::Ft1)], &t64),
        ["sqrtsd %xmm0, %xmm1"]
    );
    assert_eq!(
        lower_one("ci2d", vec![reg(Gpr::T0), fp(Fpr::Ft0)], &t64),
        ["cvtsi2sd %eax, %xmm0"]
    );
    assert_eq!(
        lower_one("movdz", vec![fp(Fpr::Ft0)], &t64),
        ["xorpd %xmm0, %xmm0"]
    );
}

#[test]
fn test_double_branch_ordered() {
    let lines = lower_one(
        "bdgt",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_gt")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["ucomisd %xmm1, %xmm0", "ja _gt"]);

    // Reversed-compare variant.
    let lines = lower_one(
        "bdlt",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_lt")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["ucomisd %xmm0, %xmm1", "ja _lt"]);
}

#[test]
fn test_double_equal_skips_unordered() {
    let lines = lower_one(
        "bdeq",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_eq")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        ["ucomisd %xmm0, %xmm1", "jp _bdeq_0", "je _eq", "_bdeq_0:"]
    );

    // Same operand twice: equal exactly when ordered.
    let lines = lower_one(
        "bdeq",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft0), Operand::local_label("_eq")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["ucomisd %xmm0, %xmm0", "jnp _eq"]);
}

#[test]
fn test_double_not_equal_takes_unordered() {
    let lines = lower_one(
        "bdnequn",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_ne")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        [
            "ucomisd %xmm0, %xmm1",
            "jp _bdnequn_0",
            "je _bdnequn_1",
            "_bdnequn_0:",
            "jmp _ne",
            "_bdnequn_1:",
        ]
    );

    let lines = lower_one(
        "bdnequn",
        vec![fp(Fpr::Ft0), fp(Fpr::Ft0), Operand::local_label("_ne")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["ucomisd %xmm0, %xmm0", "jp _ne"]);
}

#[test]
fn test_truncation_with_sentinel_check() {
    let lines = lower_one(
        "btd2i",
        vec![fp(Fpr::Ft0), reg(Gpr::T0), Operand::local_label("_fail")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        [
            "cvttsd2si %xmm0, %eax",
            "cmpl $0x80000000, %eax",
            "je _fail",
        ]
    );
}

#[test]
fn test_checked_truncation_round_trips() {
    let lines = lower_one(
        "bcd2i",
        vec![fp(Fpr::Ft0), reg(Gpr::T0), Operand::local_label("_fail")],
        &TargetConfig::x86_64(),
    );
    assert_eq!(
        lines,
        [
            "cvttsd2si %xmm0, %eax",
            "testl %eax, %eax",
            "je _fail",
            "cvtsi2sd %eax, %xmm7",
            "ucomisd %xmm0, %xmm7",
            "jp _fail",
            "jne _fail",
        ]
    );
}

#[test]
fn test_double_pack_and_unpack() {
    let lines = lower_one(
        "fii2d",
        vec![reg(Gpr::T0), reg(Gpr::T1), fp(Fpr::Ft0)],
        &TargetConfig::x86(),
    );
    assert_eq!(
        lines,
        [
            "movd %eax, %xmm0",
            "movd %edx, %xmm7",
            "psllq $32, %xmm7",
            "por %xmm7, %xmm0",
        ]
    );

    let lines = lower_one(
        "fd2ii",
        vec![fp(Fpr::Ft0), reg(Gpr::T0), reg(Gpr::T1)],
        &TargetConfig::x86(),
    );
    assert_eq!(
        lines,
        [
            "movd %xmm0, %eax",
            "movsd %xmm0, %xmm7",
            "psrlq $32, %xmm7",
            "movd %xmm7, %edx",
        ]
    );
}

#[test]
fn test_quad_double_bitcast() {
    assert_eq!(
        lower_one(
            "fq2d",
            vec![reg(Gpr::T0), fp(Fpr::Ft0)],
            &TargetConfig::x86_64()
        ),
        ["movq %rax, %xmm0"]
    );
    assert_eq!(
        lower_one("fq2d", vec![reg(Gpr::T0), fp(Fpr::Ft0)], &x86_64_intel()),
        ["movd xmm0, rax"]
    );
    assert_eq!(
        lower_one(
            "fd2q",
            vec![fp(Fpr::Ft0), reg(Gpr::T0)],
            &TargetConfig::x86_64()
        ),
        ["movq %xmm0, %rax"]
    );
}

// --- Stack, calls, miscellaneous ---

#[test]
fn test_peek_and_poke() {
    assert_eq!(
        lower_one(
            "peek",
            vec![Operand::Imm(2), reg(Gpr::T0)],
            &TargetConfig::x86_64()
        ),
        ["movq 16(%rsp), %rax"]
    );
    assert_eq!(
        lower_one(
            "poke",
            vec![reg(Gpr::T0), Operand::Imm(1)],
            &TargetConfig::x86()
        ),
        ["movl %eax, 4(%esp)"]
    );
}

#[test]
fn test_push_pop() {
    let lines = lower_one(
        "push",
        vec![reg(Gpr::T0), reg(Gpr::T1)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["push %rax", "push %rsi"]);

    let lines = lower_one(
        "pop",
        vec![reg(Gpr::T1), reg(Gpr::T0)],
        &TargetConfig::x86_64(),
    );
    assert_eq!(lines, ["pop %rsi", "pop %rax"]);
}

#[test]
fn test_calls_and_jumps() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(
        lower_one("call", vec![Operand::label("_helper")], &t64),
        ["call _helper"]
    );
    assert_eq!(
        lower_one("call", vec![reg(Gpr::T0)], &t64),
        ["call *%rax"]
    );
    assert_eq!(
        lower_one("call", vec![reg(Gpr::T0)], &x86_64_intel()),
        ["call rax"]
    );
    assert_eq!(
        lower_one("jmp", vec![Operand::local_label("_loop")], &t64),
        ["jmp _loop"]
    );
    assert_eq!(
        lower_one("jmp", vec![addr(Gpr::T0, 0)], &t64),
        ["jmp *0(%rax)"]
    );
    assert_eq!(lower_one("ret", vec![], &t64), ["ret"]);
}

#[test]
fn test_misc_ops() {
    let t64 = TargetConfig::x86_64();
    assert_eq!(lower_one("break", vec![], &t64), ["int $3"]);
    assert_eq!(lower_one("nop", vec![], &t64), ["nop"]);
    assert_eq!(lower_one("cdqi", vec![], &t64), ["cdq"]);
    assert_eq!(
        lower_one("idivi", vec![reg(Gpr::T3)], &t64),
        ["idivl %ecx"]
    );
}

#[test]
fn test_memfence() {
    assert_eq!(
        lower_one("memfence", vec![], &TargetConfig::x86_64()),
        ["lock; orl $0, (%rsp)"]
    );
    assert_eq!(lower_one("memfence", vec![], &x86_64_intel()), ["mfence"]);
}

// --- Sequence-level behavior ---

#[test]
fn test_labels_and_skip() {
    let nodes = vec![
        Node::Label("entry".to_string()),
        Node::Instr(Instruction::synthetic("nop", vec![])),
        Node::LocalLabel("_loop".to_string()),
        Node::Skip,
        Node::Instr(Instruction::synthetic(
            "jmp",
            vec![Operand::local_label("_loop")],
        )),
    ];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert_eq!(translation.lines, ["entry:", "nop", "_loop:", "jmp _loop"]);
    assert!(translation.used_labels.is_empty());
}

#[test]
fn test_annotations_use_dialect_comment_syntax() {
    let nodes = vec![Node::Instr(
        Instruction::synthetic("nop", vec![]).with_annotation("spill slot 3"),
    )];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert_eq!(translation.lines, ["# spill slot 3", "nop"]);

    let translation = lower(&nodes, &x86_64_intel()).unwrap();
    assert_eq!(translation.lines, ["; spill slot 3", "nop"]);
}

#[test]
fn test_wide_immediate_goes_through_scratch() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "addq",
        vec![Operand::Imm(0x1_0000_0000), reg(Gpr::T0)],
    ))];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert_eq!(
        translation.lines,
        ["movq $4294967296, %r11", "addq %r11, %rax"]
    );
}

#[test]
fn test_local_label_counter_is_per_translation() {
    let nodes = vec![
        Node::Instr(Instruction::synthetic(
            "bdeq",
            vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_a")],
        )),
        Node::Instr(Instruction::synthetic(
            "bdeq",
            vec![fp(Fpr::Ft0), fp(Fpr::Ft1), Operand::local_label("_b")],
        )),
    ];
    let translation = lower(&nodes, &TargetConfig::x86_64()).unwrap();
    assert!(translation.lines.contains(&"_bdeq_0:".to_string()));
    assert!(translation.lines.contains(&"_bdeq_1:".to_string()));

    // A fresh translation starts over.
    let translation = lower(&nodes[..1], &TargetConfig::x86_64()).unwrap();
    assert!(translation.lines.contains(&"_bdeq_0:".to_string()));
}

// --- Errors ---

#[test]
fn test_unknown_opcode_rejected() {
    let nodes = vec![Node::Instr(Instruction::synthetic("frobnicate", vec![]))];
    let err = lower(&nodes, &TargetConfig::x86_64()).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedOpcode);
    assert_eq!(err.opcode.as_deref(), Some("frobnicate"));
}

#[test]
fn test_quad_opcode_rejected_on_32_bit() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "addq",
        vec![reg(Gpr::T1), reg(Gpr::T0)],
    ))];
    let err = lower(&nodes, &TargetConfig::x86()).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedOpcode);
    assert_eq!(err.opcode.as_deref(), Some("addq"));
}

#[test]
fn test_unmapped_register_rejected() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "move",
        vec![reg(Gpr::Csr0), reg(Gpr::T0)],
    ))];
    let err = lower(&nodes, &TargetConfig::x86()).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Configuration);
    assert_eq!(err.opcode.as_deref(), Some("move"));
}

#[test]
fn test_byte_access_to_extended_register_rejected() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "storeb",
        vec![reg(Gpr::T4), addr(Gpr::T0, 0)],
    ))];
    let err = lower(&nodes, &TargetConfig::x86_64()).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedOperand);
    assert_eq!(err.opcode.as_deref(), Some("storeb"));
    assert_eq!(err.operand_index, Some(0));
}

#[test]
fn test_missing_operand_rejected() {
    let nodes = vec![Node::Instr(Instruction::synthetic(
        "bieq",
        vec![reg(Gpr::T0), reg(Gpr::T1)],
    ))];
    let err = lower(&nodes, &TargetConfig::x86_64()).unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::UnsupportedOperand);
    assert_eq!(err.opcode.as_deref(), Some("bieq"));
}
