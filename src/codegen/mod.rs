//! Macro-assembly → x86 translation pipeline.
//!
//! The sequence is legalized first (immediate rewriting on 64-bit
//! targets), then each node is lowered in original order. Emission order
//! matters: local-label scoping and jump text depend on it, which is why
//! legalization must fully complete before any instruction is lowered.

mod legalize;
mod lower;
mod operand;
mod regs;
#[cfg(test)]
mod tests;

pub use legalize::legalize_sequence;

use crate::asm::Assembler;
use crate::diagnostic::Diagnostic;
use crate::ir::Node;
use crate::target::TargetConfig;

/// Result of one whole-sequence translation.
#[derive(Debug)]
pub struct Translation {
    /// Emitted assembly, one statement per line.
    pub lines: Vec<String>,
    /// Global labels referenced position-independently, in first-use
    /// order; the embedder emits indirection stubs for these.
    pub used_labels: Vec<String>,
}

/// Per-translation emission state: line sink, target, local-label
/// uniqueness counter, and the used-label record. Owned exclusively by a
/// single translation call and never exposed across calls.
pub(crate) struct LowerCtx<'a> {
    pub(crate) target: &'a TargetConfig,
    pub(crate) asm: Assembler,
    label_counter: u32,
    used_labels: Vec<String>,
}

impl<'a> LowerCtx<'a> {
    pub(crate) fn new(target: &'a TargetConfig) -> Self {
        Self {
            target,
            asm: Assembler::new(),
            label_counter: 0,
            used_labels: Vec::new(),
        }
    }

    /// Fresh local label, unique within this translation.
    pub(crate) fn fresh_local_label(&mut self, stem: &str) -> String {
        let name = format!("_{}_{}", stem, self.label_counter);
        self.label_counter += 1;
        name
    }

    pub(crate) fn mark_label_used(&mut self, name: &str) {
        if !self.used_labels.iter().any(|used| used == name) {
            self.used_labels.push(name.to_string());
        }
    }

    fn emit_annotation(&mut self, text: &str) {
        let line = if self.target.is_intel() {
            format!("; {}", text)
        } else {
            format!("# {}", text)
        };
        self.asm.puts(line);
    }

    fn finish(self) -> Translation {
        Translation {
            lines: self.asm.into_lines(),
            used_labels: self.used_labels,
        }
    }
}

/// Translate a full IR sequence for one target. All-or-nothing: any
/// unsupported opcode, operand, or register aborts the translation and no
/// partial line output is valid.
pub fn lower(nodes: &[Node], target: &TargetConfig) -> Result<Translation, Diagnostic> {
    let legalized = legalize_sequence(nodes, target)?;
    let mut ctx = LowerCtx::new(target);
    for node in legalized.iter() {
        match node {
            Node::Instr(instr) => {
                if let Some(annotation) = &instr.annotation {
                    ctx.emit_annotation(annotation);
                }
                ctx.lower_instruction(instr)?;
            }
            Node::Label(name) | Node::LocalLabel(name) => ctx.asm.label(name),
            Node::Skip => {}
        }
    }
    Ok(ctx.finish())
}
