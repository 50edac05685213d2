pub mod asm;
pub mod codegen;
pub mod diagnostic;
pub mod ir;
pub mod span;
pub mod target;

// Re-export the public surface — preserves `macroasm::X` paths used by tests
pub use codegen::{legalize_sequence, lower, Translation};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use ir::{Fpr, Gpr, Instruction, Node, Operand, OperandKind, Scale};
pub use span::Span;
pub use target::{Abi, Dialect, TargetConfig, WordWidth};

/// Translate a sequence for a named target: resolve the configuration,
/// then lower. The one-call entry point for embedders that do not keep a
/// [`TargetConfig`] around.
pub fn translate(
    nodes: &[Node],
    target_name: &str,
    dialect: Option<Dialect>,
) -> Result<Translation, Diagnostic> {
    let target = TargetConfig::resolve(target_name, dialect)?;
    lower(nodes, &target)
}
