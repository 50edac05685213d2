use crate::span::Span;

/// A translation diagnostic. Every failure is fatal for the whole
/// translation; there is no local recovery or partial output.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    /// Abstract opcode of the instruction being lowered, when known.
    pub opcode: Option<String>,
    /// Index of the offending operand, when known.
    pub operand_index: Option<usize>,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Bad target identifier, or a register that does not exist on the
    /// active word width / ABI.
    Configuration,
    /// Opcode outside the recognized vocabulary, or recognized but not
    /// available on the active target.
    UnsupportedOpcode,
    /// Operand variant / kind combination that cannot be rendered for the
    /// requested opcode.
    UnsupportedOperand,
    /// Immediate that cannot be legalized because the scratch register is
    /// already reserved within the same instruction.
    EncodingRange,
}

impl Diagnostic {
    pub fn configuration(message: String, span: Span) -> Self {
        Self::new(DiagnosticKind::Configuration, message, span)
    }

    pub fn unsupported_opcode(message: String, span: Span) -> Self {
        Self::new(DiagnosticKind::UnsupportedOpcode, message, span)
    }

    pub fn unsupported_operand(message: String, span: Span) -> Self {
        Self::new(DiagnosticKind::UnsupportedOperand, message, span)
    }

    pub fn encoding_range(message: String, span: Span) -> Self {
        Self::new(DiagnosticKind::EncodingRange, message, span)
    }

    fn new(kind: DiagnosticKind, message: String, span: Span) -> Self {
        Self {
            kind,
            message,
            span,
            opcode: None,
            operand_index: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_opcode(mut self, opcode: &str) -> Self {
        self.opcode = Some(opcode.to_string());
        self
    }

    pub fn with_operand_index(mut self, index: usize) -> Self {
        self.operand_index = Some(index);
        self
    }

    /// Attach opcode context unless a more specific one is already set.
    pub fn or_opcode(mut self, opcode: &str) -> Self {
        if self.opcode.is_none() {
            self.opcode = Some(opcode.to_string());
        }
        self
    }

    /// Attach an operand index unless one is already set.
    pub fn or_operand_index(mut self, index: usize) -> Self {
        if self.operand_index.is_none() {
            self.operand_index = Some(index);
        }
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Render the diagnostic to stderr using ariadne, against the
    /// macro-assembly source the IR was built from.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let mut report = Report::build(ReportKind::Error, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );

        if let Some(opcode) = &self.opcode {
            report = report.with_note(format!("while lowering '{}'", opcode));
        }
        if let Some(index) = self.operand_index {
            report = report.with_note(format!("operand {}", index));
        }
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        report
            .finish()
            .eprint((filename, Source::from(source)))
            .ok();
    }
}
