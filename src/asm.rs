//! Append-only assembly text sink.

/// Collects the emitted assembly, one syntactically complete statement
/// per line. Append-only: nothing ever rewrites a line once pushed.
#[derive(Debug, Default)]
pub struct Assembler {
    lines: Vec<String>,
}

impl Assembler {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn puts(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Emit a label definition line.
    pub fn label(&mut self, name: &str) {
        self.lines.push(format!("{}:", name));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
