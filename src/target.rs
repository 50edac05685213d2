use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Word width of the target variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordWidth {
    W32,
    W64,
}

/// Calling-convention variant determining the physical-register
/// assignment for argument / return / callee-saved roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Abi {
    Default,
    Windows,
}

/// Textual convention for operand order and size annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Att,
    Intel,
}

/// Immutable target configuration, consumed by every other component.
///
/// Exactly four word-width × ABI combinations exist; the syntax dialect
/// is independently selectable for any of them.
#[derive(Clone, Debug)]
pub struct TargetConfig {
    /// Short identifier used to select the target (e.g. "x86_64").
    pub name: &'static str,
    pub word_width: WordWidth,
    pub abi: Abi,
    pub dialect: Dialect,
}

impl TargetConfig {
    pub fn x86() -> Self {
        Self {
            name: "x86",
            word_width: WordWidth::W32,
            abi: Abi::Default,
            dialect: Dialect::Att,
        }
    }

    pub fn x86_win() -> Self {
        Self {
            name: "x86_win",
            word_width: WordWidth::W32,
            abi: Abi::Windows,
            dialect: Dialect::Att,
        }
    }

    pub fn x86_64() -> Self {
        Self {
            name: "x86_64",
            word_width: WordWidth::W64,
            abi: Abi::Default,
            dialect: Dialect::Att,
        }
    }

    pub fn x86_64_win() -> Self {
        Self {
            name: "x86_64_win",
            word_width: WordWidth::W64,
            abi: Abi::Windows,
            dialect: Dialect::Att,
        }
    }

    /// Resolve a target identifier, with an optional explicit syntax
    /// dialect override. Pure; no side effects.
    pub fn resolve(name: &str, dialect: Option<Dialect>) -> Result<Self, Diagnostic> {
        let config = match name {
            "x86" => Self::x86(),
            "x86_win" => Self::x86_win(),
            "x86_64" => Self::x86_64(),
            "x86_64_win" => Self::x86_64_win(),
            other => {
                return Err(Diagnostic::configuration(
                    format!("unknown target '{}'", other),
                    Span::dummy(),
                )
                .with_help(
                    "available targets: x86, x86_win, x86_64, x86_64_win".to_string(),
                ))
            }
        };
        Ok(match dialect {
            Some(dialect) => Self { dialect, ..config },
            None => config,
        })
    }

    pub fn is_64(&self) -> bool {
        self.word_width == WordWidth::W64
    }

    pub fn is_windows(&self) -> bool {
        self.abi == Abi::Windows
    }

    pub fn is_intel(&self) -> bool {
        self.dialect == Dialect::Intel
    }

    /// Size of a pointer-width slot in bytes.
    pub fn pointer_bytes(&self) -> i64 {
        if self.is_64() {
            8
        } else {
            4
        }
    }
}
