use crate::source_map::Range;
use serde::Serialize;

pub const E_ATTR_SYNTAX: &str = "E_ATTR_SYNTAX";
pub const E_TARGET_ORPHAN: &str = "E_TARGET_ORPHAN";
pub const E_FETCH_FAILED: &str = "E_FETCH_FAILED";
pub const E_FRAGMENT_NOT_FOUND: &str = "E_FRAGMENT_NOT_FOUND";

pub const W_UNSUPPORTED_FORMAT: &str = "W_UNSUPPORTED_FORMAT";
pub const W_INVALID_SHIFT: &str = "W_INVALID_SHIFT";
pub const W_DIRECTIVE_SYNTAX: &str = "W_DIRECTIVE_SYNTAX";
pub const W_INCLUDED_SOURCE: &str = "W_INCLUDED_SOURCE";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: &'static str,
    pub component: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

impl Diagnostic {
    pub fn new(
        severity: DiagnosticSeverity,
        code: &'static str,
        component: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code,
            component,
            message: message.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        }
    }
}

/// Collector threaded through one expansion run.
///
/// Every diagnostic is also forwarded to the `log` facade; the collector stays
/// the authoritative record that callers and tests inspect.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(
        &mut self,
        component: &'static str,
        code: &'static str,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            code,
            component,
            message,
        ));
    }

    pub fn error(
        &mut self,
        component: &'static str,
        code: &'static str,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Error,
            code,
            component,
            message,
        ));
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            DiagnosticSeverity::Warning => {
                log::warn!("[{}] {}", diagnostic.component, diagnostic.message)
            }
            DiagnosticSeverity::Error => {
                log::error!("[{}] {}", diagnostic.component, diagnostic.message)
            }
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.items
            .iter()
            .any(|diag| diag.severity == DiagnosticSeverity::Error)
    }

    pub fn count(&self, severity: DiagnosticSeverity) -> usize {
        self.items
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
