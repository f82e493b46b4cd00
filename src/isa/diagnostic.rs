use std::fmt;
use std::path::PathBuf;

/// Phase of the pipeline that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticPhase {
    Xml,
    Schema,
    Validation,
}

/// Severity of a diagnostic. Only errors fail a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticLevel {
    Error,
    Warning,
}

/// A precise source position (1-indexed line/column) inside an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Resolves a byte offset into `src` to a line/column pair. Offsets past the end clamp to
    /// the last position.
    pub fn from_offset(src: &str, offset: usize) -> Self {
        let offset = offset.min(src.len());
        let mut line = 1;
        let mut line_start = 0;
        for (idx, byte) in src.as_bytes()[..offset].iter().enumerate() {
            if *byte == b'\n' {
                line += 1;
                line_start = idx + 1;
            }
        }
        let column = src[line_start..offset].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A position inside a specific source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub path: PathBuf,
    pub start: SourcePosition,
}

impl SourceSpan {
    pub fn new(path: PathBuf, start: SourcePosition) -> Self {
        Self { path, start }
    }
}

/// Structured diagnostic suitable for tooling integration.
#[derive(Debug, Clone)]
pub struct InstDiagnostic {
    pub phase: DiagnosticPhase,
    pub level: DiagnosticLevel,
    pub code: &'static str,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl InstDiagnostic {
    pub fn new(
        phase: DiagnosticPhase,
        level: DiagnosticLevel,
        code: &'static str,
        message: impl Into<String>,
        span: Option<SourceSpan>,
    ) -> Self {
        Self {
            phase,
            level,
            code,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagnosticLevel::Error
    }

    pub fn format_human(&self) -> String {
        let location = self
            .span
            .as_ref()
            .map(|span| format!("{}:{}", span.path.display(), span.start))
            .unwrap_or_else(|| "<unknown>".to_string());
        format!(
            "{level:?} {code}: {message} @ {location}",
            level = self.level,
            code = self.code,
            message = self.message,
            location = location
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_resolves_to_line_and_column() {
        let src = "<root>\n  <inst/>\n</root>";
        let offset = src.find("<inst").expect("inst tag");
        assert_eq!(SourcePosition::from_offset(src, offset), SourcePosition::new(2, 3));
        assert_eq!(SourcePosition::from_offset(src, 0), SourcePosition::new(1, 1));
    }

    #[test]
    fn offset_past_end_clamps() {
        let src = "ab\ncd";
        assert_eq!(SourcePosition::from_offset(src, 99), SourcePosition::new(2, 3));
    }

    #[test]
    fn human_format_names_location() {
        let diag = InstDiagnostic::new(
            DiagnosticPhase::Schema,
            DiagnosticLevel::Error,
            "schema.missing-attribute",
            "<field> is missing required attribute 'name'",
            Some(SourceSpan::new(PathBuf::from("load.xml"), SourcePosition::new(4, 7))),
        );
        assert_eq!(
            diag.format_human(),
            "Error schema.missing-attribute: <field> is missing required attribute 'name' @ load.xml:4:7"
        );
    }
}
