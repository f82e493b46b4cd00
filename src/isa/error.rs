use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::isa::diagnostic::{DiagnosticLevel, InstDiagnostic, SourcePosition};

/// Represents any failure that can occur while loading, mapping, validating, or tabulating
/// instruction descriptions.
#[derive(Debug, Error)]
pub enum InstError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse of '{}' failed{}: {message}", .path.display(), position_suffix(.position))]
    Parse {
        path: PathBuf,
        position: Option<SourcePosition>,
        message: String,
    },
    #[error("{}", format_schema(.path, .diagnostics))]
    Schema {
        path: PathBuf,
        diagnostics: Vec<InstDiagnostic>,
    },
    #[error(
        "duplicate instruction '{mnemonic}' defined in '{}' and '{}'",
        .first.display(),
        .second.display()
    )]
    DuplicateInstruction {
        mnemonic: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("emit error: {0}")]
    Emit(String),
}

impl InstError {
    pub fn parse(
        path: &Path,
        position: Option<SourcePosition>,
        message: impl Into<String>,
    ) -> Self {
        InstError::Parse {
            path: path.to_path_buf(),
            position,
            message: message.into(),
        }
    }

    /// Source file the error is attributed to, when it concerns a single file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            InstError::Io { path, .. }
            | InstError::Parse { path, .. }
            | InstError::Schema { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }
}

fn position_suffix(position: &Option<SourcePosition>) -> String {
    position
        .map(|pos| format!(" at {pos}"))
        .unwrap_or_default()
}

fn format_schema(path: &Path, diagnostics: &[InstDiagnostic]) -> String {
    let mut out = format!(
        "schema error in '{}': {} issue(s)",
        path.display(),
        diagnostics.len()
    );
    for diag in diagnostics {
        out.push_str("\n  - ");
        out.push_str(&diag.format_human());
    }
    out
}

/// Every way a well-formed document can fail to describe a valid instruction set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("document root must be <{expected}>, found <{found}>")]
    UnexpectedRootElement { expected: &'static str, found: String },
    #[error("<{parent}> may not contain <{found}>")]
    UnexpectedElement { parent: &'static str, found: String },
    #[error("<{element}> may not contain text")]
    UnexpectedText { element: &'static str },
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("<{element}> has unknown attribute '{attribute}'")]
    UnknownAttribute { element: &'static str, attribute: String },
    #[error("<{element}> attribute '{attribute}' is not a valid number: '{value}'")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("<{element}> attribute '{attribute}' has invalid value '{value}' (expected {expected})")]
    InvalidValue {
        element: &'static str,
        attribute: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("<{element}> may not combine '{first}' with '{second}'")]
    ConflictingAttributes {
        element: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("instruction '{mnemonic}' declares word index {index} more than once")]
    DuplicateWordIndex { mnemonic: String, index: u32 },
    #[error("instruction '{mnemonic}' word indices must be contiguous from 0; expected {expected}, found {found}")]
    WordIndexGap {
        mnemonic: String,
        expected: u32,
        found: u32,
    },
    #[error("instruction mnemonic must not be empty")]
    EmptyMnemonic,
    #[error("instruction '{mnemonic}' has no words")]
    NoWords { mnemonic: String },
    #[error("instruction '{mnemonic}' word {index} is at position {position}")]
    WordIndexMismatch {
        mnemonic: String,
        index: u32,
        position: usize,
    },
    #[error("instruction '{mnemonic}' word {index} has illegal width {width} (legal: {legal:?})")]
    IllegalWordWidth {
        mnemonic: String,
        index: u32,
        width: u32,
        legal: Vec<u32>,
    },
    #[error("instruction '{mnemonic}' word {index} has no fields")]
    EmptyWord { mnemonic: String, index: u32 },
    #[error("field '{field}' of instruction '{mnemonic}' word {word} has zero width")]
    ZeroWidthField {
        mnemonic: String,
        word: u32,
        field: String,
    },
    #[error(
        "field '{field}' of instruction '{mnemonic}' word {word} (offset {offset}, width {width}) exceeds the {word_width}-bit word"
    )]
    FieldOutOfRange {
        mnemonic: String,
        word: u32,
        field: String,
        offset: u32,
        width: u32,
        word_width: u32,
    },
    #[error("fields '{first}' and '{second}' of instruction '{mnemonic}' word {word} overlap")]
    FieldOverlap {
        mnemonic: String,
        word: u32,
        first: String,
        second: String,
    },
    #[error("instruction '{mnemonic}' declares field '{field}' more than once")]
    DuplicateFieldName { mnemonic: String, field: String },
    #[error("instruction '{mnemonic}' declares more than one opcode field")]
    DuplicateOpcodeField { mnemonic: String },
    #[error("fixed value {value:#x} of field '{field}' in instruction '{mnemonic}' does not fit in {width} bits")]
    FixedValueTooWide {
        mnemonic: String,
        field: String,
        value: u64,
        width: u32,
    },
    #[error("bias {minus} of field '{field}' in instruction '{mnemonic}' exceeds i64::MAX")]
    BiasTooLarge {
        mnemonic: String,
        field: String,
        minus: u64,
    },
    #[error("instruction '{mnemonic}' opcode {opcode:#x} disagrees with opcode field value {value:#x}")]
    OpcodeMismatch {
        mnemonic: String,
        opcode: u64,
        value: u64,
    },
    #[error("instruction '{mnemonic}' opcode {opcode:#x} does not fit in its {width}-bit opcode field")]
    OpcodeTooWide {
        mnemonic: String,
        opcode: u64,
        width: u32,
    },
    #[error("instruction '{mnemonic}' is defined more than once in this file")]
    DuplicateMnemonic { mnemonic: String },
}

impl SchemaViolation {
    /// Stable machine-readable code for the violation.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaViolation::UnexpectedRootElement { .. } => "schema.unexpected-root",
            SchemaViolation::UnexpectedElement { .. } => "schema.unexpected-element",
            SchemaViolation::UnexpectedText { .. } => "schema.unexpected-text",
            SchemaViolation::MissingAttribute { .. } => "schema.missing-attribute",
            SchemaViolation::UnknownAttribute { .. } => "schema.unknown-attribute",
            SchemaViolation::InvalidNumber { .. } => "schema.invalid-number",
            SchemaViolation::InvalidValue { .. } => "schema.invalid-value",
            SchemaViolation::ConflictingAttributes { .. } => "schema.conflicting-attributes",
            SchemaViolation::DuplicateWordIndex { .. } => "schema.duplicate-word-index",
            SchemaViolation::WordIndexGap { .. } => "schema.word-index-gap",
            SchemaViolation::EmptyMnemonic => "validation.empty-mnemonic",
            SchemaViolation::NoWords { .. } => "validation.no-words",
            SchemaViolation::WordIndexMismatch { .. } => "validation.word-index",
            SchemaViolation::IllegalWordWidth { .. } => "validation.word-width",
            SchemaViolation::EmptyWord { .. } => "validation.empty-word",
            SchemaViolation::ZeroWidthField { .. } => "validation.zero-width-field",
            SchemaViolation::FieldOutOfRange { .. } => "validation.field-range",
            SchemaViolation::FieldOverlap { .. } => "validation.field-overlap",
            SchemaViolation::DuplicateFieldName { .. } => "validation.duplicate-field",
            SchemaViolation::DuplicateOpcodeField { .. } => "validation.duplicate-opcode-field",
            SchemaViolation::FixedValueTooWide { .. } => "validation.fixed-value",
            SchemaViolation::BiasTooLarge { .. } => "validation.bias-range",
            SchemaViolation::OpcodeMismatch { .. } => "validation.opcode-mismatch",
            SchemaViolation::OpcodeTooWide { .. } => "validation.opcode-width",
            SchemaViolation::DuplicateMnemonic { .. } => "validation.duplicate-mnemonic",
        }
    }

    pub fn level(&self) -> DiagnosticLevel {
        match self {
            SchemaViolation::EmptyWord { .. } => DiagnosticLevel::Warning,
            _ => DiagnosticLevel::Error,
        }
    }
}
