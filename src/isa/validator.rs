//! Structural validation for parsed roots: word widths, field bounds, overlap, and name/role
//! uniqueness.

use ahash::{AHashMap, AHashSet};

use super::ast::{FieldRole, InstructionDecl, Root, WordDecl};
use super::bitfield::{BitSlice, fits_in};
use super::diagnostic::{DiagnosticPhase, InstDiagnostic, SourceSpan};
use super::error::{InstError, SchemaViolation};
use crate::config::DEFAULT_WORD_WIDTHS;

pub struct Validator {
    word_widths: Vec<u32>,
    diagnostics: Vec<InstDiagnostic>,
    warnings: Vec<InstDiagnostic>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_WIDTHS.to_vec())
    }
}

impl Validator {
    pub fn new(word_widths: impl Into<Vec<u32>>) -> Self {
        Self {
            word_widths: word_widths.into(),
            diagnostics: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Validates one root. Errors fail the root as a whole; warnings are kept for
    /// [`Validator::take_warnings`].
    pub fn validate(&mut self, root: &Root) -> Result<(), InstError> {
        let mut mnemonics = AHashSet::new();
        for instr in &root.instructions {
            if !instr.mnemonic.is_empty() && !mnemonics.insert(instr.mnemonic.as_str()) {
                self.push(
                    SchemaViolation::DuplicateMnemonic {
                        mnemonic: instr.mnemonic.clone(),
                    },
                    &instr.span,
                );
            }
            self.validate_instruction(instr);
        }
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            let mut diagnostics = std::mem::take(&mut self.diagnostics);
            diagnostics.append(&mut self.warnings);
            Err(InstError::Schema {
                path: root.path.clone(),
                diagnostics,
            })
        }
    }

    pub fn take_warnings(&mut self) -> Vec<InstDiagnostic> {
        std::mem::take(&mut self.warnings)
    }

    fn validate_instruction(&mut self, instr: &InstructionDecl) {
        if instr.mnemonic.trim().is_empty() {
            self.push(SchemaViolation::EmptyMnemonic, &instr.span);
        }
        if instr.words.is_empty() {
            self.push(
                SchemaViolation::NoWords {
                    mnemonic: instr.mnemonic.clone(),
                },
                &instr.span,
            );
            return;
        }

        for (position, word) in instr.words.iter().enumerate() {
            if word.index as usize != position {
                self.push(
                    SchemaViolation::WordIndexMismatch {
                        mnemonic: instr.mnemonic.clone(),
                        index: word.index,
                        position,
                    },
                    &word.span,
                );
            }
            self.validate_word(instr, word);
        }

        self.validate_field_names(instr);
        self.validate_opcode(instr);
    }

    fn validate_word(&mut self, instr: &InstructionDecl, word: &WordDecl) {
        if !self.word_widths.contains(&word.width) {
            self.push(
                SchemaViolation::IllegalWordWidth {
                    mnemonic: instr.mnemonic.clone(),
                    index: word.index,
                    width: word.width,
                    legal: self.word_widths.clone(),
                },
                &word.span,
            );
        }
        if word.fields.is_empty() {
            self.push(
                SchemaViolation::EmptyWord {
                    mnemonic: instr.mnemonic.clone(),
                    index: word.index,
                },
                &word.span,
            );
            return;
        }

        let mut placed: Vec<(&str, BitSlice)> = Vec::with_capacity(word.fields.len());
        for field in &word.fields {
            if field.width == 0 {
                self.push(
                    SchemaViolation::ZeroWidthField {
                        mnemonic: instr.mnemonic.clone(),
                        word: word.index,
                        field: field.name.clone(),
                    },
                    &field.span,
                );
                continue;
            }
            if u64::from(field.offset) + u64::from(field.width) > u64::from(word.width) {
                self.push(
                    SchemaViolation::FieldOutOfRange {
                        mnemonic: instr.mnemonic.clone(),
                        word: word.index,
                        field: field.name.clone(),
                        offset: field.offset,
                        width: field.width,
                        word_width: word.width,
                    },
                    &field.span,
                );
                continue;
            }
            if let Some(value) = field.value
                && !fits_in(value, field.width)
            {
                self.push(
                    SchemaViolation::FixedValueTooWide {
                        mnemonic: instr.mnemonic.clone(),
                        field: field.name.clone(),
                        value,
                        width: field.width,
                    },
                    &field.span,
                );
            }
            if i64::try_from(field.minus).is_err() {
                self.push(
                    SchemaViolation::BiasTooLarge {
                        mnemonic: instr.mnemonic.clone(),
                        field: field.name.clone(),
                        minus: field.minus,
                    },
                    &field.span,
                );
            }
            // Words wider than 64 bits are already reported as illegal widths.
            let Ok(slice) = field.slice() else {
                continue;
            };
            if let Some((other, _)) = placed.iter().find(|(_, prior)| prior.overlaps(&slice)) {
                self.push(
                    SchemaViolation::FieldOverlap {
                        mnemonic: instr.mnemonic.clone(),
                        word: word.index,
                        first: (*other).to_string(),
                        second: field.name.clone(),
                    },
                    &field.span,
                );
                continue;
            }
            placed.push((field.name.as_str(), slice));
        }
    }

    fn validate_field_names(&mut self, instr: &InstructionDecl) {
        // name -> (word index, reserved)
        let mut seen: AHashMap<&str, (u32, bool)> = AHashMap::new();
        let mut reported: AHashSet<&str> = AHashSet::new();
        for (word, field) in instr.fields() {
            match seen.get(field.name.as_str()) {
                None => {
                    seen.insert(field.name.as_str(), (word.index, field.is_reserved()));
                }
                Some(&(prior_word, prior_reserved)) => {
                    let permitted =
                        prior_word != word.index && prior_reserved && field.is_reserved();
                    if permitted {
                        seen.insert(field.name.as_str(), (word.index, true));
                    } else if reported.insert(field.name.as_str()) {
                        self.push(
                            SchemaViolation::DuplicateFieldName {
                                mnemonic: instr.mnemonic.clone(),
                                field: field.name.clone(),
                            },
                            &field.span,
                        );
                    }
                }
            }
        }
    }

    fn validate_opcode(&mut self, instr: &InstructionDecl) {
        let opcode_fields: Vec<_> = instr
            .fields()
            .map(|(_, field)| field)
            .filter(|field| field.role == Some(FieldRole::Opcode))
            .collect();
        if opcode_fields.len() > 1 {
            self.push(
                SchemaViolation::DuplicateOpcodeField {
                    mnemonic: instr.mnemonic.clone(),
                },
                &opcode_fields[1].span,
            );
        }
        let (Some(opcode), Some(field)) = (instr.opcode, opcode_fields.first()) else {
            return;
        };
        if let Some(value) = field.value
            && value != opcode
        {
            self.push(
                SchemaViolation::OpcodeMismatch {
                    mnemonic: instr.mnemonic.clone(),
                    opcode,
                    value,
                },
                &field.span,
            );
        } else if field.width > 0 && !fits_in(opcode, field.width) {
            self.push(
                SchemaViolation::OpcodeTooWide {
                    mnemonic: instr.mnemonic.clone(),
                    opcode,
                    width: field.width,
                },
                &field.span,
            );
        }
    }

    fn push(&mut self, violation: SchemaViolation, span: &SourceSpan) {
        let diag = InstDiagnostic::new(
            DiagnosticPhase::Validation,
            violation.level(),
            violation.code(),
            violation.to_string(),
            Some(span.clone()),
        );
        if diag.is_error() {
            self.diagnostics.push(diag);
        } else {
            self.warnings.push(diag);
        }
    }
}
