//! Declarative mapping from a generic [`XmlElement`] tree to the instruction entity model.
//!
//! Each element kind lists its tag, its required and optional attributes, the child tags it may
//! contain and whether it may carry text. Anything outside that shape is reported as a
//! [`SchemaViolation`]; every violation in the file is collected before failing.

use std::path::Path;

use smallvec::SmallVec;

use super::tree::XmlElement;
use crate::isa::ast::{Endianness, FieldDecl, FieldRole, InstructionDecl, Root, WordDecl};
use crate::isa::bitfield::parse_bit_range;
use crate::isa::diagnostic::{DiagnosticPhase, InstDiagnostic, SourceSpan};
use crate::isa::error::{InstError, SchemaViolation};

struct ElementSpec {
    tag: &'static str,
    required: &'static [&'static str],
    optional: &'static [&'static str],
    children: &'static [&'static str],
    text: bool,
}

impl ElementSpec {
    fn allows_attribute(&self, name: &str) -> bool {
        self.required.contains(&name) || self.optional.contains(&name)
    }
}

const ROOT: ElementSpec = ElementSpec {
    tag: "root",
    required: &[],
    optional: &["name", "version", "word_width", "endian"],
    children: &["inst"],
    text: false,
};

const INST: ElementSpec = ElementSpec {
    tag: "inst",
    required: &["name"],
    optional: &["opcode", "category"],
    children: &["doc", "word"],
    text: false,
};

const DOC: ElementSpec = ElementSpec {
    tag: "doc",
    required: &[],
    optional: &[],
    children: &[],
    text: true,
};

const WORD: ElementSpec = ElementSpec {
    tag: "word",
    required: &[],
    optional: &["index", "width"],
    children: &["field"],
    text: false,
};

const FIELD: ElementSpec = ElementSpec {
    tag: "field",
    required: &["name"],
    optional: &[
        "offset", "width", "bits", "role", "value", "minus", "signed", "desc",
    ],
    children: &[],
    text: false,
};

/// Maps a parsed document into a [`Root`]. Structural invariants that need the whole entity
/// (overlap, widths, uniqueness) are left to the validator.
pub fn map_document(path: &Path, tree: &XmlElement) -> Result<Root, InstError> {
    let mut mapper = SchemaMapper {
        path,
        diagnostics: Vec::new(),
    };
    let root = mapper.map_root(tree);
    match root {
        Some(root) if mapper.diagnostics.is_empty() => Ok(root),
        _ => Err(InstError::Schema {
            path: path.to_path_buf(),
            diagnostics: mapper.diagnostics,
        }),
    }
}

struct SchemaMapper<'a> {
    path: &'a Path,
    diagnostics: Vec<InstDiagnostic>,
}

impl<'a> SchemaMapper<'a> {
    fn map_root(&mut self, element: &XmlElement) -> Option<Root> {
        if element.tag != ROOT.tag {
            self.report(
                SchemaViolation::UnexpectedRootElement {
                    expected: ROOT.tag,
                    found: element.tag.clone(),
                },
                element,
            );
            return None;
        }
        self.check_shape(&ROOT, element);

        let stem = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = element
            .attribute("name")
            .map(str::to_string)
            .unwrap_or(stem);
        let mut root = Root::new(self.path.to_path_buf(), name);
        root.version = element.attribute("version").map(str::to_string);
        if let Some(text) = element.attribute("endian") {
            match Endianness::parse(text) {
                Some(endian) => root.endianness = endian,
                None => self.report(
                    SchemaViolation::InvalidValue {
                        element: ROOT.tag,
                        attribute: "endian",
                        value: text.to_string(),
                        expected: "'little' or 'big'",
                    },
                    element,
                ),
            }
        }
        let word_width = self.number_u32(&ROOT, element, "word_width");

        for child in element.children_named(INST.tag) {
            if let Some(instr) = self.map_instruction(child, word_width) {
                root.instructions.push(instr);
            }
        }
        Some(root)
    }

    fn map_instruction(
        &mut self,
        element: &XmlElement,
        word_width: Option<u32>,
    ) -> Option<InstructionDecl> {
        self.check_shape(&INST, element);
        let mnemonic = element.attribute("name")?.to_string();
        let opcode = self.number_u64(&INST, element, "opcode");
        let category = element.attribute("category").map(str::to_string);

        let docs: Vec<&str> = element
            .children_named(DOC.tag)
            .map(|doc| {
                self.check_shape(&DOC, doc);
                doc.text.trim()
            })
            .filter(|text| !text.is_empty())
            .collect();
        let doc = (!docs.is_empty()).then(|| docs.join("\n"));

        let mut words: Vec<WordDecl> = Vec::new();
        for (position, child) in element.children_named(WORD.tag).enumerate() {
            if let Some(word) = self.map_word(child, position as u32, word_width) {
                words.push(word);
            }
        }
        words.sort_by_key(|word| word.index);
        for pair in words.windows(2) {
            if pair[0].index == pair[1].index {
                self.report_at(
                    SchemaViolation::DuplicateWordIndex {
                        mnemonic: mnemonic.clone(),
                        index: pair[1].index,
                    },
                    pair[1].span.clone(),
                );
            } else if pair[1].index != pair[0].index + 1 {
                self.report_at(
                    SchemaViolation::WordIndexGap {
                        mnemonic: mnemonic.clone(),
                        expected: pair[0].index + 1,
                        found: pair[1].index,
                    },
                    pair[1].span.clone(),
                );
            }
        }
        if let Some(first) = words.first()
            && first.index != 0
        {
            self.report_at(
                SchemaViolation::WordIndexGap {
                    mnemonic: mnemonic.clone(),
                    expected: 0,
                    found: first.index,
                },
                first.span.clone(),
            );
        }

        Some(InstructionDecl {
            mnemonic,
            opcode,
            category,
            doc,
            words: SmallVec::from_vec(words),
            span: self.span(element),
        })
    }

    fn map_word(
        &mut self,
        element: &XmlElement,
        position: u32,
        word_width: Option<u32>,
    ) -> Option<WordDecl> {
        self.check_shape(&WORD, element);
        let index = self.number_u32(&WORD, element, "index").unwrap_or(position);
        let width = match element.attribute("width") {
            Some(_) => self.number_u32(&WORD, element, "width")?,
            None => match word_width {
                Some(width) => width,
                None => {
                    self.report(
                        SchemaViolation::MissingAttribute {
                            element: WORD.tag,
                            attribute: "width",
                        },
                        element,
                    );
                    return None;
                }
            },
        };
        let fields = element
            .children_named(FIELD.tag)
            .filter_map(|child| self.map_field(child))
            .collect();
        Some(WordDecl {
            index,
            width,
            fields,
            span: self.span(element),
        })
    }

    fn map_field(&mut self, element: &XmlElement) -> Option<FieldDecl> {
        self.check_shape(&FIELD, element);
        let name = element.attribute("name")?.to_string();

        let (offset, width) = match element.attribute("bits") {
            Some(bits) => {
                for other in ["offset", "width"] {
                    if element.attribute(other).is_some() {
                        self.report(
                            SchemaViolation::ConflictingAttributes {
                                element: FIELD.tag,
                                first: "bits",
                                second: other,
                            },
                            element,
                        );
                    }
                }
                match parse_bit_range(bits) {
                    Ok(range) => range,
                    Err(_) => {
                        self.report(
                            SchemaViolation::InvalidValue {
                                element: FIELD.tag,
                                attribute: "bits",
                                value: bits.to_string(),
                                expected: "an inclusive bit range such as '0-5'",
                            },
                            element,
                        );
                        return None;
                    }
                }
            }
            None => {
                let offset = self.required_u32(&FIELD, element, "offset");
                let width = self.required_u32(&FIELD, element, "width");
                (offset?, width?)
            }
        };

        let signed = match element.attribute("signed") {
            Some(text) => match parse_bool(text) {
                Some(flag) => flag,
                None => {
                    self.report(
                        SchemaViolation::InvalidValue {
                            element: FIELD.tag,
                            attribute: "signed",
                            value: text.to_string(),
                            expected: "true/false/1/0/yes/no",
                        },
                        element,
                    );
                    false
                }
            },
            None => false,
        };

        Some(FieldDecl {
            name,
            offset,
            width,
            role: element.attribute("role").map(FieldRole::parse),
            value: self.number_u64(&FIELD, element, "value"),
            minus: self.number_u64(&FIELD, element, "minus").unwrap_or(0),
            signed,
            description: element.attribute("desc").map(str::to_string),
            span: self.span(element),
        })
    }

    /// Reports unknown or missing attributes, disallowed children and stray text.
    fn check_shape(&mut self, spec: &ElementSpec, element: &XmlElement) {
        for (key, _) in &element.attributes {
            if !spec.allows_attribute(key) {
                self.report(
                    SchemaViolation::UnknownAttribute {
                        element: spec.tag,
                        attribute: key.clone(),
                    },
                    element,
                );
            }
        }
        for &attribute in spec.required {
            if element.attribute(attribute).is_none() {
                self.report(
                    SchemaViolation::MissingAttribute {
                        element: spec.tag,
                        attribute,
                    },
                    element,
                );
            }
        }
        for child in &element.children {
            if !spec.children.contains(&child.tag.as_str()) {
                self.report(
                    SchemaViolation::UnexpectedElement {
                        parent: spec.tag,
                        found: child.tag.clone(),
                    },
                    child,
                );
            }
        }
        if !spec.text && !element.text.trim().is_empty() {
            self.report(SchemaViolation::UnexpectedText { element: spec.tag }, element);
        }
    }

    fn number_u64(
        &mut self,
        spec: &ElementSpec,
        element: &XmlElement,
        attribute: &'static str,
    ) -> Option<u64> {
        let text = element.attribute(attribute)?;
        match parse_number(text) {
            Some(value) => Some(value),
            None => {
                self.report(
                    SchemaViolation::InvalidNumber {
                        element: spec.tag,
                        attribute,
                        value: text.to_string(),
                    },
                    element,
                );
                None
            }
        }
    }

    fn number_u32(
        &mut self,
        spec: &ElementSpec,
        element: &XmlElement,
        attribute: &'static str,
    ) -> Option<u32> {
        let text = element.attribute(attribute)?;
        match parse_number(text).and_then(|value| u32::try_from(value).ok()) {
            Some(value) => Some(value),
            None => {
                self.report(
                    SchemaViolation::InvalidNumber {
                        element: spec.tag,
                        attribute,
                        value: text.to_string(),
                    },
                    element,
                );
                None
            }
        }
    }

    fn required_u32(
        &mut self,
        spec: &ElementSpec,
        element: &XmlElement,
        attribute: &'static str,
    ) -> Option<u32> {
        if element.attribute(attribute).is_none() {
            self.report(
                SchemaViolation::MissingAttribute {
                    element: spec.tag,
                    attribute,
                },
                element,
            );
            return None;
        }
        self.number_u32(spec, element, attribute)
    }

    fn span(&self, element: &XmlElement) -> SourceSpan {
        SourceSpan::new(self.path.to_path_buf(), element.position)
    }

    fn report(&mut self, violation: SchemaViolation, element: &XmlElement) {
        let span = self.span(element);
        self.report_at(violation, span);
    }

    fn report_at(&mut self, violation: SchemaViolation, span: SourceSpan) {
        self.diagnostics.push(InstDiagnostic::new(
            DiagnosticPhase::Schema,
            violation.level(),
            violation.code(),
            violation.to_string(),
            Some(span),
        ));
    }
}

/// Parses an unsigned integer in decimal or with a `0x`/`0o`/`0b` prefix; `_` separators are
/// ignored.
pub fn parse_number(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|ch| *ch != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
