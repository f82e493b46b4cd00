//! Helpers for constructing [`Root`]s programmatically without routing through the XML parser.
//!
//! The builder keeps source spans consistent so downstream diagnostics can still attach to
//! deterministic locations even when the description is produced in memory. Nothing is
//! validated here; the table generator re-validates every root it receives.

use std::path::PathBuf;

use smallvec::SmallVec;

use super::ast::{Endianness, FieldDecl, FieldRole, InstructionDecl, Root, WordDecl};
use super::diagnostic::{SourcePosition, SourceSpan};

/// Convenience wrapper for assembling a full root in memory.
pub struct RootBuilder {
    root: Root,
    span: SourceSpan,
}

impl RootBuilder {
    /// Creates a new builder that pretends every element originated from `path`. The root name
    /// defaults to the file stem.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let span = SourceSpan::new(path.clone(), SourcePosition::new(1, 1));
        Self {
            root: Root::new(path, name),
            span,
        }
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.root.name = name.into();
        self
    }

    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.root.version = Some(version.into());
        self
    }

    pub fn endianness(&mut self, endianness: Endianness) -> &mut Self {
        self.root.endianness = endianness;
        self
    }

    /// Begins an instruction declaration; call [`InstructionBuilder::finish`] to push it.
    pub fn instruction(&mut self, mnemonic: impl Into<String>) -> InstructionBuilder<'_> {
        let decl = InstructionDecl {
            mnemonic: mnemonic.into(),
            opcode: None,
            category: None,
            doc: None,
            words: SmallVec::new(),
            span: self.span.clone(),
        };
        InstructionBuilder {
            builder: self,
            decl,
        }
    }

    /// Finishes building and returns the assembled root.
    pub fn build(self) -> Root {
        self.root
    }
}

/// Builder for a single instruction.
pub struct InstructionBuilder<'a> {
    builder: &'a mut RootBuilder,
    decl: InstructionDecl,
}

impl<'a> InstructionBuilder<'a> {
    pub fn opcode(mut self, opcode: u64) -> Self {
        self.decl.opcode = Some(opcode);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.decl.category = Some(category.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.decl.doc = Some(doc.into());
        self
    }

    /// Appends the next word; its index is its position.
    pub fn word(mut self, width: u32, fields: impl IntoIterator<Item = FieldBuilder>) -> Self {
        let span = self.builder.span.clone();
        let word = WordDecl {
            index: self.decl.words.len() as u32,
            width,
            fields: fields
                .into_iter()
                .map(|field| field.into_decl(span.clone()))
                .collect(),
            span,
        };
        self.decl.words.push(word);
        self
    }

    /// Completes the builder and pushes the instruction into the owning root.
    pub fn finish(self) -> &'a mut RootBuilder {
        self.builder.root.instructions.push(self.decl);
        self.builder
    }
}

/// Field description used with [`InstructionBuilder::word`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    name: String,
    offset: u32,
    width: u32,
    role: Option<FieldRole>,
    value: Option<u64>,
    minus: u64,
    signed: bool,
}

impl FieldBuilder {
    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(FieldRole::parse(role));
        self
    }

    pub fn value(mut self, value: u64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn minus(mut self, minus: u64) -> Self {
        self.minus = minus;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    fn into_decl(self, span: SourceSpan) -> FieldDecl {
        FieldDecl {
            name: self.name,
            offset: self.offset,
            width: self.width,
            role: self.role,
            value: self.value,
            minus: self.minus,
            signed: self.signed,
            description: None,
            span,
        }
    }
}

/// Utility for defining a field without spelling out the struct each time.
pub fn field(name: impl Into<String>, offset: u32, width: u32) -> FieldBuilder {
    FieldBuilder {
        name: name.into(),
        offset,
        width,
        role: None,
        value: None,
        minus: 0,
        signed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::validator::Validator;

    #[test]
    fn builds_root_with_multi_word_instruction() {
        let mut builder = RootBuilder::new("xml/load.xml");
        builder.version("dpuv2").endianness(Endianness::Big);
        builder
            .instruction("LOAD")
            .opcode(0x0)
            .category("transfer")
            .word(32, [field("opcode", 28, 4).role("opcode"), field("bank", 0, 6)])
            .word(32, [field("length", 0, 10).minus(1)])
            .finish();
        let root = builder.build();

        assert_eq!(root.name, "load");
        assert_eq!(root.version.as_deref(), Some("dpuv2"));
        assert_eq!(root.endianness, Endianness::Big);
        let load = &root.instructions[0];
        assert_eq!(load.words.len(), 2);
        assert_eq!(load.words[1].index, 1);
        assert_eq!(load.words[1].fields[0].minus, 1);
        assert_eq!(load.opcode_field().map(|f| f.name.as_str()), Some("opcode"));

        Validator::default()
            .validate(&root)
            .expect("builder-generated root should validate");
    }
}
