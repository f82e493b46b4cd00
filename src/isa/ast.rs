//! Entity model produced by the XML schema mapping: one [`Root`] per source file, holding
//! instructions, their words, and the fields inside each word.

use std::path::PathBuf;

use bitflags::bitflags;
use serde::{Serialize, Serializer};
use smallvec::SmallVec;

use super::bitfield::{BitFieldError, BitSlice};
use super::diagnostic::SourceSpan;

/// Parsed representation of one XML source file.
#[derive(Debug, Clone)]
pub struct Root {
    pub path: PathBuf,
    pub name: String,
    pub version: Option<String>,
    pub endianness: Endianness,
    pub instructions: Vec<InstructionDecl>,
}

impl Root {
    pub fn new(path: PathBuf, name: impl Into<String>) -> Self {
        Self {
            path,
            name: name.into(),
            version: None,
            endianness: Endianness::Little,
            instructions: Vec::new(),
        }
    }

    /// File name of the source, used wherever output must not depend on the directory layout.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct InstructionDecl {
    pub mnemonic: String,
    pub opcode: Option<u64>,
    pub category: Option<String>,
    pub doc: Option<String>,
    pub words: SmallVec<[WordDecl; 2]>,
    pub span: SourceSpan,
}

impl InstructionDecl {
    pub fn fields(&self) -> impl Iterator<Item = (&WordDecl, &FieldDecl)> {
        self.words
            .iter()
            .flat_map(|word| word.fields.iter().map(move |field| (word, field)))
    }

    pub fn opcode_field(&self) -> Option<&FieldDecl> {
        self.fields()
            .map(|(_, field)| field)
            .find(|field| field.role == Some(FieldRole::Opcode))
    }
}

#[derive(Debug, Clone)]
pub struct WordDecl {
    pub index: u32,
    pub width: u32,
    pub fields: SmallVec<[FieldDecl; 8]>,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub role: Option<FieldRole>,
    pub value: Option<u64>,
    pub minus: u64,
    pub signed: bool,
    pub description: Option<String>,
    pub span: SourceSpan,
}

impl FieldDecl {
    pub fn slice(&self) -> Result<BitSlice, BitFieldError> {
        BitSlice::new(self.offset, self.width)
    }

    pub fn is_reserved(&self) -> bool {
        self.role == Some(FieldRole::Reserved)
    }

    pub fn flags(&self) -> FieldFlags {
        let mut flags = FieldFlags::empty();
        flags.set(FieldFlags::FIXED, self.value.is_some());
        flags.set(FieldFlags::SIGNED, self.signed);
        flags.set(FieldFlags::BIASED, self.minus != 0);
        flags.set(FieldFlags::RESERVED, self.is_reserved());
        flags
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u8 {
        const FIXED = 0b0001;
        const SIGNED = 0b0010;
        const BIASED = 0b0100;
        const RESERVED = 0b1000;
    }
}

impl Serialize for FieldFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter_names().map(|(name, _)| name.to_ascii_lowercase()))
    }
}

/// Semantic tag carried by a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Opcode,
    Register,
    Immediate,
    Reserved,
    Tag(String),
}

impl FieldRole {
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "opcode" => FieldRole::Opcode,
            "register" | "reg" => FieldRole::Register,
            "immediate" | "imm" => FieldRole::Immediate,
            "reserved" => FieldRole::Reserved,
            _ => FieldRole::Tag(text.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldRole::Opcode => "opcode",
            FieldRole::Register => "register",
            FieldRole::Immediate => "immediate",
            FieldRole::Reserved => "reserved",
            FieldRole::Tag(tag) => tag.as_str(),
        }
    }
}

impl Serialize for FieldRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Byte order of the words when an instruction is laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "little" | "le" => Some(Endianness::Little),
            "big" | "be" => Some(Endianness::Big),
            _ => None,
        }
    }

    pub fn decode_word(self, bytes: &[u8]) -> u64 {
        match self {
            Endianness::Little => bytes
                .iter()
                .enumerate()
                .fold(0u64, |acc, (idx, byte)| acc | ((*byte as u64) << (idx * 8))),
            Endianness::Big => bytes
                .iter()
                .fold(0u64, |acc, byte| (acc << 8) | (*byte as u64)),
        }
    }
}
