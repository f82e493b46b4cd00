//! Table rows derived from validated instruction declarations.

use std::ops::Range;
use std::path::PathBuf;

use serde::Serialize;

use crate::isa::ast::{
    Endianness, FieldDecl, FieldFlags, FieldRole, InstructionDecl, Root, WordDecl,
};
use crate::isa::bitfield::mask_for_width;

/// One field of a table entry with its placement and encoding metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEntry {
    pub name: String,
    pub offset: u32,
    pub width: u32,
    pub mask: u64,
    pub role: Option<FieldRole>,
    pub flags: FieldFlags,
    pub fixed: Option<u64>,
    pub minus: u64,
    pub signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldEntry {
    fn from_decl(decl: &FieldDecl, opcode: Option<u64>) -> Self {
        let fixed = match decl.role {
            Some(FieldRole::Opcode) => decl.value.or(opcode),
            _ => decl.value,
        };
        let mut flags = decl.flags();
        flags.set(FieldFlags::FIXED, fixed.is_some());
        Self {
            name: decl.name.clone(),
            offset: decl.offset,
            width: decl.width,
            mask: mask_for_width(decl.width) << decl.offset,
            role: decl.role.clone(),
            flags,
            fixed,
            minus: decl.minus,
            signed: decl.signed,
            description: decl.description.clone(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed.is_some()
    }

    /// Raw stored bits of this field inside `word`.
    pub fn read(&self, word: u64) -> u64 {
        (word & self.mask) >> self.offset
    }
}

/// One word of a table entry: the fixed-bit `mask`/`value` pair plus every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordEntry {
    pub index: u32,
    pub width: u32,
    pub mask: u64,
    pub value: u64,
    pub fields: Vec<FieldEntry>,
}

impl WordEntry {
    fn from_decl(decl: &WordDecl, opcode: Option<u64>) -> Self {
        let fields: Vec<FieldEntry> = decl
            .fields
            .iter()
            .map(|field| FieldEntry::from_decl(field, opcode))
            .collect();
        let (mask, value) = fields
            .iter()
            .filter_map(|field| field.fixed.map(|fixed| (field, fixed)))
            .fold((0u64, 0u64), |(mask, value), (field, fixed)| {
                (mask | field.mask, value | ((fixed << field.offset) & field.mask))
            });
        Self {
            index: decl.index,
            width: decl.width,
            mask,
            value,
            fields,
        }
    }

    pub fn matches(&self, word: u64) -> bool {
        word & self.mask == self.value
    }

    /// Bytes this word occupies in a byte stream.
    pub fn byte_len(&self) -> usize {
        self.width.div_ceil(8) as usize
    }
}

/// Table entry for one instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub mnemonic: String,
    /// File name of the Root the instruction came from.
    pub source: String,
    #[serde(skip)]
    pub source_path: PathBuf,
    #[serde(skip)]
    pub root: usize,
    pub opcode: Option<u64>,
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub endianness: Endianness,
    pub words: Vec<WordEntry>,
    /// Number of fixed bits across all words; higher wins when several entries match.
    pub specificity: u32,
}

impl TableEntry {
    pub(super) fn from_decl(root_idx: usize, root: &Root, decl: &InstructionDecl) -> Self {
        let words: Vec<WordEntry> = decl
            .words
            .iter()
            .map(|word| WordEntry::from_decl(word, decl.opcode))
            .collect();
        let specificity = words.iter().map(|word| word.mask.count_ones()).sum();
        let opcode = decl.opcode.or_else(|| {
            decl.opcode_field()
                .and_then(|field| field.value)
        });
        Self {
            mnemonic: decl.mnemonic.clone(),
            source: root.source_name(),
            source_path: root.path.clone(),
            root: root_idx,
            opcode,
            category: decl.category.clone(),
            doc: decl.doc.clone(),
            endianness: root.endianness,
            words,
            specificity,
        }
    }

    pub fn field(&self, name: &str) -> Option<(&WordEntry, &FieldEntry)> {
        self.fields().find(|(_, field)| field.name == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&WordEntry, &FieldEntry)> {
        self.words
            .iter()
            .flat_map(|word| word.fields.iter().map(move |field| (word, field)))
    }

    pub fn byte_len(&self) -> usize {
        self.words.iter().map(WordEntry::byte_len).sum()
    }

    /// Whether every word of `words` carries this entry's fixed bits.
    pub fn matches(&self, words: &[u64]) -> bool {
        words.len() >= self.words.len()
            && self
                .words
                .iter()
                .zip(words)
                .all(|(entry, word)| entry.matches(*word))
    }

    /// Key identifying the encoding; two entries with equal keys cannot be told apart.
    pub(super) fn encoding_key(&self) -> Vec<(u32, u64, u64)> {
        self.words
            .iter()
            .map(|word| (word.width, word.mask, word.value))
            .collect()
    }
}

/// Per-source-file view of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootTable {
    pub source: String,
    pub name: String,
    pub version: Option<String>,
    pub endianness: Endianness,
    pub mnemonics: Vec<String>,
    #[serde(skip)]
    pub entries: Range<usize>,
}

impl RootTable {
    pub(super) fn new(root: &Root, entries: Range<usize>) -> Self {
        Self {
            source: root.source_name(),
            name: root.name.clone(),
            version: root.version.clone(),
            endianness: root.endianness,
            mnemonics: root
                .instructions
                .iter()
                .map(|instr| instr.mnemonic.clone())
                .collect(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::builder::{RootBuilder, field};

    fn load_root() -> Root {
        let mut builder = RootBuilder::new("xml/load.xml");
        builder
            .instruction("LOAD")
            .opcode(0x0)
            .word(
                32,
                [
                    field("opcode", 28, 4).role("opcode"),
                    field("rsv", 24, 4).role("reserved").value(0),
                    field("bank", 0, 6).role("register"),
                ],
            )
            .word(32, [field("length", 0, 10).minus(1)])
            .finish();
        builder.build()
    }

    #[test]
    fn opcode_attribute_fixes_opcode_field() {
        let root = load_root();
        let entry = TableEntry::from_decl(0, &root, &root.instructions[0]);
        assert_eq!(entry.source, "load.xml");
        let (_, opcode) = entry.field("opcode").expect("opcode field");
        assert_eq!(opcode.fixed, Some(0));
        assert!(opcode.flags.contains(FieldFlags::FIXED));
        assert_eq!(entry.words[0].mask, 0xFF00_0000);
        assert_eq!(entry.words[0].value, 0);
        assert_eq!(entry.words[1].mask, 0);
        assert_eq!(entry.specificity, 8);
        assert_eq!(entry.byte_len(), 8);
    }

    #[test]
    fn matching_requires_every_word() {
        let root = load_root();
        let entry = TableEntry::from_decl(0, &root, &root.instructions[0]);
        assert!(entry.matches(&[0x00AB_CDEF, 0x3FF]));
        assert!(!entry.matches(&[0x1000_0000, 0]));
        assert!(!entry.matches(&[0x0000_0001]), "too few words");
    }

    #[test]
    fn biased_field_reads_raw_bits() {
        let root = load_root();
        let entry = TableEntry::from_decl(0, &root, &root.instructions[0]);
        let (word, length) = entry.field("length").expect("length");
        assert_eq!(word.index, 1);
        assert!(length.flags.contains(FieldFlags::BIASED));
        assert_eq!(length.read(0xFFFF_F3FF), 0x3FF);
    }
}
