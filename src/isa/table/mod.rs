//! Consolidated instruction tables generated from validated Roots.

pub mod decode;
pub mod emit;
pub mod entry;
pub mod format;

use ahash::AHashMap;
use log::{debug, warn};

use super::ast::Root;
use super::error::InstError;
use super::validator::Validator;
use crate::config::DEFAULT_WORD_WIDTHS;

pub use decode::{DecodedInstruction, DecodedOperand};
pub use entry::{FieldEntry, RootTable, TableEntry, WordEntry};

/// Flat table-list spanning every Root, in canonical order (Root order, then instruction
/// order inside each Root), with a per-Root view on top.
#[derive(Debug, Clone, Default)]
pub struct TableList {
    roots: Vec<RootTable>,
    entries: Vec<TableEntry>,
    by_mnemonic: AHashMap<String, usize>,
}

impl TableList {
    pub fn get(&self, mnemonic: &str) -> Option<&TableEntry> {
        self.by_mnemonic.get(mnemonic).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn roots(&self) -> &[RootTable] {
        &self.roots
    }

    /// Entries contributed by the Root at `index`, or an empty slice when out of range.
    pub fn root_entries(&self, index: usize) -> &[TableEntry] {
        self.roots
            .get(index)
            .map(|root| &self.entries[root.entries.clone()])
            .unwrap_or(&[])
    }

    /// Entries whose opcode equals `opcode`, in canonical order.
    pub fn by_opcode(&self, opcode: u64) -> impl Iterator<Item = &TableEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.opcode == Some(opcode))
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.mnemonic.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct TableGenerator {
    word_widths: Vec<u32>,
}

impl Default for TableGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_WORD_WIDTHS.to_vec())
    }
}

impl TableGenerator {
    pub fn new(word_widths: impl Into<Vec<u32>>) -> Self {
        Self {
            word_widths: word_widths.into(),
        }
    }

    /// Builds the table-list. Every Root is re-validated; a mnemonic defined by two Roots is a
    /// [`InstError::DuplicateInstruction`] naming both files. Nothing is returned on error.
    pub fn generate(&self, roots: &[Root]) -> Result<TableList, InstError> {
        let mut table = TableList::default();
        for (root_idx, root) in roots.iter().enumerate() {
            Validator::new(self.word_widths.clone()).validate(root)?;
            let start = table.entries.len();
            for instr in &root.instructions {
                if let Some(&prior) = table.by_mnemonic.get(&instr.mnemonic) {
                    return Err(InstError::DuplicateInstruction {
                        mnemonic: instr.mnemonic.clone(),
                        first: table.entries[prior].source_path.clone(),
                        second: root.path.clone(),
                    });
                }
                table
                    .by_mnemonic
                    .insert(instr.mnemonic.clone(), table.entries.len());
                table
                    .entries
                    .push(TableEntry::from_decl(root_idx, root, instr));
            }
            debug!(
                "{}: {} table entr(ies)",
                root.source_name(),
                table.entries.len() - start
            );
            table
                .roots
                .push(RootTable::new(root, start..table.entries.len()));
        }
        report_ambiguous(&table.entries);
        Ok(table)
    }
}

/// Warns about entries whose fixed bits are identical; decode resolves them by canonical order.
fn report_ambiguous(entries: &[TableEntry]) {
    for (first, second) in ambiguous_pairs(entries) {
        warn!(
            "instructions '{}' ({}) and '{}' ({}) share the same encoding; decode prefers '{}'",
            entries[first].mnemonic,
            entries[first].source,
            entries[second].mnemonic,
            entries[second].source,
            entries[first].mnemonic
        );
    }
}

/// `(earlier, later)` index pairs of entries sharing an encoding key. Each later entry is
/// paired with the first entry that used its key.
fn ambiguous_pairs(entries: &[TableEntry]) -> Vec<(usize, usize)> {
    let mut seen: AHashMap<Vec<(u32, u64, u64)>, usize> = AHashMap::new();
    let mut pairs = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let key = entry.encoding_key();
        match seen.get(&key) {
            Some(&first) => pairs.push((first, idx)),
            None => {
                seen.insert(key, idx);
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::builder::{RootBuilder, field};

    fn alu_root(path: &str, mnemonic: &str, opcode: u64) -> Root {
        let mut builder = RootBuilder::new(path);
        builder
            .instruction(mnemonic)
            .word(
                32,
                [
                    field("opcode", 0, 6).role("opcode").value(opcode),
                    field("rd", 6, 5).role("register"),
                    field("rs", 11, 5).role("register"),
                    field("rt", 16, 5).role("register"),
                ],
            )
            .finish();
        builder.build()
    }

    #[test]
    fn preserves_canonical_order_and_layout() {
        let roots = vec![
            alu_root("xml/add.xml", "ADD", 0x20),
            alu_root("xml/sub.xml", "SUB", 0x22),
        ];
        let table = TableGenerator::default().generate(&roots).expect("table");
        assert_eq!(table.mnemonics().collect::<Vec<_>>(), vec!["ADD", "SUB"]);
        let add = table.get("ADD").expect("ADD");
        let layout: Vec<_> = add.words[0]
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.offset, f.width))
            .collect();
        assert_eq!(
            layout,
            vec![("opcode", 0, 6), ("rd", 6, 5), ("rs", 11, 5), ("rt", 16, 5)]
        );
        assert_eq!(table.roots()[1].source, "sub.xml");
        assert_eq!(table.root_entries(1)[0].mnemonic, "SUB");
        assert!(table.root_entries(7).is_empty());
        assert_eq!(
            table.by_opcode(0x22).map(|e| e.mnemonic.as_str()).collect::<Vec<_>>(),
            vec!["SUB"]
        );
    }

    #[test]
    fn duplicate_across_roots_names_both_files() {
        let roots = vec![alu_root("xml/a.xml", "NOP", 0), alu_root("xml/b.xml", "NOP", 1)];
        match TableGenerator::default().generate(&roots) {
            Err(InstError::DuplicateInstruction { mnemonic, first, second }) => {
                assert_eq!(mnemonic, "NOP");
                assert!(first.ends_with("a.xml"));
                assert!(second.ends_with("b.xml"));
            }
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn shared_encoding_is_kept_and_decodes_to_first_entry() {
        let roots = vec![
            alu_root("xml/a.xml", "MOV", 0x11),
            alu_root("xml/b.xml", "COPY", 0x11),
            alu_root("xml/c.xml", "ADD", 0x20),
        ];
        let table = TableGenerator::default().generate(&roots).expect("table");
        assert_eq!(table.len(), 3);
        assert_eq!(ambiguous_pairs(table.entries()), vec![(0, 1)]);
        let decoded = table.decode(&[0x11 | (3 << 6)]).expect("decode");
        assert_eq!(decoded.mnemonic(), "MOV");
        assert_eq!(decoded.operand("rd").map(|op| op.value), Some(3));
        assert_eq!(table.decode(&[0x20]).map(|d| d.mnemonic().to_string()), Some("ADD".into()));
    }

    #[test]
    fn revalidates_programmatic_roots() {
        let mut builder = RootBuilder::new("bad.xml");
        builder
            .instruction("BAD")
            .word(32, [field("a", 0, 6), field("b", 4, 6)])
            .finish();
        let err = TableGenerator::default()
            .generate(&[builder.build()])
            .unwrap_err();
        assert!(matches!(err, InstError::Schema { .. }));
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = TableGenerator::default().generate(&[]).expect("empty");
        assert!(table.is_empty());
        assert!(table.roots().is_empty());
    }
}
