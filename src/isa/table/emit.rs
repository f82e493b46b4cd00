//! JSON serialization and content fingerprinting of a [`TableList`].

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::TableList;
use super::entry::{RootTable, TableEntry};
use crate::isa::error::InstError;

#[derive(Serialize)]
struct TableDocument<'a> {
    roots: &'a [RootTable],
    entries: &'a [TableEntry],
}

/// Deterministic pretty-printed JSON: the per-Root view followed by the flat entry list.
pub fn to_json(table: &TableList) -> Result<String, InstError> {
    let document = TableDocument {
        roots: table.roots(),
        entries: table.entries(),
    };
    serde_json::to_string_pretty(&document).map_err(|err| InstError::Emit(err.to_string()))
}

/// SHA-256 of [`to_json`], identical across runs on unchanged input.
pub fn fingerprint(table: &TableList) -> Result<[u8; 32], InstError> {
    let json = to_json(table)?;
    let digest = Sha256::digest(json.as_bytes());
    let mut array = [0u8; 32];
    array.copy_from_slice(&digest);
    Ok(array)
}

pub fn fingerprint_hex(table: &TableList) -> Result<String, InstError> {
    Ok(fingerprint(table)?
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;
    use crate::isa::builder::{RootBuilder, field};
    use crate::isa::table::TableGenerator;

    fn table(path: &str) -> TableList {
        let mut builder = RootBuilder::new(path);
        builder.version("dpuv2");
        builder
            .instruction("SAVE")
            .opcode(0x4)
            .category("transfer")
            .doc("Write bank memory back to DDR.")
            .word(32, [field("opcode", 28, 4).role("opcode"), field("bank", 0, 6)])
            .finish();
        TableGenerator::default()
            .generate(&[builder.build()])
            .expect("table")
    }

    #[test]
    fn json_carries_roots_and_entries() {
        let json = to_json(&table("xml/save.xml")).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse back");
        assert_eq!(value["roots"][0]["source"], "save.xml");
        assert_eq!(value["roots"][0]["version"], "dpuv2");
        assert_eq!(value["roots"][0]["mnemonics"][0], "SAVE");
        let entry = &value["entries"][0];
        assert_eq!(entry["mnemonic"], "SAVE");
        assert_eq!(entry["opcode"], 4);
        assert_eq!(entry["endianness"], "little");
        assert_eq!(entry["words"][0]["mask"], 0xF000_0000u64);
        assert_eq!(entry["words"][0]["value"], 0x4000_0000u64);
        assert_eq!(entry["words"][0]["fields"][0]["role"], "opcode");
        assert_eq!(entry["words"][0]["fields"][0]["flags"][0], "fixed");
        assert!(entry["words"][0]["fields"][1]["role"].is_null());
    }

    #[test]
    fn fingerprint_ignores_directory_layout() {
        let a = fingerprint(&table("/srv/one/save.xml")).expect("a");
        let b = fingerprint(&table("other/save.xml")).expect("b");
        assert_eq!(a, b);
        assert_ne!(a, fingerprint(&table("other/store.xml")).expect("c"));
        assert_eq!(fingerprint_hex(&table("save.xml")).expect("hex").len(), 64);
    }

    #[test]
    fn empty_table_fingerprint_is_stable() {
        let empty = TableList::default();
        assert_eq!(to_json(&empty).expect("json"), "{\n  \"roots\": [],\n  \"entries\": []\n}");
        assert_eq!(
            fingerprint(&empty).expect("digest"),
            hex!("c03e19b4f65dfd1aed959704aefd131aed21aa31a8d65a34f1a3e32835a8e0c6")
        );
    }
}
