//! Text renderings of a [`TableList`]: the simulator's C++ `inst_table` header and a
//! human-readable summary.

use std::fmt::{self, Write};

use ahash::AHashMap;

use super::TableList;
use super::entry::TableEntry;
use crate::isa::error::InstError;

/// Renders a C++ header exposing the table under `namespace` (which may be nested with `::`).
///
/// Mnemonics that sanitise to the same identifier and opcodes shared by two instructions
/// cannot be represented and are reported as [`InstError::Emit`].
pub fn render_cpp_header(table: &TableList, namespace: &str) -> Result<String, InstError> {
    if namespace.split("::").any(|part| !is_identifier(part)) {
        return Err(InstError::Emit(format!(
            "'{namespace}' is not a valid C++ namespace"
        )));
    }

    let mut idents: AHashMap<String, &str> = AHashMap::new();
    let mut names = Vec::with_capacity(table.len());
    for entry in table.entries() {
        let ident = sanitize(&entry.mnemonic);
        if let Some(prior) = idents.insert(ident.clone(), &entry.mnemonic) {
            return Err(InstError::Emit(format!(
                "instructions '{prior}' and '{}' both map to identifier '{ident}'",
                entry.mnemonic
            )));
        }
        names.push(ident);
    }

    let mut opcodes: AHashMap<u64, &str> = AHashMap::new();
    for entry in table.entries() {
        if let Some(opcode) = entry.opcode
            && let Some(prior) = opcodes.insert(opcode, &entry.mnemonic)
        {
            return Err(InstError::Emit(format!(
                "instructions '{prior}' and '{}' share opcode {opcode:#x}",
                entry.mnemonic
            )));
        }
    }

    let mut out = String::new();
    write_header(&mut out, table, namespace, &names)
        .map_err(|err| InstError::Emit(err.to_string()))?;
    Ok(out)
}

fn write_header(
    out: &mut String,
    table: &TableList,
    namespace: &str,
    names: &[String],
) -> fmt::Result {
    writeln!(
        out,
        "// Generated by insttab from {} source file(s). Do not edit.",
        table.roots().len()
    )?;
    writeln!(out, "#pragma once")?;
    writeln!(out)?;
    writeln!(out, "#include <cstdint>")?;
    writeln!(out, "#include <string>")?;
    writeln!(out, "#include <unordered_map>")?;
    writeln!(out, "#include <vector>")?;
    writeln!(out)?;
    writeln!(out, "namespace {namespace} {{")?;
    writeln!(out)?;

    writeln!(out, "enum InstType : uint32_t {{")?;
    for (idx, name) in names.iter().enumerate() {
        writeln!(out, "    INST_TYPE_{name} = {idx},")?;
    }
    writeln!(out, "    INST_TYPE_INVALID = {},", names.len())?;
    writeln!(out, "}};")?;
    writeln!(out)?;

    let quoted: Vec<String> = table
        .entries()
        .iter()
        .map(|entry| format!("\"{}\"", escape(&entry.mnemonic)))
        .collect();
    write_vector(out, "std::string", "InstName", &quoted)?;
    let word_num: Vec<String> = table
        .entries()
        .iter()
        .map(|entry| entry.words.len().to_string())
        .collect();
    write_vector(out, "uint32_t", "WordNum", &word_num)?;

    writeln!(out, "const std::unordered_map<uint64_t, InstType> OPCode2InstType = {{")?;
    for (entry, name) in table.entries().iter().zip(names) {
        if let Some(opcode) = entry.opcode {
            writeln!(out, "    {{{opcode:#x}, INST_TYPE_{name}}},")?;
        }
    }
    writeln!(out, "}};")?;

    for (entry, name) in table.entries().iter().zip(names) {
        writeln!(out)?;
        write_fields(out, entry, name)?;
    }

    writeln!(out)?;
    writeln!(out, "}} // namespace {namespace}")
}

fn write_fields(out: &mut String, entry: &TableEntry, name: &str) -> fmt::Result {
    writeln!(out, "namespace {name} {{")?;
    let mut field_names = Vec::new();
    let mut words = Vec::new();
    let mut positions = Vec::new();
    let mut lengths = Vec::new();
    let mut minus = Vec::new();
    for (word, field) in entry.fields() {
        field_names.push(format!("\"{}\"", escape(&field.name)));
        words.push(word.index.to_string());
        positions.push(field.offset.to_string());
        lengths.push(field.width.to_string());
        minus.push(field.minus.to_string());
    }
    write_vector(out, "std::string", "FieldName", &field_names)?;
    write_vector(out, "uint32_t", "FieldWord", &words)?;
    write_vector(out, "uint32_t", "FieldPos", &positions)?;
    write_vector(out, "uint32_t", "FieldLen", &lengths)?;
    write_vector(out, "uint64_t", "FieldMinus", &minus)?;
    writeln!(out, "}} // namespace {name}")
}

fn write_vector(out: &mut String, ty: &str, name: &str, items: &[String]) -> fmt::Result {
    writeln!(out, "const std::vector<{ty}> {name} = {{{}}};", items.join(", "))
}

/// Uppercase C++ identifier for a mnemonic.
fn sanitize(mnemonic: &str) -> String {
    let mut ident: String = mnemonic
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|ch: char| ch.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One line per instruction with its word count, fixed-bit count and source file.
pub fn render_summary(table: &TableList) -> String {
    let mut out = format!(
        "{} instruction(s) from {} source file(s)\n",
        table.len(),
        table.roots().len()
    );
    let width = table
        .mnemonics()
        .map(str::len)
        .max()
        .unwrap_or(0);
    for entry in table.entries() {
        let opcode = entry
            .opcode
            .map(|op| format!("{op:#x}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<width$}  opcode={opcode:<6} words={} fixed={:>2}  {}",
            entry.mnemonic,
            entry.words.len(),
            entry.specificity,
            entry.source,
            width = width
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::builder::{RootBuilder, field};
    use crate::isa::table::TableGenerator;

    fn table(mnemonics: &[(&str, u64)]) -> TableList {
        let mut builder = RootBuilder::new("xml/dpu.xml");
        for (mnemonic, opcode) in mnemonics {
            builder
                .instruction(*mnemonic)
                .opcode(*opcode)
                .word(
                    32,
                    [
                        field("opcode", 28, 4).role("opcode"),
                        field("length", 0, 10).minus(1),
                    ],
                )
                .finish();
        }
        TableGenerator::default()
            .generate(&[builder.build()])
            .expect("table")
    }

    #[test]
    fn header_lists_every_table() {
        let header = render_cpp_header(&table(&[("LOAD", 0), ("save", 4)]), "dpu::table")
            .expect("header");
        assert!(header.contains("namespace dpu::table {"));
        assert!(header.contains("    INST_TYPE_LOAD = 0,"));
        assert!(header.contains("    INST_TYPE_SAVE = 1,"));
        assert!(header.contains("const std::vector<std::string> InstName = {\"LOAD\", \"save\"};"));
        assert!(header.contains("const std::vector<uint32_t> WordNum = {1, 1};"));
        assert!(header.contains("    {0x4, INST_TYPE_SAVE},"));
        assert!(header.contains("namespace SAVE {"));
        assert!(header.contains("const std::vector<uint32_t> FieldPos = {28, 0};"));
        assert!(header.contains("const std::vector<uint64_t> FieldMinus = {0, 1};"));
    }

    #[test]
    fn header_rejects_unrepresentable_tables() {
        let clash = table(&[("DUMP.DDR", 1), ("DUMP_DDR", 2)]);
        assert!(matches!(render_cpp_header(&clash, "t"), Err(InstError::Emit(_))));
        let shared = table(&[("CONV", 3), ("CONVINIT", 3)]);
        assert!(matches!(render_cpp_header(&shared, "t"), Err(InstError::Emit(_))));
        let fine = table(&[("END", 7)]);
        assert!(matches!(render_cpp_header(&fine, "1bad"), Err(InstError::Emit(_))));
    }

    #[test]
    fn sanitises_identifiers() {
        assert_eq!(sanitize("dump.ddr"), "DUMP_DDR");
        assert_eq!(sanitize("2x"), "_2X");
        assert!(is_identifier("_ns1"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn summary_has_one_line_per_instruction() {
        let summary = render_summary(&table(&[("LOAD", 0), ("END", 7)]));
        let lines: Vec<_> = summary.lines().collect();
        assert_eq!(lines[0], "2 instruction(s) from 1 source file(s)");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("LOAD  opcode=0x0"));
        assert!(lines[2].contains("fixed= 4  dpu.xml"), "{}", lines[2]);
    }
}
