use std::fs;
use std::path::{Path, PathBuf};

use hex_literal::hex;
use tempfile::tempdir;

use insttab::isa::table::{emit, format};
use insttab::{FailurePolicy, InstError, PipelineConfig, TableHandle};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("defs/dpu")
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write file");
    path
}

fn alu_source(mnemonic: &str, opcode: u32) -> String {
    format!(
        r#"<root>
  <inst name="{mnemonic}">
    <word width="32">
      <field name="opcode" offset="0" width="6" role="opcode" value="{opcode:#x}"/>
      <field name="rd" offset="6" width="5" role="register"/>
      <field name="rs" offset="11" width="5" role="register"/>
      <field name="rt" offset="16" width="5" role="register"/>
    </word>
  </inst>
</root>
"#
    )
}

#[test]
fn fixture_tables_follow_file_name_order() {
    let handle = TableHandle::from_dir(fixture_dir()).expect("load dpu fixtures");
    let table = handle.table();
    assert_eq!(
        table.mnemonics().collect::<Vec<_>>(),
        vec!["CONVINIT", "CONV", "END", "LOAD", "SAVE"]
    );
    let sources: Vec<_> = table.roots().iter().map(|root| root.source.as_str()).collect();
    assert_eq!(sources, vec!["conv.xml", "end.xml", "load.xml", "save.xml"]);
    assert!(handle.failures().is_empty());
    assert!(handle.warnings().is_empty());

    let load = table.get("LOAD").expect("LOAD");
    assert_eq!(load.words.len(), 3);
    assert_eq!(load.category.as_deref(), Some("transfer"));
    let (word, length) = load.field("length").expect("length");
    assert_eq!((word.index, length.offset, length.width, length.minus), (1, 0, 10, 1));
    assert_eq!(table.by_opcode(0x8).next().map(|e| e.mnemonic.as_str()), Some("CONV"));
}

#[test]
fn fields_never_exceed_or_overlap_their_word() {
    let handle = TableHandle::from_dir(fixture_dir()).expect("load dpu fixtures");
    for entry in handle.table().entries() {
        for word in &entry.words {
            let total: u32 = word.fields.iter().map(|f| f.width).sum();
            assert!(total <= word.width, "{} word {}", entry.mnemonic, word.index);
            let mut used = 0u64;
            for field in &word.fields {
                assert_eq!(used & field.mask, 0, "{}.{} overlaps", entry.mnemonic, field.name);
                used |= field.mask;
            }
        }
    }
}

#[test]
fn add_and_sub_produce_two_entries_in_order() {
    let dir = tempdir().expect("tempdir");
    write_file(dir.path(), "sub.xml", &alu_source("SUB", 0x22));
    write_file(dir.path(), "add.xml", &alu_source("ADD", 0x20));

    let handle = TableHandle::from_dir(dir.path()).expect("add + sub");
    let table = handle.table();
    assert_eq!(table.mnemonics().collect::<Vec<_>>(), vec!["ADD", "SUB"]);
    for entry in table.entries() {
        let layout: Vec<_> = entry.words[0]
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.offset, f.offset + f.width - 1))
            .collect();
        assert_eq!(
            layout,
            vec![("opcode", 0, 5), ("rd", 6, 10), ("rs", 11, 15), ("rt", 16, 20)]
        );
    }
}

#[test]
fn duplicate_nop_names_both_files_and_yields_no_table() {
    let dir = tempdir().expect("tempdir");
    write_file(dir.path(), "a.xml", &alu_source("NOP", 0));
    write_file(dir.path(), "b.xml", &alu_source("NOP", 1));

    match TableHandle::from_dir(dir.path()) {
        Err(err @ InstError::DuplicateInstruction { .. }) => {
            let text = err.to_string();
            assert!(text.contains("a.xml") && text.contains("b.xml"), "{text}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("duplicate NOP must not produce a table"),
    }
}

#[test]
fn malformed_file_is_skipped_or_aborts_per_policy() {
    let dir = tempdir().expect("tempdir");
    write_file(dir.path(), "add.xml", &alu_source("ADD", 0x20));
    write_file(
        dir.path(),
        "broken.xml",
        "<root>\n  <inst name=\"X\">\n    <word width=\"32\">\n</root>\n",
    );
    write_file(dir.path(), "sub.xml", &alu_source("SUB", 0x22));

    let skip = PipelineConfig::new(dir.path()).with_policy(FailurePolicy::Skip);
    let handle = TableHandle::from_config(skip).expect("skip policy");
    assert_eq!(handle.table().roots().len(), 2);
    assert_eq!(handle.table().mnemonics().collect::<Vec<_>>(), vec!["ADD", "SUB"]);
    assert_eq!(handle.failures().len(), 1);
    assert!(handle.failures()[0].path.ends_with("broken.xml"));

    let abort = PipelineConfig::new(dir.path());
    match TableHandle::from_config(abort) {
        Err(err) => {
            assert!(matches!(err, InstError::Parse { .. }), "{err:?}");
            assert!(err.to_string().contains("broken.xml"), "{err}");
        }
        Ok(_) => panic!("abort policy must fail"),
    }
}

#[test]
fn rerunning_yields_identical_output() {
    let first = TableHandle::from_dir(fixture_dir()).expect("first run");
    let second = TableHandle::from_dir(fixture_dir()).expect("second run");
    assert_eq!(first.table().entries(), second.table().entries());
    assert_eq!(
        emit::to_json(first.table()).expect("json"),
        emit::to_json(second.table()).expect("json")
    );
    assert_eq!(
        emit::fingerprint(first.table()).expect("fingerprint"),
        emit::fingerprint(second.table()).expect("fingerprint")
    );
}

#[test]
fn fixture_table_decodes_little_endian_stream() {
    let handle = TableHandle::from_dir(fixture_dir()).expect("load dpu fixtures");
    let table = handle.table();

    // LOAD bank 3 @ 0x040, length 256, ddr 0x1000 via reg 1.
    let words = table
        .encode(
            "LOAD",
            &[
                ("bank_id", 3),
                ("bank_addr", 0x40),
                ("length", 256),
                ("reg_id", 1),
                ("ddr_addr", 0x1000),
            ],
        )
        .expect("encode LOAD");
    assert_eq!(words, vec![0x0000_3040, 0x0000_00FF, 0x2000_1000]);

    let bytes = hex!("40300000 ff000000 00100020");
    let load = table.decode_bytes(&bytes).expect("decode LOAD");
    assert_eq!(load.mnemonic(), "LOAD");
    assert_eq!(load.operand("length").map(|op| op.value), Some(256));
    assert_eq!(load.operand("ddr_addr").map(|op| op.value), Some(0x1000));

    let end = table.decode_bytes(&hex!("00000070")).expect("decode END");
    assert_eq!(end.mnemonic(), "END");
    assert!(table.decode_bytes(&hex!("000000f0")).is_none());

    let conv = table
        .decode(&[0x8000_0010, 0x001F_0020])
        .expect("decode CONV");
    assert_eq!(conv.operand("channel_offset").map(|op| op.value), Some(-1));
}

#[test]
fn fixture_table_renders_cpp_header() {
    let handle = TableHandle::from_dir(fixture_dir()).expect("load dpu fixtures");
    let header = format::render_cpp_header(handle.table(), "dpu").expect("header");
    assert!(header.contains("INST_TYPE_CONVINIT = 0,"));
    assert!(header.contains("    {0x7, INST_TYPE_END},"));
    assert!(header.contains("INST_TYPE_INVALID = 5,"));
    let summary = format::render_summary(handle.table());
    assert!(summary.starts_with("5 instruction(s) from 4 source file(s)"));
}

#[test]
fn config_file_drives_the_pipeline() {
    let dir = tempdir().expect("tempdir");
    let sources = dir.path().join("src");
    fs::create_dir(&sources).expect("mkdir");
    write_file(&sources, "add.desc", &alu_source("ADD", 0x20));
    write_file(&sources, "ignored.xml", &alu_source("SUB", 0x22));
    let config_path = write_file(
        dir.path(),
        "insttab.toml",
        &format!(
            "source_dir = {:?}\nextension = \"desc\"\nword_widths = [32]\n",
            sources.display().to_string()
        ),
    );

    let config = PipelineConfig::from_file(&config_path).expect("config");
    let handle = TableHandle::from_config(config).expect("table");
    assert_eq!(handle.table().mnemonics().collect::<Vec<_>>(), vec!["ADD"]);
}
