//! Whole-pipeline properties: determinism, scope balance, storage layout,
//! dialect handling and error recovery.

mod cases;

use cases::*;
use indoc::indoc;
use pretty_assertions::assert_eq;
use vfr::{CompileOptions, OpCode, StringTable, records, verify_scopes};

const SAMPLE: &str = indoc! {"
    checkbox name = Flag, varid = Cfg.Flag, prompt = STR_P, help = STR_H,
    endcheckbox;
    numeric name = Count, varid = Cfg.Count, prompt = STR_P, help = STR_H,
      minimum = 1, maximum = 100, step = 1, default = 10,
    endnumeric;
    suppressif ideqval Flag == 1;
      grayoutif questionref(Count) > 50;
        text = STR_T;
      endif;
    endif;
    rule Big, questionref(Count) >= 90 endrule;
"};

#[test]
fn compiling_twice_gives_identical_packages() {
    let source = in_form(SAMPLE);
    let first = compile_ok(&source);
    let second = compile_ok(&source);
    assert_eq!(first.package, second.package);
    assert_eq!(first.to_c_array("Sample"), second.to_c_array("Sample"));
}

#[test]
fn every_scope_is_closed_once() {
    let compiled = compile_ok(&in_form(SAMPLE));
    let expected: usize = compiled.tree.iter().map(|n| n.scope_count()).sum();
    assert_eq!(verify_scopes(&compiled.package), Ok(expected));

    let records = records(&compiled.package).unwrap();
    let ends = records
        .iter()
        .filter(|r| r.opcode == Some(OpCode::End))
        .count();
    assert_eq!(ends, expected);
    assert!(records.iter().all(|r| r.bytes.len() >= 2));
}

#[test]
fn package_header_carries_total_length() {
    let compiled = compile_ok(&in_form(SAMPLE));
    let package = &compiled.package;
    let declared = u32::from_le_bytes([package[0], package[1], package[2], 0]) as usize;
    assert_eq!(declared, package.len());
    assert_eq!(package[3], 0x02);
}

#[test]
fn field_offsets_follow_natural_alignment() {
    let source = indoc! {"
        typedef struct {
          UINT8  A;
          UINT32 B;
          UINT8  C : 3;
          UINT8  D : 5;
        } Layout;

        formset guid = GUID, title = STR_TITLE, help = STR_HELP,
          varstore Layout, name = L, guid = GUID;
          form formid = 1, title = STR_FORM;
            numeric varid = L.A, prompt = STR_P, help = STR_H, maximum = 10, endnumeric;
            numeric varid = L.B, prompt = STR_P, help = STR_H, maximum = 10, endnumeric;
            numeric varid = L.C, prompt = STR_P, help = STR_H, maximum = 7, endnumeric;
            numeric varid = L.D, prompt = STR_P, help = STR_H, maximum = 31, endnumeric;
          endform;
        endformset;
    "}
    .replace("GUID", GUID);
    let compiled = compile_ok(&source);

    let offsets: Vec<u16> = form(&compiled, 1)
        .walk()
        .filter_map(|n| n.op.question())
        .filter_map(|q| q.var.as_ref())
        .map(|v| v.header_info())
        .collect();
    // Bit fields are addressed in bits from the start of the record.
    assert_eq!(offsets, vec![0, 4, 64, 67]);
}

#[test]
fn shared_endif_needs_the_framework_dialect() {
    let body = indoc! {"
        suppressif TRUE;
        grayoutif FALSE;
          text = STR1;
        endif;
    "};
    let err = compile(&in_form(body)).unwrap_err();
    assert_eq!(error_codes(&err), vec!["V002".to_string()]);

    let options = CompileOptions {
        framework_compatible: true,
        ..CompileOptions::default()
    };
    let compiled = compile_with(&in_form(body), options).unwrap();
    let form = form(&compiled, 1);
    assert_eq!(child_opcodes(form), vec![OpCode::SuppressIf]);
    assert_eq!(
        child_opcodes(&form.children[0]),
        vec![OpCode::True, OpCode::GrayOutIf]
    );
}

#[test]
fn disableif_cannot_follow_a_framework_head() {
    let body = indoc! {"
        grayoutif FALSE;
        disableif TRUE;
          text = STR1;
        endif;
        endif;
    "};
    let framework = CompileOptions {
        framework_compatible: true,
        ..CompileOptions::default()
    };
    for options in [CompileOptions::default(), framework] {
        let err = compile_with(&in_form(body), options).unwrap_err();
        assert_eq!(error_codes(&err), vec!["V019".to_string()]);
    }
}

#[test]
fn oversized_layouts_and_names_are_overflows() {
    let source = indoc! {"
        typedef struct { UINT64 Big[0x40000000]; } Huge;

        formset guid = GUID, title = STR_TITLE, help = STR_HELP,
          varstore UINT8, name = NAME, guid = GUID;
        endformset;
    "}
    .replace("NAME", &"N".repeat(110))
    .replace("GUID", GUID);
    let err = compile(&source).unwrap_err();
    assert_eq!(error_codes(&err), vec!["V016".to_string(); 2]);
}

#[test]
fn errors_are_collected_across_statements() {
    let err = compile(&in_form(indoc! {"
        label 0x10000;
        text = STR1;
        bogus stuff;
    "}))
    .unwrap_err();
    assert_eq!(
        error_codes(&err),
        vec!["V016".to_string(), "V001".to_string()]
    );
    let rendered = vfr::render_error_to_string_no_color(&err, "broken.vfr");
    assert!(rendered.contains("V016"));
    assert!(rendered.contains("broken.vfr"));
}

#[test]
fn string_table_supplies_ids() {
    let table = StringTable::parse(indoc! {"
        # setup strings
        STR_TITLE = 1
        STR_HELP  = 2
        STR_FORM  = 3
        STR_T     = 0x10
    "})
    .unwrap();
    let options = CompileOptions::default();

    let compiled =
        vfr::compile_source(&in_form("text = STR_T;"), &table, options.clone()).unwrap();
    let records = records(&compiled.package).unwrap();
    let text = records
        .iter()
        .find(|r| r.opcode == Some(OpCode::Text))
        .unwrap();
    assert_eq!(&text.bytes[2..4], &[0x10, 0x00]);

    let err = vfr::compile_source(&in_form("text = STR_MISSING;"), &table, options).unwrap_err();
    assert_eq!(error_codes(&err), vec!["V014".to_string()]);
}

#[test]
fn outputs_render_in_every_format() {
    let compiled = compile_ok(&in_form(SAMPLE));

    let c = compiled.to_c_array("SampleBin");
    assert!(c.starts_with("unsigned char SampleBin[] = {"));
    assert!(c.trim_end().ends_with("};"));

    let listing = compiled.listing().unwrap();
    assert!(listing.starts_with("000000  PACKAGE_HEADER"));
    assert!(listing.contains("FORM_SET"));

    let symbols = compiled.symbols.to_string();
    assert!(symbols.contains("form 0x0001\n"));
    assert!(symbols.contains("question 0x0001 form=0x0001 name=Flag varid=Cfg.Flag\n"));
    assert!(symbols.contains("question 0x0002 form=0x0001 name=Count varid=Cfg.Count\n"));
    assert!(symbols.contains("rule 0x00 Big\n"));
}
