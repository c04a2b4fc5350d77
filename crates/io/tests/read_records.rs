use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook, Worksheet};
use sheetbind_core::{
    CellEnum, DefaultIdGenerator, DocumentKind, DocumentSpec, FieldSet, GenerationError,
    GenerationStrategy, SchemaRegistry, SheetRecord,
};
use sheetbind_io::{SheetError, SheetReader};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Level {
    #[default]
    Junior,
    Senior,
}

impl CellEnum for Level {
    const TYPE_NAME: &'static str = "Level";

    fn from_canonical(raw: &str) -> Option<Self> {
        match raw {
            "junior" => Some(Level::Junior),
            "senior" => Some(Level::Senior),
            _ => None,
        }
    }

    fn canonical(&self) -> &'static str {
        match self {
            Level::Junior => "junior",
            Level::Senior => "senior",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    name: String,
    age: i32,
    active: bool,
    joined: Option<NaiveDateTime>,
    level: Level,
}

impl SheetRecord for Person {
    fn document() -> Option<DocumentSpec> {
        Some(DocumentSpec::new(DocumentKind::Xlsx).named("people"))
    }

    fn fields(fields: &mut FieldSet<Self>) {
        fields.field("Name", |r| &r.name, |r| &mut r.name);
        fields.field("Age", |r| &r.age, |r| &mut r.age);
        fields.field("Active", |r| &r.active, |r| &mut r.active);
        fields.field("Joined", |r| &r.joined, |r| &mut r.joined);
        fields.enumeration("Level", |r| &r.level, |r| &mut r.level);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Ticket {
    id: String,
    seq: i64,
    subject: String,
}

impl SheetRecord for Ticket {
    fn document() -> Option<DocumentSpec> {
        Some(DocumentSpec::new(DocumentKind::Xlsx).with_description("Open tickets", 1))
    }

    fn fields(fields: &mut FieldSet<Self>) {
        fields.field("ID", |r| &r.id, |r| &mut r.id).generated(GenerationStrategy::Uuid);
        fields.field("Seq", |r| &r.seq, |r| &mut r.seq).generated(GenerationStrategy::SequenceId);
        fields.field("Subject", |r| &r.subject, |r| &mut r.subject);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct LegacyPerson {
    name: String,
    age: i32,
}

impl SheetRecord for LegacyPerson {
    fn document() -> Option<DocumentSpec> {
        Some(DocumentSpec::new(DocumentKind::Xls))
    }

    fn fields(fields: &mut FieldSet<Self>) {
        fields.field("Name", |r| &r.name, |r| &mut r.name);
        fields.field("Age", |r| &r.age, |r| &mut r.age);
    }
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Build an xlsx document in memory; `fill` writes the first sheet.
fn xlsx(fill: impl FnOnce(&mut Worksheet)) -> Cursor<Vec<u8>> {
    let mut workbook = Workbook::new();
    fill(workbook.add_worksheet());
    Cursor::new(workbook.save_to_buffer().unwrap())
}

fn write_row(sheet: &mut Worksheet, row: u32, cells: &[&str]) {
    for (col, text) in cells.iter().enumerate() {
        if !text.is_empty() {
            sheet.write_string(row, col as u16, *text).unwrap();
        }
    }
}

fn people_sheet(sheet: &mut Worksheet) {
    let date = Format::new().set_num_format("yyyy-mm-dd");
    write_row(sheet, 0, &["Name", "Age", "Active", "Joined", "Level"]);
    sheet.write_string(1, 0, "Ada").unwrap();
    sheet.write_number(1, 1, 36).unwrap();
    sheet.write_boolean(1, 2, true).unwrap();
    let joined = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
    sheet.write_datetime_with_format(1, 3, &joined, &date).unwrap();
    sheet.write_string(1, 4, "senior").unwrap();
    write_row(sheet, 2, &["Grace", "42.0", "maybe", "", "junior"]);
    write_row(sheet, 3, &["Linus", "19", "TRUE", "2023-03-01 09:30:00", ""]);
}

fn joined(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
}

#[test]
fn reads_one_record_per_data_row() {
    let reader = SheetReader::<Person>::new().unwrap();
    let people = reader.read(xlsx(people_sheet)).unwrap();

    assert_eq!(people.len(), 3);
    assert_eq!(
        people[0],
        Person {
            name: "Ada".into(),
            age: 36,
            active: true,
            joined: Some(joined(2024, 1, 15, 0, 0)),
            level: Level::Senior,
        }
    );
    assert_eq!(people[1].age, 42);
    assert!(!people[1].active, "anything but 'true' is false");
    assert_eq!(people[1].joined, None);
    assert!(people[2].active);
    assert_eq!(people[2].joined, Some(joined(2023, 3, 1, 9, 30)));
    assert_eq!(people[2].level, Level::Junior, "blank enum cell keeps the default");
}

#[test]
fn unknown_and_blank_header_columns_are_ignored() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Nickname", "", "Name", "Age"]);
        write_row(sheet, 1, &["Countess", "x", "Ada", "36"]);
    });
    let people = SheetReader::<Person>::new().unwrap().read(doc).unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].name, "Ada");
    assert_eq!(people[0].age, 36);
}

#[test]
fn blank_rows_produce_no_records() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name"]);
        write_row(sheet, 1, &["Ada"]);
        write_row(sheet, 4, &["Grace"]);
    });
    let people = SheetReader::<Person>::new().unwrap().read(doc).unwrap();
    let names: Vec<&str> = people.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Ada", "Grace"]);
}

#[test]
fn header_only_document_is_empty() {
    let doc = xlsx(|sheet| write_row(sheet, 0, &["Name", "Age"]));
    assert!(SheetReader::<Person>::new().unwrap().read(doc).unwrap().is_empty());
}

#[test]
fn formula_cells_read_as_formula_text() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name", "Age"]);
        sheet.write_formula(1, 0, "=1+2").unwrap();
        sheet.write_number(1, 1, 1).unwrap();
    });
    let people = SheetReader::<Person>::new().unwrap().read(doc).unwrap();
    assert_eq!(people[0].name, "1+2");
}

#[test]
fn invalid_date_fails_the_read() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name", "Joined"]);
        write_row(sheet, 1, &["Ada", "2024-01-15 00:00:00"]);
        write_row(sheet, 2, &["Grace", "last tuesday"]);
    });
    let err = SheetReader::<Person>::new().unwrap().read(doc).unwrap_err();
    match err {
        SheetError::Coercion { row, source } => {
            assert_eq!(row, 2);
            assert_eq!(source.field, "Joined");
            assert_eq!(source.raw, "last tuesday");
        }
        other => panic!("expected coercion error, got {other}"),
    }
}

#[test]
fn record_stream_stops_after_first_error() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name", "Age"]);
        write_row(sheet, 1, &["Ada", "36"]);
        write_row(sheet, 2, &["Grace", "old"]);
        write_row(sheet, 3, &["Linus", "19"]);
    });
    let reader = SheetReader::<Person>::new().unwrap();
    let mut document = reader.open(doc).unwrap();
    let results: Vec<_> = document.records(&reader).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().name, "Ada");
    assert!(matches!(results[1], Err(SheetError::Coercion { .. })));
}

#[test]
fn small_row_cache_reads_everything() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name", "Age"]);
        for row in 1..=25 {
            sheet.write_string(row, 0, format!("p{row}")).unwrap();
            sheet.write_number(row, 1, row).unwrap();
        }
    });
    let settings = sheetbind_config::ReaderSettings {
        row_cache_size: Some(1),
        buffer_size: Some(64),
        ..Default::default()
    };
    let reader = SheetReader::<Person>::new().unwrap().with_settings(settings);
    let people = reader.read(doc).unwrap();
    assert_eq!(people.len(), 25);
    assert_eq!(people[24].age, 25);
}

fn ticket_sheet(sheet: &mut Worksheet) {
    sheet.merge_range(0, 0, 1, 2, "Open tickets", &Format::new()).unwrap();
    write_row(sheet, 2, &["ID", "Seq", "Subject"]);
    write_row(sheet, 3, &["keep-me", "", "Printer on fire"]);
    write_row(sheet, 4, &["", "", "VPN down"]);
}

#[test]
fn description_rows_precede_the_header() {
    let reader = SheetReader::<Ticket>::new()
        .unwrap()
        .with_generator(Arc::new(DefaultIdGenerator::new(3)));
    let tickets = reader.read(xlsx(ticket_sheet)).unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].subject, "Printer on fire");
    assert_eq!(tickets[1].subject, "VPN down");
}

#[test]
fn generated_columns_are_always_filled() {
    let reader = SheetReader::<Ticket>::new()
        .unwrap()
        .with_generator(Arc::new(DefaultIdGenerator::new(3)));
    let tickets = reader.read(xlsx(ticket_sheet)).unwrap();

    assert_ne!(tickets[0].id, "keep-me", "cell text never wins over a generated id");
    assert_eq!(tickets[0].id.len(), 32);
    assert_ne!(tickets[0].id, tickets[1].id);
    assert!(tickets[0].seq > 0);
    assert!(tickets[1].seq > tickets[0].seq);
}

#[test]
fn generated_columns_need_a_generator() {
    let reader = SheetReader::<Ticket>::new().unwrap();
    let mut document = reader.open(xlsx(ticket_sheet)).unwrap();
    match document.records(&reader) {
        Err(SheetError::Generation(GenerationError::NoGenerator { field })) => {
            assert_eq!(field, "ID");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("records should not start without a generator"),
    };
}

#[test]
fn missing_header_row_is_an_open_error() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 1, &["Ada", "36"]);
        write_row(sheet, 2, &["Grace", "42"]);
    });
    let err = SheetReader::<Person>::new().unwrap().read(doc).unwrap_err();
    match err {
        SheetError::DocumentOpen { kind, message } => {
            assert_eq!(kind, DocumentKind::Xlsx);
            assert!(message.contains("header row 1"), "{message}");
        }
        other => panic!("expected open error, got {other}"),
    }
}

#[test]
fn blank_header_row_is_an_open_error() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Open tickets"]);
        write_row(sheet, 3, &["ID", "Seq", "Subject"]);
    });
    let reader = SheetReader::<Ticket>::new()
        .unwrap()
        .with_generator(Arc::new(DefaultIdGenerator::new(3)));
    let err = reader.read(doc).unwrap_err();
    assert!(matches!(err, SheetError::DocumentOpen { .. }), "{err}");
}

#[test]
fn out_of_range_age_fails_the_read() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name", "Age"]);
        write_row(sheet, 1, &["Ada", "3000000000"]);
    });
    let err = SheetReader::<Person>::new().unwrap().read(doc).unwrap_err();
    assert!(matches!(err, SheetError::Coercion { row: 1, .. }), "{err}");
}

#[test]
fn header_binding_maps_columns_to_fields() {
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Nickname", "Age", "Name"]);
        write_row(sheet, 1, &["Countess", "36", "Ada"]);
    });
    let reader = SheetReader::<Person>::new().unwrap();
    let mut document = reader.open(doc).unwrap();
    assert_eq!(document.kind(), DocumentKind::Xlsx);
    assert_eq!(document.sheet_name(), "Sheet1");

    let records = document.records(&reader).unwrap();
    let header = records.header();
    assert_eq!(header.bound_count(), 2);
    assert_eq!(header.binding_at(0), None);
    assert_eq!(header.binding_at(1), reader.schema().position("Age"));
    assert_eq!(header.binding_at(2), reader.schema().position("Name"));
    assert_eq!(header.binding_at(9), None);
}

#[test]
fn legacy_document_reads_rows_in_order() {
    let reader = SheetReader::<LegacyPerson>::new().unwrap();
    let people = reader.read_path(fixture("people.xls")).unwrap();
    assert_eq!(
        people,
        vec![
            LegacyPerson { name: "Ada".into(), age: 36 },
            LegacyPerson { name: "Grace".into(), age: 42 },
            LegacyPerson { name: "Linus".into(), age: 19 },
        ]
    );

    let mut document = reader.open(std::fs::File::open(fixture("people.xls")).unwrap()).unwrap();
    assert_eq!(document.kind(), DocumentKind::Xls);
    assert_eq!(document.sheet_name(), "People");
}

#[test]
fn kind_mismatch_is_an_open_error() {
    let reader = SheetReader::<LegacyPerson>::new().unwrap();
    let doc = xlsx(|sheet| {
        write_row(sheet, 0, &["Name"]);
        write_row(sheet, 1, &["Ada"]);
    });
    let err = reader.read(doc).unwrap_err();
    assert!(matches!(err, SheetError::DocumentOpen { kind: DocumentKind::Xls, .. }), "{err}");
}

#[test]
fn garbage_input_is_an_open_error() {
    let reader = SheetReader::<Person>::new().unwrap();
    let err = reader.read(Cursor::new(b"Name,Age\nAda,36\n".to_vec())).unwrap_err();
    assert!(matches!(err, SheetError::DocumentOpen { kind: DocumentKind::Xlsx, .. }));
}

#[test]
fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let reader = SheetReader::<Person>::new().unwrap();
    let err = reader.read_path(dir.path().join("absent.xlsx")).unwrap_err();
    assert!(matches!(err, SheetError::DocumentOpen { .. }));
}

#[test]
fn private_registry_is_independent_of_global() {
    let registry = SchemaRegistry::new();
    let reader = SheetReader::<Person>::with_registry(&registry).unwrap();
    assert_eq!(registry.len(), 1);
    assert_eq!(reader.schema().document().name, "people");
}
