use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use chrono::{Local, NaiveDate, TimeZone, Utc};
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use qail_export::prelude::*;
use qail_export::{export, export_copy, export_with_cancel};

fn users() -> MemoryCursor {
    MemoryCursor::new(
        vec![Column::new("id", TypeKind::Int4), Column::new("name", TypeKind::Text)],
        vec![vec![1.into(), "a".into()], vec![2.into(), Value::Null]],
    )
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read export")
}

fn nl() -> &'static str {
    if cfg!(windows) { "\r\n" } else { "\n" }
}

#[test]
fn test_csv_with_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.csv");

    let summary = export(&mut users(), &path, &ExportOptions::new("csv")).unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(read(&path), ["id,name", "1,a", "2,", ""].join(nl()));
}

#[test]
fn test_sql_one_statement_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.sql");
    let options = ExportOptions::new("sql").with_table("t");

    let summary = export(&mut users(), &path, &options).unwrap();

    assert_eq!(summary.statements, 2);
    let out = read(&path);
    let statements: Vec<&str> = out.split_inclusive(";\n").collect();
    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[1],
        "insert into \"t\" (\"id\", \"name\") values\n\t(2, NULL);\n"
    );
}

#[test]
fn test_sql_batches_preserve_row_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.sql");
    let rows = (1..=7).map(|i| vec![Value::Int(i)]).collect();
    let mut cursor = MemoryCursor::new(vec![Column::new("id", TypeKind::Int8)], rows);
    let options = ExportOptions::new("sql")
        .with_table("items")
        .with_rows_per_statement(3);

    let summary = export(&mut cursor, &path, &options).unwrap();
    assert_eq!((summary.rows, summary.statements), (7, 3));

    let out = read(&path);
    let per_statement: Vec<Vec<i64>> = out
        .split_inclusive(";\n")
        .map(|stmt| {
            stmt.lines()
                .skip(1)
                .map(|line| {
                    line.trim_matches(|c: char| matches!(c, '\t' | '(' | ')' | ',' | ';'))
                        .parse()
                        .unwrap()
                })
                .collect()
        })
        .collect();
    assert_eq!(per_statement, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
}

#[test]
fn test_gzip_matches_plain_output() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.json");
    let packed = dir.path().join("packed.json");

    export(&mut users(), &plain, &ExportOptions::new("json")).unwrap();
    let summary = export(
        &mut users(),
        &packed,
        &ExportOptions::new("json").with_compression(Compression::Gzip),
    )
    .unwrap();

    assert_eq!(summary.path, dir.path().join("packed.json.gz"));
    assert!(!packed.exists());

    let mut decoded = Vec::new();
    GzDecoder::new(File::open(&summary.path).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert_eq!(decoded, fs::read(&plain).unwrap());
}

#[test]
fn test_zip_contains_single_named_member() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.zip");
    let options = ExportOptions::new("xml").with_compression(Compression::Zip);

    export(&mut users(), &path, &options).unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    assert_eq!(archive.len(), 1);
    let mut member = archive.by_index(0).unwrap();
    assert_eq!(member.name(), "users.xml");
    let mut body = String::new();
    member.read_to_string(&mut body).unwrap();
    assert!(body.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<results>\n"));
}

#[test]
fn test_invalid_timezone_falls_back_to_local() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.csv");
    let ts = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 45).unwrap();
    let mut cursor = MemoryCursor::new(
        vec![Column::new("at", TypeKind::TimestampTz)],
        vec![vec![Value::TimestampTz(ts)]],
    );
    let options = ExportOptions::new("csv")
        .without_header()
        .with_time_zone("Mars/Olympus_Mons");

    let summary = export(&mut cursor, &path, &options).unwrap();

    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("Mars/Olympus_Mons"));
    let expected = ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
    assert_eq!(read(&path).trim_end(), expected);
}

#[test]
fn test_named_timezone_and_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.json");
    let ts = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 45).unwrap();
    let mut cursor = MemoryCursor::new(
        vec![
            Column::new("at", TypeKind::TimestampTz),
            Column::new("day", TypeKind::Date),
        ],
        vec![vec![
            Value::TimestampTz(ts),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()),
        ]],
    );
    let options = ExportOptions::new("json")
        .with_time_zone("Europe/Paris")
        .with_time_format("dd/MM/yyyy HH:mm");

    let summary = export(&mut cursor, &path, &options).unwrap();
    assert!(summary.warnings.is_empty());

    let parsed: serde_json::Value = serde_json::from_str(&read(&path)).unwrap();
    assert_eq!(
        parsed,
        serde_json::json!([{"at": "15/03/2024 15:30", "day": "15/03/2024"}])
    );
}

#[test]
fn test_null_tokens_per_format() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = || {
        MemoryCursor::new(
            vec![Column::new("id", TypeKind::Int4), Column::new("note", TypeKind::Text)],
            vec![vec![1.into(), Value::Null], vec![2.into(), "null".into()]],
        )
    };

    let csv = dir.path().join("n.csv");
    export(&mut cursor(), &csv, &ExportOptions::new("csv").without_header()).unwrap();
    assert_eq!(read(&csv).lines().collect::<Vec<_>>(), vec!["1,", "2,null"]);

    let json = dir.path().join("n.json");
    export(&mut cursor(), &json, &ExportOptions::new("json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&read(&json)).unwrap();
    assert_eq!(
        parsed,
        serde_json::json!([{"id": 1, "note": null}, {"id": 2, "note": "null"}])
    );

    let xml = dir.path().join("n.xml");
    export(&mut cursor(), &xml, &ExportOptions::new("xml")).unwrap();
    let out = read(&xml);
    assert!(out.contains("<note></note>"));
    assert!(out.contains("<note>null</note>"));

    let sql = dir.path().join("n.sql");
    export(
        &mut cursor(),
        &sql,
        &ExportOptions::new("sql").with_table("notes").with_rows_per_statement(2),
    )
    .unwrap();
    assert!(read(&sql).ends_with("\t(1, NULL),\n\t(2, 'null');\n"));
}

#[test]
fn test_csv_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tricky.csv");
    let originals = [
        "plain",
        "semi;colon",
        "say \"hi\"",
        "O'Brien",
        "two\nlines",
        "",
        " padded ",
    ];
    let rows = originals.iter().map(|s| vec![Value::from(*s)]).collect();
    let mut cursor = MemoryCursor::new(vec![Column::new("text", TypeKind::Text)], rows);

    export(&mut cursor, &path, &ExportOptions::new("csv").with_delimiter(';')).unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .from_path(&path)
        .unwrap();
    assert_eq!(reader.headers().unwrap().get(0), Some("text"));
    let fields: Vec<String> = reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect();
    assert_eq!(fields, originals);
}

#[test]
fn test_json_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ordered.json");
    let mut cursor = MemoryCursor::new(
        vec![
            Column::new("zz", TypeKind::Int4),
            Column::new("id", TypeKind::Int4),
            Column::new("aa", TypeKind::Text),
        ],
        vec![vec![3.into(), 1.into(), "x".into()], vec![4.into(), 2.into(), "y".into()]],
    );

    export(&mut cursor, &path, &ExportOptions::new("json")).unwrap();

    for entry in read(&path).split("},") {
        let zz = entry.find("\"zz\"").unwrap();
        let id = entry.find("\"id\"").unwrap();
        let aa = entry.find("\"aa\"").unwrap();
        assert!(zz < id && id < aa, "keys out of order in {entry}");
    }
}

#[test]
fn test_repeated_exports_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    for format in ["csv", "json", "xml", "yaml"] {
        let first = dir.path().join(format!("first.{format}"));
        let second = dir.path().join(format!("second.{format}"));
        let options = ExportOptions::new(format).with_compression(Compression::Gzip);

        let a = export(&mut users(), &first, &options).unwrap();
        let b = export(&mut users(), &second, &options).unwrap();

        assert_eq!(
            fs::read(&a.path).unwrap(),
            fs::read(&b.path).unwrap(),
            "{format} output differs between runs"
        );
    }
}

/// Trips the token after handing out `after` rows.
struct CancelAfter {
    inner: MemoryCursor,
    token: CancelToken,
    after: usize,
    served: usize,
}

impl RowCursor for CancelAfter {
    fn columns(&self) -> &[Column] {
        self.inner.columns()
    }

    fn next_row(&mut self) -> ExportResult<Option<Vec<Value>>> {
        let row = self.inner.next_row()?;
        self.served += 1;
        if self.served == self.after {
            self.token.cancel();
        }
        Ok(row)
    }
}

#[test]
fn test_cancelled_json_is_still_well_formed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    let token = CancelToken::new();
    let rows = (1..=5).map(|i| vec![Value::Int(i)]).collect();
    let mut cursor = CancelAfter {
        inner: MemoryCursor::new(vec![Column::new("id", TypeKind::Int4)], rows),
        token: token.clone(),
        after: 2,
        served: 0,
    };

    let err = export_with_cancel(&mut cursor, &path, &ExportOptions::new("json"), &token)
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.rows_written(), Some(2));
    let parsed: serde_json::Value = serde_json::from_str(&read(&path)).unwrap();
    assert_eq!(parsed, serde_json::json!([{"id": 1}, {"id": 2}]));
}

#[test]
fn test_cancelled_sql_flushes_partial_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.sql");
    let token = CancelToken::new();
    let rows = (1..=5).map(|i| vec![Value::Int(i)]).collect();
    let mut cursor = CancelAfter {
        inner: MemoryCursor::new(vec![Column::new("id", TypeKind::Int4)], rows),
        token: token.clone(),
        after: 1,
        served: 0,
    };
    let options = ExportOptions::new("sql").with_table("t").with_rows_per_statement(10);

    let err = export_with_cancel(&mut cursor, &path, &options, &token).unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(read(&path), "insert into \"t\" (\"id\") values\n\t(1);\n");
}

#[test]
fn test_unknown_format_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.parquet");

    let err = export(&mut users(), &path, &ExportOptions::new("parquet")).unwrap_err();

    assert!(matches!(err.root(), ExportError::Config(_)));
    assert!(err.to_string().contains("available: csv, json, sql, xml, yaml"));
    assert!(!path.exists());
}

#[test]
fn test_copy_export() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bulk.csv");
    let mut source = MemoryCopySource::new(vec![
        &b"id;note\n1;\"multi\n"[..],
        &b"line\"\n2;\n"[..],
    ]);
    let options = ExportOptions::new("csv").with_delimiter(';');

    let summary = export_copy(
        &mut source,
        "SELECT id, note FROM notes;",
        &path,
        &options,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(
        source.statements,
        vec![
            "COPY (SELECT id, note FROM notes) TO STDOUT \
             WITH (FORMAT csv, HEADER true, DELIMITER ';')"
        ]
    );
    assert_eq!(read(&path), "id;note\n1;\"multi\nline\"\n2;\n");
}

#[test]
fn test_copy_export_requires_csv() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = MemoryCopySource::new(Vec::<&'static [u8]>::new());

    let err = export_copy(
        &mut source,
        "select 1",
        dir.path().join("out.json"),
        &ExportOptions::new("json"),
        &CancelToken::new(),
    )
    .unwrap_err();

    assert!(matches!(err.root(), ExportError::Config(_)));
    assert!(source.statements.is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_write_failure_reports_context() {
    let err = export(&mut users(), "/dev/full", &ExportOptions::new("csv")).unwrap_err();

    assert!(matches!(err.root(), ExportError::Io(_)));
    assert!(err.rows_written().is_some());
    assert!(err.to_string().starts_with("csv export to /dev/full failed at row "));
}

#[test]
fn test_sql_unbounded_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.sql");
    let options = ExportOptions::new("sql")
        .with_table("t")
        .with_rows_per_statement(usize::MAX);

    let summary = export(&mut users(), &path, &options).unwrap();

    assert_eq!((summary.rows, summary.statements), (2, 1));
    assert_eq!(
        read(&path),
        "insert into \"t\" (\"id\", \"name\") values\n\t(1, 'a'),\n\t(2, NULL);\n"
    );
}
