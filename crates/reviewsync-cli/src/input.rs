//! CSV input: one review per row.
//!
//! Headers are matched case-insensitively, ignoring a trailing score range
//! such as `(1-5)` or `（1-5）`. Both English and Chinese reviewer columns are
//! recognised.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use reviewsync_core::{FieldSet, FieldValue, ImportRecord};
use tracing::warn;

/// Sample file written by `reviewsync example`.
pub const EXAMPLE_CSV: &str = "\
paper id,name,email,papersummary,strengths,weakness,overall merit（1-5）,reviewer expertise（1-4）,comments for author
316,张三,reviewer1@example.edu,论文总结A,优势A,不足A,4,3,给作者的一段建议A
316,李四,external@example.com,论文总结B,优势B,不足B,2,2,给作者的一段建议B
";

pub const EXAMPLE_FILE: &str = "reviews_example.csv";

enum Kind {
    Text,
    Score,
}

/// Column header → (field id, value kind). Later entries win when a row
/// fills both spellings of a column.
const FIELD_COLUMNS: &[(&str, &str, Kind)] = &[
    ("papersummary", "t01", Kind::Text),
    ("strengths", "Strengths", Kind::Text),
    ("weakness", "Weaknesses", Kind::Text),
    ("weaknesses", "Weaknesses", Kind::Text),
    ("overall merit", "s01", Kind::Score),
    ("reviewer expertise", "s02", Kind::Score),
    ("comments for author", "t02", Kind::Text),
    ("comments for authors", "t02", Kind::Text),
];

pub fn read_records(path: &Path) -> Result<Vec<ImportRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open CSV file {}", path.display()))?;
    parse_records(file).with_context(|| format!("failed to read {}", path.display()))
}

/// Parse every usable row. Malformed rows are logged and skipped.
pub fn parse_records<R: Read>(input: R) -> Result<Vec<ImportRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("failed to read CSV header")?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.iter().all(String::is_empty) {
        bail!("CSV file has no header row");
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        // Row 1 is the header.
        let line = index + 2;
        let row = row.with_context(|| format!("row {line}: malformed CSV"))?;
        if row.len() != headers.len() {
            warn!(row = line, expected = headers.len(), found = row.len(), "column count mismatch, skipping");
            continue;
        }
        let cells: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(row.iter().map(str::trim))
            .collect();
        if let Some(record) = to_record(&cells, line) {
            records.push(record);
        }
    }
    Ok(records)
}

fn to_record(cells: &HashMap<&str, &str>, line: usize) -> Option<ImportRecord> {
    let cell = |names: &[&str]| filled(cells, names);

    let (Some(paper), Some(email)) = (cell(&["paper id"]), cell(&["email", "审稿人邮箱"])) else {
        warn!(row = line, "missing paper id or reviewer email, skipping");
        return None;
    };
    let Ok(paper_id) = paper.parse::<u64>() else {
        warn!(row = line, paper, "paper id is not an integer, skipping");
        return None;
    };

    let mut fields = FieldSet::new();
    for (column, id, kind) in FIELD_COLUMNS {
        let Some(raw) = cell(&[*column]) else {
            continue;
        };
        let value = match kind {
            Kind::Text => Some(FieldValue::from(raw)),
            Kind::Score => FieldValue::from_cell(raw),
        };
        if let Some(value) = value {
            fields.insert(*id, value);
        }
    }

    Some(ImportRecord {
        paper_id,
        reviewer_email: email.to_string(),
        reviewer_name: cell(&["name", "审稿人姓名"]).map(str::to_string),
        round: cell(&["round"]).map(str::to_string),
        fields,
    })
}

/// First non-blank cell among the alternative column names.
fn filled<'a>(cells: &HashMap<&str, &'a str>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|n| cells.get(*n).copied().filter(|v| !v.is_empty()))
}

/// Lower-case, trim, and drop a trailing parenthesised range.
fn normalize_header(raw: &str) -> String {
    let header = raw.trim_start_matches('\u{feff}').trim().to_lowercase();
    let stripped = if header.ends_with(')') {
        header.rfind('(').map(|i| &header[..i])
    } else if header.ends_with('）') {
        header.rfind('（').map(|i| &header[..i])
    } else {
        None
    };
    stripped.unwrap_or(&header).trim().to_string()
}

pub fn write_example(path: &Path) -> Result<()> {
    std::fs::write(path, EXAMPLE_CSV)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn headers_are_normalised() {
        assert_eq!(normalize_header(" Overall Merit（1-5）"), "overall merit");
        assert_eq!(normalize_header("Reviewer expertise (1-4) "), "reviewer expertise");
        assert_eq!(normalize_header("\u{feff}Paper ID"), "paper id");
        assert_eq!(normalize_header("审稿人邮箱"), "审稿人邮箱");
    }

    #[test]
    fn example_file_parses() {
        let records = parse_records(EXAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.paper_id, 316);
        assert_eq!(first.reviewer_email, "reviewer1@example.edu");
        assert_eq!(first.reviewer_name.as_deref(), Some("张三"));
        assert_eq!(first.round, None);
        assert_eq!(first.fields.get("s01"), Some(&FieldValue::Int(4)));
        assert_eq!(first.fields.get("s02"), Some(&FieldValue::Int(3)));
        assert_eq!(first.fields.get("t01"), Some(&FieldValue::from("论文总结A")));
        assert_eq!(first.fields.get("Strengths"), Some(&FieldValue::from("优势A")));
        assert_eq!(first.fields.get("Weaknesses"), Some(&FieldValue::from("不足A")));
        assert_eq!(first.fields.get("t02"), Some(&FieldValue::from("给作者的一段建议A")));
    }

    #[test]
    fn chinese_reviewer_columns_and_round() {
        let csv = "paper id,审稿人姓名,审稿人邮箱,round,comments for authors\n\
                   12,王五,w@x.cn,R2,Nice work\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].reviewer_name.as_deref(), Some("王五"));
        assert_eq!(records[0].reviewer_email, "w@x.cn");
        assert_eq!(records[0].round(), Some("R2"));
        assert_eq!(records[0].fields.get("t02"), Some(&FieldValue::from("Nice work")));
    }

    #[test]
    fn bad_rows_are_skipped() {
        let csv = "paper id,email,overall merit (1-5)\n\
                   1,a@x.edu,4\n\
                   2,b@x.edu\n\
                   ,c@x.edu,3\n\
                   abc,d@x.edu,3\n\
                   5,,3\n\
                   6,f@x.edu,strong\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.paper_id).collect();
        assert_eq!(ids, vec![1, 6]);
        assert_eq!(records[1].fields.get("s01"), Some(&FieldValue::from("strong")));
    }

    #[test]
    fn blank_cells_are_not_sent() {
        let csv = "paper id,email,papersummary,overall merit\n7,g@x.edu,  ,\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert!(records[0].fields.is_empty());
    }

    #[test]
    fn numeric_text_stays_text() {
        let csv = "paper id,email,papersummary\n7,g@x.edu,42\n";
        let records = parse_records(csv.as_bytes()).unwrap();
        assert_eq!(records[0].fields.get("t01"), Some(&FieldValue::from("42")));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE_CSV.as_bytes()).unwrap();
        let records = read_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_records(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn example_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXAMPLE_FILE);
        write_example(&path).unwrap();
        assert_eq!(read_records(&path).unwrap().len(), 2);
    }
}
