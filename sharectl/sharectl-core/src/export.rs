//! Snapshot export and import in the tabular interchange format.
//!
//! One row per item: `id,path,type,anyoneWithLink,reader,commenter,editor`.
//! Role columns hold comma-joined email addresses inside a single quoted
//! field; an empty field is an empty set. Exporting a snapshot and
//! reconciling against the re-imported table yields zero mutations.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::error::ExportError;
use crate::model::{ItemKind, SnapshotRow};

pub const HEADER: &str = "id,path,type,anyoneWithLink,reader,commenter,editor";

/// Result of reading an exported table: surviving rows plus the rows the
/// reader had to skip. Skips are reported, never fatal.
#[derive(Debug, Default)]
pub struct Import {
    pub rows: Vec<SnapshotRow>,
    pub skipped: Vec<RowIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line: usize,
    pub reason: String,
}

pub fn write_snapshot(path: &Path, rows: &[SnapshotRow]) -> Result<(), ExportError> {
    fs::write(path, render(rows))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<Import, ExportError> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

/// Render rows in the order given; inventories come pre-sorted by path.
pub fn render(rows: &[SnapshotRow]) -> String {
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    for row in rows {
        push_field(&mut out, &row.id);
        out.push(',');
        push_field(&mut out, &row.path);
        out.push(',');
        push_field(&mut out, row.kind.as_str());
        out.push(',');
        push_field(&mut out, if row.public_link { "true" } else { "false" });
        for set in [&row.readers, &row.commenters, &row.editors] {
            out.push(',');
            let joined = set.iter().cloned().collect::<Vec<_>>().join(",");
            push_field(&mut out, &joined);
        }
        out.push('\n');
    }
    out
}

pub fn parse(text: &str) -> Result<Import, ExportError> {
    let mut records = split_records(text)?.into_iter();
    let header = match records.next() {
        Some((_, fields)) => fields,
        None => return Err(ExportError::Header(String::new())),
    };
    let expected: Vec<&str> = HEADER.split(',').collect();
    if header != expected {
        return Err(ExportError::Header(header.join(",")));
    }

    let mut import = Import::default();
    for (line, fields) in records {
        match row_from_fields(&fields) {
            Ok(row) => import.rows.push(row),
            Err(reason) => import.skipped.push(RowIssue { line, reason }),
        }
    }
    Ok(import)
}

fn row_from_fields(fields: &[String]) -> Result<SnapshotRow, String> {
    if fields.len() != 7 {
        return Err(format!("expected 7 columns, found {}", fields.len()));
    }
    if fields[0].is_empty() {
        return Err("empty item id".into());
    }
    let kind = ItemKind::from_str(&fields[2]).ok_or_else(|| format!("unknown type `{}`", fields[2]))?;
    let public_link = match fields[3].as_str() {
        "true" => true,
        "false" => false,
        other => return Err(format!("invalid anyoneWithLink flag `{other}`")),
    };
    let mut row = SnapshotRow::new(fields[0].clone(), fields[1].clone(), kind);
    row.public_link = public_link;
    row.readers = split_emails(&fields[4]);
    row.commenters = split_emails(&fields[5]);
    row.editors = split_emails(&fields[6]);
    Ok(row)
}

fn split_emails(field: &str) -> BTreeSet<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase())
        .collect()
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Split the input into records, honoring quoted fields (including embedded
/// separators, doubled quotes and newlines). Returns each record with the
/// line number it started on.
fn split_records(input: &str) -> Result<Vec<(usize, Vec<String>)>, ExportError> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut started = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push('\n');
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                started = true;
            }
            ',' => {
                fields.push(std::mem::take(&mut field));
                started = true;
            }
            '\r' => {}
            '\n' => {
                line += 1;
                if started || !fields.is_empty() || !field.is_empty() {
                    fields.push(std::mem::take(&mut field));
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                started = false;
                record_line = line;
            }
            _ => {
                field.push(c);
                started = true;
            }
        }
    }
    if in_quotes {
        return Err(ExportError::Parse {
            line: record_line,
            reason: "unterminated quoted field".into(),
        });
    }
    if started || !fields.is_empty() || !field.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}
