//! Record Normalizer: raw cells to typed task records
//!
//! Normalization never fails a batch. Rows without a title are dropped with a
//! warning; an unparseable date clears the field and warns instead of
//! erroring, because a task without a due date is still worth creating.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::ingest::ColumnMapping;

/// A normalized task row, ready for enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub title: String,
    pub description: String,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    /// Individual assignee names, split on commas, order preserved, deduped
    pub assignee_names: Vec<String>,
    /// The original joined assignee cell, kept for display
    pub assignee_display: Option<String>,
    pub bucket_name: Option<String>,
    pub status: Option<String>,
}

impl TaskRecord {
    pub fn has_assignees(&self) -> bool {
        !self.assignee_names.is_empty()
    }
}

fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

fn optional_cell(row: &[String], idx: Option<usize>) -> Option<String> {
    let value = cell(row, idx?).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a human-entered date leniently.
///
/// Accepts ISO 8601 (with or without time/offset), `MM/DD/YYYY`, and common
/// month-name forms. Date-only values become midnight UTC.
pub fn parse_flexible_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%m/%d/%Y %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%m/%d/%Y",
        "%m/%d/%y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%B %d %Y",
        "%b %d %Y",
        "%d %B %Y",
        "%d %b %Y",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            let naive = date.and_hms_opt(0, 0, 0)?;
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

fn parse_date_field(
    row: &[String],
    idx: Option<usize>,
    field: &str,
    row_number: usize,
    warnings: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let raw = optional_cell(row, idx)?;
    match parse_flexible_date(&raw) {
        Some(dt) => Some(dt),
        None => {
            warnings.push(format!(
                "Row {}: could not parse {} '{}' - field left empty",
                row_number, field, raw
            ));
            None
        }
    }
}

/// Split a joined assignee cell into trimmed, non-empty, deduplicated names
fn split_assignees(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for segment in raw.split(',') {
        let name = segment.trim();
        if name.is_empty() {
            continue;
        }
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Normalize one raw row. Returns `None` (with a warning) for rows whose
/// title is empty after trimming; those never reach enrichment.
pub fn normalize_row(
    row: &[String],
    mapping: &ColumnMapping,
    row_number: usize,
) -> (Option<TaskRecord>, Vec<String>) {
    let mut warnings = Vec::new();

    let title = cell(row, mapping.title).trim().to_string();
    if title.is_empty() {
        warnings.push(format!("Row {}: skipped - missing title", row_number));
        return (None, warnings);
    }

    let description = optional_cell(row, mapping.description).unwrap_or_default();
    let start_date = parse_date_field(row, mapping.start_date, "start date", row_number, &mut warnings);
    let due_date = parse_date_field(row, mapping.due_date, "due date", row_number, &mut warnings);

    let assignee_display = optional_cell(row, mapping.assignees);
    let assignee_names = assignee_display
        .as_deref()
        .map(split_assignees)
        .unwrap_or_default();

    let record = TaskRecord {
        title,
        description,
        start_date,
        due_date,
        assignee_names,
        assignee_display,
        bucket_name: optional_cell(row, mapping.bucket),
        status: optional_cell(row, mapping.status),
    };
    (Some(record), warnings)
}

/// Normalize a whole sheet, preserving input row order
pub fn normalize_rows(
    rows: &[Vec<String>],
    mapping: &ColumnMapping,
) -> (Vec<TaskRecord>, Vec<String>) {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        // Row numbers are 1-based and account for the header row
        let (record, row_warnings) = normalize_row(row, mapping, i + 2);
        warnings.extend(row_warnings);
        if let Some(record) = record {
            records.push(record);
        }
    }
    (records, warnings)
}
