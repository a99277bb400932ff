//! Column-to-field mapping
//!
//! Maps spreadsheet headers onto task fields. Explicit header names from the
//! CLI win; anything unspecified is auto-detected from conventional header
//! names, case-insensitively.

use anyhow::{Result, bail};

/// Resolved column indices for one sheet. Only the title is mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub title: usize,
    pub description: Option<usize>,
    pub start_date: Option<usize>,
    pub due_date: Option<usize>,
    pub assignees: Option<usize>,
    pub bucket: Option<usize>,
    pub status: Option<usize>,
}

/// Header names supplied on the command line, overriding auto-detection
#[derive(Debug, Clone, Default)]
pub struct MappingOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<String>,
    pub due_date: Option<String>,
    pub assignees: Option<String>,
    pub bucket: Option<String>,
    pub status: Option<String>,
}

const TITLE_HEADERS: &[&str] = &["title", "task", "task name", "name", "subject"];
const DESCRIPTION_HEADERS: &[&str] = &["description", "notes", "details", "body"];
const START_DATE_HEADERS: &[&str] = &["start date", "start", "start_date", "startdate"];
const DUE_DATE_HEADERS: &[&str] = &["due date", "due", "due_date", "duedate", "deadline"];
const ASSIGNEE_HEADERS: &[&str] = &[
    "assignee",
    "assignees",
    "assigned to",
    "owner",
    "owners",
    "responsible",
];
const BUCKET_HEADERS: &[&str] = &["bucket", "column", "list", "section", "category"];
const STATUS_HEADERS: &[&str] = &["status", "state", "progress"];

/// Find the index of an exact (case-insensitive, trimmed) header
fn find_header(headers: &[String], wanted: &str) -> Option<usize> {
    let wanted = wanted.trim().to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == wanted)
}

/// First header matching any of the conventional candidate names
fn detect(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|c| find_header(headers, c))
}

/// Resolve one optional field: explicit override first, detection second.
/// An override naming a header that does not exist is an error; silent
/// fallback would import the wrong column.
fn resolve_field(
    headers: &[String],
    field: &str,
    explicit: &Option<String>,
    candidates: &[&str],
) -> Result<Option<usize>> {
    if let Some(name) = explicit {
        return match find_header(headers, name) {
            Some(idx) => Ok(Some(idx)),
            None => bail!(
                "Column '{}' (for {}) not found in sheet headers: {}",
                name,
                field,
                headers.join(", ")
            ),
        };
    }
    Ok(detect(headers, candidates))
}

impl ColumnMapping {
    /// Resolve a mapping from sheet headers plus CLI overrides
    pub fn resolve(headers: &[String], overrides: &MappingOverrides) -> Result<ColumnMapping> {
        let title = match resolve_field(headers, "title", &overrides.title, TITLE_HEADERS)? {
            Some(idx) => idx,
            None => bail!(
                "No title column found. Add a 'Title' header or pass --title-column. \
                 Headers present: {}",
                headers.join(", ")
            ),
        };

        Ok(ColumnMapping {
            title,
            description: resolve_field(
                headers,
                "description",
                &overrides.description,
                DESCRIPTION_HEADERS,
            )?,
            start_date: resolve_field(
                headers,
                "start date",
                &overrides.start_date,
                START_DATE_HEADERS,
            )?,
            due_date: resolve_field(headers, "due date", &overrides.due_date, DUE_DATE_HEADERS)?,
            assignees: resolve_field(
                headers,
                "assignees",
                &overrides.assignees,
                ASSIGNEE_HEADERS,
            )?,
            bucket: resolve_field(headers, "bucket", &overrides.bucket, BUCKET_HEADERS)?,
            status: resolve_field(headers, "status", &overrides.status, STATUS_HEADERS)?,
        })
    }
}
