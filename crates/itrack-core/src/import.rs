//! CSV issue import
//!
//! Each data row is its own unit of work with its own transaction. A bad row
//! is recorded in the summary and never stops the rows after it.

use crate::engine::create_with_status;
use crate::issue::Status;
use crate::store::Store;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

/// A failed row, numbered from 1 after the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error: String,
}

/// Aggregate outcome of an import. `total_rows == created + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    /// Set when the import stopped early on request
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    /// Set when reading the upload failed part way. The failing row is the
    /// last entry in `errors`; rows before it stay committed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
}

impl ImportSummary {
    fn record_failure(&mut self, row: usize, error: &Error) {
        tracing::warn!(row, error = %error, "import row rejected");
        self.failed += 1;
        self.errors.push(RowError {
            row,
            error: error.to_string(),
        });
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImportOptions<'a> {
    /// Checked between rows; once set, no further rows are read
    pub cancel: Option<&'a AtomicBool>,
}

impl ImportOptions<'_> {
    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy)]
struct Columns {
    title: Option<usize>,
    assignee_id: Option<usize>,
    status: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Self {
            title: find("title"),
            assignee_id: find("assignee_id"),
            status: find("status"),
        }
    }
}

/// One validated row, ready to create
#[derive(Debug, PartialEq, Eq)]
struct ImportRow {
    title: String,
    assignee_id: Option<i64>,
    status: Status,
}

fn cell<'r>(record: &'r csv::StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| record.get(i))
        .filter(|value| !value.is_empty())
}

fn parse_row(record: &csv::StringRecord, columns: &Columns) -> Result<ImportRow> {
    let title = cell(record, columns.title)
        .ok_or_else(|| Error::Validation("title is required".into()))?;

    let assignee_id = cell(record, columns.assignee_id)
        .map(|raw| {
            raw.parse::<i64>()
                .map_err(|_| Error::Validation(format!("invalid assignee_id '{raw}'")))
        })
        .transpose()?;

    let status = match cell(record, columns.status) {
        Some(raw) => raw.parse()?,
        None => Status::Open,
    };

    Ok(ImportRow {
        title: title.to_string(),
        assignee_id,
        status,
    })
}

/// Import issues from CSV text.
///
/// The header row names the columns: `title` is required per row,
/// `assignee_id` and `status` are optional (`status` defaults to `open`).
/// Only an unreadable header is an `Err`. An I/O failure after that stops
/// the import and is reported through [`ImportSummary::interrupted`].
pub fn import_csv<R: Read>(
    store: &mut Store,
    input: R,
    options: &ImportOptions<'_>,
) -> Result<ImportSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let columns = Columns::from_headers(reader.headers()?);
    if columns.title.is_none() {
        tracing::warn!("import has no title column, every row will be rejected");
    }

    let mut summary = ImportSummary::default();
    for (index, record) in reader.records().enumerate() {
        if options.cancelled() {
            tracing::info!(processed = summary.total_rows, "import cancelled");
            summary.cancelled = true;
            break;
        }

        let row = index + 1;
        summary.total_rows += 1;

        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => {
                summary.record_failure(row, &e.into());
                summary.interrupted = true;
                break;
            }
            Err(e) => {
                summary.record_failure(row, &e.into());
                continue;
            }
        };

        let outcome = parse_row(&record, &columns).and_then(|parsed| {
            store.write("import_row", |tx| {
                create_with_status(
                    tx,
                    &parsed.title,
                    parsed.assignee_id,
                    parsed.status,
                    Utc::now(),
                )
            })
        });
        match outcome {
            Ok(_) => summary.created += 1,
            Err(e) => summary.record_failure(row, &e),
        }
    }

    tracing::info!(
        total_rows = summary.total_rows,
        created = summary.created,
        failed = summary.failed,
        interrupted = summary.interrupted,
        "import finished"
    );
    Ok(summary)
}
