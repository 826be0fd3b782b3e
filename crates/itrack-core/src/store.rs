//! SQLite store for itrack
//!
//! Every operation runs against an explicit [`Tx`] handle obtained from
//! [`Store::write`] or [`Store::read`]. The transaction commits when the
//! closure returns `Ok` and rolls back on `Err` or unwind.

use crate::issue::{Comment, Issue, Label, Status, User};
use crate::schema::apply_schema;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

const ISSUE_COLUMNS: &str = "id, title, status, assignee_id, version, created_at, resolved_at";
const COMMENT_COLUMNS: &str = "id, issue_id, author_id, body, created_at";

/// SQLite-backed store owning a single connection
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened store");
        Ok(Self { conn })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Run `f` inside an IMMEDIATE transaction.
    ///
    /// The write lock is taken up front, so the closure sees no interleaved
    /// writer. Any `Err` from `f` rolls everything back before it is returned.
    pub fn write<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Tx<'_>) -> Result<R>,
    {
        let tx = Tx {
            inner: self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?,
        };
        Self::finish(op, tx, f)
    }

    /// Run `f` against a read snapshot. Nothing `f` does is committed.
    pub fn read<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&Tx<'_>) -> Result<R>,
    {
        let tx = Tx {
            inner: self.conn.transaction()?,
        };
        let result = f(&tx);
        if let Err(e) = tx.inner.rollback() {
            tracing::error!(error = %e, "read rollback failed");
        }
        result
    }

    fn finish<F, R>(op: &str, tx: Tx<'_>, f: F) -> Result<R>
    where
        F: FnOnce(&Tx<'_>) -> Result<R>,
    {
        match f(&tx) {
            Ok(value) => {
                tx.inner.commit()?;
                tracing::debug!(op, "committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.inner.rollback() {
                    tracing::error!(op, error = %rollback_err, "rollback failed");
                }
                tracing::debug!(op, error = %e, "rolled back");
                Err(e)
            }
        }
    }
}

/// Transaction handle: the repository surface the engine works against
pub struct Tx<'conn> {
    inner: Transaction<'conn>,
}

impl Tx<'_> {
    // Users

    pub fn insert_user(&self, name: &str) -> Result<User> {
        self.inner
            .execute("INSERT INTO users (name) VALUES (?1)", params![name])?;
        Ok(User {
            id: self.inner.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.inner.prepare("SELECT id, name FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        let found = self
            .inner
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    // Issues

    /// Insert a new issue at version 1
    pub fn insert_issue(
        &self,
        title: &str,
        status: &Status,
        assignee_id: Option<i64>,
        created_at: DateTime<Utc>,
        resolved_at: Option<DateTime<Utc>>,
    ) -> Result<Issue> {
        self.inner.execute(
            "INSERT INTO issues (title, status, assignee_id, version, created_at, resolved_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
            params![title, status.as_str(), assignee_id, created_at, resolved_at],
        )?;
        Ok(Issue {
            id: self.inner.last_insert_rowid(),
            title: title.to_string(),
            status: status.clone(),
            assignee_id,
            version: 1,
            created_at,
            resolved_at,
        })
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<Issue>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1");
        let issue = self
            .inner
            .query_row(&sql, params![id], issue_from_row)
            .optional()?;
        Ok(issue)
    }

    /// Fetch an issue or fail with `NotFound`
    pub fn require_issue(&self, id: i64) -> Result<Issue> {
        self.get_issue(id)?.ok_or_else(|| Error::issue_not_found(id))
    }

    pub fn list_issues(&self, status: Option<&Status>) -> Result<Vec<Issue>> {
        let sql = format!(
            "SELECT {ISSUE_COLUMNS} FROM issues WHERE (?1 IS NULL OR status = ?1) ORDER BY id"
        );
        let mut stmt = self.inner.prepare(&sql)?;
        let issues = stmt
            .query_map(params![status.map(Status::as_str)], issue_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(issues)
    }

    /// Compare-and-swap write of `issue`.
    ///
    /// Succeeds only while the stored version still equals `expected_version`;
    /// the stored version becomes `issue.version`. Returns whether a row
    /// was written.
    pub fn swap_issue(&self, issue: &Issue, expected_version: i64) -> Result<bool> {
        let changed = self.inner.execute(
            "UPDATE issues
             SET title = ?1, status = ?2, assignee_id = ?3, resolved_at = ?4, version = ?5
             WHERE id = ?6 AND version = ?7",
            params![
                issue.title,
                issue.status.as_str(),
                issue.assignee_id,
                issue.resolved_at,
                issue.version,
                issue.id,
                expected_version
            ],
        )?;
        Ok(changed == 1)
    }

    // Comments

    pub fn insert_comment(
        &self,
        issue_id: i64,
        author_id: i64,
        body: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Comment> {
        self.inner.execute(
            "INSERT INTO comments (issue_id, author_id, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![issue_id, author_id, body, created_at],
        )?;
        Ok(Comment {
            id: self.inner.last_insert_rowid(),
            issue_id,
            author_id,
            body: body.to_string(),
            created_at,
        })
    }

    /// Comments of an issue in insertion order
    pub fn comments_for(&self, issue_id: i64) -> Result<Vec<Comment>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE issue_id = ?1 ORDER BY id");
        let mut stmt = self.inner.prepare(&sql)?;
        let comments = stmt
            .query_map(params![issue_id], |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    issue_id: row.get(1)?,
                    author_id: row.get(2)?,
                    body: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(comments)
    }

    // Labels

    pub fn find_label(&self, name: &str) -> Result<Option<Label>> {
        let label = self
            .inner
            .query_row(
                "SELECT id, name FROM labels WHERE name = ?1",
                params![name],
                label_from_row,
            )
            .optional()?;
        Ok(label)
    }

    pub fn insert_label(&self, name: &str) -> Result<Label> {
        self.inner
            .execute("INSERT INTO labels (name) VALUES (?1)", params![name])?;
        Ok(Label {
            id: self.inner.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn count_labels(&self) -> Result<i64> {
        Ok(self
            .inner
            .query_row("SELECT COUNT(*) FROM labels", [], |row| row.get(0))?)
    }

    /// Labels attached to an issue, in attachment order
    pub fn labels_for(&self, issue_id: i64) -> Result<Vec<Label>> {
        let mut stmt = self.inner.prepare(
            "SELECT l.id, l.name FROM issue_labels il
             JOIN labels l ON l.id = il.label_id
             WHERE il.issue_id = ?1
             ORDER BY il.position",
        )?;
        let labels = stmt
            .query_map(params![issue_id], label_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(labels)
    }

    /// Attach a label, or move an existing attachment to `position`
    pub fn attach_label(&self, issue_id: i64, label_id: i64, position: usize) -> Result<()> {
        let position = i64::try_from(position)
            .map_err(|_| Error::Validation(format!("label position {position} out of range")))?;
        self.inner.execute(
            "INSERT INTO issue_labels (issue_id, label_id, position) VALUES (?1, ?2, ?3)
             ON CONFLICT(issue_id, label_id) DO UPDATE SET position = excluded.position",
            params![issue_id, label_id, position],
        )?;
        Ok(())
    }

    pub fn detach_label(&self, issue_id: i64, label_id: i64) -> Result<()> {
        self.inner.execute(
            "DELETE FROM issue_labels WHERE issue_id = ?1 AND label_id = ?2",
            params![issue_id, label_id],
        )?;
        Ok(())
    }

    // Report projections

    /// Issue counts grouped by assignee, largest first
    pub fn assignee_totals(&self) -> Result<Vec<(Option<i64>, i64)>> {
        let mut stmt = self.inner.prepare(
            "SELECT assignee_id, COUNT(id) AS total FROM issues
             GROUP BY assignee_id
             ORDER BY total DESC, assignee_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// `(created_at, resolved_at)` for every resolved issue
    pub fn resolution_spans(&self) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
        let mut stmt = self.inner.prepare(
            "SELECT created_at, resolved_at FROM issues WHERE resolved_at IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    let status: String = row.get(2)?;
    Ok(Issue {
        id: row.get(0)?,
        title: row.get(1)?,
        status: status_from_column(status),
        assignee_id: row.get(3)?,
        version: row.get(4)?,
        created_at: row.get(5)?,
        resolved_at: row.get(6)?,
    })
}

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn status_from_column(s: String) -> Status {
    match s.as_str() {
        "open" => Status::Open,
        "closed" => Status::Closed,
        _ => Status::Other(s),
    }
}
