//! SQLite schema for the itrack database.

use rusqlite::Connection;

/// The complete SQL schema. Safe to apply to an existing database.
pub const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK(length(trim(name)) > 0)
    );

    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL CHECK(length(trim(title)) > 0),
        status TEXT NOT NULL DEFAULT 'open',
        assignee_id INTEGER REFERENCES users(id),
        version INTEGER NOT NULL DEFAULT 1 CHECK(version >= 1),
        created_at TEXT NOT NULL,
        resolved_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
    CREATE INDEX IF NOT EXISTS idx_issues_assignee ON issues(assignee_id);

    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id INTEGER NOT NULL REFERENCES issues(id),
        author_id INTEGER NOT NULL REFERENCES users(id),
        body TEXT NOT NULL CHECK(length(trim(body)) > 0),
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id);

    CREATE TABLE IF NOT EXISTS labels (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    -- Set semantics: one row per (issue, label); position keeps attachment order
    CREATE TABLE IF NOT EXISTS issue_labels (
        issue_id INTEGER NOT NULL REFERENCES issues(id),
        label_id INTEGER NOT NULL REFERENCES labels(id),
        position INTEGER NOT NULL,
        PRIMARY KEY (issue_id, label_id)
    );
";

/// Enable foreign keys and create all tables.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.execute_batch(SCHEMA_SQL)
}
