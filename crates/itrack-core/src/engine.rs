//! Issue mutation engine
//!
//! Create, optimistic-locked update and bulk status transitions. Every
//! function takes the transaction it runs in; callers decide its scope.
//!
//! `resolved_at` follows one rule on every path: it is stamped when an issue
//! moves from any non-closed status into `closed`, and is never cleared.

use crate::issue::{Comment, Issue, IssueUpdate, NewComment, NewIssue, Status, User};
use crate::store::Tx;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Outcome of a bulk status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkStatusResult {
    pub updated_issues: Vec<i64>,
    pub new_status: Status,
}

/// Create an open issue at version 1
pub fn create_issue(tx: &Tx<'_>, new: &NewIssue, now: DateTime<Utc>) -> Result<Issue> {
    create_with_status(tx, &new.title, new.assignee_id, Status::Open, now)
}

/// Create an issue with an explicit initial status
///
/// Used by the import pipeline, where rows may arrive already closed.
pub fn create_with_status(
    tx: &Tx<'_>,
    title: &str,
    assignee_id: Option<i64>,
    status: Status,
    now: DateTime<Utc>,
) -> Result<Issue> {
    let title = require_text("title", title)?;
    if let Some(user_id) = assignee_id
        && !tx.user_exists(user_id)?
    {
        return Err(Error::user_not_found(user_id));
    }

    let resolved_at = status.is_closed().then_some(now);
    let issue = tx.insert_issue(title, &status, assignee_id, now, resolved_at)?;
    tracing::info!(issue_id = issue.id, status = %issue.status, "issue created");
    Ok(issue)
}

/// Apply a partial update if `update.version` matches the stored version
pub fn update_issue(
    tx: &Tx<'_>,
    id: i64,
    update: &IssueUpdate,
    now: DateTime<Utc>,
) -> Result<Issue> {
    let current = tx.require_issue(id)?;
    if current.version != update.version {
        tracing::warn!(
            issue_id = id,
            expected = update.version,
            actual = current.version,
            "stale update rejected"
        );
        return Err(Error::VersionConflict {
            id,
            expected: update.version,
            actual: current.version,
        });
    }

    let mut next = current.clone();
    if let Some(title) = &update.title {
        next.title = require_text("title", title)?.to_string();
    }
    if let Some(status) = &update.status {
        next.transition(status.parse()?, now);
    }
    next.version = current.version + 1;

    if !tx.swap_issue(&next, current.version)? {
        let actual = tx.require_issue(id)?.version;
        return Err(Error::VersionConflict {
            id,
            expected: update.version,
            actual,
        });
    }

    tracing::info!(issue_id = id, version = next.version, status = %next.status, "issue updated");
    Ok(next)
}

/// Move every issue in `issue_ids` to `new_status`, or none of them
pub fn bulk_update_status(
    tx: &Tx<'_>,
    issue_ids: &[i64],
    new_status: &str,
    now: DateTime<Utc>,
) -> Result<BulkStatusResult> {
    let status: Status = new_status.parse()?;
    if issue_ids.is_empty() {
        return Err(Error::Validation("issue_ids must not be empty".into()));
    }

    let mut seen = HashSet::new();
    let ids: Vec<i64> = issue_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let mut issues = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for id in &ids {
        match tx.get_issue(*id)? {
            Some(issue) => issues.push(issue),
            None => missing.push(id.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(Error::NotFound(format!("Issues {}", missing.join(", "))));
    }

    if status.is_closed()
        && let Some(closed) = issues.iter().find(|i| i.status.is_closed())
    {
        return Err(Error::InvalidTransition(format!(
            "issue {} is already closed",
            closed.id
        )));
    }

    for issue in &mut issues {
        let expected = issue.version;
        issue.transition(status.clone(), now);
        issue.version += 1;
        if !tx.swap_issue(issue, expected)? {
            let actual = tx.require_issue(issue.id)?.version;
            return Err(Error::VersionConflict {
                id: issue.id,
                expected,
                actual,
            });
        }
    }

    tracing::info!(count = ids.len(), status = %status, "bulk status update");
    Ok(BulkStatusResult {
        updated_issues: ids,
        new_status: status,
    })
}

/// Add a comment to an existing issue
pub fn add_comment(
    tx: &Tx<'_>,
    issue_id: i64,
    new: &NewComment,
    now: DateTime<Utc>,
) -> Result<Comment> {
    let body = require_text("comment body", &new.body)?;
    tx.require_issue(issue_id)?;
    if !tx.user_exists(new.author_id)? {
        return Err(Error::user_not_found(new.author_id));
    }
    let comment = tx.insert_comment(issue_id, new.author_id, body, now)?;
    tracing::info!(issue_id, comment_id = comment.id, "comment added");
    Ok(comment)
}

pub fn create_user(tx: &Tx<'_>, name: &str) -> Result<User> {
    let name = require_text("user name", name)?;
    let user = tx.insert_user(name)?;
    tracing::info!(user_id = user.id, "user created");
    Ok(user)
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed)
}
