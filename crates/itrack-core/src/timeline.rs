//! Issue timeline
//!
//! A read-only projection merging issue, comment and label events into one
//! chronological list. Label changes are not audited, so the label snapshot is
//! dated at the issue's creation time.

use crate::issue::{Comment, Issue, Label, Status};
use crate::store::Tx;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened, with event-specific details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "details", rename_all = "snake_case")]
pub enum TimelineEntry {
    IssueCreated {
        title: String,
        assignee_id: Option<i64>,
    },
    IssueClosed {
        status: Status,
    },
    CommentAdded {
        comment_id: i64,
        author_id: i64,
        body: String,
    },
    LabelsUpdated {
        labels: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: TimelineEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub issue_id: i64,
    pub timeline: Vec<TimelineEvent>,
}

/// Assemble events in ascending timestamp order.
///
/// The sort is stable, so events sharing a timestamp keep the order
/// created, closed, comments, labels.
pub fn build_timeline(issue: &Issue, comments: &[Comment], labels: &[Label]) -> Timeline {
    let mut events = Vec::with_capacity(comments.len() + 3);

    events.push(TimelineEvent {
        timestamp: issue.created_at,
        entry: TimelineEntry::IssueCreated {
            title: issue.title.clone(),
            assignee_id: issue.assignee_id,
        },
    });

    if let Some(resolved_at) = issue.resolved_at {
        events.push(TimelineEvent {
            timestamp: resolved_at,
            entry: TimelineEntry::IssueClosed {
                status: issue.status.clone(),
            },
        });
    }

    events.extend(comments.iter().map(|c| TimelineEvent {
        timestamp: c.created_at,
        entry: TimelineEntry::CommentAdded {
            comment_id: c.id,
            author_id: c.author_id,
            body: c.body.clone(),
        },
    }));

    if !labels.is_empty() {
        events.push(TimelineEvent {
            timestamp: issue.created_at,
            entry: TimelineEntry::LabelsUpdated {
                labels: labels.iter().map(|l| l.name.clone()).collect(),
            },
        });
    }

    events.sort_by_key(|e| e.timestamp);
    Timeline {
        issue_id: issue.id,
        timeline: events,
    }
}

/// Load an issue with its comments and labels and project its timeline
pub fn issue_timeline(tx: &Tx<'_>, issue_id: i64) -> Result<Timeline> {
    let issue = tx.require_issue(issue_id)?;
    let comments = tx.comments_for(issue_id)?;
    let labels = tx.labels_for(issue_id)?;
    Ok(build_timeline(&issue, &comments, &labels))
}
