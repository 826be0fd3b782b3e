//! Data model for itrack
//!
//! Users, issues, comments and labels as they are stored and served.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue status
///
/// Free-form text on the wire. `open` and `closed` drive the lifecycle rules,
/// anything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Status {
    #[default]
    Open,
    Closed,
    Other(String),
}

impl Status {
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Closed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Open => "open",
            Status::Closed => "closed",
            Status::Other(s) => s,
        }
    }
}

impl std::str::FromStr for Status {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(crate::Error::Validation("status must not be blank".into())),
            "open" => Ok(Status::Open),
            "closed" => Ok(Status::Closed),
            other => Ok(Status::Other(other.to_string())),
        }
    }
}

impl TryFrom<String> for Status {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person who can be assigned issues and author comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// Core issue structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: i64,

    pub title: String,

    pub status: Status,

    pub assignee_id: Option<i64>,

    /// Optimistic-lock counter, starts at 1 and grows by one per accepted mutation
    pub version: i64,

    pub created_at: DateTime<Utc>,

    /// Set when the issue moves into `closed`, never cleared
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Apply a status change, stamping `resolved_at` on a transition into `closed`
    pub fn transition(&mut self, status: Status, now: DateTime<Utc>) {
        if status.is_closed() && !self.status.is_closed() {
            self.resolved_at = Some(now);
        }
        self.status = status;
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} [v{}] [{}] {}",
            self.id, self.version, self.status, self.title
        )
    }
}

/// Comment attached to an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: i64,
    pub author_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Label shared across issues, unique by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub name: String,
}

/// Comment as embedded in [`IssueDetail`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentSummary {
    pub id: i64,
    pub body: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentSummary {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            body: c.body,
            author_id: c.author_id,
            created_at: c.created_at,
        }
    }
}

/// Issue with its comments and label names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDetail {
    #[serde(flatten)]
    pub issue: Issue,
    pub comments: Vec<CommentSummary>,
    pub labels: Vec<String>,
}

/// Input for creating an issue
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub assignee_id: Option<i64>,
}

/// Input for commenting on an issue
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub body: String,
    pub author_id: i64,
}

/// Partial update guarded by the caller's last-read version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(status: Status) -> Issue {
        Issue {
            id: 1,
            title: "Fix bug".into(),
            status,
            assignee_id: None,
            version: 1,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("open".parse::<Status>().unwrap(), Status::Open);
        assert_eq!(" closed ".parse::<Status>().unwrap(), Status::Closed);
        assert_eq!(
            "in_review".parse::<Status>().unwrap(),
            Status::Other("in_review".into())
        );
        assert!("   ".parse::<Status>().is_err());
    }

    #[test]
    fn test_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&Status::Other("triage".into())).unwrap();
        assert_eq!(json, "\"triage\"");
        let back: Status = serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(back, Status::Closed);
    }

    #[test]
    fn test_transition_into_closed_stamps_resolved_at() {
        let mut i = issue(Status::Open);
        let now = Utc::now();
        i.transition(Status::Closed, now);
        assert_eq!(i.resolved_at, Some(now));
    }

    #[test]
    fn test_closed_to_closed_keeps_resolved_at() {
        let first = Utc::now();
        let mut i = issue(Status::Closed);
        i.resolved_at = Some(first);
        i.transition(Status::Closed, first + chrono::Duration::hours(1));
        assert_eq!(i.resolved_at, Some(first));
    }

    #[test]
    fn test_reopen_keeps_resolved_at() {
        let first = Utc::now();
        let mut i = issue(Status::Closed);
        i.resolved_at = Some(first);
        i.transition(Status::Open, first);
        assert_eq!(i.status, Status::Open);
        assert_eq!(i.resolved_at, Some(first));
    }

    #[test]
    fn test_detail_flattens_issue_fields() {
        let detail = IssueDetail {
            issue: issue(Status::Open),
            comments: vec![],
            labels: vec!["bug".into()],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["status"], "open");
        assert_eq!(value["labels"][0], "bug");
    }
}
