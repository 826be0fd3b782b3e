//! Tracker facade
//!
//! Owns the store, opens one transaction per operation and supplies the
//! wall-clock time. This is the surface the API server calls.

use crate::config::DatabaseConfig;
use crate::engine::{self, BulkStatusResult};
use crate::import::{self, ImportOptions, ImportSummary};
use crate::issue::{Comment, Issue, IssueDetail, IssueUpdate, NewComment, NewIssue, Status, User};
use crate::labels::{self, IssueLabels};
use crate::reports::{self, AssigneeTotal, ResolutionLatency};
use crate::store::Store;
use crate::timeline::{self, Timeline};
use crate::Result;
use chrono::Utc;
use std::io::Read;

pub struct Tracker {
    store: Store,
}

impl Tracker {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Open the database described by `config`
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(Store::open(&config.path, config.busy_timeout())?))
    }

    /// Tracker over a fresh in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Store::open_in_memory()?))
    }

    pub fn create_user(&mut self, name: &str) -> Result<User> {
        self.store
            .write("create_user", |tx| engine::create_user(tx, name))
    }

    pub fn list_users(&mut self) -> Result<Vec<User>> {
        self.store.read(|tx| tx.list_users())
    }

    pub fn create_issue(&mut self, new: &NewIssue) -> Result<Issue> {
        self.store
            .write("create_issue", |tx| engine::create_issue(tx, new, Utc::now()))
    }

    /// List issues, optionally only those with `status`. A blank filter
    /// lists everything.
    pub fn list_issues(&mut self, status: Option<&str>) -> Result<Vec<Issue>> {
        let status: Option<Status> = status
            .filter(|s| !s.trim().is_empty())
            .map(str::parse)
            .transpose()?;
        self.store.read(|tx| tx.list_issues(status.as_ref()))
    }

    pub fn get_issue(&mut self, id: i64) -> Result<IssueDetail> {
        self.store.read(|tx| {
            let issue = tx.require_issue(id)?;
            let comments = tx.comments_for(id)?;
            let labels = tx.labels_for(id)?;
            Ok(IssueDetail {
                issue,
                comments: comments.into_iter().map(Into::into).collect(),
                labels: labels.into_iter().map(|l| l.name).collect(),
            })
        })
    }

    pub fn update_issue(&mut self, id: i64, update: &IssueUpdate) -> Result<Issue> {
        self.store
            .write("update_issue", |tx| engine::update_issue(tx, id, update, Utc::now()))
    }

    pub fn bulk_update_status(
        &mut self,
        issue_ids: &[i64],
        status: &str,
    ) -> Result<BulkStatusResult> {
        self.store.write("bulk_update_status", |tx| {
            engine::bulk_update_status(tx, issue_ids, status, Utc::now())
        })
    }

    pub fn replace_labels(&mut self, issue_id: i64, names: &[String]) -> Result<IssueLabels> {
        self.store
            .write("replace_labels", |tx| labels::replace_labels(tx, issue_id, names))
    }

    pub fn add_comment(&mut self, issue_id: i64, new: &NewComment) -> Result<Comment> {
        self.store
            .write("add_comment", |tx| engine::add_comment(tx, issue_id, new, Utc::now()))
    }

    pub fn timeline(&mut self, issue_id: i64) -> Result<Timeline> {
        self.store.read(|tx| timeline::issue_timeline(tx, issue_id))
    }

    pub fn import_csv<R: Read>(&mut self, input: R) -> Result<ImportSummary> {
        import::import_csv(&mut self.store, input, &ImportOptions::default())
    }

    pub fn top_assignees(&mut self) -> Result<Vec<AssigneeTotal>> {
        self.store.read(|tx| reports::top_assignees(tx))
    }

    pub fn resolution_latency(&mut self) -> Result<ResolutionLatency> {
        self.store.read(|tx| reports::resolution_latency(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_detail_includes_comments_and_labels() {
        let mut tracker = Tracker::in_memory().unwrap();
        let alice = tracker.create_user("alice").unwrap();
        let issue = tracker
            .create_issue(&NewIssue {
                title: "Fix bug".into(),
                assignee_id: Some(alice.id),
            })
            .unwrap();
        tracker
            .add_comment(
                issue.id,
                &NewComment {
                    body: "repro attached".into(),
                    author_id: alice.id,
                },
            )
            .unwrap();
        tracker
            .replace_labels(issue.id, &["bug".to_string(), "ui".to_string()])
            .unwrap();

        let detail = tracker.get_issue(issue.id).unwrap();
        assert_eq!(detail.issue, issue);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].body, "repro attached");
        assert_eq!(detail.labels, vec!["bug", "ui"]);

        let timeline = tracker.timeline(issue.id).unwrap();
        assert_eq!(timeline.timeline.len(), 3);
    }

    #[test]
    fn test_list_issues_filters_by_status() {
        let mut tracker = Tracker::in_memory().unwrap();
        for title in ["A", "B", "C"] {
            tracker
                .create_issue(&NewIssue {
                    title: title.into(),
                    assignee_id: None,
                })
                .unwrap();
        }
        tracker.bulk_update_status(&[2], "closed").unwrap();

        let closed = tracker.list_issues(Some("closed")).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, 2);
        assert_eq!(tracker.list_issues(Some("open")).unwrap().len(), 2);
        assert_eq!(tracker.list_issues(Some("")).unwrap().len(), 3);
        assert_eq!(tracker.list_issues(None).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_issue_reads_are_not_found() {
        let mut tracker = Tracker::in_memory().unwrap();
        assert!(matches!(
            tracker.get_issue(1),
            Err(crate::Error::NotFound(_))
        ));
        assert!(matches!(
            tracker.timeline(1),
            Err(crate::Error::NotFound(_))
        ));
    }
}
