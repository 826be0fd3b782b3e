//! itrack-core: Core library for the itrack issue tracker
//!
//! Provides the data model, SQLite storage, and the mutation, label,
//! import and timeline logic behind the REST API.

pub mod config;
pub mod engine;
pub mod error;
pub mod import;
pub mod issue;
pub mod labels;
pub mod reports;
pub mod schema;
pub mod store;
pub mod timeline;
pub mod tracker;

pub use config::Config;
pub use engine::BulkStatusResult;
pub use error::Error;
pub use import::{ImportOptions, ImportSummary, RowError};
pub use issue::{
    Comment, CommentSummary, Issue, IssueDetail, IssueUpdate, Label, NewComment, NewIssue, Status,
    User,
};
pub use labels::{IssueLabels, LabelPlan, plan_labels};
pub use reports::{AssigneeTotal, ResolutionLatency};
pub use store::{Store, Tx};
pub use timeline::{Timeline, TimelineEntry, TimelineEvent, build_timeline};
pub use tracker::Tracker;

/// Result type for itrack operations
pub type Result<T> = std::result::Result<T, Error>;
