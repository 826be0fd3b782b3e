//! Label reconciliation
//!
//! [`plan_labels`] works on plain name sets and decides what to create,
//! attach and detach. [`replace_labels`] executes a plan inside a
//! transaction.

use crate::store::Tx;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Operations needed to move an issue's labels to a target set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPlan {
    /// Names with no Label row yet
    pub create: Vec<String>,
    /// Names not currently attached to the issue
    pub attach: Vec<String>,
    /// Currently attached names absent from the target
    pub detach: Vec<String>,
    /// Final label set in attachment order
    pub labels: Vec<String>,
}

impl LabelPlan {
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.attach.is_empty() && self.detach.is_empty()
    }
}

/// Final label set of an issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueLabels {
    pub issue_id: i64,
    pub labels: Vec<String>,
}

/// Plan the move from `current` attachments to `target`.
///
/// `known` holds every target name that already exists as a Label row.
/// Duplicates in `target` collapse onto their first occurrence.
pub fn plan_labels(current: &[String], known: &HashSet<String>, target: &[String]) -> LabelPlan {
    let mut seen = HashSet::new();
    let labels: Vec<String> = target
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect();

    let attached: HashSet<&str> = current.iter().map(String::as_str).collect();
    let wanted: HashSet<&str> = labels.iter().map(String::as_str).collect();

    LabelPlan {
        create: labels
            .iter()
            .filter(|name| !known.contains(*name))
            .cloned()
            .collect(),
        attach: labels
            .iter()
            .filter(|name| !attached.contains(name.as_str()))
            .cloned()
            .collect(),
        detach: current
            .iter()
            .filter(|name| !wanted.contains(name.as_str()))
            .cloned()
            .collect(),
        labels,
    }
}

/// Replace the issue's labels with `names`, creating missing labels.
///
/// Label rows are never deleted; detaching only removes the association.
pub fn replace_labels(tx: &Tx<'_>, issue_id: i64, names: &[String]) -> Result<IssueLabels> {
    tx.require_issue(issue_id)?;
    if names.iter().any(|n| n.trim().is_empty()) {
        return Err(Error::Validation("label names must not be blank".into()));
    }

    apply(tx, issue_id, names).map_err(|e| match e {
        Error::Database(cause) => Error::Reconciliation(cause.to_string()),
        other => other,
    })
}

fn apply(tx: &Tx<'_>, issue_id: i64, names: &[String]) -> Result<IssueLabels> {
    let current = tx.labels_for(issue_id)?;
    let current_names: Vec<String> = current.iter().map(|l| l.name.clone()).collect();

    let mut ids: HashMap<String, i64> = current.into_iter().map(|l| (l.name, l.id)).collect();
    for name in names {
        if !ids.contains_key(name)
            && let Some(label) = tx.find_label(name)?
        {
            ids.insert(label.name, label.id);
        }
    }
    let known: HashSet<String> = ids.keys().cloned().collect();

    let plan = plan_labels(&current_names, &known, names);
    tracing::debug!(
        issue_id,
        create = plan.create.len(),
        attach = plan.attach.len(),
        detach = plan.detach.len(),
        "label plan"
    );

    for name in &plan.create {
        let label = tx.insert_label(name)?;
        ids.insert(label.name, label.id);
    }
    for name in &plan.detach {
        if let Some(id) = ids.get(name) {
            tx.detach_label(issue_id, *id)?;
        }
    }
    for (position, name) in plan.labels.iter().enumerate() {
        let id = ids
            .get(name)
            .ok_or_else(|| Error::Reconciliation(format!("label '{name}' has no id")))?;
        tx.attach_label(issue_id, *id, position)?;
    }

    tracing::info!(issue_id, labels = ?plan.labels, "labels replaced");
    Ok(IssueLabels {
        issue_id,
        labels: plan.labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::create_issue;
    use crate::issue::NewIssue;
    use crate::store::Store;
    use chrono::Utc;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn store_with_issue() -> Store {
        let mut store = Store::open_in_memory().unwrap();
        store
            .write("seed", |tx| {
                let new = NewIssue {
                    title: "A".into(),
                    assignee_id: None,
                };
                create_issue(tx, &new, Utc::now())
            })
            .unwrap();
        store
    }

    #[test]
    fn test_plan_from_empty() {
        let plan = plan_labels(&[], &HashSet::new(), &names(&["bug", "urgent", "bug"]));
        assert_eq!(plan.labels, names(&["bug", "urgent"]));
        assert_eq!(plan.create, names(&["bug", "urgent"]));
        assert_eq!(plan.attach, names(&["bug", "urgent"]));
        assert!(plan.detach.is_empty());
    }

    #[test]
    fn test_plan_reuses_known_labels() {
        let known: HashSet<String> = names(&["bug", "ui"]).into_iter().collect();
        let plan = plan_labels(&names(&["ui"]), &known, &names(&["bug", "docs"]));
        assert_eq!(plan.create, names(&["docs"]));
        assert_eq!(plan.attach, names(&["bug", "docs"]));
        assert_eq!(plan.detach, names(&["ui"]));
    }

    #[test]
    fn test_plan_same_set_is_noop() {
        let current = names(&["bug", "ui"]);
        let known: HashSet<String> = current.iter().cloned().collect();
        let plan = plan_labels(&current, &known, &names(&["ui", "bug"]));
        assert!(plan.is_noop());
        assert_eq!(plan.labels, names(&["ui", "bug"]));
    }

    #[test]
    fn test_replace_then_narrow_keeps_label_rows() {
        let mut store = store_with_issue();

        let first = store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["bug", "urgent"])))
            .unwrap();
        assert_eq!(first.labels, names(&["bug", "urgent"]));

        let second = store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["bug"])))
            .unwrap();
        assert_eq!(second.labels, names(&["bug"]));

        store
            .read(|tx| {
                let attached: Vec<_> = tx.labels_for(1)?.into_iter().map(|l| l.name).collect();
                assert_eq!(attached, names(&["bug"]));
                assert!(tx.find_label("urgent")?.is_some());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_replace_is_idempotent() {
        let mut store = store_with_issue();
        let target = names(&["bug", "ui"]);

        let first = store
            .write("labels", |tx| replace_labels(tx, 1, &target))
            .unwrap();
        let labels_after_first = store.read(|tx| tx.count_labels()).unwrap();
        let second = store
            .write("labels", |tx| replace_labels(tx, 1, &target))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(store.read(|tx| tx.count_labels()).unwrap(), labels_after_first);
        assert_eq!(labels_after_first, 2);
    }

    #[test]
    fn test_labels_are_shared_between_issues() {
        let mut store = store_with_issue();
        store
            .write("seed", |tx| {
                let new = NewIssue {
                    title: "B".into(),
                    assignee_id: None,
                };
                create_issue(tx, &new, Utc::now())
            })
            .unwrap();

        store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["bug"])))
            .unwrap();
        store
            .write("labels", |tx| replace_labels(tx, 2, &names(&["bug", "ui"])))
            .unwrap();

        assert_eq!(store.read(|tx| tx.count_labels()).unwrap(), 2);
    }

    #[test]
    fn test_reordering_updates_attachment_order() {
        let mut store = store_with_issue();
        store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["a", "b", "c"])))
            .unwrap();
        store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["c", "a"])))
            .unwrap();

        let attached: Vec<_> = store
            .read(|tx| tx.labels_for(1))
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(attached, names(&["c", "a"]));
    }

    #[test]
    fn test_replace_missing_issue() {
        let mut store = Store::open_in_memory().unwrap();
        let err = store
            .write("labels", |tx| replace_labels(tx, 3, &names(&["bug"])))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.read(|tx| tx.count_labels()).unwrap(), 0);
    }

    #[test]
    fn test_blank_name_rolls_back_everything() {
        let mut store = store_with_issue();
        store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["keep"])))
            .unwrap();

        let err = store
            .write("labels", |tx| replace_labels(tx, 1, &names(&["new", " "])))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let attached: Vec<_> = store
            .read(|tx| tx.labels_for(1))
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(attached, names(&["keep"]));
        assert!(store.read(|tx| tx.find_label("new")).unwrap().is_none());
    }

    fn label_names() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-d]{1,2}", 0..8)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn replace_is_idempotent_for_any_names(before in label_names(), target in label_names()) {
            let mut store = store_with_issue();
            store
                .write("labels", |tx| replace_labels(tx, 1, &before))
                .unwrap();

            let first = store
                .write("labels", |tx| replace_labels(tx, 1, &target))
                .unwrap();
            let count_after_first = store.read(|tx| tx.count_labels()).unwrap();
            let second = store
                .write("labels", |tx| replace_labels(tx, 1, &target))
                .unwrap();

            let mut seen = HashSet::new();
            let expected: Vec<String> = target
                .iter()
                .filter(|name| seen.insert(name.as_str()))
                .cloned()
                .collect();
            prop_assert_eq!(&first.labels, &expected);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(store.read(|tx| tx.count_labels()).unwrap(), count_after_first);

            let attached: Vec<String> = store
                .read(|tx| tx.labels_for(1))
                .unwrap()
                .into_iter()
                .map(|l| l.name)
                .collect();
            prop_assert_eq!(attached, expected);
        }
    }
}
