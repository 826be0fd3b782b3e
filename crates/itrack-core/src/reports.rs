//! Read-only report projections

use crate::store::Tx;
use crate::Result;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssigneeTotal {
    pub assignee_id: Option<i64>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionLatency {
    pub resolved_issues: usize,
    pub average_resolution_seconds: Option<i64>,
}

/// Issue counts per assignee; unassigned issues are grouped under `None`
pub fn top_assignees(tx: &Tx<'_>) -> Result<Vec<AssigneeTotal>> {
    Ok(tx
        .assignee_totals()?
        .into_iter()
        .map(|(assignee_id, total)| AssigneeTotal { assignee_id, total })
        .collect())
}

/// Mean time from creation to resolution over resolved issues
pub fn resolution_latency(tx: &Tx<'_>) -> Result<ResolutionLatency> {
    let spans = tx.resolution_spans()?;
    let total: i64 = spans
        .iter()
        .map(|(created, resolved)| (*resolved - *created).num_seconds())
        .sum();
    let average = i64::try_from(spans.len())
        .ok()
        .filter(|count| *count > 0)
        .map(|count| total / count);

    Ok(ResolutionLatency {
        resolved_issues: spans.len(),
        average_resolution_seconds: average,
    })
}
