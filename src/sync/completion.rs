use crate::error::SyncResult;
use crate::model::issue::{IssueSnapshot, StatusCategory};
use crate::providers::IssueSource;

/// Status names treated as done when the tracker reports no category.
const DONE_STATUS_NAMES: &[&str] = &["done", "closed", "resolved", "complete"];

pub fn is_done_status(snapshot: &IssueSnapshot) -> bool {
    match snapshot.status_category {
        Some(category) => category == StatusCategory::Done,
        None => snapshot
            .status_name
            .as_deref()
            .map(str::trim)
            .is_some_and(|name| DONE_STATUS_NAMES.iter().any(|d| name.eq_ignore_ascii_case(d))),
    }
}

/// True when `root` is done, or when it has sub-tasks and every one of them is done.
///
/// Sub-tasks are fetched through `source` in order; the first one that is not
/// done ends the evaluation. Fetch errors are returned to the caller.
pub async fn is_fully_done(root: &IssueSnapshot, source: &dyn IssueSource) -> SyncResult<bool> {
    if !root.has_subtasks() {
        return Ok(is_done_status(root));
    }
    for key in &root.subtasks {
        let child = source.fetch_issue(key).await?;
        if !is_done_status(&child) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::{issue, ScriptedIssues, Step};

    fn snap(name: Option<&str>, category: Option<StatusCategory>) -> IssueSnapshot {
        IssueSnapshot {
            key: "KT-1".into(),
            status_name: name.map(String::from),
            status_category: category,
            subtasks: vec![],
        }
    }

    #[test]
    fn done_category_wins() {
        assert!(is_done_status(&snap(Some("Shipped"), Some(StatusCategory::Done))));
        assert!(is_done_status(&snap(None, Some(StatusCategory::from_key("Done")))));
    }

    #[test]
    fn other_category_is_not_done_regardless_of_name() {
        assert!(!is_done_status(&snap(Some("Done"), Some(StatusCategory::InProgress))));
        assert!(!is_done_status(&snap(Some("Closed"), Some(StatusCategory::Todo))));
        assert!(!is_done_status(&snap(Some("Resolved"), Some(StatusCategory::Unknown))));
    }

    #[test]
    fn done_names_without_category() {
        for name in ["done", "CLOSED", "Resolved", "Complete"] {
            assert!(is_done_status(&snap(Some(name), None)), "{name} should be done");
        }
    }

    #[test]
    fn other_names_or_missing_fields_are_not_done() {
        assert!(!is_done_status(&snap(Some("In Review"), None)));
        assert!(!is_done_status(&snap(Some("Completed"), None)));
        assert!(!is_done_status(&snap(None, None)));
    }

    fn done(key: &str) -> Vec<Step> {
        vec![Step::Snap(issue(key, "Done", Some(StatusCategory::Done), &[]))]
    }

    fn open(key: &str) -> Vec<Step> {
        vec![Step::Snap(issue(key, "In Progress", Some(StatusCategory::InProgress), &[]))]
    }

    #[tokio::test]
    async fn no_subtasks_uses_root_status() {
        let source = ScriptedIssues::new();
        let root = issue("KT-1", "Done", Some(StatusCategory::Done), &[]);
        assert!(is_fully_done(&root, &source).await.unwrap());

        let root = issue("KT-1", "To Do", Some(StatusCategory::Todo), &[]);
        assert!(!is_fully_done(&root, &source).await.unwrap());
    }

    #[tokio::test]
    async fn all_subtasks_done() {
        let source = ScriptedIssues::new()
            .script("KT-2", done("KT-2"))
            .script("KT-3", done("KT-3"))
            .script("KT-4", done("KT-4"));
        let root = issue("KT-1", "In Progress", Some(StatusCategory::InProgress), &["KT-2", "KT-3", "KT-4"]);
        assert!(is_fully_done(&root, &source).await.unwrap());
    }

    #[tokio::test]
    async fn one_open_subtask_is_not_done() {
        let source = ScriptedIssues::new()
            .script("KT-2", done("KT-2"))
            .script("KT-3", open("KT-3"))
            .script("KT-4", done("KT-4"));
        let root = issue("KT-1", "Done", Some(StatusCategory::Done), &["KT-2", "KT-3", "KT-4"]);
        assert!(!is_fully_done(&root, &source).await.unwrap());
    }

    #[tokio::test]
    async fn stops_at_first_open_subtask() {
        let source = ScriptedIssues::new()
            .script("KT-2", open("KT-2"))
            .script("KT-3", vec![Step::Upstream(500)]);
        let root = issue("KT-1", "In Progress", None, &["KT-2", "KT-3"]);
        assert!(!is_fully_done(&root, &source).await.unwrap());
    }

    #[tokio::test]
    async fn subtask_fetch_error_propagates() {
        let source = ScriptedIssues::new()
            .script("KT-2", done("KT-2"))
            .script("KT-3", vec![Step::Upstream(502)]);
        let root = issue("KT-1", "In Progress", None, &["KT-2", "KT-3"]);
        assert!(matches!(
            is_fully_done(&root, &source).await,
            Err(crate::error::SyncError::Upstream { status: 502, .. })
        ));
    }
}
