//! Client-side task filtering.
//!
//! The official API has no query surface beyond per-project listing, so
//! filtering happens here over the fetched task set. [`apply`] is pure: no
//! network, no clock, and the input order is preserved unless a sort is
//! requested.

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::cmp::Reverse;
use thiserror::Error;

use crate::datetime::parse_task_date;
use crate::ticktick::types::{Priority, Task, TaskStatus};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("malformed date bound {0:?}, expected ISO-8601")]
    InvalidDateBound(String),
    #[error("unknown timezone {0:?}, expected an IANA name")]
    UnknownTimezone(String),
}

/// Declarative task filter. Unset fields match everything; all set
/// predicates are AND-combined.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub status: Option<TaskStatus>,
    pub project_id: Option<String>,
    /// Case-insensitive tag membership
    pub tag_label: Option<String>,
    pub priority: Option<Priority>,
    /// Inclusive due-date range, compared by calendar date
    pub due_start: Option<String>,
    pub due_end: Option<String>,
    /// Inclusive completion-date range; only meaningful for completed tasks
    pub completion_start: Option<String>,
    pub completion_end: Option<String>,
    /// Stable sort, highest priority first
    pub sort_by_priority: bool,
    /// Zone for date-range comparison; defaults to each task's own zone,
    /// then UTC
    pub timezone: Option<String>,
}

impl FilterSpec {
    fn is_identity(&self) -> bool {
        self.status.is_none()
            && self.project_id.is_none()
            && self.tag_label.is_none()
            && self.priority.is_none()
            && self.due_start.is_none()
            && self.due_end.is_none()
            && self.completion_start.is_none()
            && self.completion_end.is_none()
            && !self.sort_by_priority
    }
}

/// Parsed date bounds and zone, validated before any task is inspected so a
/// malformed spec fails instead of silently matching nothing.
struct Bounds {
    due: (Option<NaiveDate>, Option<NaiveDate>),
    completion: (Option<NaiveDate>, Option<NaiveDate>),
    tz: Option<Tz>,
}

impl Bounds {
    fn parse(spec: &FilterSpec) -> Result<Self, FilterError> {
        let tz = spec
            .timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>()
                    .map_err(|_| FilterError::UnknownTimezone(name.to_string()))
            })
            .transpose()?;
        Ok(Self {
            due: (
                parse_bound(spec.due_start.as_deref())?,
                parse_bound(spec.due_end.as_deref())?,
            ),
            completion: (
                parse_bound(spec.completion_start.as_deref())?,
                parse_bound(spec.completion_end.as_deref())?,
            ),
            tz,
        })
    }
}

fn parse_bound(value: Option<&str>) -> Result<Option<NaiveDate>, FilterError> {
    let Some(value) = value else { return Ok(None) };
    // Accept either a bare date or a full datetime bound
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(Some(date));
    }
    parse_task_date(value)
        .map(|dt| Some(dt.date_naive()))
        .ok_or_else(|| FilterError::InvalidDateBound(value.to_string()))
}

/// Evaluate `spec` against `tasks`.
///
/// Relative order is preserved; `sort_by_priority` applies a stable
/// descending sort, so ties keep their original order. An empty spec is the
/// identity.
pub fn apply(tasks: Vec<Task>, spec: &FilterSpec) -> Result<Vec<Task>, FilterError> {
    let bounds = Bounds::parse(spec)?;
    if spec.is_identity() {
        return Ok(tasks);
    }

    let mut matched: Vec<Task> = tasks
        .into_iter()
        .filter(|task| matches(task, spec, &bounds))
        .collect();

    if spec.sort_by_priority {
        matched.sort_by_key(|task| Reverse(task.priority));
    }
    Ok(matched)
}

fn matches(task: &Task, spec: &FilterSpec, bounds: &Bounds) -> bool {
    if let Some(status) = spec.status {
        if task.status != status {
            return false;
        }
    }
    if let Some(project_id) = &spec.project_id {
        if &task.project_id != project_id {
            return false;
        }
    }
    if let Some(tag) = &spec.tag_label {
        if !task.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            return false;
        }
    }
    if let Some(priority) = spec.priority {
        if task.priority != priority {
            return false;
        }
    }
    if !within_range(task, task.due_date.as_deref(), bounds.due, bounds.tz) {
        return false;
    }
    if !within_range(task, task.completed_time.as_deref(), bounds.completion, bounds.tz) {
        return false;
    }
    true
}

/// Tasks lacking the relevant date are excluded whenever either bound is set.
fn within_range(
    task: &Task,
    raw_date: Option<&str>,
    (start, end): (Option<NaiveDate>, Option<NaiveDate>),
    spec_tz: Option<Tz>,
) -> bool {
    if start.is_none() && end.is_none() {
        return true;
    }
    let Some(date) = raw_date.and_then(|raw| date_in_zone(raw, task.time_zone.as_deref(), spec_tz))
    else {
        return false;
    };
    if let Some(start) = start {
        if date < start {
            return false;
        }
    }
    if let Some(end) = end {
        if date > end {
            return false;
        }
    }
    true
}

fn date_in_zone(raw: &str, task_tz: Option<&str>, spec_tz: Option<Tz>) -> Option<NaiveDate> {
    let instant = parse_task_date(raw)?;
    let tz = spec_tz.or_else(|| task_tz.and_then(|name| name.parse().ok()));
    match tz {
        Some(tz) => Some(instant.with_timezone(&tz).date_naive()),
        None => Some(instant.with_timezone(&chrono::Utc).date_naive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, status: TaskStatus, priority: Priority) -> Task {
        Task {
            id: id.to_string(),
            project_id: "proj1".to_string(),
            title: format!("task {}", id),
            status,
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_spec_is_identity() {
        let tasks = vec![
            task("a", TaskStatus::Completed, Priority::None),
            task("b", TaskStatus::Uncompleted, Priority::High),
        ];
        let result = apply(tasks.clone(), &FilterSpec::default()).unwrap();
        assert_eq!(result, tasks);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let spec = FilterSpec {
            status: Some(TaskStatus::Completed),
            sort_by_priority: true,
            ..Default::default()
        };
        assert!(apply(vec![], &spec).unwrap().is_empty());
    }

    #[test]
    fn test_status_filter() {
        let tasks = vec![
            task("a", TaskStatus::Completed, Priority::None),
            task("b", TaskStatus::Uncompleted, Priority::High),
        ];
        let spec = FilterSpec {
            status: Some(TaskStatus::Uncompleted),
            ..Default::default()
        };
        let result = apply(tasks, &spec).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "b");
    }

    #[test]
    fn test_sort_by_priority_is_stable_descending() {
        let tasks = vec![
            task("a", TaskStatus::Uncompleted, Priority::Low),
            task("b", TaskStatus::Uncompleted, Priority::High),
            task("c", TaskStatus::Uncompleted, Priority::Low),
            task("d", TaskStatus::Uncompleted, Priority::Medium),
        ];
        let spec = FilterSpec {
            sort_by_priority: true,
            ..Default::default()
        };
        let result = apply(tasks, &spec).unwrap();
        let ids: Vec<&str> = result.iter().map(|t| t.id.as_str()).collect();
        // Equal priorities (a, c) keep their original relative order
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_tag_filter_is_case_insensitive() {
        let mut with_tag = task("a", TaskStatus::Uncompleted, Priority::None);
        with_tag.tags = vec!["Work".to_string()];
        let without = task("b", TaskStatus::Uncompleted, Priority::None);

        let spec = FilterSpec {
            tag_label: Some("work".to_string()),
            ..Default::default()
        };
        let result = apply(vec![with_tag, without], &spec).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "a");
    }

    #[test]
    fn test_due_range_is_inclusive_and_excludes_dateless() {
        let mut early = task("a", TaskStatus::Uncompleted, Priority::None);
        early.due_date = Some("2024-07-21T10:00:00+0000".to_string());
        let mut on_start = task("b", TaskStatus::Uncompleted, Priority::None);
        on_start.due_date = Some("2024-07-22T00:00:00+0000".to_string());
        let mut on_end = task("c", TaskStatus::Uncompleted, Priority::None);
        on_end.due_date = Some("2024-07-28T23:00:00+0000".to_string());
        let dateless = task("d", TaskStatus::Uncompleted, Priority::None);

        let spec = FilterSpec {
            due_start: Some("2024-07-22".to_string()),
            due_end: Some("2024-07-28".to_string()),
            ..Default::default()
        };
        let result = apply(vec![early, on_start, on_end, dateless], &spec).unwrap();
        let ids: Vec<&str> = result.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_due_range_respects_spec_timezone() {
        // 23:00 UTC on the 26th is already the 27th in Seoul
        let mut t = task("a", TaskStatus::Uncompleted, Priority::None);
        t.due_date = Some("2024-07-26T23:00:00+0000".to_string());

        let seoul = FilterSpec {
            due_start: Some("2024-07-27".to_string()),
            due_end: Some("2024-07-27".to_string()),
            timezone: Some("Asia/Seoul".to_string()),
            ..Default::default()
        };
        assert_eq!(apply(vec![t.clone()], &seoul).unwrap().len(), 1);

        let utc = FilterSpec {
            timezone: None,
            ..seoul
        };
        assert!(apply(vec![t], &utc).unwrap().is_empty());
    }

    #[test]
    fn test_completion_range_uses_completed_time() {
        let mut done = task("a", TaskStatus::Completed, Priority::None);
        done.completed_time = Some("2024-07-20T09:00:00+0000".to_string());
        let mut pending = task("b", TaskStatus::Uncompleted, Priority::None);
        pending.due_date = Some("2024-07-20T09:00:00+0000".to_string());

        let spec = FilterSpec {
            status: Some(TaskStatus::Completed),
            completion_start: Some("2024-07-15".to_string()),
            completion_end: Some("2024-07-21".to_string()),
            ..Default::default()
        };
        let result = apply(vec![done, pending], &spec).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "a");
    }

    #[test]
    fn test_malformed_date_bound_fails() {
        let spec = FilterSpec {
            due_start: Some("not-a-date".to_string()),
            ..Default::default()
        };
        let err = apply(vec![], &spec).unwrap_err();
        assert!(matches!(err, FilterError::InvalidDateBound(_)));
    }

    #[test]
    fn test_unknown_timezone_fails() {
        let spec = FilterSpec {
            timezone: Some("Mars/Olympus".to_string()),
            due_start: Some("2024-07-22".to_string()),
            ..Default::default()
        };
        let err = apply(vec![], &spec).unwrap_err();
        assert!(matches!(err, FilterError::UnknownTimezone(_)));
    }
}
