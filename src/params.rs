//! Parameter types for the MCP tools.
//!
//! Each struct mirrors one tool's input schema; `schemars` derives the JSON
//! Schema the protocol advertises to agents. Priorities and statuses are
//! plain wire values here and validated at the handler boundary so the agent
//! gets a readable error instead of a schema rejection.

use schemars::JsonSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskParams {
    /// Task title (required, must be non-empty)
    pub title: String,
    /// Project to create the task in; omit for the inbox
    #[serde(default)]
    pub project_id: Option<String>,
    /// Task body content
    #[serde(default)]
    pub content: Option<String>,
    /// Short description shown under the title
    #[serde(default)]
    pub desc: Option<String>,
    /// Start date-time, ISO-8601 (e.g. "2024-07-26T10:00:00" or "2024-07-26")
    #[serde(default)]
    pub start_date: Option<String>,
    /// Due date-time, ISO-8601
    #[serde(default)]
    pub due_date: Option<String>,
    /// IANA timezone name for the dates (e.g. "Asia/Seoul"); defaults to UTC
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Priority: 0 = none, 1 = low, 3 = medium, 5 = high
    #[serde(default)]
    pub priority: Option<i32>,
    /// Tag labels to attach
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// RFC 5545 reminder triggers (e.g. "TRIGGER:-PT30M")
    #[serde(default)]
    pub reminders: Option<Vec<String>>,
    /// RFC 5545 recurrence rule (e.g. "RRULE:FREQ=DAILY;INTERVAL=1")
    #[serde(default)]
    pub repeat_flag: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateTaskWithSubtasksParams {
    /// Task title (required, must be non-empty)
    pub title: String,
    /// Subtask titles, created as checklist items in order
    pub subtasks: Vec<String>,
    /// Project to create the task in; omit for the inbox
    #[serde(default)]
    pub project_id: Option<String>,
    /// Task body content
    #[serde(default)]
    pub content: Option<String>,
    /// Due date-time, ISO-8601
    #[serde(default)]
    pub due_date: Option<String>,
    /// IANA timezone name for the dates; defaults to UTC
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Priority: 0 = none, 1 = low, 3 = medium, 5 = high
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateTaskParams {
    /// Id of the task to update
    pub task_id: String,
    /// Project the task currently belongs to
    pub project_id: String,
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New body content
    #[serde(default)]
    pub content: Option<String>,
    /// New short description
    #[serde(default)]
    pub desc: Option<String>,
    /// New start date-time, ISO-8601
    #[serde(default)]
    pub start_date: Option<String>,
    /// New due date-time, ISO-8601
    #[serde(default)]
    pub due_date: Option<String>,
    /// IANA timezone name for the dates; defaults to UTC
    #[serde(default)]
    pub time_zone: Option<String>,
    /// Priority: 0 = none, 1 = low, 3 = medium, 5 = high
    #[serde(default)]
    pub priority: Option<i32>,
    /// Replacement tag set
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Replacement RFC 5545 reminder triggers
    #[serde(default)]
    pub reminders: Option<Vec<String>>,
    /// Replacement RFC 5545 recurrence rule
    #[serde(default)]
    pub repeat_flag: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTaskParams {
    /// Project the task belongs to
    pub project_id: String,
    /// Id of the task to fetch
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompleteTaskParams {
    /// Project the task belongs to
    pub project_id: String,
    /// Id of the task to complete
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteTasksParams {
    /// Project the tasks belong to
    pub project_id: String,
    /// Ids of the tasks to delete
    pub task_ids: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveTaskParams {
    /// Id of the task to move
    pub task_id: String,
    /// Project the task currently belongs to
    pub from_project_id: String,
    /// Destination project
    pub to_project_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MakeSubtaskParams {
    /// Project both tasks belong to
    pub project_id: String,
    /// Task that becomes the parent
    pub parent_task_id: String,
    /// Task converted into a checklist item of the parent (and then deleted)
    pub child_task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTasksFromProjectParams {
    /// Project whose tasks to list
    pub project_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetProjectParams {
    /// Id of the project to fetch
    pub project_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateProjectParams {
    /// Project name (required, must be non-empty)
    pub name: String,
    /// Hex color (e.g. "#F18181")
    #[serde(default)]
    pub color: Option<String>,
    /// View mode: "list", "kanban" or "timeline"
    #[serde(default)]
    pub view_mode: Option<String>,
    /// Kind: "TASK" or "NOTE"
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateProjectParams {
    /// Id of the project to update
    pub project_id: String,
    /// New name
    #[serde(default)]
    pub name: Option<String>,
    /// New hex color
    #[serde(default)]
    pub color: Option<String>,
    /// New view mode: "list", "kanban" or "timeline"
    #[serde(default)]
    pub view_mode: Option<String>,
    /// New kind: "TASK" or "NOTE"
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteProjectParams {
    /// Id of the project to delete
    pub project_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilterTasksParams {
    /// "uncompleted" or "completed"
    #[serde(default)]
    pub status: Option<String>,
    /// Only tasks in this project
    #[serde(default)]
    pub project_id: Option<String>,
    /// Only tasks carrying this tag (case-insensitive)
    #[serde(default)]
    pub tag_label: Option<String>,
    /// Only tasks at this priority: 0, 1, 3 or 5
    #[serde(default)]
    pub priority: Option<i32>,
    /// Earliest due date, inclusive, ISO-8601
    #[serde(default)]
    pub due_start_date: Option<String>,
    /// Latest due date, inclusive, ISO-8601
    #[serde(default)]
    pub due_end_date: Option<String>,
    /// Earliest completion date, inclusive, ISO-8601
    #[serde(default)]
    pub completion_start_date: Option<String>,
    /// Latest completion date, inclusive, ISO-8601
    #[serde(default)]
    pub completion_end_date: Option<String>,
    /// Sort results by priority, highest first
    #[serde(default)]
    pub sort_by_priority: bool,
    /// IANA timezone for the date comparisons; defaults to each task's zone
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConvertDatetimeParams {
    /// ISO-8601 datetime or bare date (e.g. "2024-07-26T10:00:00")
    pub datetime: String,
    /// IANA timezone name (e.g. "Asia/Seoul")
    pub time_zone: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PinTaskParams {
    /// Id of the task to pin
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UnpinTaskParams {
    /// Id of the task to unpin
    pub task_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetRepeatFromParams {
    /// Id of the repeating task
    pub task_id: String,
    /// Project the task belongs to
    pub project_id: String,
    /// "due_date" (or "0") to repeat from the due date, "completion_date"
    /// (or "1") to repeat from the completion date
    pub repeat_from: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetTaskActivityParams {
    /// Id of the task whose history to fetch
    pub task_id: String,
    /// Number of history entries to skip (paging)
    #[serde(default)]
    pub skip: Option<u32>,
}
