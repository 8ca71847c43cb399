//! Tool handler implementations.
//!
//! The server layer stays a thin protocol shim; the actual work of each tool
//! lives here so it can be exercised without an MCP transport. Handlers
//! validate agent input, call the API client, and render results as pretty
//! JSON text content.

use rmcp::model::{CallToolResult, Content};
use rmcp::ErrorData as McpError;
use serde::Serialize;
use serde_json::json;

use crate::datetime;
use crate::filter::{self, FilterSpec};
use crate::params::*;
use crate::ticktick::error::ApiError;
use crate::ticktick::types::{NewProject, NewTask, Priority, RepeatFrom, Subtask, TaskUpdate};
use crate::ticktick::unofficial::UnofficialApi;
use crate::ticktick::TickTickApi;

/// Render any serializable value as a successful tool result.
pub(crate) fn json_success<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("failed to serialize result: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// Map an API failure onto the protocol error space. Caller mistakes become
/// `invalid_params` so the agent can correct them; everything else is
/// internal.
pub(crate) fn api_error(e: ApiError) -> McpError {
    match e {
        ApiError::Validation(_) | ApiError::NotFound(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn parse_priority(value: Option<i32>) -> Result<Option<Priority>, McpError> {
    value
        .map(|v| Priority::try_from(v).map_err(|e| McpError::invalid_params(e, None)))
        .transpose()
}

/// Convert an agent-supplied date into the provider's offset form, using UTC
/// when no zone was given. Also reports whether the input was date-only.
fn wire_date(
    value: Option<&str>,
    tz_name: &str,
) -> Result<(Option<String>, Option<bool>), McpError> {
    let Some(value) = value else { return Ok((None, None)) };
    let wire = datetime::convert(value, tz_name)
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
    Ok((Some(wire.datetime), Some(wire.is_all_day)))
}

fn resolve_project_id(api: &TickTickApi, project_id: Option<String>) -> Result<String, McpError> {
    match project_id {
        Some(id) => Ok(id),
        None => api.inbox_id().ok_or_else(|| {
            McpError::invalid_params(
                "no project_id given and the inbox is unavailable: set TICKTICK_USER_ID \
                 so the inbox project id can be derived",
                None,
            )
        }),
    }
}

// ---- tasks ----

pub async fn create_task(
    api: &TickTickApi,
    params: CreateTaskParams,
) -> Result<CallToolResult, McpError> {
    let tz_name = params.time_zone.as_deref().unwrap_or("UTC");
    let (start_date, start_all_day) = wire_date(params.start_date.as_deref(), tz_name)?;
    let (due_date, due_all_day) = wire_date(params.due_date.as_deref(), tz_name)?;

    let task = NewTask {
        title: params.title,
        project_id: resolve_project_id(api, params.project_id)?,
        content: params.content,
        desc: params.desc,
        is_all_day: start_all_day.or(due_all_day),
        start_date,
        due_date,
        time_zone: (params.time_zone.is_some()).then(|| tz_name.to_string()),
        reminders: params.reminders,
        repeat_flag: params.repeat_flag,
        priority: parse_priority(params.priority)?,
        tags: params.tags,
        ..Default::default()
    };
    json_success(&api.create_task(&task).await.map_err(api_error)?)
}

pub async fn create_task_with_subtasks(
    api: &TickTickApi,
    params: CreateTaskWithSubtasksParams,
) -> Result<CallToolResult, McpError> {
    if params.subtasks.is_empty() {
        return Err(McpError::invalid_params(
            "subtasks must contain at least one title",
            None,
        ));
    }
    let tz_name = params.time_zone.as_deref().unwrap_or("UTC");
    let (due_date, due_all_day) = wire_date(params.due_date.as_deref(), tz_name)?;

    let items = params
        .subtasks
        .into_iter()
        .map(|title| Subtask {
            title,
            ..Default::default()
        })
        .collect();

    let task = NewTask {
        title: params.title,
        project_id: resolve_project_id(api, params.project_id)?,
        content: params.content,
        is_all_day: due_all_day,
        due_date,
        time_zone: (params.time_zone.is_some()).then(|| tz_name.to_string()),
        priority: parse_priority(params.priority)?,
        items: Some(items),
        ..Default::default()
    };
    json_success(&api.create_task(&task).await.map_err(api_error)?)
}

pub async fn update_task(
    api: &TickTickApi,
    params: UpdateTaskParams,
) -> Result<CallToolResult, McpError> {
    let tz_name = params.time_zone.as_deref().unwrap_or("UTC");
    let (start_date, start_all_day) = wire_date(params.start_date.as_deref(), tz_name)?;
    let (due_date, due_all_day) = wire_date(params.due_date.as_deref(), tz_name)?;

    let update = TaskUpdate {
        id: params.task_id,
        project_id: params.project_id,
        title: params.title,
        content: params.content,
        desc: params.desc,
        is_all_day: start_all_day.or(due_all_day),
        start_date,
        due_date,
        time_zone: (params.time_zone.is_some()).then(|| tz_name.to_string()),
        reminders: params.reminders,
        repeat_flag: params.repeat_flag,
        priority: parse_priority(params.priority)?,
        tags: params.tags,
        ..Default::default()
    };
    json_success(&api.update_task(&update).await.map_err(api_error)?)
}

pub async fn get_task(
    api: &TickTickApi,
    params: GetTaskParams,
) -> Result<CallToolResult, McpError> {
    json_success(
        &api.get_task(&params.project_id, &params.task_id)
            .await
            .map_err(api_error)?,
    )
}

pub async fn complete_task(
    api: &TickTickApi,
    params: CompleteTaskParams,
) -> Result<CallToolResult, McpError> {
    let completed = api
        .complete_task(&params.project_id, &params.task_id)
        .await
        .map_err(api_error)?;
    let message = if completed {
        "task completed"
    } else {
        "task was already gone"
    };
    json_success(&json!({ "task_id": params.task_id, "message": message }))
}

pub async fn delete_tasks(
    api: &TickTickApi,
    params: DeleteTasksParams,
) -> Result<CallToolResult, McpError> {
    if params.task_ids.is_empty() {
        return Err(McpError::invalid_params(
            "task_ids must contain at least one id",
            None,
        ));
    }
    let deleted = api
        .delete_tasks(&params.project_id, &params.task_ids)
        .await
        .map_err(api_error)?;
    json_success(&json!({
        "requested": params.task_ids.len(),
        "deleted": deleted,
    }))
}

pub async fn move_task(
    api: &TickTickApi,
    params: MoveTaskParams,
) -> Result<CallToolResult, McpError> {
    json_success(
        &api.move_task(
            &params.task_id,
            &params.from_project_id,
            &params.to_project_id,
        )
        .await
        .map_err(api_error)?,
    )
}

pub async fn make_subtask(
    api: &TickTickApi,
    params: MakeSubtaskParams,
) -> Result<CallToolResult, McpError> {
    json_success(
        &api.make_subtask(
            &params.project_id,
            &params.parent_task_id,
            &params.child_task_id,
        )
        .await
        .map_err(api_error)?,
    )
}

pub async fn get_all_tasks(api: &TickTickApi) -> Result<CallToolResult, McpError> {
    json_success(&api.get_all_tasks().await.map_err(api_error)?)
}

pub async fn get_tasks_from_project(
    api: &TickTickApi,
    params: GetTasksFromProjectParams,
) -> Result<CallToolResult, McpError> {
    json_success(
        &api.get_project_tasks(&params.project_id)
            .await
            .map_err(api_error)?,
    )
}

pub async fn filter_tasks(
    api: &TickTickApi,
    params: FilterTasksParams,
) -> Result<CallToolResult, McpError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse().map_err(|e| McpError::invalid_params(format!("{}", e), None)))
        .transpose()?;
    let spec = FilterSpec {
        status,
        project_id: params.project_id,
        tag_label: params.tag_label,
        priority: parse_priority(params.priority)?,
        due_start: params.due_start_date,
        due_end: params.due_end_date,
        completion_start: params.completion_start_date,
        completion_end: params.completion_end_date,
        sort_by_priority: params.sort_by_priority,
        timezone: params.timezone,
    };

    let tasks = api.get_all_tasks().await.map_err(api_error)?;
    let matched = filter::apply(tasks, &spec)
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
    json_success(&matched)
}

// ---- projects ----

pub async fn get_projects(api: &TickTickApi) -> Result<CallToolResult, McpError> {
    json_success(&api.list_projects().await.map_err(api_error)?)
}

pub async fn get_project(
    api: &TickTickApi,
    params: GetProjectParams,
) -> Result<CallToolResult, McpError> {
    json_success(&api.get_project(&params.project_id).await.map_err(api_error)?)
}

pub async fn create_project(
    api: &TickTickApi,
    params: CreateProjectParams,
) -> Result<CallToolResult, McpError> {
    let project = NewProject {
        name: params.name,
        color: params.color,
        view_mode: params.view_mode,
        kind: params.kind,
        ..Default::default()
    };
    json_success(&api.create_project(&project).await.map_err(api_error)?)
}

pub async fn update_project(
    api: &TickTickApi,
    params: UpdateProjectParams,
) -> Result<CallToolResult, McpError> {
    // The endpoint wants the full name either way; fetch it when the caller
    // only changes cosmetics.
    let name = match params.name {
        Some(name) => name,
        None => {
            api.get_project(&params.project_id)
                .await
                .map_err(api_error)?
                .name
        }
    };
    let update = NewProject {
        name,
        color: params.color,
        view_mode: params.view_mode,
        kind: params.kind,
        ..Default::default()
    };
    json_success(
        &api.update_project(&params.project_id, &update)
            .await
            .map_err(api_error)?,
    )
}

pub async fn delete_project(
    api: &TickTickApi,
    params: DeleteProjectParams,
) -> Result<CallToolResult, McpError> {
    let deleted = api
        .delete_project(&params.project_id)
        .await
        .map_err(api_error)?;
    let message = if deleted {
        "project deleted"
    } else {
        "project was already gone"
    };
    json_success(&json!({ "project_id": params.project_id, "message": message }))
}

pub async fn get_inbox_tasks(api: &TickTickApi) -> Result<CallToolResult, McpError> {
    json_success(&api.get_inbox_data().await.map_err(api_error)?.tasks)
}

// ---- datetime ----

pub fn convert_datetime(params: ConvertDatetimeParams) -> Result<CallToolResult, McpError> {
    let wire = datetime::convert(&params.datetime, &params.time_zone)
        .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
    json_success(&wire)
}

// ---- unofficial ----

pub async fn pin_task(
    api: &UnofficialApi,
    params: PinTaskParams,
) -> Result<CallToolResult, McpError> {
    api.pin_task(&params.task_id).await.map_err(api_error)?;
    json_success(&json!({ "task_id": params.task_id, "pinned": true }))
}

pub async fn unpin_task(
    api: &UnofficialApi,
    params: UnpinTaskParams,
) -> Result<CallToolResult, McpError> {
    api.unpin_task(&params.task_id).await.map_err(api_error)?;
    json_success(&json!({ "task_id": params.task_id, "pinned": false }))
}

pub async fn set_repeat_from(
    api: &UnofficialApi,
    params: SetRepeatFromParams,
) -> Result<CallToolResult, McpError> {
    let repeat_from: RepeatFrom = params
        .repeat_from
        .parse()
        .map_err(|e| McpError::invalid_params(format!("{}", e), None))?;
    api.set_repeat_from(&params.task_id, &params.project_id, repeat_from)
        .await
        .map_err(api_error)?;
    json_success(&json!({
        "task_id": params.task_id,
        "repeat_from": repeat_from.wire_value(),
    }))
}

pub async fn get_task_activity(
    api: &UnofficialApi,
    params: GetTaskActivityParams,
) -> Result<CallToolResult, McpError> {
    json_success(
        &api.get_task_activity(&params.task_id, params.skip)
            .await
            .map_err(api_error)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_priority_accepts_wire_values() {
        assert_eq!(parse_priority(None).unwrap(), None);
        assert_eq!(parse_priority(Some(5)).unwrap(), Some(Priority::High));
        assert!(parse_priority(Some(2)).is_err());
    }

    #[test]
    fn test_wire_date_defaults_to_utc() {
        let (date, all_day) = wire_date(Some("2024-07-26T10:00:00"), "UTC").unwrap();
        assert_eq!(date.as_deref(), Some("2024-07-26T10:00:00+00:00"));
        assert_eq!(all_day, Some(false));

        let (date, all_day) = wire_date(None, "UTC").unwrap();
        assert!(date.is_none());
        assert!(all_day.is_none());
    }

    #[test]
    fn test_wire_date_accepts_provider_shaped_input() {
        // An agent copying a fetched task's dueDate back into an update
        let (date, all_day) =
            wire_date(Some("2024-07-26T10:00:00.000+0000"), "Asia/Seoul").unwrap();
        assert_eq!(date.as_deref(), Some("2024-07-26T19:00:00+09:00"));
        assert_eq!(all_day, Some(false));
    }

    #[test]
    fn test_wire_date_rejects_garbage() {
        assert!(wire_date(Some("tomorrow"), "UTC").is_err());
        assert!(wire_date(Some("2024-07-26"), "Nowhere/Else").is_err());
    }

    #[test]
    fn test_api_error_mapping() {
        let err = api_error(ApiError::Validation("bad".into()));
        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        let err = api_error(ApiError::Remote {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(err.code, rmcp::model::ErrorCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_json_success_renders_pretty_json() {
        let result = json_success(&json!({ "ok": true })).unwrap();
        assert_eq!(result.is_error, Some(false));
    }
}
