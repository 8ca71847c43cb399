//! MCP server implementation for TickTick.
//!
//! This module defines the main MCP server that exposes TickTick operations
//! as tools. Handler implementations are in the handlers module.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::AuthManager;
use crate::config::Credentials;
use crate::handlers;
use crate::params::*;
use crate::ticktick::unofficial::UnofficialApi;
use crate::ticktick::TickTickApi;

/// The main TickTick MCP server
#[derive(Clone)]
pub struct TickTickMcpServer {
    api: TickTickApi,
    credentials: Credentials,
    /// Session for the private v2 endpoints, established on first use
    unofficial: Arc<Mutex<Option<Arc<UnofficialApi>>>>,
    tool_router: ToolRouter<Self>,
}

// ============================================================================
// Tool Router - Each tool delegates to its handler
// ============================================================================

#[tool_router]
impl TickTickMcpServer {
    pub fn new(credentials: Credentials, auth: Arc<AuthManager>) -> Self {
        let api = TickTickApi::new(auth, credentials.user_id.clone());
        Self {
            api,
            credentials,
            unofficial: Arc::new(Mutex::new(None)),
            tool_router: Self::tool_router(),
        }
    }

    /// Log in to the unofficial API on first use and cache the session.
    async fn unofficial(&self) -> Result<Arc<UnofficialApi>, McpError> {
        let mut guard = self.unofficial.lock().await;
        if let Some(api) = guard.as_ref() {
            return Ok(api.clone());
        }
        let (Some(username), Some(password)) =
            (&self.credentials.username, &self.credentials.password)
        else {
            return Err(McpError::invalid_params(
                "this tool uses TickTick's unofficial API: set TICKTICK_USERNAME and \
                 TICKTICK_PASSWORD to enable it",
                None,
            ));
        };
        let api = Arc::new(
            UnofficialApi::login(username, password)
                .await
                .map_err(handlers::api_error)?,
        );
        *guard = Some(api.clone());
        Ok(api)
    }

    // ========================================================================
    // Task Operations
    // ========================================================================

    #[tool(description = "Create a task (dates are ISO-8601, priority 0/1/3/5)")]
    async fn ticktick_create_task(
        &self,
        Parameters(params): Parameters<CreateTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::create_task(&self.api, params).await
    }

    #[tool(description = "Create a task with checklist subtasks in one call")]
    async fn ticktick_create_task_with_subtasks(
        &self,
        Parameters(params): Parameters<CreateTaskWithSubtasksParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::create_task_with_subtasks(&self.api, params).await
    }

    #[tool(description = "Update task fields (title, dates, priority, tags)")]
    async fn ticktick_update_task(
        &self,
        Parameters(params): Parameters<UpdateTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::update_task(&self.api, params).await
    }

    #[tool(description = "Fetch one task by project and task id")]
    async fn ticktick_get_task(
        &self,
        Parameters(params): Parameters<GetTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_task(&self.api, params).await
    }

    #[tool(description = "Mark a task completed (succeeds if already gone)")]
    async fn ticktick_complete_task(
        &self,
        Parameters(params): Parameters<CompleteTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::complete_task(&self.api, params).await
    }

    #[tool(description = "Delete one or more tasks from a project")]
    async fn ticktick_delete_tasks(
        &self,
        Parameters(params): Parameters<DeleteTasksParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::delete_tasks(&self.api, params).await
    }

    #[tool(description = "Move a task to another project")]
    async fn ticktick_move_task(
        &self,
        Parameters(params): Parameters<MoveTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::move_task(&self.api, params).await
    }

    #[tool(description = "Convert a task into a checklist item of another task")]
    async fn ticktick_make_subtask(
        &self,
        Parameters(params): Parameters<MakeSubtaskParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::make_subtask(&self.api, params).await
    }

    #[tool(description = "List every task across the inbox and all projects")]
    async fn ticktick_get_all_tasks(&self) -> Result<CallToolResult, McpError> {
        handlers::get_all_tasks(&self.api).await
    }

    #[tool(description = "List the tasks of one project")]
    async fn ticktick_get_tasks_from_project(
        &self,
        Parameters(params): Parameters<GetTasksFromProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_tasks_from_project(&self.api, params).await
    }

    #[tool(description = "Filter tasks by status, project, tag, priority and date ranges")]
    async fn ticktick_filter_tasks(
        &self,
        Parameters(params): Parameters<FilterTasksParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::filter_tasks(&self.api, params).await
    }

    // ========================================================================
    // Project Operations
    // ========================================================================

    #[tool(description = "List all projects")]
    async fn ticktick_get_projects(&self) -> Result<CallToolResult, McpError> {
        handlers::get_projects(&self.api).await
    }

    #[tool(description = "Fetch one project by id")]
    async fn ticktick_get_project(
        &self,
        Parameters(params): Parameters<GetProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::get_project(&self.api, params).await
    }

    #[tool(description = "Create a project")]
    async fn ticktick_create_project(
        &self,
        Parameters(params): Parameters<CreateProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::create_project(&self.api, params).await
    }

    #[tool(description = "Update project name, color, view mode or kind")]
    async fn ticktick_update_project(
        &self,
        Parameters(params): Parameters<UpdateProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::update_project(&self.api, params).await
    }

    #[tool(description = "Delete a project (succeeds if already gone)")]
    async fn ticktick_delete_project(
        &self,
        Parameters(params): Parameters<DeleteProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::delete_project(&self.api, params).await
    }

    #[tool(description = "List inbox tasks (requires TICKTICK_USER_ID)")]
    async fn ticktick_get_inbox_tasks(&self) -> Result<CallToolResult, McpError> {
        handlers::get_inbox_tasks(&self.api).await
    }

    // ========================================================================
    // Datetime Helper
    // ========================================================================

    #[tool(description = "Convert an ISO-8601 datetime plus IANA timezone to TickTick's format")]
    async fn ticktick_convert_datetime_to_ticktick_format(
        &self,
        Parameters(params): Parameters<ConvertDatetimeParams>,
    ) -> Result<CallToolResult, McpError> {
        handlers::convert_datetime(params)
    }

    // ========================================================================
    // Unofficial API (requires TICKTICK_USERNAME / TICKTICK_PASSWORD)
    // ========================================================================

    #[tool(description = "Pin a task to the top of its list (unofficial API)")]
    async fn ticktick_pin_task(
        &self,
        Parameters(params): Parameters<PinTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        let api = self.unofficial().await?;
        handlers::pin_task(&api, params).await
    }

    #[tool(description = "Unpin a task (unofficial API)")]
    async fn ticktick_unpin_task(
        &self,
        Parameters(params): Parameters<UnpinTaskParams>,
    ) -> Result<CallToolResult, McpError> {
        let api = self.unofficial().await?;
        handlers::unpin_task(&api, params).await
    }

    #[tool(description = "Set whether a repeating task repeats from due date or completion date (unofficial API)")]
    async fn ticktick_set_repeat_from(
        &self,
        Parameters(params): Parameters<SetRepeatFromParams>,
    ) -> Result<CallToolResult, McpError> {
        let api = self.unofficial().await?;
        handlers::set_repeat_from(&api, params).await
    }

    #[tool(description = "Fetch a task's change history (unofficial API)")]
    async fn ticktick_get_task_activity(
        &self,
        Parameters(params): Parameters<GetTaskActivityParams>,
    ) -> Result<CallToolResult, McpError> {
        let api = self.unofficial().await?;
        handlers::get_task_activity(&api, params).await
    }
}

// ============================================================================
// Server Handler Implementation
// ============================================================================

#[tool_handler]
impl rmcp::ServerHandler for TickTickMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "TickTick MCP server: task and project CRUD, client-side filtering, and \
                 datetime conversion over the official API, plus pinning, repeat-from and \
                 task history via the unofficial API when account credentials are set. \
                 If a tool reports an expired or missing token, re-authorize via the \
                 oauth-server subcommand."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
