//! TickTick API client.
//!
//! [`TickTickApi`] wraps the official OpenAPI v1 surface; the session-cookie
//! endpoints the open API never gained live in [`unofficial`]. Every call
//! obtains its bearer token from the shared [`AuthManager`] at request time,
//! so a refresh mid-session is picked up without restarting.

pub mod error;
pub mod types;
pub mod unofficial;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use error::{classify_status, ApiError, ApiResult};
use types::{NewProject, NewTask, Project, ProjectData, Subtask, Task, TaskUpdate};

const BASE_URL: &str = "https://api.ticktick.com/open/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on parent-chain hops when checking for cycles; anything deeper is a
/// corrupt hierarchy and treated as cyclic.
const MAX_NESTING_DEPTH: usize = 64;

/// Authenticated client for the official TickTick API.
#[derive(Clone)]
pub struct TickTickApi {
    http: Client,
    auth: Arc<AuthManager>,
    user_id: Option<String>,
    base_url: String,
}

impl TickTickApi {
    pub fn new(auth: Arc<AuthManager>, user_id: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to create HTTP client");
        Self {
            http,
            auth,
            user_id,
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// The inbox is a virtual project whose id is derived from the account's
    /// user id; the API never lists it.
    pub fn inbox_id(&self) -> Option<String> {
        self.user_id.as_ref().map(|id| format!("inbox{}", id))
    }

    async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<Option<serde_json::Value>> {
        let token = self.auth.get_valid_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), path, body));
        }
        // Several endpoints answer 200 with an empty body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let value = self
            .request::<()>(Method::GET, path, None)
            .await?
            .ok_or_else(|| ApiError::NotFound(path.to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    // ---- tasks ----

    pub async fn create_task(&self, task: &NewTask) -> ApiResult<Task> {
        if task.title.trim().is_empty() {
            return Err(ApiError::Validation("task title must not be empty".into()));
        }
        let value = self
            .request(Method::POST, "/task", Some(task))
            .await?
            .ok_or_else(|| ApiError::NotFound("/task".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// The endpoint echoes the updated task back.
    pub async fn update_task(&self, update: &TaskUpdate) -> ApiResult<Task> {
        let path = format!("/task/{}", update.id);
        let value = self
            .request(Method::POST, &path, Some(update))
            .await?
            .ok_or_else(|| ApiError::NotFound(path.clone()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_task(&self, project_id: &str, task_id: &str) -> ApiResult<Task> {
        self.get_json(&format!("/project/{}/task/{}", project_id, task_id))
            .await
    }

    /// Completing an already-deleted task is a success: the desired end state
    /// (task not pending) holds either way.
    pub async fn complete_task(&self, project_id: &str, task_id: &str) -> ApiResult<bool> {
        let path = format!("/project/{}/task/{}/complete", project_id, task_id);
        match self.request::<()>(Method::POST, &path, None).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Idempotent: deleting a missing task returns `Ok(false)`.
    pub async fn delete_task(&self, project_id: &str, task_id: &str) -> ApiResult<bool> {
        let path = format!("/project/{}/task/{}", project_id, task_id);
        match self.request::<()>(Method::DELETE, &path, None).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete several tasks from one project; returns the ids actually
    /// removed. Stops at the first non-404 failure.
    pub async fn delete_tasks(&self, project_id: &str, task_ids: &[String]) -> ApiResult<Vec<String>> {
        let mut deleted = Vec::new();
        for task_id in task_ids {
            if self.delete_task(project_id, task_id).await? {
                deleted.push(task_id.clone());
            } else {
                tracing::warn!(task_id = %task_id, "task already absent, skipping");
            }
        }
        Ok(deleted)
    }

    /// The open API has no move endpoint; re-posting the task with the new
    /// project id achieves it.
    pub async fn move_task(
        &self,
        task_id: &str,
        from_project_id: &str,
        to_project_id: &str,
    ) -> ApiResult<Task> {
        let task = self.get_task(from_project_id, task_id).await?;
        let update = TaskUpdate {
            id: task.id.clone(),
            project_id: to_project_id.to_string(),
            title: Some(task.title.clone()),
            ..Default::default()
        };
        self.update_task(&update).await
    }

    /// Attach `child_task_id` to `parent_task_id` as a checklist item. The
    /// child task is converted into an item on the parent and then deleted,
    /// so its own subtasks and attachments do not survive.
    pub async fn make_subtask(
        &self,
        project_id: &str,
        parent_task_id: &str,
        child_task_id: &str,
    ) -> ApiResult<Task> {
        if parent_task_id == child_task_id {
            return Err(ApiError::Validation(
                "a task cannot be its own subtask".into(),
            ));
        }

        let data = self.get_project_data(project_id).await?;
        if would_create_cycle(&data.tasks, parent_task_id, child_task_id) {
            return Err(ApiError::Validation(format!(
                "making {} a subtask of {} would create a cycle",
                child_task_id, parent_task_id
            )));
        }

        let child = self.get_task(project_id, child_task_id).await?;
        let mut parent = self.get_task(project_id, parent_task_id).await?;
        if child.project_id != parent.project_id {
            return Err(ApiError::Validation(
                "parent and child must belong to the same project".into(),
            ));
        }

        parent.items.push(Subtask {
            id: None,
            title: child.title.clone(),
            status: child.status,
            start_date: child.start_date.clone(),
            is_all_day: child.is_all_day,
        });
        let update = TaskUpdate {
            id: parent.id.clone(),
            project_id: parent.project_id.clone(),
            title: Some(parent.title.clone()),
            items: Some(parent.items.clone()),
            ..Default::default()
        };
        let updated = self.update_task(&update).await?;
        self.delete_task(project_id, child_task_id).await?;
        Ok(updated)
    }

    /// Every task visible to the account: inbox first, then each listed
    /// project. A project that fails to load is logged and skipped so one
    /// broken list does not hide the rest.
    pub async fn get_all_tasks(&self) -> ApiResult<Vec<Task>> {
        let mut tasks = Vec::new();

        if let Some(inbox_id) = self.inbox_id() {
            match self.get_project_data(&inbox_id).await {
                Ok(data) => tasks.extend(data.tasks),
                Err(e) => tracing::warn!("failed to fetch inbox tasks: {}", e),
            }
        }

        for project in self.list_projects().await? {
            match self.get_project_data(&project.id).await {
                Ok(data) => tasks.extend(data.tasks),
                Err(e) => {
                    tracing::warn!(project_id = %project.id, "failed to fetch project tasks: {}", e)
                }
            }
        }
        Ok(tasks)
    }

    pub async fn get_project_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
        Ok(self.get_project_data(project_id).await?.tasks)
    }

    // ---- projects ----

    pub async fn get_project_data(&self, project_id: &str) -> ApiResult<ProjectData> {
        self.get_json(&format!("/project/{}/data", project_id)).await
    }

    pub async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        // An account with no projects answers with an empty body
        let value = self.request::<()>(Method::GET, "/project", None).await?;
        match value {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_project(&self, project_id: &str) -> ApiResult<Project> {
        self.get_json(&format!("/project/{}", project_id)).await
    }

    pub async fn create_project(&self, project: &NewProject) -> ApiResult<Project> {
        if project.name.trim().is_empty() {
            return Err(ApiError::Validation(
                "project name must not be empty".into(),
            ));
        }
        let value = self
            .request(Method::POST, "/project", Some(project))
            .await?
            .ok_or_else(|| ApiError::NotFound("/project".to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn update_project(&self, project_id: &str, update: &NewProject) -> ApiResult<Project> {
        let path = format!("/project/{}", project_id);
        let value = self
            .request(Method::POST, &path, Some(update))
            .await?
            .ok_or_else(|| ApiError::NotFound(path.clone()))?;
        Ok(serde_json::from_value(value)?)
    }

    /// Idempotent like task deletion.
    pub async fn delete_project(&self, project_id: &str) -> ApiResult<bool> {
        let path = format!("/project/{}", project_id);
        match self.request::<()>(Method::DELETE, &path, None).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn get_inbox_data(&self) -> ApiResult<ProjectData> {
        let inbox_id = self.inbox_id().ok_or_else(|| {
            ApiError::Validation(
                "inbox access requires TICKTICK_USER_ID (the inbox project id is derived from it)"
                    .into(),
            )
        })?;
        self.get_project_data(&inbox_id).await
    }
}

/// Walk the parent chain upward from `parent_id`; if it reaches `child_id`
/// the proposed edge would close a loop.
fn would_create_cycle(tasks: &[Task], parent_id: &str, child_id: &str) -> bool {
    let mut current = Some(parent_id);
    for _ in 0..MAX_NESTING_DEPTH {
        let Some(id) = current else { return false };
        if id == child_id {
            return true;
        }
        current = tasks
            .iter()
            .find(|t| t.id == id)
            .and_then(|t| t.parent_id.as_deref());
    }
    true
}
