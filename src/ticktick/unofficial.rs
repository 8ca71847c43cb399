//! Session-cookie client for TickTick's private v2 API.
//!
//! Pinning, repeat-from and the activity log never made it into the open
//! API, so these calls authenticate the way the web app does: username and
//! password for a session token, then a `t` cookie on every request. The
//! endpoints are unversioned internals and can break without notice.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

use super::error::{classify_status, ApiResult};
use super::types::RepeatFrom;

const V2_BASE_URL: &str = "https://api.ticktick.com/api/v2";
const ACTIVITY_URL: &str = "https://api.ticktick.com/api/v1/task/activity";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The web client signals "pinned" through a magic sort-order value rather
/// than a boolean.
const PIN_SORT_ORDER: i64 = -36_352_603_324_416;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) \
     Gecko/20100101 Firefox/95.0";

#[derive(Debug, Deserialize)]
struct SignonResponse {
    token: String,
}

/// Client for the private v2 endpoints, holding a logged-in session token.
#[derive(Clone)]
pub struct UnofficialApi {
    http: Client,
    session_token: String,
}

impl UnofficialApi {
    /// Log in with account credentials and capture the session token. The
    /// `x-device` header is mandatory; the service rejects logins without a
    /// plausible device descriptor.
    pub async fn login(username: &str, password: &str) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to create HTTP client");

        let url = format!("{}/user/signon?wc=true&remember=true", V2_BASE_URL);
        let response = http
            .post(&url)
            .header("x-device", device_descriptor())
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "/user/signon", body));
        }
        let signon: SignonResponse = response.json().await?;
        tracing::info!("signed in to the unofficial API");
        Ok(Self {
            http,
            session_token: signon.token,
        })
    }

    async fn post(&self, url: &str, path: &str, body: serde_json::Value) -> ApiResult<serde_json::Value> {
        let response = self
            .http
            .post(url)
            .header("Cookie", format!("t={}", self.session_token))
            .header("x-device", device_descriptor())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), path, body));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn pin_task(&self, task_id: &str) -> ApiResult<()> {
        let url = format!("{}/batch/order", V2_BASE_URL);
        self.post(
            &url,
            "/batch/order",
            json!({
                "changed": [{ "id": task_id, "type": 1, "order": PIN_SORT_ORDER }],
                "deleted": [],
            }),
        )
        .await?;
        Ok(())
    }

    pub async fn unpin_task(&self, task_id: &str) -> ApiResult<()> {
        let url = format!("{}/batch/order", V2_BASE_URL);
        self.post(
            &url,
            "/batch/order",
            json!({
                "changed": [],
                "deleted": [task_id],
            }),
        )
        .await?;
        Ok(())
    }

    /// Switch a repeating task between repeat-from-due-date and
    /// repeat-from-completion-date.
    pub async fn set_repeat_from(
        &self,
        task_id: &str,
        project_id: &str,
        repeat_from: RepeatFrom,
    ) -> ApiResult<()> {
        let url = format!("{}/batch/task", V2_BASE_URL);
        self.post(
            &url,
            "/batch/task",
            json!({
                "add": [],
                "update": [{
                    "id": task_id,
                    "projectId": project_id,
                    "repeatFrom": repeat_from.wire_value(),
                }],
                "delete": [],
                "addAttachments": [],
                "updateAttachments": [],
            }),
        )
        .await?;
        Ok(())
    }

    /// The task's change history (creations, edits, completions). `skip`
    /// pages through older entries.
    pub async fn get_task_activity(
        &self,
        task_id: &str,
        skip: Option<u32>,
    ) -> ApiResult<serde_json::Value> {
        let url = format!(
            "{}/{}?skip={}",
            ACTIVITY_URL,
            task_id,
            skip.unwrap_or(0)
        );
        let response = self
            .http
            .get(&url)
            .header("Cookie", format!("t={}", self.session_token))
            .header("x-device", device_descriptor())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "/task/activity", body));
        }
        Ok(response.json().await?)
    }
}

/// Device descriptor the web client sends; the id only has to be stable for
/// the session.
fn device_descriptor() -> String {
    let id = format!("6490{}", Uuid::new_v4().simple());
    json!({
        "platform": "web",
        "os": "OS X",
        "device": "Firefox 95.0",
        "name": "unofficial api!",
        "version": 4531,
        "id": &id[..24],
        "channel": "website",
        "campaign": "",
        "websocket": "",
    })
    .to_string()
}
