//! Cross-module tests exercising the auth lifecycle and the filtering path
//! end to end, without a network.

use chrono::Utc;
use std::sync::Arc;
use tempfile::tempdir;

use crate::auth::{cache, is_expired, AuthManager, AuthPhase};
use crate::config::Credentials;
use crate::filter::{self, FilterSpec};
use crate::ticktick::types::{Priority, Task, TaskStatus};

fn credentials() -> Credentials {
    Credentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "http://localhost:8000/callback".to_string(),
        access_token: None,
        oauth_token_json: None,
        user_id: Some("42".to_string()),
        username: None,
        password: None,
    }
}

#[tokio::test]
async fn injected_token_survives_restart_via_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".token-cache.json");

    let mut creds = credentials();
    creds.oauth_token_json = Some(r#"{"access_token":"tok1","expires_in":3600}"#.to_string());
    let manager = AuthManager::new(creds, path.clone());
    assert_eq!(manager.get_valid_token().await.unwrap(), "tok1");

    // A second process without the env payload picks the token up from disk
    let restarted = AuthManager::new(credentials(), path);
    assert_eq!(restarted.phase().await, AuthPhase::Authenticated);
    assert_eq!(restarted.get_valid_token().await.unwrap(), "tok1");
}

#[tokio::test]
async fn injected_expiry_is_enforced_with_margin() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".token-cache.json");

    let record = cache::write_from_injected_json(
        r#"{"access_token":"tok1","expires_in":3600}"#,
        &path,
    )
    .unwrap();

    let issued = Utc::now().timestamp();
    // Valid right up to the 60s safety margin, expired at and past it
    assert!(!is_expired(&record, issued));
    assert!(!is_expired(&record, issued + 3600 - 61));
    assert!(is_expired(&record, issued + 3600 - 60));
    assert!(is_expired(&record, issued + 3601));
}

#[tokio::test]
async fn expired_cached_token_without_refresh_reports_remediation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(".token-cache.json");
    cache::write(
        &path,
        &cache::TokenRecord {
            access_token: "stale".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now().timestamp() - 1,
            scope: String::new(),
            refresh_token: None,
        },
    )
    .unwrap();

    let manager = Arc::new(AuthManager::new(credentials(), path));
    let err = manager.get_valid_token().await.unwrap_err().to_string();
    assert!(err.contains("TICKTICK_OAUTH_TOKEN"));
    assert_eq!(manager.phase().await, AuthPhase::Expired);
}

#[test]
fn filter_pipeline_over_provider_shaped_tasks() {
    let json = r#"[
        {"id": "t1", "projectId": "p1", "title": "Ship release",
         "priority": 5, "status": 2,
         "completedTime": "2024-07-20T09:00:00.000+0000"},
        {"id": "t2", "projectId": "p1", "title": "Write changelog",
         "dueDate": "2024-07-26T10:00:00.000+0000", "timeZone": "Asia/Seoul",
         "priority": 3, "status": 0, "tags": ["release"]},
        {"id": "t3", "projectId": "p2", "title": "Water plants",
         "priority": 0, "status": 0}
    ]"#;
    let tasks: Vec<Task> = serde_json::from_str(json).unwrap();

    let uncompleted = filter::apply(
        tasks.clone(),
        &FilterSpec {
            status: Some(TaskStatus::Uncompleted),
            sort_by_priority: true,
            ..Default::default()
        },
    )
    .unwrap();
    let ids: Vec<&str> = uncompleted.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t2", "t3"]);
    assert_eq!(uncompleted[0].priority, Priority::Medium);

    let tagged = filter::apply(
        tasks,
        &FilterSpec {
            tag_label: Some("RELEASE".to_string()),
            due_start: Some("2024-07-26".to_string()),
            due_end: Some("2024-07-26".to_string()),
            timezone: Some("Asia/Seoul".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, "t2");
}
