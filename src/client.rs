//! Typed async client for the journal API.

use crate::analytics::AnalyticsSnapshot;
use crate::models::{
    ChatReply, ChatRequest, CreateTaskRequest, DayCompletion, JournalEntry, JournalRequest,
    Settings, SettingsRequest, Task, UpdateTaskRequest,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            Self::Decode(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.json(self.http.get(self.url("/api/tasks"))).await
    }

    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        self.json(self.http.post(self.url("/api/tasks")).json(request)).await
    }

    pub async fn update_task(
        &self,
        id: u64,
        request: &UpdateTaskRequest,
    ) -> Result<Task, ClientError> {
        self.json(
            self.http
                .patch(self.url(&format!("/api/tasks/{id}")))
                .json(request),
        )
        .await
    }

    pub async fn delete_task(&self, id: u64) -> Result<(), ClientError> {
        self.send(self.http.delete(self.url(&format!("/api/tasks/{id}"))))
            .await
            .map(|_| ())
    }

    pub async fn weekly_tasks(&self) -> Result<Vec<DayCompletion>, ClientError> {
        self.json(self.http.get(self.url("/api/tasks/weekly"))).await
    }

    pub async fn save_journal(&self, request: &JournalRequest) -> Result<JournalEntry, ClientError> {
        self.json(self.http.post(self.url("/api/journal")).json(request)).await
    }

    pub async fn journal_entry(&self, date_key: &str) -> Result<JournalEntry, ClientError> {
        self.json(self.http.get(self.url(&format!("/api/journal/{date_key}"))))
            .await
    }

    pub async fn settings(&self) -> Result<Settings, ClientError> {
        self.json(self.http.get(self.url("/api/settings"))).await
    }

    pub async fn set_daily_goal(&self, daily_goal: i64) -> Result<Settings, ClientError> {
        self.json(
            self.http
                .put(self.url("/api/settings"))
                .json(&SettingsRequest { daily_goal }),
        )
        .await
    }

    pub async fn analytics(&self, goal: Option<i64>) -> Result<AnalyticsSnapshot, ClientError> {
        let mut request = self.http.get(self.url("/api/analytics"));
        if let Some(goal) = goal {
            request = request.query(&[("goal", goal)]);
        }
        self.json(request).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        self.json(self.http.post(self.url("/api/chat")).json(request)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
