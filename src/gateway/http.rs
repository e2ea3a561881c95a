//! HTTP gateway for the tasknest REST backend.
//!
//! The session is cookie based: `login` stores the session cookie in the
//! client's cookie jar and every later call carries it implicitly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method, RequestBuilder};
use serde::Serialize;

use super::{Envelope, GatewayError, SyncGateway};
use crate::config::ClientConfig;
use crate::models::*;

/// HTTP client for the tasknest API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    client: Client,
}

impl HttpGateway {
    /// Create with an explicit base URL, e.g. `http://127.0.0.1:5000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        Self::build(base_url.into(), Client::builder())
    }

    /// Create a client whose every request, auth calls included, gives up
    /// after `timeout`. An expired request surfaces as `Unavailable`.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Self::build(base_url.into(), Client::builder().timeout(timeout))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        Self::with_timeout(config.base_url.clone(), config.request_timeout())
    }

    fn build(base_url: String, builder: ClientBuilder) -> Result<Self, GatewayError> {
        let client = builder
            .cookie_store(true)
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    /// Send a request and normalize whatever comes back into an [`Envelope`].
    ///
    /// Transport failures never escape as errors here; they become an
    /// envelope with status `0`.
    async fn send(&self, request: RequestBuilder) -> Envelope {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Request failed before a response arrived: {}", e);
                return Envelope::unreachable(e.to_string());
            }
        };
        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => Envelope::from_text(status, &text),
            Err(e) => Envelope::unreachable(e.to_string()),
        }
    }

    async fn get(&self, path: &str) -> Envelope {
        tracing::debug!("GET {}", path);
        self.send(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Envelope {
        tracing::debug!("POST {}", path);
        self.send(self.request(Method::POST, path).json(body)).await
    }

    async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Envelope {
        tracing::debug!("PUT {}", path);
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    async fn delete(&self, path: &str) -> Envelope {
        tracing::debug!("DELETE {}", path);
        self.send(self.request(Method::DELETE, path)).await
    }

    // ============================================================
    // Auth Operations
    // ============================================================

    /// Log in and keep the session cookie for later calls.
    pub async fn login(&self, credentials: &Credentials) -> Result<Identity, GatewayError> {
        self.post("/auth/login", credentials).await.into_result()
    }

    /// Register a new account. The server also opens a session for it.
    pub async fn register(&self, credentials: &Credentials) -> Result<Identity, GatewayError> {
        self.post("/auth/register", credentials).await.into_result()
    }

    pub async fn logout(&self) -> Result<(), GatewayError> {
        self.post("/auth/logout", &serde_json::json!({}))
            .await
            .into_empty()
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    // ============================================================
    // List Operations
    // ============================================================

    async fn fetch_lists(&self) -> Result<Vec<TaskList>, GatewayError> {
        self.get("/lists/all").await.into_result()
    }

    async fn create_list(&self, name: &str) -> Result<TaskList, GatewayError> {
        let input = ListNameInput {
            name: name.to_string(),
        };
        self.post("/lists", &input).await.into_result()
    }

    async fn rename_list(&self, list_id: ListId, name: &str) -> Result<TaskList, GatewayError> {
        let input = ListNameInput {
            name: name.to_string(),
        };
        self.put(&format!("/lists/{}", list_id), &input)
            .await
            .into_result()
    }

    async fn delete_list(&self, list_id: ListId) -> Result<(), GatewayError> {
        self.delete(&format!("/lists/{}", list_id))
            .await
            .into_empty()
    }

    // ============================================================
    // Task Operations
    // ============================================================

    async fn fetch_forest(&self, list_id: ListId) -> Result<Vec<TaskNode>, GatewayError> {
        self.get(&format!("/lists/{}/tasks", list_id))
            .await
            .into_result()
    }

    async fn fetch_subtree(
        &self,
        list_id: ListId,
        task_id: TaskId,
    ) -> Result<TaskNode, GatewayError> {
        self.get(&format!("/lists/{}/tasks/{}", list_id, task_id))
            .await
            .into_result()
    }

    async fn create_task(
        &self,
        list_id: ListId,
        input: &CreateTaskInput,
    ) -> Result<Task, GatewayError> {
        self.post(&format!("/lists/{}/tasks", list_id), input)
            .await
            .into_result()
    }

    async fn update_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        input: &UpdateTaskInput,
    ) -> Result<Task, GatewayError> {
        self.put(&format!("/lists/{}/tasks/{}", list_id, task_id), input)
            .await
            .into_result()
    }

    async fn delete_task(&self, list_id: ListId, task_id: TaskId) -> Result<(), GatewayError> {
        self.delete(&format!("/lists/{}/tasks/{}", list_id, task_id))
            .await
            .into_empty()
    }

    async fn move_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        new_list_id: ListId,
    ) -> Result<(), GatewayError> {
        self.put(
            &format!("/lists/{}/tasks/{}/move", list_id, task_id),
            &MoveTaskInput { new_list_id },
        )
        .await
        .into_empty()
    }

    async fn reorder_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        index: usize,
    ) -> Result<(), GatewayError> {
        self.put(
            &format!("/lists/{}/tasks/{}/reorder", list_id, task_id),
            &ReorderTaskInput { index },
        )
        .await
        .into_empty()
    }
}
