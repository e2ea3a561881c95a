//! The persistence boundary the registry and tree manager call.
//!
//! [`SyncGateway`] is the contract; [`HttpGateway`] talks to the REST backend
//! and [`MemoryGateway`] keeps everything in process for tests and demos.

mod envelope;
mod http;
mod memory;

pub use envelope::Envelope;
pub use http::HttpGateway;
pub use memory::MemoryGateway;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Error;
use crate::models::*;

/// Outcomes a gateway call can fail with.
///
/// The variants keep "not found", "validation" and "server error" apart so
/// callers can map them onto their own taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Unauthorized: session missing or expired")]
    Unauthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    Rejected(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Server unreachable: {0}")]
    Unavailable(String),

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// Request/response interface to the list and task store.
///
/// Implementations are expected to scope every call to the session user and
/// to return lists and forests in their persisted order.
#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn fetch_lists(&self) -> Result<Vec<TaskList>, GatewayError>;

    async fn create_list(&self, name: &str) -> Result<TaskList, GatewayError>;

    async fn rename_list(&self, list_id: ListId, name: &str) -> Result<TaskList, GatewayError>;

    async fn delete_list(&self, list_id: ListId) -> Result<(), GatewayError>;

    /// The ordered forest of a list.
    async fn fetch_forest(&self, list_id: ListId) -> Result<Vec<TaskNode>, GatewayError>;

    /// One task with its full subtree.
    async fn fetch_subtree(&self, list_id: ListId, task_id: TaskId)
        -> Result<TaskNode, GatewayError>;

    async fn create_task(
        &self,
        list_id: ListId,
        input: &CreateTaskInput,
    ) -> Result<Task, GatewayError>;

    async fn update_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        input: &UpdateTaskInput,
    ) -> Result<Task, GatewayError>;

    /// Delete a task and all of its descendants.
    async fn delete_task(&self, list_id: ListId, task_id: TaskId) -> Result<(), GatewayError>;

    /// Move a root task, with its subtree, to the root of another list.
    async fn move_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        new_list_id: ListId,
    ) -> Result<(), GatewayError>;

    async fn reorder_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        index: usize,
    ) -> Result<(), GatewayError>;
}

/// Await a gateway call for at most `limit`.
///
/// Expiry is reported as [`Error::Timeout`], distinct from any rejection the
/// gateway itself returns.
pub async fn bounded<T, F>(limit: Duration, call: F) -> crate::Result<T>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => {
            tracing::warn!("Gateway call timed out after {:?}", limit);
            Err(Error::Timeout(limit))
        }
    }
}
