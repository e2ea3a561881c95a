//! Task tree manager: the forest of the loaded list and every mutation on it.
//!
//! Mutations follow confirm-then-commit: preconditions are checked against the
//! in-memory forest, the gateway is called, and the forest changes only once
//! the call succeeded. Mutations pass one at a time through a FIFO gate.
//! Loads do not wait on that gate; instead every applied load bumps a
//! generation counter and any mutation response that arrives for an older
//! generation is discarded.

mod draft;
mod forest;
pub mod render;

pub use draft::Draft;
pub use forest::{clamp_index, Forest, ForestError};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{validate_name, Error, Result};
use crate::gateway::{bounded, SyncGateway};
use crate::models::*;

/// Default bound on a single gateway call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct TreeState {
    forest: Option<Forest>,
    generation: u64,
    pending: Option<&'static str>,
}

/// Snapshot taken when a mutation starts, checked again when it resolves.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    list_id: ListId,
    generation: u64,
}

/// Clears the pending marker however the mutation ends.
struct PendingGuard<'a> {
    manager: &'a TaskTreeManager,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.manager.state().pending = None;
    }
}

/// Owns the task forest of one list at a time.
pub struct TaskTreeManager {
    gateway: Arc<dyn SyncGateway>,
    identity: Option<Identity>,
    timeout: Duration,
    state: Mutex<TreeState>,
    gate: tokio::sync::Mutex<()>,
    load_seq: AtomicU64,
}

impl TaskTreeManager {
    /// Create a manager for the given session user. `None` means no session;
    /// every operation then fails with [`Error::Unauthenticated`].
    pub fn new(gateway: Arc<dyn SyncGateway>, identity: Option<Identity>) -> Self {
        Self {
            gateway,
            identity,
            timeout: DEFAULT_TIMEOUT,
            state: Mutex::new(TreeState::default()),
            gate: tokio::sync::Mutex::new(()),
            load_seq: AtomicU64::new(0),
        }
    }

    /// Override the bound on each gateway call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    // ============================================================
    // Loading
    // ============================================================

    /// Replace the forest with the server's forest for `list_id`.
    ///
    /// If another load is issued before this one resolves, this one is
    /// discarded and fails with [`Error::Superseded`].
    pub async fn load(&self, list_id: ListId) -> Result<()> {
        self.require_identity()?;
        let token = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Loading forest of list {} (request {})", list_id, token);

        let nodes = bounded(self.timeout, self.gateway.fetch_forest(list_id)).await?;

        if self.load_seq.load(Ordering::SeqCst) != token {
            tracing::warn!("Discarding stale forest of list {} (request {})", list_id, token);
            return Err(Error::Superseded);
        }
        let forest = Forest::from_nodes(list_id, nodes).map_err(|e| {
            tracing::error!("Server forest for list {} is malformed: {}", list_id, e);
            Error::SyncFailure(e.to_string())
        })?;

        let mut state = self.state();
        // unload() bumps the token before taking this lock
        if self.load_seq.load(Ordering::SeqCst) != token {
            tracing::warn!("Discarding forest of list {}: unloaded while building", list_id);
            return Err(Error::Superseded);
        }
        tracing::info!("Loaded list {} with {} tasks", list_id, forest.len());
        state.forest = Some(forest);
        state.generation += 1;
        Ok(())
    }

    /// Drop the forest. Results of in-flight mutations and loads are discarded.
    pub fn unload(&self) {
        self.load_seq.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(forest) = state.forest.take() {
            tracing::debug!("Unloaded list {}", forest.list_id());
        }
        state.generation += 1;
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn loaded_list(&self) -> Option<ListId> {
        self.state().forest.as_ref().map(Forest::list_id)
    }

    pub fn find_by_id(&self, task_id: TaskId) -> Option<Task> {
        self.state().forest.as_ref()?.get(task_id).cloned()
    }

    pub fn find_parent_of(&self, task_id: TaskId) -> Option<Task> {
        self.state().forest.as_ref()?.parent_of(task_id).cloned()
    }

    pub fn depth_of(&self, task_id: TaskId) -> Option<usize> {
        self.state().forest.as_ref()?.depth(task_id)
    }

    /// Ordered child ids of `parent` (roots for `None`).
    pub fn children_of(&self, parent: Option<TaskId>) -> Option<Vec<TaskId>> {
        self.state()
            .forest
            .as_ref()?
            .children(parent)
            .map(<[TaskId]>::to_vec)
    }

    /// The loaded forest in its nested shape; empty when nothing is loaded.
    pub fn snapshot(&self) -> Vec<TaskNode> {
        self.state()
            .forest
            .as_ref()
            .map(Forest::to_nodes)
            .unwrap_or_default()
    }

    /// Tasks in display order with their depth.
    pub fn flatten(&self) -> Vec<(Task, usize)> {
        self.state()
            .forest
            .as_ref()
            .map(|f| f.flatten().into_iter().map(|(t, d)| (t.clone(), d)).collect())
            .unwrap_or_default()
    }

    pub fn task_count(&self) -> usize {
        self.state().forest.as_ref().map(Forest::len).unwrap_or(0)
    }

    /// Name of the mutation currently awaiting the gateway, if any.
    pub fn pending(&self) -> Option<&'static str> {
        self.state().pending
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Create a task. `None` creates a root task; otherwise the task is
    /// appended as the last child of `parent_id`.
    pub async fn create_task(&self, parent_id: Option<TaskId>, name: &str) -> Result<Task> {
        let name = validate_name(name)?;
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (), _pending) = self.begin("create_task", issued, |forest| match parent_id {
            Some(p) if !forest.contains(p) => Err(Error::ParentNotFound(p)),
            _ => Ok(()),
        })?;

        let input = CreateTaskInput { name, parent_id };
        let result = bounded(self.timeout, self.gateway.create_task(ticket.list_id, &input))
            .await
            .map_err(|e| match (e, parent_id) {
                (Error::NotFound(_), Some(p)) => Error::ParentNotFound(p),
                (e, _) => e,
            });

        self.finish(ticket, result, |forest, mut task| {
            task.list_id = ticket.list_id;
            task.parent_id = parent_id;
            let id = task.id;
            forest.insert(task).map_err(|e| Error::SyncFailure(e.to_string()))?;
            tracing::debug!("Created task {} under {:?}", id, parent_id);
            forest
                .get(id)
                .cloned()
                .ok_or_else(|| Error::SyncFailure(format!("task {} vanished", id)))
        })
    }

    /// Persist a draft. A blank draft never reaches the gateway.
    pub async fn submit_draft(&self, draft: Draft) -> Result<Task> {
        let (parent_id, text) = draft.into_parts();
        self.create_task(parent_id, &text).await
    }

    /// Rename a task. An empty name is rejected and the prior name kept.
    pub async fn rename_task(&self, task_id: TaskId, name: &str) -> Result<Task> {
        let name = validate_name(name)?;
        self.update(
            "rename_task",
            task_id,
            UpdateTaskInput {
                name: Some(name),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_date(&self, task_id: TaskId, date: Option<NaiveDate>) -> Result<Task> {
        self.update(
            "set_date",
            task_id,
            UpdateTaskInput {
                date: Some(date),
                ..Default::default()
            },
        )
        .await
    }

    /// Flip the completion flag of one task. Parents and subtasks are not
    /// touched.
    pub async fn toggle_completion(&self, task_id: TaskId) -> Result<Task> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, done, _pending) = self.begin("toggle_completion", issued, |forest| {
            forest
                .get(task_id)
                .map(|t| t.is_completed)
                .ok_or_else(|| task_not_found(task_id))
        })?;

        let input = UpdateTaskInput {
            is_completed: Some(!done),
            ..Default::default()
        };
        let result = bounded(
            self.timeout,
            self.gateway.update_task(ticket.list_id, task_id, &input),
        )
        .await;

        self.finish(ticket, result, |forest, record| apply_update(forest, task_id, record))
    }

    /// Delete a task together with its whole subtree.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<()> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (), _pending) = self.begin("delete_task", issued, |forest| {
            if forest.contains(task_id) {
                Ok(())
            } else {
                Err(task_not_found(task_id))
            }
        })?;

        let result = bounded(self.timeout, self.gateway.delete_task(ticket.list_id, task_id)).await;

        self.finish(ticket, result, |forest, ()| {
            if let Some(removed) = forest.remove_subtree(task_id) {
                tracing::debug!("Deleted task {} and {} descendants", task_id, removed.len() - 1);
            }
            Ok(())
        })
    }

    /// Move a root task and its subtree to the root of another list.
    pub async fn move_task(&self, task_id: TaskId, target_list_id: ListId) -> Result<()> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (), _pending) = self.begin("move_task", issued, |forest| {
            let task = forest.get(task_id).ok_or_else(|| task_not_found(task_id))?;
            if task.parent_id.is_some() {
                return Err(Error::InvalidMove(format!(
                    "task {} is a subtask; only root tasks move between lists",
                    task_id
                )));
            }
            if forest.list_id() == target_list_id {
                return Err(Error::InvalidMove(format!(
                    "task {} is already in list {}",
                    task_id, target_list_id
                )));
            }
            Ok(())
        })?;

        let result = bounded(
            self.timeout,
            self.gateway.move_task(ticket.list_id, task_id, target_list_id),
        )
        .await;

        self.finish(ticket, result, |forest, ()| {
            forest.remove_subtree(task_id);
            tracing::info!("Moved task {} to list {}", task_id, target_list_id);
            Ok(())
        })
    }

    /// Move a task to `new_index` among its siblings. The index is clamped to
    /// the sibling range; the applied index is returned.
    pub async fn reorder_sibling(&self, task_id: TaskId, new_index: usize) -> Result<usize> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (current, target), _pending) = self.begin("reorder_sibling", issued, |forest| {
            let siblings = forest
                .siblings_of(task_id)
                .ok_or_else(|| task_not_found(task_id))?;
            let current = forest
                .position(task_id)
                .ok_or_else(|| task_not_found(task_id))?;
            Ok((current, clamp_index(new_index, siblings.len())))
        })?;

        if current == target {
            return Ok(current);
        }

        let result = bounded(
            self.timeout,
            self.gateway.reorder_task(ticket.list_id, task_id, target),
        )
        .await;

        self.finish(ticket, result, |forest, ()| {
            forest
                .reorder(task_id, target)
                .map_err(|e| Error::SyncFailure(e.to_string()))
        })
    }

    /// Re-fetch one task's subtree from the server and splice it in place.
    pub async fn refresh_task(&self, task_id: TaskId) -> Result<TaskNode> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (), _pending) = self.begin("refresh_task", issued, |forest| {
            if forest.contains(task_id) {
                Ok(())
            } else {
                Err(task_not_found(task_id))
            }
        })?;

        let result = bounded(
            self.timeout,
            self.gateway.fetch_subtree(ticket.list_id, task_id),
        )
        .await;

        self.finish(ticket, result, |forest, node| {
            forest
                .replace_subtree(node)
                .map_err(|e| Error::SyncFailure(e.to_string()))?;
            forest
                .subtree(task_id)
                .ok_or_else(|| task_not_found(task_id))
        })
    }

    // ============================================================
    // Internals
    // ============================================================

    async fn update(
        &self,
        op: &'static str,
        task_id: TaskId,
        input: UpdateTaskInput,
    ) -> Result<Task> {
        let issued = self.generation();
        let _gate = self.gate.lock().await;
        let (ticket, (), _pending) = self.begin(op, issued, |forest| {
            if forest.contains(task_id) {
                Ok(())
            } else {
                Err(task_not_found(task_id))
            }
        })?;

        let result = bounded(
            self.timeout,
            self.gateway.update_task(ticket.list_id, task_id, &input),
        )
        .await;

        self.finish(ticket, result, |forest, record| apply_update(forest, task_id, record))
    }

    fn require_identity(&self) -> Result<&Identity> {
        self.identity.as_ref().ok_or(Error::Unauthenticated)
    }

    fn state(&self) -> MutexGuard<'_, TreeState> {
        self.state.lock().expect("task tree state lock poisoned")
    }

    fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Validate against the current forest and mark the operation pending.
    ///
    /// `issued` is the generation observed when the caller started waiting on
    /// the gate; if a load or unload happened meanwhile the intent no longer
    /// refers to the loaded forest and is dropped.
    fn begin<X>(
        &self,
        op: &'static str,
        issued: u64,
        check: impl FnOnce(&Forest) -> Result<X>,
    ) -> Result<(Ticket, X, PendingGuard<'_>)> {
        self.require_identity()?;
        let mut state = self.state();
        if state.generation != issued {
            tracing::warn!("Dropping queued {}: forest replaced while it waited", op);
            return Err(Error::Superseded);
        }
        let forest = state.forest.as_ref().ok_or(Error::NoListLoaded)?;
        let checked = check(forest)?;
        let ticket = Ticket {
            list_id: forest.list_id(),
            generation: state.generation,
        };
        state.pending = Some(op);
        drop(state);
        tracing::debug!("{} on list {}", op, ticket.list_id);
        Ok((ticket, checked, PendingGuard { manager: self }))
    }

    /// Commit a gateway result to the forest, unless the forest was replaced
    /// while the call was in flight.
    fn finish<R, T>(
        &self,
        ticket: Ticket,
        result: Result<R>,
        apply: impl FnOnce(&mut Forest, R) -> Result<T>,
    ) -> Result<T> {
        let value = result.map_err(|e| {
            tracing::warn!("Gateway rejected mutation on list {}: {}", ticket.list_id, e);
            e
        })?;
        let mut state = self.state();
        if state.generation != ticket.generation {
            tracing::warn!(
                "Discarding response for list {}: forest replaced while in flight",
                ticket.list_id
            );
            return Err(Error::Superseded);
        }
        let forest = state.forest.as_mut().ok_or(Error::Superseded)?;
        apply(forest, value)
    }
}

fn task_not_found(task_id: TaskId) -> Error {
    Error::NotFound(format!("Task {} not found", task_id))
}

fn apply_update(forest: &mut Forest, task_id: TaskId, mut record: Task) -> Result<Task> {
    record.id = task_id;
    forest
        .apply_record(&record)
        .map_err(|e| Error::SyncFailure(e.to_string()))?;
    forest.get(task_id).cloned().ok_or_else(|| task_not_found(task_id))
}
