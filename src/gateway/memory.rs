//! In-process gateway.
//!
//! Honours the same contract as the REST backend (per-user ownership,
//! cascading deletes, sibling order) without any I/O. Clones share one store,
//! so a test can keep a handle for seeding and assertions while the registry
//! and tree manager hold another.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{GatewayError, SyncGateway};
use crate::models::*;
use crate::tree::Forest;

struct StoredList {
    id: ListId,
    owner: i64,
    name: String,
    forest: Forest,
}

#[derive(Default)]
struct Store {
    session: Option<Identity>,
    lists: Vec<StoredList>,
    next_list_id: ListId,
    next_task_id: TaskId,
    latency: Duration,
    fail_next: Option<GatewayError>,
    calls: usize,
}

impl Store {
    fn owned(&self, user: &Identity, list_id: ListId) -> Result<&StoredList, GatewayError> {
        self.lists
            .iter()
            .find(|l| l.id == list_id && l.owner == user.user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("List {} not found", list_id)))
    }

    fn owned_mut(
        &mut self,
        user: &Identity,
        list_id: ListId,
    ) -> Result<&mut StoredList, GatewayError> {
        self.lists
            .iter_mut()
            .find(|l| l.id == list_id && l.owner == user.user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("List {} not found", list_id)))
    }

    fn bump_ids(&mut self, list_id: Option<ListId>, task_id: Option<TaskId>) {
        if let Some(id) = list_id {
            self.next_list_id = self.next_list_id.max(id + 1);
        }
        if let Some(id) = task_id {
            self.next_task_id = self.next_task_id.max(id + 1);
        }
    }
}

fn summary(list: &StoredList) -> TaskList {
    TaskList {
        id: list.id,
        name: list.name.clone(),
        task_count: list.forest.len(),
    }
}

fn checked_name(name: &str) -> Result<String, GatewayError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(GatewayError::Rejected("Name must not be empty".to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

fn task_not_found(task_id: TaskId) -> GatewayError {
    GatewayError::NotFound(format!("Task {} not found", task_id))
}

/// Gateway backed by an in-memory store.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    store: Arc<Mutex<Store>>,
}

impl MemoryGateway {
    /// An empty store with no session.
    pub fn new() -> Self {
        let gateway = Self::default();
        {
            let mut store = gateway.lock();
            store.next_list_id = 1;
            store.next_task_id = 1;
        }
        gateway
    }

    /// An empty store with `identity` already signed in.
    pub fn signed_in(identity: Identity) -> Self {
        let gateway = Self::new();
        gateway.sign_in(identity);
        gateway
    }

    pub fn sign_in(&self, identity: Identity) {
        self.lock().session = Some(identity);
    }

    pub fn sign_out(&self) {
        self.lock().session = None;
    }

    /// Insert a list with a fixed id, owned by the signed-in user.
    pub fn seed_list(&self, id: ListId, name: &str) -> TaskList {
        let mut store = self.lock();
        let owner = store.session.as_ref().map(|s| s.user_id).unwrap_or_default();
        store.lists.push(StoredList {
            id,
            owner,
            name: name.to_string(),
            forest: Forest::new(id),
        });
        store.bump_ids(Some(id), None);
        TaskList {
            id,
            name: name.to_string(),
            task_count: 0,
        }
    }

    /// Insert a task with a fixed id, appended as the last child of `parent_id`.
    ///
    /// # Panics
    /// If the list or parent does not exist, or the id is taken.
    pub fn seed_task(
        &self,
        list_id: ListId,
        parent_id: Option<TaskId>,
        id: TaskId,
        name: &str,
    ) -> Task {
        let mut store = self.lock();
        let task = Task {
            id,
            name: name.to_string(),
            is_completed: false,
            list_id,
            parent_id,
            date: None,
        };
        let list = store
            .lists
            .iter_mut()
            .find(|l| l.id == list_id)
            .expect("seed_task: list must exist");
        list.forest
            .insert(task.clone())
            .expect("seed_task: parent must exist and id must be free");
        store.bump_ids(None, Some(id));
        task
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make the next call fail with `error`, after any configured latency.
    pub fn fail_next(&self, error: GatewayError) {
        self.lock().fail_next = Some(error);
    }

    /// Number of gateway calls received so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// The stored forest of a list, regardless of session.
    pub fn stored_forest(&self, list_id: ListId) -> Option<Vec<TaskNode>> {
        self.lock()
            .lists
            .iter()
            .find(|l| l.id == list_id)
            .map(|l| l.forest.to_nodes())
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().expect("memory gateway lock poisoned")
    }

    /// Common prologue of every call: count it, wait out the latency, apply
    /// any injected failure and resolve the session user.
    async fn enter(&self) -> Result<Identity, GatewayError> {
        let (latency, failure) = {
            let mut store = self.lock();
            store.calls += 1;
            (store.latency, store.fail_next.take())
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }
        self.lock()
            .session
            .clone()
            .ok_or(GatewayError::Unauthenticated)
    }
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn fetch_lists(&self) -> Result<Vec<TaskList>, GatewayError> {
        let user = self.enter().await?;
        let store = self.lock();
        Ok(store
            .lists
            .iter()
            .filter(|l| l.owner == user.user_id)
            .map(summary)
            .collect())
    }

    async fn create_list(&self, name: &str) -> Result<TaskList, GatewayError> {
        let user = self.enter().await?;
        let name = checked_name(name)?;
        let mut store = self.lock();
        let id = store.next_list_id;
        store.next_list_id += 1;
        let list = StoredList {
            id,
            owner: user.user_id,
            name,
            forest: Forest::new(id),
        };
        let created = summary(&list);
        store.lists.push(list);
        Ok(created)
    }

    async fn rename_list(&self, list_id: ListId, name: &str) -> Result<TaskList, GatewayError> {
        let user = self.enter().await?;
        let name = checked_name(name)?;
        let mut store = self.lock();
        let list = store.owned_mut(&user, list_id)?;
        list.name = name;
        Ok(summary(list))
    }

    async fn delete_list(&self, list_id: ListId) -> Result<(), GatewayError> {
        let user = self.enter().await?;
        let mut store = self.lock();
        store.owned(&user, list_id)?;
        store.lists.retain(|l| l.id != list_id);
        Ok(())
    }

    async fn fetch_forest(&self, list_id: ListId) -> Result<Vec<TaskNode>, GatewayError> {
        let user = self.enter().await?;
        let store = self.lock();
        Ok(store.owned(&user, list_id)?.forest.to_nodes())
    }

    async fn fetch_subtree(
        &self,
        list_id: ListId,
        task_id: TaskId,
    ) -> Result<TaskNode, GatewayError> {
        let user = self.enter().await?;
        let store = self.lock();
        store
            .owned(&user, list_id)?
            .forest
            .subtree(task_id)
            .ok_or_else(|| task_not_found(task_id))
    }

    async fn create_task(
        &self,
        list_id: ListId,
        input: &CreateTaskInput,
    ) -> Result<Task, GatewayError> {
        let user = self.enter().await?;
        let name = checked_name(&input.name)?;
        let mut store = self.lock();
        let id = store.next_task_id;
        let list = store.owned_mut(&user, list_id)?;
        if let Some(parent_id) = input.parent_id {
            if !list.forest.contains(parent_id) {
                return Err(GatewayError::NotFound(format!(
                    "Parent task {} not found",
                    parent_id
                )));
            }
        }
        let task = Task {
            id,
            name,
            is_completed: false,
            list_id,
            parent_id: input.parent_id,
            date: None,
        };
        list.forest
            .insert(task.clone())
            .map_err(|e| GatewayError::Server(e.to_string()))?;
        store.next_task_id += 1;
        Ok(task)
    }

    async fn update_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        input: &UpdateTaskInput,
    ) -> Result<Task, GatewayError> {
        let user = self.enter().await?;
        let name = input.name.as_deref().map(checked_name).transpose()?;
        let mut store = self.lock();
        let list = store.owned_mut(&user, list_id)?;
        let mut record = list
            .forest
            .get(task_id)
            .cloned()
            .ok_or_else(|| task_not_found(task_id))?;
        if let Some(name) = name {
            record.name = name;
        }
        if let Some(date) = input.date {
            record.date = date;
        }
        if let Some(done) = input.is_completed {
            record.is_completed = done;
        }
        list.forest
            .apply_record(&record)
            .map_err(|e| GatewayError::Server(e.to_string()))?;
        Ok(record)
    }

    async fn delete_task(&self, list_id: ListId, task_id: TaskId) -> Result<(), GatewayError> {
        let user = self.enter().await?;
        let mut store = self.lock();
        store
            .owned_mut(&user, list_id)?
            .forest
            .remove_subtree(task_id)
            .map(|_| ())
            .ok_or_else(|| task_not_found(task_id))
    }

    async fn move_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        new_list_id: ListId,
    ) -> Result<(), GatewayError> {
        let user = self.enter().await?;
        let mut store = self.lock();
        if list_id == new_list_id {
            return Err(GatewayError::Rejected(
                "Task is already in that list".to_string(),
            ));
        }
        let target = &store.owned(&user, new_list_id)?.forest;
        let source = &store.owned(&user, list_id)?.forest;
        let task = source.get(task_id).ok_or_else(|| task_not_found(task_id))?;
        if task.parent_id.is_some() {
            return Err(GatewayError::Rejected(
                "Only root tasks can move between lists".to_string(),
            ));
        }
        let moving = std::iter::once(task_id).chain(source.descendants(task_id));
        if let Some(clash) = moving.into_iter().find(|&id| target.contains(id)) {
            return Err(GatewayError::Server(format!(
                "Task {} already exists in list {}",
                clash, new_list_id
            )));
        }

        let subtree = store
            .owned_mut(&user, list_id)?
            .forest
            .remove_subtree(task_id)
            .ok_or_else(|| task_not_found(task_id))?;
        store
            .owned_mut(&user, new_list_id)?
            .forest
            .graft(None, subtree)
            .map_err(|e| GatewayError::Server(e.to_string()))
    }

    async fn reorder_task(
        &self,
        list_id: ListId,
        task_id: TaskId,
        index: usize,
    ) -> Result<(), GatewayError> {
        let user = self.enter().await?;
        let mut store = self.lock();
        store
            .owned_mut(&user, list_id)?
            .forest
            .reorder(task_id, index)
            .map(|_| ())
            .map_err(|_| task_not_found(task_id))
    }
}
