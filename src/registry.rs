//! List registry: the session user's lists and which one is current.
//!
//! The registry owns list summaries only. Task data belongs to the
//! [`TaskTreeManager`], which the registry drives when the current list
//! changes or disappears.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{validate_name, Error, Result};
use crate::gateway::{bounded, SyncGateway};
use crate::models::*;
use crate::tree::{TaskTreeManager, DEFAULT_TIMEOUT};

#[derive(Default)]
struct RegistryState {
    lists: Vec<TaskList>,
    current: Option<ListId>,
}

pub struct ListRegistry {
    gateway: Arc<dyn SyncGateway>,
    identity: Option<Identity>,
    tree: Arc<TaskTreeManager>,
    timeout: Duration,
    state: Mutex<RegistryState>,
}

impl ListRegistry {
    pub fn new(
        gateway: Arc<dyn SyncGateway>,
        identity: Option<Identity>,
        tree: Arc<TaskTreeManager>,
    ) -> Self {
        Self {
            gateway,
            identity,
            tree,
            timeout: DEFAULT_TIMEOUT,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tree(&self) -> &Arc<TaskTreeManager> {
        &self.tree
    }

    /// Fetch every list of the session user, replacing the local collection.
    pub async fn fetch_all(&self) -> Result<Vec<TaskList>> {
        self.require_identity()?;
        let lists = bounded(self.timeout, self.gateway.fetch_lists()).await?;
        tracing::debug!("Fetched {} lists", lists.len());

        let lost_current = {
            let mut state = self.state();
            state.lists = lists;
            match state.current {
                Some(id) if !state.lists.iter().any(|l| l.id == id) => {
                    state.current = None;
                    true
                }
                _ => false,
            }
        };
        if lost_current {
            self.tree.unload();
        }
        Ok(self.lists())
    }

    /// Create a list. Not retried on failure.
    pub async fn create(&self, name: &str) -> Result<TaskList> {
        let name = validate_name(name)?;
        self.require_identity()?;
        let created = bounded(self.timeout, self.gateway.create_list(&name)).await?;
        tracing::info!("Created list {} ({})", created.id, created.name);
        self.state().lists.push(created.clone());
        Ok(created)
    }

    /// Rename a list optimistically; the prior name is restored if the server
    /// rejects the change.
    pub async fn rename(&self, list_id: ListId, name: &str) -> Result<TaskList> {
        let name = validate_name(name)?;
        self.require_identity()?;

        let previous = {
            let mut state = self.state();
            let list = state
                .lists
                .iter_mut()
                .find(|l| l.id == list_id)
                .ok_or_else(|| list_not_found(list_id))?;
            std::mem::replace(&mut list.name, name.clone())
        };

        match bounded(self.timeout, self.gateway.rename_list(list_id, &name)).await {
            Ok(renamed) => {
                self.set_name(list_id, renamed.name.clone());
                Ok(self.get(list_id).unwrap_or(renamed))
            }
            Err(e) => {
                tracing::warn!("Rename of list {} failed, restoring '{}': {}", list_id, previous, e);
                self.set_name(list_id, previous);
                Err(e)
            }
        }
    }

    /// Delete a list once the server confirms. Deleting the current list
    /// clears the selection and unloads its forest.
    pub async fn remove(&self, list_id: ListId) -> Result<()> {
        self.require_identity()?;
        bounded(self.timeout, self.gateway.delete_list(list_id)).await?;

        let was_current = {
            let mut state = self.state();
            state.lists.retain(|l| l.id != list_id);
            if state.current == Some(list_id) {
                state.current = None;
                true
            } else {
                false
            }
        };
        if was_current {
            self.tree.unload();
        }
        tracing::info!("Removed list {}", list_id);
        Ok(())
    }

    /// Make `list_id` current and load its forest. No-op if already current.
    pub async fn set_current(&self, list_id: ListId) -> Result<()> {
        self.require_identity()?;
        if self.current() == Some(list_id) {
            return Ok(());
        }
        self.tree.load(list_id).await?;
        self.state().current = Some(list_id);
        tracing::debug!("Current list is now {}", list_id);
        Ok(())
    }

    pub fn current(&self) -> Option<ListId> {
        self.state().current
    }

    pub fn current_list(&self) -> Option<TaskList> {
        self.get(self.current()?)
    }

    /// One list summary, with its task count derived from the loaded forest
    /// when it is the loaded list.
    pub fn get(&self, list_id: ListId) -> Option<TaskList> {
        self.lists().into_iter().find(|l| l.id == list_id)
    }

    /// Snapshot of all lists in server order.
    pub fn lists(&self) -> Vec<TaskList> {
        let mut lists = self.state().lists.clone();
        if let Some(loaded) = self.tree.loaded_list() {
            let count = self.tree.task_count();
            if let Some(list) = lists.iter_mut().find(|l| l.id == loaded) {
                list.task_count = count;
            }
        }
        lists
    }

    fn set_name(&self, list_id: ListId, name: String) {
        if let Some(list) = self.state().lists.iter_mut().find(|l| l.id == list_id) {
            list.name = name;
        }
    }

    fn require_identity(&self) -> Result<&Identity> {
        self.identity.as_ref().ok_or(Error::Unauthenticated)
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().expect("list registry lock poisoned")
    }
}

fn list_not_found(list_id: ListId) -> Error {
    Error::NotFound(format!("List {} not found", list_id))
}
