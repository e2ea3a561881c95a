use serde::{Deserialize, Serialize};

/// Server-issued list identifier.
pub type ListId = i64;

/// A named, user-owned collection of tasks.
///
/// `task_count` is derived: the server may report it, and the registry
/// overrides it for the current list from the loaded forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: ListId,
    pub name: String,
    #[serde(default)]
    pub task_count: usize,
}

/// Input for creating or renaming a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListNameInput {
    pub name: String,
}
