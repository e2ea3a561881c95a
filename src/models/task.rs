use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ListId;

/// Server-issued task identifier.
pub type TaskId = i64;

/// A single task record, without its subtasks.
///
/// `parent_id` is `None` for root tasks. Depth is never stored; it is derived
/// from the parent chain by the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
    pub list_id: ListId,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// A task with its nested subtasks, used for forest responses.
///
/// The `task` fields are flattened into the JSON object, with an additional
/// `subtasks` array containing nested `TaskNode` objects in sibling order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    #[serde(default)]
    pub subtasks: Vec<TaskNode>,
}

impl TaskNode {
    pub fn leaf(task: Task) -> Self {
        Self {
            task,
            subtasks: Vec::new(),
        }
    }

    /// Number of tasks in this subtree, including the node itself.
    pub fn len(&self) -> usize {
        1 + self.subtasks.iter().map(TaskNode::len).sum::<usize>()
    }
}

/// Input for creating a task. `parent_id: None` creates a root task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
}

/// Input for updating a task. All fields are optional for partial updates.
///
/// `date` is double-wrapped so that `Some(None)` clears the date while
/// `None` leaves it untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub date: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

/// Input for moving a root task to another list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveTaskInput {
    pub new_list_id: ListId,
}

/// Input for reordering a task among its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderTaskInput {
    pub index: usize,
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(
        value: &Option<Option<T>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T: Deserialize<'de>, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<T>>, D::Error> {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
