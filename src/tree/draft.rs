use crate::models::TaskId;

/// Client-only text for a task that has not been persisted yet.
///
/// A draft has no id. It either becomes a persisted task through
/// [`TaskTreeManager::submit_draft`](super::TaskTreeManager::submit_draft) or
/// is dropped; a blank draft is rejected and never enters the forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    parent_id: Option<TaskId>,
    text: String,
}

impl Draft {
    /// A draft for a new root task.
    pub fn root() -> Self {
        Self::default()
    }

    /// A draft for a new subtask of `parent_id`.
    pub fn child_of(parent_id: TaskId) -> Self {
        Self {
            parent_id: Some(parent_id),
            text: String::new(),
        }
    }

    pub fn parent_id(&self) -> Option<TaskId> {
        self.parent_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub(crate) fn into_parts(self) -> (Option<TaskId>, String) {
        (self.parent_id, self.text)
    }
}
