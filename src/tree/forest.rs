//! Arena representation of one list's task forest.
//!
//! Nodes live in a flat map keyed by task id with parent and ordered child-id
//! links, so lookups anywhere in the hierarchy are a single map access.
//! Depth is derived by walking the parent chain.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::models::{ListId, Task, TaskId, TaskNode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForestError {
    #[error("duplicate task id {0}")]
    DuplicateId(TaskId),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("parent task {0} not found")]
    ParentNotFound(TaskId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    task: Task,
    children: Vec<TaskId>,
}

/// The ordered root tasks of a list and all their descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forest {
    list_id: ListId,
    nodes: HashMap<TaskId, Node>,
    roots: Vec<TaskId>,
}

impl Forest {
    pub fn new(list_id: ListId) -> Self {
        Self {
            list_id,
            nodes: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Build a forest from the nested wire shape.
    ///
    /// `list_id` and `parent_id` of every node are taken from its position in
    /// the tree, not from the record itself.
    pub fn from_nodes(list_id: ListId, nodes: Vec<TaskNode>) -> Result<Self, ForestError> {
        let mut forest = Self::new(list_id);
        for node in nodes {
            forest.graft(None, node)?;
        }
        Ok(forest)
    }

    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.nodes.get(&id).map(|n| &n.task)
    }

    /// The parent task of `id`. `None` for root tasks and unknown ids.
    pub fn parent_of(&self, id: TaskId) -> Option<&Task> {
        let parent_id = self.get(id)?.parent_id?;
        self.get(parent_id)
    }

    pub fn depth(&self, id: TaskId) -> Option<usize> {
        let mut task = self.get(id)?;
        let mut depth = 0;
        while let Some(parent_id) = task.parent_id {
            task = self.get(parent_id)?;
            depth += 1;
        }
        Some(depth)
    }

    pub fn roots(&self) -> &[TaskId] {
        &self.roots
    }

    /// Ordered child ids of `parent`, or the roots when `parent` is `None`.
    pub fn children(&self, parent: Option<TaskId>) -> Option<&[TaskId]> {
        match parent {
            None => Some(&self.roots),
            Some(id) => self.nodes.get(&id).map(|n| n.children.as_slice()),
        }
    }

    /// Ordered ids of the sibling group `id` belongs to, `id` included.
    pub fn siblings_of(&self, id: TaskId) -> Option<&[TaskId]> {
        let task = self.get(id)?;
        self.children(task.parent_id)
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.siblings_of(id)?.iter().position(|&s| s == id)
    }

    /// Every descendant of `id` in depth-first order, `id` excluded.
    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut stack: Vec<TaskId> = match self.nodes.get(&id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Append a single task as the last child of `task.parent_id`.
    pub fn insert(&mut self, task: Task) -> Result<(), ForestError> {
        let parent = task.parent_id;
        self.graft(parent, TaskNode::leaf(task))
    }

    /// Append a whole subtree as the last child of `parent` (or as the last
    /// root). Nothing is inserted if any id collides.
    pub fn graft(&mut self, parent: Option<TaskId>, node: TaskNode) -> Result<(), ForestError> {
        if let Some(parent_id) = parent {
            if !self.nodes.contains_key(&parent_id) {
                return Err(ForestError::ParentNotFound(parent_id));
            }
        }
        self.check_ids(&node, &HashSet::new())?;

        let id = node.task.id;
        self.attach(parent, node);
        match parent {
            None => self.roots.push(id),
            Some(parent_id) => {
                if let Some(p) = self.nodes.get_mut(&parent_id) {
                    p.children.push(id);
                }
            }
        }
        Ok(())
    }

    /// Detach `id` and its descendants, returning them in the nested shape.
    pub fn remove_subtree(&mut self, id: TaskId) -> Option<TaskNode> {
        let parent = self.get(id)?.parent_id;
        let siblings = match parent {
            None => &mut self.roots,
            Some(parent_id) => &mut self.nodes.get_mut(&parent_id)?.children,
        };
        siblings.retain(|&s| s != id);
        self.detach(id)
    }

    /// Replace the subtree rooted at `node.task.id` in place, keeping its
    /// parent and sibling position.
    pub fn replace_subtree(&mut self, node: TaskNode) -> Result<(), ForestError> {
        let id = node.task.id;
        let parent = self.get(id).ok_or(ForestError::NotFound(id))?.parent_id;
        let mut replaced: HashSet<TaskId> = self.descendants(id).into_iter().collect();
        replaced.insert(id);
        self.check_ids(&node, &replaced)?;

        for old in replaced {
            self.nodes.remove(&old);
        }
        self.attach(parent, node);
        Ok(())
    }

    /// Overwrite the scalar fields of an existing task with a server record.
    /// Structure (`parent_id`, `list_id`, children) is left untouched.
    pub fn apply_record(&mut self, record: &Task) -> Result<(), ForestError> {
        let node = self
            .nodes
            .get_mut(&record.id)
            .ok_or(ForestError::NotFound(record.id))?;
        node.task.name = record.name.clone();
        node.task.is_completed = record.is_completed;
        node.task.date = record.date;
        Ok(())
    }

    /// Move `id` to `new_index` within its sibling group, clamping the index.
    /// Returns the index actually applied.
    pub fn reorder(&mut self, id: TaskId, new_index: usize) -> Result<usize, ForestError> {
        let parent = self.get(id).ok_or(ForestError::NotFound(id))?.parent_id;
        let siblings = match parent {
            None => &mut self.roots,
            Some(parent_id) => {
                &mut self
                    .nodes
                    .get_mut(&parent_id)
                    .ok_or(ForestError::ParentNotFound(parent_id))?
                    .children
            }
        };
        let current = siblings
            .iter()
            .position(|&s| s == id)
            .ok_or(ForestError::NotFound(id))?;
        let target = clamp_index(new_index, siblings.len());
        let moved = siblings.remove(current);
        siblings.insert(target, moved);
        Ok(target)
    }

    pub fn subtree(&self, id: TaskId) -> Option<TaskNode> {
        let node = self.nodes.get(&id)?;
        Some(TaskNode {
            task: node.task.clone(),
            subtasks: node
                .children
                .iter()
                .filter_map(|&child| self.subtree(child))
                .collect(),
        })
    }

    /// The whole forest in the nested wire shape.
    pub fn to_nodes(&self) -> Vec<TaskNode> {
        self.roots.iter().filter_map(|&id| self.subtree(id)).collect()
    }

    /// Tasks in display order paired with their depth.
    pub fn flatten(&self) -> Vec<(&Task, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(TaskId, usize)> = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push((&node.task, depth));
                stack.extend(node.children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        out
    }

    fn check_ids(&self, node: &TaskNode, replaceable: &HashSet<TaskId>) -> Result<(), ForestError> {
        let mut seen = HashSet::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            let id = n.task.id;
            if !seen.insert(id) || (self.nodes.contains_key(&id) && !replaceable.contains(&id)) {
                return Err(ForestError::DuplicateId(id));
            }
            stack.extend(n.subtasks.iter());
        }
        Ok(())
    }

    /// Insert `node` and its descendants into the arena, normalizing list and
    /// parent links. Does not touch the parent's child list.
    fn attach(&mut self, parent: Option<TaskId>, node: TaskNode) {
        let TaskNode { mut task, subtasks } = node;
        let id = task.id;
        task.list_id = self.list_id;
        task.parent_id = parent;
        let children = subtasks.iter().map(|s| s.task.id).collect();
        self.nodes.insert(id, Node { task, children });
        for sub in subtasks {
            self.attach(Some(id), sub);
        }
    }

    fn detach(&mut self, id: TaskId) -> Option<TaskNode> {
        let Node { task, children } = self.nodes.remove(&id)?;
        Some(TaskNode {
            task,
            subtasks: children.into_iter().filter_map(|c| self.detach(c)).collect(),
        })
    }
}

/// Clamp a destination index into `[0, len - 1]`.
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}
