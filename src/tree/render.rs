//! ASCII tree rendering for task forests.

use crate::models::{Task, TaskNode};

const OPEN: char = '○';
const DONE: char = '●';

fn completion_symbol(task: &Task) -> char {
    if task.is_completed {
        DONE
    } else {
        OPEN
    }
}

/// Render a forest as ASCII art with completion symbols and task ids.
///
/// Example output:
/// ```text
/// ○ Buy milk #10
/// ├── ● 2% milk #11
/// └── ○ Oat milk #12
///     └── ○ Check the brand #13
/// ○ Bake bread #14
/// ```
pub fn render_forest(nodes: &[TaskNode]) -> String {
    let mut output = String::new();
    for node in nodes {
        render_node(&mut output, node, "", true, true);
    }
    output
}

fn render_node(output: &mut String, node: &TaskNode, prefix: &str, is_last: bool, is_root: bool) {
    if !is_root {
        let branch = if is_last { "└── " } else { "├── " };
        output.push_str(prefix);
        output.push_str(branch);
    }
    output.push(completion_symbol(&node.task));
    output.push(' ');
    output.push_str(&node.task.name);
    output.push_str(&format!(" #{}", node.task.id));
    if let Some(date) = node.task.date {
        output.push_str(&format!(" ({})", date));
    }
    output.push('\n');

    let child_prefix = if is_root {
        String::new()
    } else {
        let continuation = if is_last { "    " } else { "│   " };
        format!("{}{}", prefix, continuation)
    };

    for (i, child) in node.subtasks.iter().enumerate() {
        let child_is_last = i == node.subtasks.len() - 1;
        render_node(output, child, &child_prefix, child_is_last, false);
    }
}
