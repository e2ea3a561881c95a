//! Domain models for tasknest.
//!
//! # Core Concepts
//!
//! - [`TaskList`]: A named collection of root-level tasks owned by the session user.
//! - [`Task`]: A unit of work. Tasks nest arbitrarily deep; a task belongs to a list
//!   through its root ancestor.
//! - [`TaskNode`]: A task with its ordered subtasks, the wire shape of a forest.
//! - [`Identity`]: The authenticated user, as issued by the auth endpoints.

mod identity;
mod list;
mod task;

pub use identity::*;
pub use list::*;
pub use task::*;
