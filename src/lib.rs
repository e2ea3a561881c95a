//! tasknest: a client core for nested task lists.
//!
//! - [`registry::ListRegistry`] tracks the session user's lists and the current one.
//! - [`tree::TaskTreeManager`] owns the task forest of the current list and
//!   reconciles every mutation with the backend.
//! - [`gateway::SyncGateway`] is the backend boundary, with an HTTP and an
//!   in-memory implementation.

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod registry;
pub mod tree;

pub use error::{Error, Result};
