//! Tasks
//!
//! Owner-scoped task CRUD, ordering, time tracking, and statistics.

pub mod handlers;
pub mod service;

pub use service::TaskService;
