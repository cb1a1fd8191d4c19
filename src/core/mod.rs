//! Port core modules
//!
//! Context layout, locks, priority scheme, stacks, the switch engine and
//! the task-side helpers built on them.

pub mod config;
pub mod context;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod fatal;
pub mod kernel;
pub mod prio;
pub mod stack;
pub mod switch;
pub mod task;
pub mod types;
