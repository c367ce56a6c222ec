//! Background Tasks Module
//!
//! # Tasks
//! - TTL Sweeper: removes expired local entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
