//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Session reaper: ends sessions idle beyond the configured timeout

mod reaper;

pub use reaper::spawn_reaper_task;
