//! Background Tasks Module
//!
//! Contains background tasks that run alongside a shared cache store.
//!
//! # Tasks
//! - Expiry sweep: reclaims expired entries at a configured interval

mod sweeper;

pub use sweeper::spawn_sweeper_task;
