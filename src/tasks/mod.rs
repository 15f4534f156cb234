//! Background Tasks Module
//!
//! Long-lived tasks spawned alongside the cache.

mod subscriber;

pub use subscriber::spawn_subscriber_task;
