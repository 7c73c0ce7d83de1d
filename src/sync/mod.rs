//! Concurrency primitives shared across the service.

pub mod retry_broadcast;

pub use retry_broadcast::RetryBroadcast;
