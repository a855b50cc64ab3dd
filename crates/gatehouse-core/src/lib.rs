//! Shared plumbing for Gatehouse services: health probes, request ids,
//! tracing setup and response serialization helpers.

pub mod health;
pub mod middleware;
pub mod serde;
pub mod tracing;
