/// Application Services
///
/// Services coordinate use cases with runtime resources (worker threads,
/// timeouts, caches). Front ends hold a shared `Arc<ComputeService<_>>`.

pub mod compute_service;

pub use compute_service::{ComputeConfig, ComputeService, ServiceError};
