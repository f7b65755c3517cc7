/// Shared utilities and types used across all layers
///
/// This module contains:
/// - Protocol definitions (request/response frames, error codes)
/// - Common data structures (bounded cache)
/// - Prometheus metrics

pub mod collections;
pub mod metrics;
pub mod protocol;

// Re-export commonly used types
pub use protocol::{
    ErrorBody, ErrorCategory, ErrorCode, Operation, PieceToken, RequestFrame, ResponseFrame,
    Status, TopMovesQuery, TopMovesResponse, PROTOCOL_VERSION,
};

pub use collections::BoundedCache;
pub use metrics::METRICS;
