/// Collections shared across layers
///
/// - BoundedCache: fixed-capacity map with FIFO eviction

pub mod bounded_cache;

pub use bounded_cache::BoundedCache;
