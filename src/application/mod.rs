/// Application Layer - Use Cases and Services
///
/// This layer orchestrates domain logic into the operations the service exposes.
/// It depends on the domain layer but is independent of network details; the
/// search engine is injected through the `MoveSearch` trait.
///
/// ## Modules
/// - `use_cases`: synchronous use case bodies (run on blocking workers)
/// - `services`: async orchestration shared by every front end

pub mod services;
pub mod use_cases;

// Re-export key services
pub use services::{ComputeConfig, ComputeService, ServiceError};
pub use use_cases::TopMovesUseCase;
