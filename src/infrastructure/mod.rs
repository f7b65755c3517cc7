/// Infrastructure Layer - Technical Implementations
///
/// This layer contains the technical implementations that talk to the outside
/// world: sockets, framing, HTTP.
///
/// The infrastructure layer depends on the application and domain layers but
/// neither of them depends on infrastructure (dependency inversion through
/// `MoveSearch`).
///
/// ## Modules
/// - `network`: framed TCP front door (listener, codec, connections, server, client)
/// - `http`: HTTP gateway, health checks and Prometheus metrics endpoint

pub mod http;
pub mod network;

// Re-export key types
pub use http::{HealthChecker, HttpGateway};
pub use network::{FrontDoor, FrontDoorClient, FrontDoorConfig, FrontDoorError};
