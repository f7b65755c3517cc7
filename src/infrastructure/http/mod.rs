//! HTTP 兼容网关与可观测性端点

pub mod gateway;
pub mod health;

pub use gateway::{router, GatewayState, HttpGateway};
pub use health::{HealthChecker, HealthDetails, HealthResponse, HealthStatus};
