//! Health Check
//!
//! 提供服务健康状态，用于负载均衡器和编排系统
//!
//! ## 健康检查端点
//! - `/health` - 详细状态（连接数、请求数、计算线程）
//! - `/health/ready` - 就绪检查（关闭过程中返回 503）
//! - `/health/live` - 存活检查
//!
//! ## 响应格式
//! ```json
//! {
//!   "status": "healthy",
//!   "uptime_seconds": 3600,
//!   "version": "0.1.0",
//!   "timestamp": 1234567890,
//!   "details": { "active_connections": 3, "total_requests": 120, "compute_workers": 8, "idle_workers": 6 }
//! }
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// 计算线程全部繁忙
    Degraded,
    /// 正在关闭
    Unhealthy,
}

/// 健康检查响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub uptime_seconds: u64,
    pub version: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// 详细健康信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDetails {
    /// TCP 前门活跃连接数
    pub active_connections: u64,
    /// 已处理请求总数
    pub total_requests: u64,
    pub compute_workers: usize,
    pub idle_workers: usize,
}

/// 健康检查器
pub struct HealthChecker {
    start_time: SystemTime,
    status: RwLock<HealthStatus>,
    version: String,
}

impl HealthChecker {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            start_time: SystemTime::now(),
            status: RwLock::new(HealthStatus::Healthy),
            version: version.into(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time
            .elapsed()
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn set_status(&self, status: HealthStatus) {
        *self.status.write() = status;
    }

    pub fn get_status(&self) -> HealthStatus {
        *self.status.read()
    }

    /// 关闭开始时调用，之后就绪检查失败
    pub fn mark_shutting_down(&self) {
        self.set_status(HealthStatus::Unhealthy);
    }

    /// 生成详细健康检查响应
    ///
    /// 计算线程全部繁忙时报告 Degraded，但关闭状态优先
    pub fn check_health_detailed(&self, details: HealthDetails) -> HealthResponse {
        let mut status = self.get_status();
        if status == HealthStatus::Healthy && details.idle_workers == 0 {
            status = HealthStatus::Degraded;
        }

        HealthResponse {
            status,
            uptime_seconds: self.uptime_seconds(),
            version: self.version.clone(),
            timestamp: Self::current_timestamp(),
            details: Some(details),
        }
    }

    /// 存活检查（liveness probe）
    pub fn check_liveness(&self) -> bool {
        true
    }

    /// 就绪检查（readiness probe）；繁忙不影响就绪
    pub fn check_readiness(&self) -> bool {
        self.get_status() != HealthStatus::Unhealthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(idle_workers: usize) -> HealthDetails {
        HealthDetails {
            active_connections: 2,
            total_requests: 10,
            compute_workers: 4,
            idle_workers,
        }
    }

    #[test]
    fn test_health_checker_creation() {
        let checker = HealthChecker::new("1.0.0");
        assert_eq!(checker.version, "1.0.0");
        assert_eq!(checker.get_status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_busy_workers_report_degraded() {
        let checker = HealthChecker::new("1.0.0");

        assert_eq!(checker.check_health_detailed(details(3)).status, HealthStatus::Healthy);
        assert_eq!(checker.check_health_detailed(details(0)).status, HealthStatus::Degraded);
        assert!(checker.check_readiness());
    }

    #[test]
    fn test_shutdown_fails_readiness_only() {
        let checker = HealthChecker::new("1.0.0");
        checker.mark_shutting_down();

        assert!(!checker.check_readiness());
        assert!(checker.check_liveness());
        assert_eq!(checker.check_health_detailed(details(0)).status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_serialization() {
        let checker = HealthChecker::new("1.0.0");
        let response = checker.check_health_detailed(details(1));

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"compute_workers\":4"));
        assert!(json.contains("1.0.0"));
    }
}
