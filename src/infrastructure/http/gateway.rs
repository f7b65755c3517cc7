//! HTTP Gateway
//!
//! 与游戏服务器原有调用方式兼容的 HTTP 入口，同时提供健康检查和指标
//!
//! ## 端点
//! - `GET /top-moves-hybrid?board=…&currentPiece=…` - 计算最佳落点
//! - `GET /metrics` - Prometheus格式的指标
//! - `GET /health` - 健康检查
//! - `GET /health/ready` - 就绪检查
//! - `GET /health/live` - 存活检查
//!
//! 计算端点经过 `ConcurrencyLimit` + `LoadShed`：并发已满时立即返回
//! `503 {"code":"overloaded"}`，不排队。
//!
//! ## 使用示例
//! ```rust,ignore
//! let gateway = HttpGateway::bind(addr, 64, service, health)?;
//! gateway.run(shutdown_rx).await?;
//! ```

use super::health::{HealthChecker, HealthDetails, HealthStatus};
use crate::application::services::ComputeService;
use crate::domain::search::MoveSearch;
use crate::infrastructure::network::listener::{bind_listener, DEFAULT_BACKLOG};
use crate::infrastructure::network::FrontDoorError;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{ErrorBody, ErrorCode, TopMovesQuery};
use axum::{
    error_handling::HandleErrorLayer,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    BoxError, Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tracing::{debug, info, warn};

/// 路由共享状态
pub struct GatewayState<S: MoveSearch> {
    pub service: Arc<ComputeService<S>>,
    pub health: Arc<HealthChecker>,
}

impl<S: MoveSearch> Clone for GatewayState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            health: Arc::clone(&self.health),
        }
    }
}

/// 构造路由
///
/// `max_concurrent` 限制同时进行的计算请求数，健康检查和指标不受限制
pub fn router<S: MoveSearch>(state: GatewayState<S>, max_concurrent: usize) -> Router {
    let admission = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_admission_error))
        .load_shed()
        .concurrency_limit(max_concurrent.max(1));

    let compute = Router::new()
        .route("/top-moves-hybrid", get(top_moves_handler::<S>))
        .route_layer(admission);

    Router::new()
        .merge(compute)
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler::<S>))
        .route("/health/ready", get(readiness_handler::<S>))
        .route("/health/live", get(liveness_handler::<S>))
        .with_state(state)
}

/// HTTP 网关服务器
pub struct HttpGateway {
    listener: TcpListener,
    local_addr: SocketAddr,
    app: Router,
}

impl HttpGateway {
    pub fn bind<S: MoveSearch>(
        addr: SocketAddr,
        max_concurrent: usize,
        service: Arc<ComputeService<S>>,
        health: Arc<HealthChecker>,
    ) -> Result<Self, FrontDoorError> {
        let listener = bind_listener(addr, DEFAULT_BACKLOG)?;
        let local_addr = listener.local_addr()?;
        let app = router(GatewayState { service, health }, max_concurrent);

        info!(addr = %local_addr, "HTTP网关已绑定");
        info!("Metrics端点: http://{}/metrics", local_addr);
        info!("健康检查端点: http://{}/health", local_addr);

        Ok(Self {
            listener,
            local_addr,
            app,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 运行直到 `shutdown` 变为 true，然后等待进行中的请求完成
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), FrontDoorError> {
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stopping| *stopping).await;
            })
            .await?;

        info!("HTTP网关已停止");
        Ok(())
    }
}

/// 错误响应：状态码由错误码决定
fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    let status = StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::new(code, message))).into_response()
}

fn record(code: Option<ErrorCode>) {
    let outcome = code.map_or("ok", ErrorCode::as_str);
    METRICS
        .requests_total
        .with_label_values(&["http_top_moves_hybrid", outcome])
        .inc();
    if let Some(code) = code {
        METRICS
            .errors_total
            .with_label_values(&[code.category().as_str(), code.as_str()])
            .inc();
    }
}

async fn handle_admission_error(err: BoxError) -> Response {
    if err.is::<tower::load_shed::error::Overloaded>() {
        record(Some(ErrorCode::Overloaded));
        return error_response(ErrorCode::Overloaded, "too many concurrent requests");
    }
    warn!(error = %err, "准入层错误");
    record(Some(ErrorCode::ComputeFailed));
    error_response(ErrorCode::ComputeFailed, err.to_string())
}

/// 计算端点
async fn top_moves_handler<S: MoveSearch>(
    State(state): State<GatewayState<S>>,
    query: Result<Query<TopMovesQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            record(Some(ErrorCode::MalformedRequest));
            return error_response(ErrorCode::MalformedRequest, rejection.body_text());
        }
    };

    match state.service.top_moves(&query).await {
        Ok(result) => {
            record(None);
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            let code = e.code();
            record(Some(code));
            debug!(code = code.as_str(), error = %e, "HTTP请求失败");
            error_response(code, e.to_string())
        }
    }
}

/// Prometheus metrics端点
async fn metrics_handler() -> Response {
    (StatusCode::OK, METRICS.export()).into_response()
}

/// 健康检查端点
async fn health_handler<S: MoveSearch>(State(state): State<GatewayState<S>>) -> Response {
    let details = HealthDetails {
        active_connections: METRICS.active_connections.with_label_values(&["tcp"]).get().max(0.0) as u64,
        total_requests: METRICS.total_requests(),
        compute_workers: state.service.worker_count(),
        idle_workers: state.service.idle_workers(),
    };

    let response = state.health.check_health_detailed(details);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// 就绪检查端点（用于Kubernetes readiness probe）
async fn readiness_handler<S: MoveSearch>(State(state): State<GatewayState<S>>) -> StatusCode {
    if state.health.check_readiness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// 存活检查端点（用于Kubernetes liveness probe）
async fn liveness_handler<S: MoveSearch>(State(state): State<GatewayState<S>>) -> StatusCode {
    if state.health.check_liveness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
