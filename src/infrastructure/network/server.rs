//! 前门服务器：接受循环、连接准入与优雅关闭
//!
//! ## 准入
//! 活跃连接数由 `max_connections` 个信号量许可限制。许可耗尽时新连接会收到
//! 一个 `overloaded` 错误帧并被关闭，不会排队。
//!
//! 写拒绝帧的任务同样有上限（`max_pending_rejects`）。该上限也用尽时连接被
//! 直接关闭，不再写帧，避免连接洪泛时无界地占用任务和文件描述符。
//!
//! ## 关闭
//! 收到关闭信号后立即停止接受连接（监听套接字被释放），空闲连接立即关闭，
//! 正在计算的请求写完响应后关闭。超过 `shutdown_grace` 仍未结束的连接被中止。

use super::connection::{reject, Connection, ConnectionConfig};
use super::listener::{bind_listener, DEFAULT_BACKLOG};
use super::FrontDoorError;
use crate::application::services::ComputeService;
use crate::domain::search::MoveSearch;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::ErrorCode;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// 前门配置
#[derive(Debug, Clone)]
pub struct FrontDoorConfig {
    pub addr: SocketAddr,
    pub max_connections: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
    pub shutdown_grace: Duration,
    pub backlog: i32,
    /// 同时在写拒绝帧的连接数上限
    pub max_pending_rejects: usize,
}

impl Default for FrontDoorConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 4501)),
            max_connections: 256,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            max_frame_bytes: super::codec::DEFAULT_MAX_FRAME_BYTES,
            shutdown_grace: Duration::from_secs(10),
            backlog: DEFAULT_BACKLOG,
            max_pending_rejects: 64,
        }
    }
}

impl FrontDoorConfig {
    pub fn validate(&self) -> Result<(), FrontDoorError> {
        if self.max_connections == 0 {
            return Err(FrontDoorError::Config("max_connections must be > 0".into()));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(FrontDoorError::Config("timeouts must be > 0".into()));
        }
        // 至少要容纳长度前缀之外的一个最小 JSON 请求
        if self.max_frame_bytes < 64 {
            return Err(FrontDoorError::Config("max_frame_bytes must be >= 64".into()));
        }
        Ok(())
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

/// TCP 前门
pub struct FrontDoor<S: MoveSearch> {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: FrontDoorConfig,
    service: Arc<ComputeService<S>>,
    slots: Arc<Semaphore>,
    rejects: Arc<Semaphore>,
}

impl<S: MoveSearch> FrontDoor<S> {
    /// 绑定监听端口；失败即返回，不重试
    pub fn bind(config: FrontDoorConfig, service: Arc<ComputeService<S>>) -> Result<Self, FrontDoorError> {
        config.validate()?;
        let listener = bind_listener(config.addr, config.backlog)?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, max_connections = config.max_connections, "前门已绑定");

        Ok(Self {
            listener,
            local_addr,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            rejects: Arc::new(Semaphore::new(config.max_pending_rejects)),
            config,
            service,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 运行接受循环直到 `shutdown` 变为 true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), FrontDoorError> {
        let FrontDoor {
            listener,
            local_addr,
            config,
            service,
            slots,
            rejects,
        } = self;
        let conn_config = config.connection_config();
        let next_id = AtomicU64::new(1);
        let mut tasks = JoinSet::new();

        info!(addr = %local_addr, "开始接受连接");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "连接任务 panic");
                        }
                    }
                }

                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            // 文件描述符耗尽等情况，稍后再试
                            warn!(error = %e, "accept 失败");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(peer = %peer, error = %e, "设置 TCP_NODELAY 失败");
                    }

                    let conn_id = next_id.fetch_add(1, Ordering::Relaxed);
                    let span = info_span!("conn", conn_id, peer = %peer);

                    match Arc::clone(&slots).try_acquire_owned() {
                        Ok(permit) => {
                            METRICS.connections_total.with_label_values(&["accepted"]).inc();
                            let service = Arc::clone(&service);
                            let conn_config = conn_config.clone();
                            let shutdown = shutdown.clone();

                            tasks.spawn(
                                async move {
                                    let _slot = ActiveSlot::enter(permit);
                                    Connection::new(conn_id, peer, stream, service, conn_config)
                                        .run(shutdown)
                                        .await;
                                }
                                .instrument(span),
                            );
                        }
                        Err(_) => {
                            METRICS.connections_total.with_label_values(&["rejected"]).inc();
                            METRICS
                                .errors_total
                                .with_label_values(&[
                                    ErrorCode::Overloaded.category().as_str(),
                                    ErrorCode::Overloaded.as_str(),
                                ])
                                .inc();
                            warn!(conn_id, peer = %peer, "连接数已满，拒绝连接");

                            let Ok(pending) = Arc::clone(&rejects).try_acquire_owned() else {
                                debug!(conn_id, peer = %peer, "拒绝任务已满，直接关闭");
                                drop(stream);
                                continue;
                            };
                            let conn_config = conn_config.clone();
                            tasks.spawn(
                                async move {
                                    let _pending = pending;
                                    reject(stream, ErrorCode::Overloaded, "connection limit reached", &conn_config)
                                        .await;
                                }
                                .instrument(span),
                            );
                        }
                    }
                }
            }
        }

        drop(listener);
        info!(in_flight = tasks.len(), "停止接受连接，等待连接结束");

        let drained = tokio::time::timeout(config.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await
        .is_ok();
        if !drained {
            warn!(remaining = tasks.len(), "关闭宽限期已过，中止剩余连接");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        info!("前门已停止");
        Ok(())
    }
}

/// 占用的连接许可；任务结束或被中止时归还并更新活跃连接数
struct ActiveSlot {
    _permit: OwnedSemaphorePermit,
}

impl ActiveSlot {
    fn enter(permit: OwnedSemaphorePermit) -> Self {
        METRICS.active_connections.with_label_values(&["tcp"]).inc();
        Self { _permit: permit }
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        METRICS.active_connections.with_label_values(&["tcp"]).dec();
    }
}
