//! 单连接处理
//!
//! 每个被接受的连接由一个 tokio 任务驱动，按顺序处理请求：
//!
//! ```text
//! Accepted → Reading → Validating → Computing → Responding → Reading …
//!                                                          ↘ Closed / ClosedOnError
//! ```
//!
//! - 一个请求帧只对应一个响应帧，顺序与请求一致
//! - 协议错误（JSON 无法解析、参数非法、版本不支持）返回错误帧，连接保持
//! - 帧边界丢失（超长帧、读超时时缓冲区里有半个帧）返回错误帧后关闭
//! - 空闲超过读超时直接关闭
//! - 传输错误只影响本连接

use super::codec::{frame_codec, is_frame_too_large, CodecError, RequestCodec};
use crate::application::services::ComputeService;
use crate::domain::search::MoveSearch;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{ErrorCategory, ErrorCode, Operation, RequestFrame, ResponseFrame};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

/// 连接级超时与限制
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// 等待一个完整请求帧的时间
    pub read_timeout: Duration,
    /// 写出一个响应帧的时间
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    Reading,
    Validating,
    Computing,
    Responding,
    Closed,
    ClosedOnError,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::ClosedOnError)
    }
}

/// 读阶段的结果
enum ReadOutcome {
    Frame(Bytes),
    /// 对端关闭、空闲超时或服务关闭
    Finished,
    /// 需要先回一个错误帧再关闭
    Fatal(ResponseFrame),
    /// 传输错误，直接丢弃连接
    Broken,
}

/// 单个客户端连接
pub struct Connection<S: MoveSearch> {
    id: u64,
    peer: SocketAddr,
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    codec: RequestCodec,
    service: Arc<ComputeService<S>>,
    config: ConnectionConfig,
    state: ConnectionState,
    served: u64,
}

impl<S: MoveSearch> Connection<S> {
    pub fn new(
        id: u64,
        peer: SocketAddr,
        stream: TcpStream,
        service: Arc<ComputeService<S>>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            id,
            peer,
            framed: Framed::new(stream, frame_codec(config.max_frame_bytes)),
            codec: RequestCodec::new(),
            service,
            config,
            state: ConnectionState::Accepted,
            served: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 处理请求直到连接关闭，返回终止状态
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ConnectionState {
        debug!(conn_id = self.id, peer = %self.peer, "连接已接受");

        while !self.state.is_terminal() {
            if *shutdown.borrow() {
                // 已经收到但尚未处理的请求得到明确答复
                if self.framed.read_buffer().is_empty() {
                    self.state = ConnectionState::Closed;
                } else {
                    record_error(Operation::TopMovesHybrid, ErrorCode::ShuttingDown);
                    let response =
                        ResponseFrame::error(None, ErrorCode::ShuttingDown, "server is shutting down");
                    self.respond(&response).await;
                    self.state = ConnectionState::ClosedOnError;
                }
                break;
            }

            self.state = ConnectionState::Reading;
            let payload = match self.read_frame(&mut shutdown).await {
                ReadOutcome::Frame(payload) => payload,
                ReadOutcome::Finished => {
                    self.state = ConnectionState::Closed;
                    break;
                }
                ReadOutcome::Fatal(response) => {
                    self.respond(&response).await;
                    self.state = ConnectionState::ClosedOnError;
                    break;
                }
                ReadOutcome::Broken => {
                    self.state = ConnectionState::ClosedOnError;
                    break;
                }
            };

            let response = self.handle_frame(payload).await;

            self.state = ConnectionState::Responding;
            let written = self.respond(&response).await;
            self.served += 1;

            let must_close = response.error_code().is_some_and(ErrorCode::closes_connection);
            if !written || must_close {
                self.state = ConnectionState::ClosedOnError;
            }
        }

        debug!(
            conn_id = self.id,
            peer = %self.peer,
            served = self.served,
            state = ?self.state,
            "连接已关闭"
        );
        self.state
    }

    async fn read_frame(&mut self, shutdown: &mut watch::Receiver<bool>) -> ReadOutcome {
        let read_timeout = self.config.read_timeout;

        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => return ReadOutcome::Finished,
            next = timeout(read_timeout, self.framed.next()) => next,
        };

        match next {
            Ok(Some(Ok(payload))) => ReadOutcome::Frame(payload.freeze()),
            Ok(None) => ReadOutcome::Finished,
            Ok(Some(Err(e))) if is_frame_too_large(&e) => {
                record_error(Operation::TopMovesHybrid, ErrorCode::FrameTooLarge);
                ReadOutcome::Fatal(ResponseFrame::error(
                    None,
                    ErrorCode::FrameTooLarge,
                    format!("frame exceeds {} bytes", self.config.max_frame_bytes),
                ))
            }
            Ok(Some(Err(e))) => {
                debug!(conn_id = self.id, peer = %self.peer, error = %e, "读取失败");
                ReadOutcome::Broken
            }
            Err(_) if self.framed.read_buffer().is_empty() => {
                debug!(conn_id = self.id, peer = %self.peer, "空闲超时");
                ReadOutcome::Finished
            }
            Err(_) => {
                record_error(Operation::TopMovesHybrid, ErrorCode::ReadTimeout);
                ReadOutcome::Fatal(ResponseFrame::error(
                    None,
                    ErrorCode::ReadTimeout,
                    format!(
                        "incomplete frame after {}ms",
                        read_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    async fn handle_frame(&mut self, payload: Bytes) -> ResponseFrame {
        self.state = ConnectionState::Validating;

        let frame = match self.codec.decode_request(&payload) {
            Ok(frame) => frame,
            Err((id, e)) => {
                let code = match e {
                    CodecError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
                    _ => ErrorCode::MalformedRequest,
                };
                record_error(Operation::TopMovesHybrid, code);
                debug!(conn_id = self.id, request_id = ?id, error = %e, "请求无法解析");
                return ResponseFrame::error(id, code, e.to_string());
            }
        };

        match frame.op {
            Operation::Ping => {
                record_ok(Operation::Ping);
                ResponseFrame::pong(frame.id)
            }
            Operation::TopMovesHybrid => self.top_moves(frame).await,
        }
    }

    async fn top_moves(&mut self, frame: RequestFrame) -> ResponseFrame {
        let Some(params) = frame.params else {
            record_error(frame.op, ErrorCode::MalformedRequest);
            return ResponseFrame::error(
                Some(frame.id),
                ErrorCode::MalformedRequest,
                "top_moves_hybrid requires params",
            );
        };

        self.state = ConnectionState::Computing;
        let started = Instant::now();

        match self.service.top_moves(&params).await {
            Ok(result) => {
                record_ok(frame.op);
                debug!(
                    conn_id = self.id,
                    request_id = frame.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "请求完成"
                );
                ResponseFrame::ok(frame.id, result)
            }
            Err(e) => {
                let code = e.code();
                record_error(frame.op, code);
                match code.category() {
                    ErrorCategory::Computation => warn!(
                        conn_id = self.id,
                        request_id = frame.id,
                        code = code.as_str(),
                        error = %e,
                        "计算错误"
                    ),
                    _ => debug!(
                        conn_id = self.id,
                        request_id = frame.id,
                        code = code.as_str(),
                        error = %e,
                        "请求被拒绝"
                    ),
                }
                ResponseFrame::error(Some(frame.id), code, e.to_string())
            }
        }
    }

    /// 写出响应，失败返回 false
    async fn respond(&mut self, response: &ResponseFrame) -> bool {
        let payload = match self.codec.encode_response(response) {
            Ok(payload) => payload,
            Err(e) => {
                error!(conn_id = self.id, error = %e, "响应编码失败");
                return false;
            }
        };

        match timeout(self.config.write_timeout, self.framed.send(payload)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                debug!(conn_id = self.id, peer = %self.peer, error = %e, "写入失败");
                false
            }
            Err(_) => {
                warn!(conn_id = self.id, peer = %self.peer, "写入超时");
                false
            }
        }
    }
}

/// 拒绝连接：写一个错误帧后关闭
pub async fn reject(stream: TcpStream, code: ErrorCode, message: &str, config: &ConnectionConfig) {
    let mut framed = Framed::new(stream, frame_codec(config.max_frame_bytes));
    let response = ResponseFrame::error(None, code, message);

    let payload = match RequestCodec::new().encode_response(&response) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "响应编码失败");
            return;
        }
    };

    match timeout(config.write_timeout, framed.send(payload)).await {
        Ok(Ok(())) => info!(code = code.as_str(), "连接已拒绝"),
        Ok(Err(e)) => debug!(error = %e, "拒绝帧写入失败"),
        Err(_) => debug!("拒绝帧写入超时"),
    }
}

fn record_ok(op: Operation) {
    METRICS
        .requests_total
        .with_label_values(&[op.as_str(), "ok"])
        .inc();
}

fn record_error(op: Operation, code: ErrorCode) {
    METRICS
        .requests_total
        .with_label_values(&[op.as_str(), code.as_str()])
        .inc();
    METRICS
        .errors_total
        .with_label_values(&[code.category().as_str(), code.as_str()])
        .inc();
}
