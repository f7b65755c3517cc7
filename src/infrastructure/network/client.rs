//! 前门客户端
//!
//! 持久连接上的同步请求/响应客户端，供负载生成器和集成测试使用。

use super::codec::{frame_codec, Codec, CodecError, JsonCodec, DEFAULT_MAX_FRAME_BYTES};
use crate::shared::protocol::{RequestFrame, ResponseFrame, TopMovesQuery};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// 客户端错误
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("connection closed by server")]
    Closed,
}

pub struct FrontDoorClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    requests: JsonCodec<RequestFrame>,
    responses: JsonCodec<ResponseFrame>,
    next_id: u64,
}

impl FrontDoorClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            framed: Framed::new(stream, frame_codec(DEFAULT_MAX_FRAME_BYTES)),
            requests: JsonCodec::new(),
            responses: JsonCodec::new(),
            next_id: 1,
        })
    }

    /// 发送 top_moves_hybrid 请求并等待响应
    pub async fn top_moves(&mut self, query: TopMovesQuery) -> Result<ResponseFrame, ClientError> {
        let id = self.allocate_id();
        self.send(&RequestFrame::top_moves(id, query)).await?;
        self.recv().await
    }

    pub async fn ping(&mut self) -> Result<ResponseFrame, ClientError> {
        let id = self.allocate_id();
        self.send(&RequestFrame::ping(id)).await?;
        self.recv().await
    }

    pub async fn send(&mut self, frame: &RequestFrame) -> Result<(), ClientError> {
        let payload = self.requests.encode(frame)?;
        self.send_raw(payload).await
    }

    /// 发送任意负载（测试畸形请求用）
    pub async fn send_raw(&mut self, payload: Bytes) -> Result<(), ClientError> {
        self.framed.send(payload).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<ResponseFrame, ClientError> {
        match self.framed.next().await {
            Some(Ok(payload)) => Ok(self.responses.decode(&payload)?),
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::Closed),
        }
    }

    /// 服务器是否已关闭连接
    pub async fn is_closed(&mut self) -> bool {
        matches!(self.framed.next().await, None | Some(Err(_)))
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
