/// 编解码器实现
///
/// 帧格式：4字节大端长度前缀 + UTF-8 JSON 负载。长度前缀由
/// `tokio_util::codec::LengthDelimitedCodec` 处理，这里只负责负载。

use crate::shared::protocol::{RequestFrame, ResponseFrame, PROTOCOL_VERSION};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tokio_util::codec::LengthDelimitedCodec;

/// 默认最大帧长度 (64 KiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// 编解码错误
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload is not valid JSON for this message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unsupported protocol version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// 负载编解码器trait
pub trait Codec: Send {
    type Item: Send;

    /// 解码一个完整帧的负载
    fn decode(&self, payload: &[u8]) -> Result<Self::Item, CodecError>;

    /// 编码为帧负载（不含长度前缀）
    fn encode(&self, item: &Self::Item) -> Result<Bytes, CodecError>;
}

/// JSON编解码器
pub struct JsonCodec<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec for JsonCodec<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Send,
{
    type Item = T;

    fn decode(&self, payload: &[u8]) -> Result<Self::Item, CodecError> {
        serde_json::from_slice(payload).map_err(CodecError::Malformed)
    }

    fn encode(&self, item: &Self::Item) -> Result<Bytes, CodecError> {
        serde_json::to_vec(item)
            .map(Bytes::from)
            .map_err(CodecError::Encode)
    }
}

/// 只取版本号和请求ID，用于在完整解析失败时仍能回填 id
#[derive(Debug, Default, Deserialize)]
struct Envelope {
    version: Option<u16>,
    id: Option<u64>,
}

/// 请求帧编解码器（服务端）
///
/// 先检查版本号，再完整解析；错误时尽量返回请求ID
#[derive(Default)]
pub struct RequestCodec {
    inner: JsonCodec<RequestFrame>,
}

impl RequestCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解码请求；失败时附带能识别出的请求ID
    pub fn decode_request(&self, payload: &[u8]) -> Result<RequestFrame, (Option<u64>, CodecError)> {
        let envelope: Envelope = serde_json::from_slice(payload).unwrap_or_default();

        if let Some(found) = envelope.version {
            if found != PROTOCOL_VERSION {
                return Err((
                    envelope.id,
                    CodecError::UnsupportedVersion {
                        found,
                        supported: PROTOCOL_VERSION,
                    },
                ));
            }
        }

        self.inner.decode(payload).map_err(|e| (envelope.id, e))
    }

    pub fn encode_response(&self, response: &ResponseFrame) -> Result<Bytes, CodecError> {
        JsonCodec::<ResponseFrame>::new().encode(response)
    }
}

/// 构造长度前缀帧编解码器
pub fn frame_codec(max_frame_bytes: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_bytes)
        .new_codec()
}

/// 判断 I/O 错误是否来自超长帧
pub fn is_frame_too_large(err: &std::io::Error) -> bool {
    err.get_ref()
        .map(|inner| inner.is::<tokio_util::codec::LengthDelimitedCodecError>())
        .unwrap_or(false)
}
