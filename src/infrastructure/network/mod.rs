/// Framed TCP front door
///
/// ## Modules
/// - `listener`: socket2 listener with `SO_REUSEADDR`
/// - `codec`: JSON payload codec over 4-byte length-prefixed frames
/// - `connection`: per-connection request loop and state machine
/// - `server`: accept loop, connection admission, graceful shutdown
/// - `client`: persistent-connection client

pub mod client;
pub mod codec;
pub mod connection;
pub mod listener;
pub mod server;

pub use client::{ClientError, FrontDoorClient};
pub use codec::{Codec, CodecError, JsonCodec, RequestCodec};
pub use connection::{Connection, ConnectionConfig, ConnectionState};
pub use server::{FrontDoor, FrontDoorConfig};

use std::net::SocketAddr;

/// 前门错误（启动期致命）
#[derive(Debug, thiserror::Error)]
pub enum FrontDoorError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid front door config: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
