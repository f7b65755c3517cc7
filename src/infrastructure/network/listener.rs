//! TCP 监听器构造
//!
//! 使用 socket2 在绑定前设置 `SO_REUSEADDR`，保证干净退出后立即重启能够
//! 重新绑定同一端口（TIME_WAIT 中的旧连接不会阻塞）。端口已被占用的
//! 监听套接字仍然会导致绑定失败。

use super::FrontDoorError;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// 默认 listen backlog
pub const DEFAULT_BACKLOG: i32 = 1024;

/// 绑定监听端口；必须在 tokio 运行时内调用
pub fn bind_listener(addr: SocketAddr, backlog: i32) -> Result<TcpListener, FrontDoorError> {
    let bind_err = |source| FrontDoorError::Bind { addr, source };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(backlog).map_err(bind_err)?;

    TcpListener::from_std(socket.into()).map_err(bind_err)
}
