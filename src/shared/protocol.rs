use serde::{Deserialize, Serialize};

/// 当前线协议版本
pub const PROTOCOL_VERSION: u16 = 1;

/// 方块标识：字母 (`"T"`)、数字字符串 (`"4"`) 或整数 (`4`)
///
/// HTTP 查询参数只有字符串，JSON 客户端常用整数，两种都接受
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PieceToken {
    Index(u32),
    Name(String),
}

impl Default for PieceToken {
    fn default() -> Self {
        PieceToken::Name(String::new())
    }
}

/// top-moves-hybrid 查询参数，字段名与游戏服务器使用的 HTTP 参数一致
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopMovesQuery {
    /// 200 个字符的棋盘，自上而下逐行
    pub board: String,
    pub current_piece: PieceToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_piece: Option<PieceToken>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_frame_timeline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playout_count: Option<u32>,
}

/// 请求操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TopMovesHybrid,
    Ping,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::TopMovesHybrid => "top_moves_hybrid",
            Operation::Ping => "ping",
        }
    }
}

/// 客户端请求帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub version: u16,
    /// 客户端分配的请求ID，原样返回
    pub id: u64,
    pub op: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<TopMovesQuery>,
}

impl RequestFrame {
    pub fn top_moves(id: u64, query: TopMovesQuery) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            op: Operation::TopMovesHybrid,
            params: Some(query),
        }
    }

    pub fn ping(id: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            op: Operation::Ping,
            params: None,
        }
    }
}

/// 已知下一块时的最佳组合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBoxMove {
    /// `[rotation, x, y]`
    pub first_placement: [i32; 3],
    pub second_placement: [i32; 3],
    pub playout_score: f64,
}

/// 只考虑当前块时的最佳落点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoNextBoxMove {
    pub first_placement: [i32; 3],
    pub playout_score: f64,
}

/// 计算结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopMovesResponse {
    pub next_box: Vec<NextBoxMove>,
    pub no_next_box: Vec<NoNextBoxMove>,
}

/// 错误大类，决定日志级别和指标标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 请求格式或参数错误
    Protocol,
    /// 计算失败或超时
    Computation,
    /// 资源不足或服务关闭中
    Resource,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Computation => "computation",
            ErrorCategory::Resource => "resource",
        }
    }
}

/// 客户端可见的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedRequest,
    UnsupportedVersion,
    InvalidRequest,
    FrameTooLarge,
    ReadTimeout,
    ComputeFailed,
    ComputeTimeout,
    Overloaded,
    ShuttingDown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedRequest => "malformed_request",
            ErrorCode::UnsupportedVersion => "unsupported_version",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::FrameTooLarge => "frame_too_large",
            ErrorCode::ReadTimeout => "read_timeout",
            ErrorCode::ComputeFailed => "compute_failed",
            ErrorCode::ComputeTimeout => "compute_timeout",
            ErrorCode::Overloaded => "overloaded",
            ErrorCode::ShuttingDown => "shutting_down",
        }
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::MalformedRequest
            | ErrorCode::UnsupportedVersion
            | ErrorCode::InvalidRequest
            | ErrorCode::FrameTooLarge
            | ErrorCode::ReadTimeout => ErrorCategory::Protocol,
            ErrorCode::ComputeFailed | ErrorCode::ComputeTimeout => ErrorCategory::Computation,
            ErrorCode::Overloaded | ErrorCode::ShuttingDown => ErrorCategory::Resource,
        }
    }

    /// HTTP网关使用的状态码
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::MalformedRequest | ErrorCode::UnsupportedVersion => 400,
            ErrorCode::FrameTooLarge => 413,
            ErrorCode::InvalidRequest => 422,
            ErrorCode::ReadTimeout => 408,
            ErrorCode::ComputeFailed => 500,
            ErrorCode::Overloaded | ErrorCode::ShuttingDown => 503,
            ErrorCode::ComputeTimeout => 504,
        }
    }

    /// 帧边界已丢失或服务不再接受请求时，发送错误后关闭连接
    pub fn closes_connection(self) -> bool {
        matches!(
            self,
            ErrorCode::FrameTooLarge
                | ErrorCode::ReadTimeout
                | ErrorCode::Overloaded
                | ErrorCode::ShuttingDown
        )
    }
}

/// 错误响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 响应状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Pong,
    Error,
}

/// 服务器响应帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub version: u16,
    /// 无法解析请求时为 null
    pub id: Option<u64>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TopMovesResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseFrame {
    pub fn ok(id: u64, result: TopMovesResponse) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: Some(id),
            status: Status::Ok,
            result: Some(result),
            error: None,
        }
    }

    pub fn pong(id: u64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id: Some(id),
            status: Status::Pong,
            result: None,
            error: None,
        }
    }

    pub fn error(id: Option<u64>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            id,
            status: Status::Error,
            result: None,
            error: Some(ErrorBody::new(code, message)),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_accepts_game_server_field_names() {
        let json = r#"{
            "board": "0000",
            "currentPiece": "T",
            "nextPiece": 0,
            "level": 19,
            "inputFrameTimeline": "X..",
            "playoutCount": 49
        }"#;
        let query: TopMovesQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.current_piece, PieceToken::Name("T".to_string()));
        assert_eq!(query.next_piece, Some(PieceToken::Index(0)));
        assert_eq!(query.level, Some(19));
        assert_eq!(query.input_frame_timeline.as_deref(), Some("X.."));
        assert_eq!(query.playout_count, Some(49));
        assert_eq!(query.depth, None);
    }

    #[test]
    fn test_response_shape_matches_decoder() {
        let response = TopMovesResponse {
            next_box: vec![NextBoxMove {
                first_placement: [1, 4, 18],
                second_placement: [0, -3, 17],
                playout_score: 12.5,
            }],
            no_next_box: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["nextBox"][0]["firstPlacement"][1], 4);
        assert_eq!(json["nextBox"][0]["secondPlacement"][1], -3);
        assert_eq!(json["nextBox"][0]["playoutScore"], 12.5);
        assert!(json["noNextBox"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_error_frame_serialization() {
        let frame = ResponseFrame::error(None, ErrorCode::MalformedRequest, "bad json");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"code\":\"malformed_request\""));
        assert!(json.contains("\"id\":null"));
        assert!(!json.contains("result"));
    }

    #[test]
    fn test_error_code_classes() {
        assert_eq!(ErrorCode::InvalidRequest.category(), ErrorCategory::Protocol);
        assert_eq!(ErrorCode::ComputeTimeout.category(), ErrorCategory::Computation);
        assert_eq!(ErrorCode::Overloaded.http_status(), 503);
        assert!(ErrorCode::ReadTimeout.closes_connection());
        assert!(!ErrorCode::MalformedRequest.closes_connection());
    }
}
