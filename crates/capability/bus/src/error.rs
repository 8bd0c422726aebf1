//! 总线错误类型定义

/// 总线通信错误
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// 连接错误（拒绝连接、串口打开失败）
    #[error("connection error: {0}")]
    Connection(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 传输错误（IO、CRC/帧错误）
    #[error("transport error: {0}")]
    Transport(String),

    /// 从站返回 Modbus 异常响应
    #[error("modbus exception: {0}")]
    Exception(String),

    /// 同一串口上请求的串口参数不一致
    #[error("serial config mismatch on {port}: {detail}")]
    ConfigMismatch { port: String, detail: String },

    /// 配置解析错误
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// 响应与请求不匹配
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl BusError {
    /// 从站异常（协议层错误），便于与传输错误区分记录。
    pub fn is_exception(&self) -> bool {
        matches!(self, BusError::Exception(_))
    }

    /// 可由外部调度器重试的错误。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BusError::Connection(_)
                | BusError::Timeout(_)
                | BusError::Transport(_)
                | BusError::Exception(_)
        )
    }
}

impl From<std::io::Error> for BusError {
    fn from(err: std::io::Error) -> Self {
        BusError::Transport(err.to_string())
    }
}
