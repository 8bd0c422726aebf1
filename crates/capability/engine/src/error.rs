//! 引擎错误类型定义

use domain::LayoutError;
use mbpoll_bus::BusError;
use mbpoll_codec::CodecError;

/// 设备驱动钩子错误。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// 钩子依赖的点位尚无值
    #[error("missing value for {0}")]
    MissingValue(String),

    /// 点位值不符合驱动预期
    #[error("invalid value for {key}: {detail}")]
    InvalidValue { key: String, detail: String },
}

/// 轮询引擎错误。核心不做重试，错误原样交给调度方。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("unknown datapoint {key} in group {group}")]
    UnknownDatapoint { group: String, key: String },

    /// 分组跨度超过单次读取上限，需要拆分分组
    #[error("group {group} spans {requested} units, max {max} per read")]
    BatchTooLarge {
        group: String,
        requested: u32,
        max: u32,
    },

    /// 从站返回的数据少于请求数量
    #[error("short response for group {group}: expected {expected}, got {actual}")]
    ShortResponse {
        group: String,
        expected: usize,
        actual: usize,
    },

    /// 计算型分组不经总线
    #[error("group {0} is not readable over modbus")]
    NotReadable(String),

    #[error("group {0} is not writable")]
    NotWritable(String),

    #[error("unknown device model: {0}")]
    UnknownModel(String),

    #[error("session closed")]
    Closed,
}

impl EngineError {
    /// 底层总线错误（连接、超时、异常响应）。
    pub fn is_bus(&self) -> bool {
        matches!(self, EngineError::Bus(_))
    }
}
