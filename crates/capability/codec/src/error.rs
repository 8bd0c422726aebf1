//! 编解码错误类型定义

use domain::ValueType;

/// 编解码错误。均属于点位表配置缺陷，不应重试。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    /// 寄存器数量与点位定义不符
    #[error("length mismatch: expected {expected} registers, got {actual}")]
    LengthMismatch { expected: u16, actual: usize },

    /// 类型不支持该寄存器数量，或写入超过 2 个寄存器
    #[error("unsupported register count {count} for {value_type:?}")]
    UnsupportedRegisterCount { value_type: ValueType, count: u16 },

    /// 值超出可表示范围
    #[error("value {value} out of range for {count}-register {value_type:?}")]
    Overflow {
        value: String,
        value_type: ValueType,
        count: u16,
    },

    /// 缩放系数为 0 或非有限值
    #[error("invalid scaling {scaling} with offset {offset}")]
    InvalidScaling { scaling: f64, offset: f64 },

    /// 写入值与点位类型不匹配
    #[error("value {value} cannot be encoded as {expected:?}")]
    TypeMismatch { value: String, expected: ValueType },

    /// 文本含有无法放入寄存器的字符
    #[error("invalid text: {0}")]
    InvalidText(String),
}
