//! 编解码参数。

use crate::error::CodecError;
use domain::{ByteOrder, Datapoint, StringLayout, ValueType, WordOrder};

/// 单个点位的编解码参数。字节序与字序来自设备，其余来自点位。
#[derive(Debug, Clone, PartialEq)]
pub struct CodecSpec {
    pub value_type: ValueType,
    pub register_count: u16,
    pub byte_order: ByteOrder,
    pub word_order: WordOrder,
    pub scaling: f64,
    pub offset: f64,
    pub precision: Option<u8>,
    pub string_layout: StringLayout,
}

impl CodecSpec {
    pub fn new(value_type: ValueType, register_count: u16) -> Self {
        Self {
            value_type,
            register_count,
            byte_order: ByteOrder::Msb,
            word_order: WordOrder::Normal,
            scaling: 1.0,
            offset: 0.0,
            precision: None,
            string_layout: StringLayout::PerRegister,
        }
    }

    pub fn for_datapoint(dp: &Datapoint, byte_order: ByteOrder, word_order: WordOrder) -> Self {
        Self {
            value_type: dp.value_type,
            register_count: dp.register_count,
            byte_order,
            word_order,
            scaling: dp.scaling,
            offset: dp.offset,
            precision: dp.precision,
            string_layout: dp.string_layout,
        }
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn word_order(mut self, word_order: WordOrder) -> Self {
        self.word_order = word_order;
        self
    }

    pub fn scaled(mut self, scaling: f64, offset: f64) -> Self {
        self.scaling = scaling;
        self.offset = offset;
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn string_layout(mut self, layout: StringLayout) -> Self {
        self.string_layout = layout;
        self
    }

    /// 校验类型与寄存器数量、缩放参数是否合法。
    pub fn validate(&self) -> Result<(), CodecError> {
        let count_ok = match self.value_type {
            ValueType::Int | ValueType::UInt => (1..=4).contains(&self.register_count),
            ValueType::Float => matches!(self.register_count, 2 | 4),
            ValueType::String => self.register_count >= 1,
        };
        if !count_ok {
            return Err(CodecError::UnsupportedRegisterCount {
                value_type: self.value_type,
                count: self.register_count,
            });
        }
        if !self.scaling.is_finite() || self.scaling == 0.0 || !self.offset.is_finite() {
            return Err(CodecError::InvalidScaling {
                scaling: self.scaling,
                offset: self.offset,
            });
        }
        Ok(())
    }

    /// 数值位宽。
    pub(crate) fn bits(&self) -> u32 {
        u32::from(self.register_count) * 16
    }

    /// 无缩放、无偏移、无精度：整数走精确路径。
    pub(crate) fn is_exact(&self) -> bool {
        self.scaling == 1.0 && self.offset == 0.0 && self.precision.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_count_rules() {
        assert!(CodecSpec::new(ValueType::Int, 4).validate().is_ok());
        assert!(CodecSpec::new(ValueType::UInt, 3).validate().is_ok());
        assert!(CodecSpec::new(ValueType::Float, 2).validate().is_ok());
        assert!(CodecSpec::new(ValueType::String, 24).validate().is_ok());

        for (value_type, count) in [
            (ValueType::Int, 0),
            (ValueType::Int, 5),
            (ValueType::Float, 1),
            (ValueType::Float, 3),
            (ValueType::String, 0),
        ] {
            let err = CodecSpec::new(value_type, count).validate().unwrap_err();
            assert_eq!(
                err,
                CodecError::UnsupportedRegisterCount { value_type, count }
            );
        }
    }

    #[test]
    fn zero_scaling_rejected() {
        let err = CodecSpec::new(ValueType::Int, 1)
            .scaled(0.0, 0.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidScaling { .. }));
    }
}
