//! 数据点定义。

use crate::data::{StringLayout, Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 数据点：一段连续寄存器与一个类型化取值之间的映射，附带最近一次的值。
///
/// `value` 只由所属设备会话在读写成功后更新；`attrs` 供展示层附加属性（如当前告警）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// 寄存器地址（0 起始）
    #[serde(default)]
    pub address: u16,
    /// 寄存器数量
    #[serde(default = "default_register_count")]
    pub register_count: u16,
    #[serde(default, rename = "type")]
    pub value_type: ValueType,
    /// 解码后乘以该系数，编码前除以该系数
    #[serde(default = "default_scaling")]
    pub scaling: f64,
    /// 缩放之后叠加的偏移
    #[serde(default)]
    pub offset: f64,
    /// 显示精度（小数位）；None 走整数折叠规则
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub string_layout: StringLayout,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

fn default_register_count() -> u16 {
    1
}

fn default_scaling() -> f64 {
    1.0
}

impl Default for Datapoint {
    fn default() -> Self {
        Self {
            address: 0,
            register_count: default_register_count(),
            value_type: ValueType::default(),
            scaling: default_scaling(),
            offset: 0.0,
            precision: None,
            string_layout: StringLayout::default(),
            value: Value::Empty,
            attrs: BTreeMap::new(),
        }
    }
}

impl Datapoint {
    /// 单寄存器有符号整数点位。
    pub fn new(address: u16) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// 计算型点位（不上总线，值由驱动钩子写入）。
    pub fn computed() -> Self {
        Self::default()
    }

    pub fn registers(mut self, register_count: u16) -> Self {
        self.register_count = register_count;
        self
    }

    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn offset(mut self, offset: f64) -> Self {
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

    /// 文本点位，`register_count` 个寄存器。
    pub fn text(address: u16, register_count: u16) -> Self {
        Self::new(address)
            .registers(register_count)
            .value_type(ValueType::String)
    }

    /// 占用区间的结束地址（不含），以 u32 表示避免溢出。
    pub fn end_address(&self) -> u32 {
        u32::from(self.address) + u32::from(self.register_count)
    }

    /// 是否已有成功读取或写入的值。
    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_datapoint_with_defaults() {
        let json = r#"{"address": 72, "register_count": 2, "type": "float"}"#;
        let dp: Datapoint = serde_json::from_str(json).expect("datapoint");
        assert_eq!(dp.address, 72);
        assert_eq!(dp.register_count, 2);
        assert_eq!(dp.value_type, ValueType::Float);
        assert_eq!(dp.scaling, 1.0);
        assert_eq!(dp.offset, 0.0);
        assert_eq!(dp.precision, None);
        assert!(!dp.has_value());
    }

    #[test]
    fn end_address_does_not_overflow() {
        let dp = Datapoint::new(u16::MAX).registers(4);
        assert_eq!(dp.end_address(), u32::from(u16::MAX) + 4);
    }
}
