pub mod data;
pub mod datapoint;
pub mod group;
pub mod layout;

pub use data::{ByteOrder, StringLayout, Value, ValueType, WordOrder};
pub use datapoint::Datapoint;
pub use group::{Group, GroupId, GroupKind, ModbusMode, PollMode};
pub use layout::{CONFIG_GROUP, DatapointMap, LayoutError, LayoutOverride, UI_GROUP};

use serde::{Deserialize, Serialize};

/// 设备静态信息：驱动给出厂商与型号，首次读取后可补全序列号与固件版本。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub manufacturer: String,
    pub model: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    /// 仅含厂商与型号的设备信息。
    pub fn new(manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            serial_number: None,
            sw_version: None,
        }
    }
}
