//! 设备驱动接口。

use crate::error::DriverError;
use domain::{ByteOrder, DatapointMap, DeviceInfo, LayoutError, WordOrder};

/// 一种设备型号的点位表与钩子。
///
/// 引擎在会话创建时调用一次 `build_layout`；每个轮询周期前调用 `before_read`；
/// 首个完整成功周期后调用一次 `after_first_read`（动态分组在此追加）；
/// 每个完成的周期后调用 `after_read`（计算型点位在此更新）。
pub trait DeviceDriver: Send + Sync {
    fn info(&self) -> DeviceInfo;

    fn byte_order(&self) -> ByteOrder {
        ByteOrder::Msb
    }

    fn word_order(&self) -> WordOrder {
        WordOrder::Normal
    }

    fn build_layout(&self) -> Result<DatapointMap, LayoutError>;

    fn before_read(&mut self, _layout: &mut DatapointMap) {}

    fn after_first_read(&mut self, _layout: &mut DatapointMap) -> Result<(), DriverError> {
        Ok(())
    }

    fn after_read(&mut self, _layout: &mut DatapointMap) -> Result<(), DriverError> {
        Ok(())
    }
}
