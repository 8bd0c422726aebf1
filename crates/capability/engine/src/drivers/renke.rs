//! Renke RS-WS-N01-8 温湿度变送器。

use crate::driver::DeviceDriver;
use domain::{Datapoint, DatapointMap, DeviceInfo, LayoutError, ModbusMode, PollMode};

pub const MODEL_ID: &str = "Renke/RS-WS-N01-8";
pub const GROUP_SENSORS: &str = "sensors";

#[derive(Debug, Default)]
pub struct RenkeWsN01;

impl DeviceDriver for RenkeWsN01 {
    fn info(&self) -> DeviceInfo {
        DeviceInfo::new("Shandong Renke", "RS-WS-N01-8")
    }

    fn build_layout(&self) -> Result<DatapointMap, LayoutError> {
        let mut layout = DatapointMap::with_default_groups();
        let sensors = layout.add_group(GROUP_SENSORS, ModbusMode::Input, PollMode::OnPoll)?;
        layout.insert(sensors, "Humidity", Datapoint::new(0).scaling(0.1))?;
        layout.insert(sensors, "Temperature", Datapoint::new(1).scaling(0.1))?;
        Ok(layout)
    }
}

pub fn factory() -> Box<dyn DeviceDriver> {
    Box::new(RenkeWsN01)
}
