//! Swegon CASA 新风机组（基础型号与 R7 变体）。
//!
//! R7 在基础点位表上应用一组修改项，不复制整张表。

use super::{required, version_string};
use crate::driver::DeviceDriver;
use crate::error::DriverError;
use domain::{
    CONFIG_GROUP, Datapoint, DatapointMap, DeviceInfo, LayoutError, LayoutOverride, ModbusMode,
    PollMode, UI_GROUP, Value,
};

pub const CASA_MODEL_ID: &str = "Swegon/CASA";
pub const CASA_R7_MODEL_ID: &str = "Swegon/CASA_R7";

pub const GROUP_COMMANDS: &str = "commands";
pub const GROUP_COMMANDS_WRITE: &str = "commands_write";
pub const GROUP_SETPOINTS: &str = "setpoints";
pub const GROUP_DEVICE_INFO: &str = "device_info";
pub const GROUP_ALARMS: &str = "alarms";
pub const GROUP_SENSORS: &str = "sensors";
pub const GROUP_UNIT_STATUSES: &str = "unit_statuses";

pub const ACTIVE_ALARMS: &str = "Active Alarms";
pub const CURRENT_ALARMS: &str = "Current Alarms";
pub const EFFICIENCY: &str = "Efficiency";

const ALARMS: &[(&str, u16)] = &[
    ("T1 Failure", 6100),
    ("T2 Failure", 6101),
    ("T3 Failure", 6102),
    ("T4 Failure", 6103),
    ("T5 Failure", 6104),
    ("T6 Failure", 6105),
    ("T7 Failure", 6106),
    ("T8 Failure", 6107),
    ("Afterheater Failure", 6116),
    ("Preheater Failure", 6118),
    ("Freezing Danger", 6120),
    ("Supply Fan Failure", 6124),
    ("Exhaust Fan Failure", 6126),
    ("Service Info", 6128),
    ("Filter Guard Info", 6129),
    ("Emergency Stop", 6130),
    (ACTIVE_ALARMS, 6131),
    ("Supply temperature low", 6142),
    ("Supply temperature high", 6144),
    ("Rotor", 6146),
    ("Fan control", 6148),
];

/// 传感器（名称, 地址, 系数）。
const SENSORS: &[(&str, u16, f64)] = &[
    ("Fresh Air Temp", 6200, 0.1),
    ("Supply Temp before re-heater", 6201, 0.1),
    ("Supply Temp", 6202, 0.1),
    ("Extract Temp", 6203, 0.1),
    ("Exhaust Temp", 6204, 0.1),
    ("Room Temp", 6205, 0.1),
    ("CO2 Filtered", 6212, 1.0),
    ("Relative Humidity", 6213, 1.0),
    ("Absolute Humidity", 6214, 0.1),
    ("VOC", 6216, 1.0),
    ("Supply Flow", 6219, 3.6),
    ("Exhaust Flow", 6220, 3.6),
];

const UNIT_STATUSES: &[(&str, u16)] = &[
    ("Unit State", 6300),
    ("Speed State", 6301),
    ("Supply Fan", 6302),
    ("Exhaust Fan", 6303),
    ("Heating Output", 6316),
    ("Heat Exchanger", 6331),
];

const CONFIG: &[(&str, u16, f64)] = &[
    ("Fireplace Run Time", 5103, 1.0),
    ("Fireplace Max Speed Difference", 5104, 1.0),
    ("Travelling Mode Speed Drop", 5105, 1.0),
    ("Night Cooling", 5163, 1.0),
    ("Night Cooling FreshAir Max", 5164, 0.1),
    ("Night Cooling FreshAir Start", 5165, 0.1),
    ("Night Cooling RoomTemp Start", 5166, 0.1),
    ("Night Cooling SupplyTemp Min", 5167, 0.1),
    ("Home Supply Speed", 5303, 1.0),
    ("Home Exhaust Speed", 5304, 1.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasaVariant {
    Base,
    R7,
}

#[derive(Debug)]
pub struct SwegonCasa {
    variant: CasaVariant,
    info: DeviceInfo,
}

impl SwegonCasa {
    pub fn new(variant: CasaVariant) -> Self {
        let model = match variant {
            CasaVariant::Base => "CASA",
            CasaVariant::R7 => "CASA R7",
        };
        Self {
            variant,
            info: DeviceInfo::new("Swegon", model),
        }
    }

    pub fn variant(&self) -> CasaVariant {
        self.variant
    }

    /// 变体相对基础点位表的修改。
    fn overrides(&self) -> Vec<LayoutOverride> {
        match self.variant {
            CasaVariant::Base => Vec::new(),
            CasaVariant::R7 => vec![
                LayoutOverride::set_scaling(GROUP_SETPOINTS, "Temperature Setpoint", 1.0),
                LayoutOverride::set_scaling(GROUP_SENSORS, "Absolute Humidity", 0.01),
                // 热交换器输出换成转速
                LayoutOverride::remove(GROUP_UNIT_STATUSES, "Heat Exchanger"),
                LayoutOverride::insert(GROUP_SENSORS, "Heat Exchanger RPM", Datapoint::new(6233)),
                LayoutOverride::set_scaling(CONFIG_GROUP, "Night Cooling FreshAir Max", 1.0),
                LayoutOverride::set_scaling(CONFIG_GROUP, "Night Cooling FreshAir Start", 1.0),
                LayoutOverride::set_scaling(CONFIG_GROUP, "Night Cooling RoomTemp Start", 1.0),
                LayoutOverride::set_scaling(CONFIG_GROUP, "Night Cooling SupplyTemp Min", 1.0),
            ],
        }
    }

    fn base_layout() -> Result<DatapointMap, LayoutError> {
        let mut layout = DatapointMap::with_default_groups();

        let commands = layout.add_group(GROUP_COMMANDS, ModbusMode::Holding, PollMode::OnPoll)?;
        layout.insert(commands, "Operating Mode", Datapoint::new(5000))?;
        layout.insert(commands, "Fireplace Mode", Datapoint::new(5001))?;
        layout.insert(commands, "Travelling Mode", Datapoint::new(5003))?;

        let write_only =
            layout.add_group(GROUP_COMMANDS_WRITE, ModbusMode::Holding, PollMode::Off)?;
        layout.insert(write_only, "Reset Alarms", Datapoint::new(5405))?;

        let setpoints = layout.add_group(GROUP_SETPOINTS, ModbusMode::Holding, PollMode::OnPoll)?;
        layout.insert(
            setpoints,
            "Temperature Setpoint",
            Datapoint::new(5100).scaling(0.1),
        )?;

        let device_info = layout.add_group(GROUP_DEVICE_INFO, ModbusMode::Input, PollMode::Once)?;
        layout.insert(device_info, "FW Maj", Datapoint::new(6000))?;
        layout.insert(device_info, "FW Min", Datapoint::new(6001))?;
        layout.insert(device_info, "FW Build", Datapoint::new(6002))?;
        layout.insert(device_info, "Model Name", Datapoint::text(6007, 15))?;
        layout.insert(device_info, "Serial Number", Datapoint::text(6023, 24))?;

        let alarms = layout.add_group(GROUP_ALARMS, ModbusMode::Input, PollMode::OnPoll)?;
        for (name, address) in ALARMS {
            layout.insert(alarms, *name, Datapoint::new(*address))?;
        }

        let sensors = layout.add_group(GROUP_SENSORS, ModbusMode::Input, PollMode::OnPoll)?;
        for (name, address, scaling) in SENSORS {
            layout.insert(sensors, *name, Datapoint::new(*address).scaling(*scaling))?;
        }

        let statuses =
            layout.add_group(GROUP_UNIT_STATUSES, ModbusMode::Input, PollMode::OnPoll)?;
        for (name, address) in UNIT_STATUSES {
            layout.insert(statuses, *name, Datapoint::new(*address))?;
        }

        let config = layout.require_group(CONFIG_GROUP)?;
        for (name, address, scaling) in CONFIG {
            layout.insert(config, *name, Datapoint::new(*address).scaling(*scaling))?;
        }

        let ui = layout.require_group(UI_GROUP)?;
        layout.insert(ui, CURRENT_ALARMS, Datapoint::computed())?;
        layout.insert(ui, EFFICIENCY, Datapoint::computed())?;

        Ok(layout)
    }
}

/// 热回收效率（%），保留 1 位小数；排风与新风温度相同时为 0。
pub fn efficiency(fresh: f64, supply: f64, extract: f64) -> f64 {
    let span = extract - fresh;
    if span == 0.0 {
        return 0.0;
    }
    ((supply - fresh) / span * 1000.0).round() / 10.0
}

impl DeviceDriver for SwegonCasa {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn build_layout(&self) -> Result<DatapointMap, LayoutError> {
        let mut layout = Self::base_layout()?;
        layout.apply(&self.overrides())?;
        Ok(layout)
    }

    fn after_first_read(&mut self, layout: &mut DatapointMap) -> Result<(), DriverError> {
        if let Some(model) = required(layout, GROUP_DEVICE_INFO, "Model Name")?
            .as_str()
            .filter(|model| !model.is_empty())
        {
            self.info.model = model.to_string();
        }
        let serial = required(layout, GROUP_DEVICE_INFO, "Serial Number")?;
        self.info.serial_number = Some(serial.to_string());
        self.info.sw_version = Some(version_string([
            required(layout, GROUP_DEVICE_INFO, "FW Maj")?,
            required(layout, GROUP_DEVICE_INFO, "FW Min")?,
            required(layout, GROUP_DEVICE_INFO, "FW Build")?,
        ]));
        Ok(())
    }

    fn after_read(&mut self, layout: &mut DatapointMap) -> Result<(), DriverError> {
        let temperature = |key: &str| -> Result<f64, DriverError> {
            required(layout, GROUP_SENSORS, key)?
                .as_f64()
                .ok_or_else(|| DriverError::InvalidValue {
                    key: key.to_string(),
                    detail: "not numeric".to_string(),
                })
        };
        let value = efficiency(
            temperature("Fresh Air Temp")?,
            temperature("Supply Temp before re-heater")?,
            temperature("Extract Temp")?,
        );
        layout.set_value(UI_GROUP, EFFICIENCY, Value::Float(value))?;

        // 告警以属性形式挂在 Active Alarms 上，汇总文本写入 ui
        let alarms_id = layout.require_group(GROUP_ALARMS)?;
        let active: Vec<String> = layout
            .datapoints(alarms_id)
            .map(|points| {
                points
                    .iter()
                    .filter(|(_, dp)| dp.value.is_truthy())
                    .map(|(name, _)| name.clone())
                    .collect()
            })
            .unwrap_or_default();
        let summary = if active.is_empty() {
            "None".to_string()
        } else {
            active.join(", ")
        };
        layout.lookup_mut(GROUP_ALARMS, ACTIVE_ALARMS)?.attrs = active
            .into_iter()
            .map(|name| (name, "ALARM".to_string()))
            .collect();
        layout.set_value(UI_GROUP, CURRENT_ALARMS, Value::Text(summary))?;
        Ok(())
    }
}

pub fn casa_factory() -> Box<dyn DeviceDriver> {
    Box::new(SwegonCasa::new(CasaVariant::Base))
}

pub fn casa_r7_factory() -> Box<dyn DeviceDriver> {
    Box::new(SwegonCasa::new(CasaVariant::R7))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r7_composes_base_with_overrides() {
        let base = SwegonCasa::new(CasaVariant::Base).build_layout().unwrap();
        let r7 = SwegonCasa::new(CasaVariant::R7).build_layout().unwrap();

        assert_eq!(
            base.lookup(GROUP_SETPOINTS, "Temperature Setpoint")
                .unwrap()
                .scaling,
            0.1
        );
        assert_eq!(
            r7.lookup(GROUP_SETPOINTS, "Temperature Setpoint")
                .unwrap()
                .scaling,
            1.0
        );
        assert!(base.lookup(GROUP_UNIT_STATUSES, "Heat Exchanger").is_some());
        assert!(r7.lookup(GROUP_UNIT_STATUSES, "Heat Exchanger").is_none());
        assert_eq!(
            r7.lookup(GROUP_SENSORS, "Heat Exchanger RPM")
                .unwrap()
                .address,
            6233
        );
        assert_eq!(
            r7.lookup(CONFIG_GROUP, "Night Cooling FreshAir Max")
                .unwrap()
                .scaling,
            1.0
        );
        // 删一项、增一项
        assert_eq!(base.len(), r7.len());
    }

    #[test]
    fn efficiency_rounds_and_guards_zero_span() {
        assert_eq!(efficiency(-5.0, 15.0, 21.0), 76.9);
        assert_eq!(efficiency(20.0, 20.0, 20.0), 0.0);
    }

    #[test]
    fn alarms_become_attributes_and_summary() {
        let mut driver = SwegonCasa::new(CasaVariant::Base);
        let mut layout = driver.build_layout().unwrap();
        for key in ["Fresh Air Temp", "Supply Temp before re-heater", "Extract Temp"] {
            layout
                .set_value(GROUP_SENSORS, key, Value::Float(10.0))
                .unwrap();
        }
        layout
            .set_value(GROUP_ALARMS, "Rotor", Value::Int(1))
            .unwrap();
        layout
            .set_value(GROUP_ALARMS, "T1 Failure", Value::Int(1))
            .unwrap();
        layout
            .set_value(GROUP_ALARMS, "T2 Failure", Value::Int(0))
            .unwrap();

        driver.after_read(&mut layout).unwrap();

        let active = layout.lookup(GROUP_ALARMS, ACTIVE_ALARMS).unwrap();
        assert_eq!(active.attrs.len(), 2);
        assert_eq!(active.attrs.get("Rotor").map(String::as_str), Some("ALARM"));
        assert_eq!(
            layout.lookup(UI_GROUP, CURRENT_ALARMS).unwrap().value,
            Value::Text("Rotor, T1 Failure".to_string())
        );
        assert_eq!(
            layout.lookup(UI_GROUP, EFFICIENCY).unwrap().value,
            Value::Float(0.0)
        );
    }

    #[test]
    fn first_read_fills_device_info() {
        let mut driver = SwegonCasa::new(CasaVariant::Base);
        let mut layout = driver.build_layout().unwrap();
        layout
            .set_value(GROUP_DEVICE_INFO, "Model Name", Value::from("CASA W100"))
            .unwrap();
        layout
            .set_value(GROUP_DEVICE_INFO, "Serial Number", Value::from("SE123"))
            .unwrap();
        for (key, v) in [("FW Maj", 4), ("FW Min", 2), ("FW Build", 17)] {
            layout
                .set_value(GROUP_DEVICE_INFO, key, Value::Int(v))
                .unwrap();
        }

        driver.after_first_read(&mut layout).unwrap();
        let info = driver.info();
        assert_eq!(info.model, "CASA W100");
        assert_eq!(info.serial_number.as_deref(), Some("SE123"));
        assert_eq!(info.sw_version.as_deref(), Some("4.2.17"));
    }

    #[test]
    fn first_read_requires_device_info() {
        let mut driver = SwegonCasa::new(CasaVariant::Base);
        let mut layout = driver.build_layout().unwrap();
        let err = driver.after_first_read(&mut layout).unwrap_err();
        assert!(matches!(err, DriverError::MissingValue(_)));
    }
}
