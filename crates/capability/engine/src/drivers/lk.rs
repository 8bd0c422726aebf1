//! LK Systems ARC Hub 地暖控制器。
//!
//! 分区数量在首次读取时才知道，分区分组在 `after_first_read` 中生成。

use super::{required, version_string};
use crate::driver::DeviceDriver;
use crate::error::DriverError;
use domain::{
    CONFIG_GROUP, Datapoint, DatapointMap, DeviceInfo, LayoutError, ModbusMode, PollMode,
    UI_GROUP, Value, ValueType,
};
use tracing::info;

pub const MODEL_ID: &str = "LKSystems/ARCHUB";

pub const GROUP_DEVICE_INFO: &str = "device_info";
pub const GROUP_UNIT_STATUSES: &str = "unit_statuses";
pub const GROUP_ALARMS: &str = "alarms";
pub const GROUP_COMMANDS: &str = "commands";

pub const NUMBER_OF_ZONES: &str = "Number Of Zones";
/// 控制器支持的最大分区数
pub const MAX_ZONES: u64 = 12;

const ACTUATORS: u16 = 12;

pub fn zone_sensors_group(zone: u16) -> String {
    format!("zone_{zone}_sensors")
}

pub fn zone_setpoints_group(zone: u16) -> String {
    format!("zone_{zone}_setpoints")
}

fn uint(address: u16) -> Datapoint {
    Datapoint::new(address).value_type(ValueType::UInt)
}

#[derive(Debug)]
pub struct ArcHub {
    info: DeviceInfo,
    zones: u16,
}

impl Default for ArcHub {
    fn default() -> Self {
        Self {
            info: DeviceInfo::new("LKSystems", "ARCHUB"),
            zones: 0,
        }
    }
}

impl ArcHub {
    pub fn zones(&self) -> u16 {
        self.zones
    }

    /// 追加单个分区的分组；已存在的分组保持不变。
    fn add_zone(layout: &mut DatapointMap, zone: u16) -> Result<(), LayoutError> {
        let base = zone * 100;

        let sensors_name = zone_sensors_group(zone);
        if layout.group_id(&sensors_name).is_none() {
            let sensors = layout.add_group(sensors_name, ModbusMode::Input, PollMode::OnPoll)?;
            let points = [
                ("Actual Temperature", Datapoint::new(base).scaling(0.1)),
                ("Actual Humidity", uint(base + 1).scaling(0.1)),
                ("Actual Battery", uint(base + 2)),
                ("Actual Signal Strength", Datapoint::new(base + 3)),
                ("Thermostat Address Raw", uint(base + 4).registers(3)),
                ("Connected Actuators", uint(base + 7)),
            ];
            for (name, dp) in points {
                layout.insert(sensors, format!("Zone {zone} {name}"), dp)?;
            }
        }

        let setpoints_name = zone_setpoints_group(zone);
        if layout.group_id(&setpoints_name).is_none() {
            let setpoints =
                layout.add_group(setpoints_name, ModbusMode::Holding, PollMode::OnPoll)?;
            let points = [
                ("Target Temperature", Datapoint::new(base).scaling(0.1)),
                ("Override", Datapoint::new(base + 1)),
                ("Override Level", Datapoint::new(base + 2)),
            ];
            for (name, dp) in points {
                layout.insert(setpoints, format!("Zone {zone} {name}"), dp)?;
            }
        }

        let ui = layout.require_group(UI_GROUP)?;
        for name in ["Thermostat Address", "Connected Actuators List"] {
            let key = format!("Zone {zone} {name}");
            if layout.datapoint(ui, &key).is_none() {
                layout.insert(ui, key, Datapoint::computed())?;
            }
        }
        Ok(())
    }
}

/// 48 位温控器地址格式化为 MAC；0 或非整数为 `N/A`。
pub fn format_mac(raw: &Value) -> String {
    match raw.as_u64() {
        Some(value) if value > 0 => (0..6)
            .rev()
            .map(|i| format!("{:02X}", (value >> (i * 8)) & 0xFF))
            .collect::<Vec<_>>()
            .join(":"),
        _ => "N/A".to_string(),
    }
}

/// 执行器位图转为 `1, 3` 形式；无执行器为 `None`。
pub fn format_actuators(bitfield: &Value) -> String {
    let Some(bits) = bitfield.as_u64() else {
        return "N/A".to_string();
    };
    let connected: Vec<String> = (0..ACTUATORS)
        .filter(|j| (bits >> j) & 1 == 1)
        .map(|j| (j + 1).to_string())
        .collect();
    if connected.is_empty() {
        "None".to_string()
    } else {
        connected.join(", ")
    }
}

impl DeviceDriver for ArcHub {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn build_layout(&self) -> Result<DatapointMap, LayoutError> {
        let mut layout = DatapointMap::with_default_groups();

        let device_info = layout.add_group(GROUP_DEVICE_INFO, ModbusMode::Input, PollMode::Once)?;
        layout.insert(device_info, "Serial Number", uint(0).registers(4))?;
        layout.insert(device_info, "Software Version Major", uint(4))?;
        layout.insert(device_info, "Software Version Minor", uint(5))?;
        layout.insert(device_info, "Software Version Micro", uint(6))?;
        // 输入寄存器 50 与保持寄存器 50（温度告警上限）不冲突
        layout.insert(device_info, NUMBER_OF_ZONES, uint(50))?;

        let statuses =
            layout.add_group(GROUP_UNIT_STATUSES, ModbusMode::Input, PollMode::OnPoll)?;
        for n in 1..=ACTUATORS {
            layout.insert(statuses, format!("Actuator {n}"), Datapoint::new(59 + n))?;
        }

        let alarms = layout.add_group(GROUP_ALARMS, ModbusMode::Input, PollMode::OnPoll)?;
        layout.insert(alarms, "Cooling Emergency Mode", Datapoint::new(80))?;

        let commands = layout.add_group(GROUP_COMMANDS, ModbusMode::Holding, PollMode::OnPoll)?;
        layout.insert(commands, "Operating Mode", Datapoint::new(0))?;
        layout.insert(commands, "LED Enable", Datapoint::new(58))?;

        let config = layout.require_group(CONFIG_GROUP)?;
        let settings = [
            ("Temperature Alarm High Level", 50, 0.1),
            ("Temperature Alarm Low Level", 51, 0.1),
            ("Humidity Alarm High Level", 52, 0.1),
            ("Humidity Alarm Low Level", 53, 0.1),
            ("Battery Alarm Low Level", 54, 0.1),
            ("Battery Alarm Critical Level", 55, 0.1),
            ("Cooling Emergency Number of Zones", 56, 1.0),
            ("Cooling Mode Humidity Limit", 57, 0.1),
        ];
        for (name, address, scaling) in settings {
            layout.insert(config, name, Datapoint::new(address).scaling(scaling))?;
        }

        Ok(layout)
    }

    fn after_first_read(&mut self, layout: &mut DatapointMap) -> Result<(), DriverError> {
        let serial = required(layout, GROUP_DEVICE_INFO, "Serial Number")?;
        self.info.serial_number = Some(serial.to_string());
        self.info.sw_version = Some(version_string([
            required(layout, GROUP_DEVICE_INFO, "Software Version Major")?,
            required(layout, GROUP_DEVICE_INFO, "Software Version Minor")?,
            required(layout, GROUP_DEVICE_INFO, "Software Version Micro")?,
        ]));

        let raw_zones = required(layout, GROUP_DEVICE_INFO, NUMBER_OF_ZONES)?;
        let zones = raw_zones
            .as_u64()
            .filter(|zones| *zones <= MAX_ZONES)
            .ok_or_else(|| DriverError::InvalidValue {
                key: NUMBER_OF_ZONES.to_string(),
                detail: format!("{raw_zones} (expected 0..={MAX_ZONES})"),
            })?;
        // 上面已限制在 MAX_ZONES 以内
        let zones = zones as u16;

        for zone in 1..=zones {
            Self::add_zone(layout, zone)?;
        }
        self.zones = zones;
        info!(
            target: "mbpoll.engine",
            model = %self.info.model,
            serial_number = self.info.serial_number.as_deref().unwrap_or("-"),
            zones,
            "zone groups activated"
        );
        Ok(())
    }

    fn after_read(&mut self, layout: &mut DatapointMap) -> Result<(), DriverError> {
        for zone in 1..=self.zones {
            let sensors = zone_sensors_group(zone);
            let mac = layout
                .lookup(&sensors, &format!("Zone {zone} Thermostat Address Raw"))
                .map(|dp| format_mac(&dp.value))
                .unwrap_or_else(|| "N/A".to_string());
            let actuators = layout
                .lookup(&sensors, &format!("Zone {zone} Connected Actuators"))
                .map(|dp| format_actuators(&dp.value))
                .unwrap_or_else(|| "N/A".to_string());

            layout.set_value(
                UI_GROUP,
                &format!("Zone {zone} Thermostat Address"),
                Value::Text(mac),
            )?;
            layout.set_value(
                UI_GROUP,
                &format!("Zone {zone} Connected Actuators List"),
                Value::Text(actuators),
            )?;
        }
        Ok(())
    }
}

pub fn factory() -> Box<dyn DeviceDriver> {
    Box::new(ArcHub::default())
}
