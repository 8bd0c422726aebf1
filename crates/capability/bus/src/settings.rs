//! 总线端点配置。

use crate::error::BusError;
use serde::{Deserialize, Serialize};

/// 串口校验位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerialParity {
    #[default]
    None,
    Even,
    Odd,
}

/// RTU 串口参数。同一串口上的所有设备必须完全一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// 串口名（如 /dev/ttyUSB0）
    pub port: String,
    /// 波特率（默认 9600）
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// 数据位（默认 8）
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: SerialParity,
    /// 停止位（默认 1）
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// 事务超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_modbus_port() -> u16 {
    502
}

impl SerialSettings {
    /// 8N1、9600、3 秒超时。
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: SerialParity::None,
            stop_bits: default_stop_bits(),
            timeout_ms: default_timeout_ms(),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        serde_json::from_str(json).map_err(|e| BusError::ConfigParse(e.to_string()))
    }

    /// 与另一组参数比较，返回第一处不一致的描述。
    pub fn mismatch(&self, other: &SerialSettings) -> Option<String> {
        if self.port != other.port {
            return Some(format!("port {} != {}", self.port, other.port));
        }
        if self.baud_rate != other.baud_rate {
            return Some(format!("baud_rate {} != {}", self.baud_rate, other.baud_rate));
        }
        if self.data_bits != other.data_bits {
            return Some(format!("data_bits {} != {}", self.data_bits, other.data_bits));
        }
        if self.parity != other.parity {
            return Some(format!("parity {:?} != {:?}", self.parity, other.parity));
        }
        if self.stop_bits != other.stop_bits {
            return Some(format!("stop_bits {} != {}", self.stop_bits, other.stop_bits));
        }
        if self.timeout_ms != other.timeout_ms {
            return Some(format!("timeout_ms {} != {}", self.timeout_ms, other.timeout_ms));
        }
        None
    }
}

/// Modbus TCP 端点配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpEndpointConfig {
    /// Modbus 服务器主机地址
    pub host: String,
    /// Modbus 服务器端口（默认 502）
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    /// 连接与事务超时（毫秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl TcpEndpointConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout_ms: default_timeout_ms(),
        }
    }

    /// 从 JSON 配置字符串解析
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        serde_json::from_str(json).map_err(|e| BusError::ConfigParse(e.to_string()))
    }

    /// 端点标识 `host:port`。
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_settings() {
        let settings = SerialSettings::from_json(r#"{"port": "/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(settings, SerialSettings::new("/dev/ttyUSB0"));

        let json = r#"{"port": "/dev/ttyUSB1", "baud_rate": 19200, "parity": "even", "stop_bits": 2}"#;
        let settings = SerialSettings::from_json(json).unwrap();
        assert_eq!(settings.baud_rate, 19200);
        assert_eq!(settings.parity, SerialParity::Even);
        assert_eq!(settings.stop_bits, 2);
        assert_eq!(settings.data_bits, 8);
    }

    #[test]
    fn test_parse_tcp_config() {
        let config = TcpEndpointConfig::from_json(r#"{"host": "192.168.1.100"}"#).unwrap();
        assert_eq!(config.port, 502);
        assert_eq!(config.timeout_ms, 3000);
        assert_eq!(config.endpoint(), "192.168.1.100:502");

        assert!(matches!(
            TcpEndpointConfig::from_json("{}"),
            Err(BusError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_mismatch_detail() {
        let a = SerialSettings::new("/dev/ttyUSB0");
        let mut b = a.clone();
        assert_eq!(a.mismatch(&b), None);
        b.baud_rate = 19200;
        assert_eq!(a.mismatch(&b), Some("baud_rate 9600 != 19200".to_string()));
        b = a.clone();
        b.timeout_ms = 1000;
        assert!(a.mismatch(&b).is_some());
    }
}
