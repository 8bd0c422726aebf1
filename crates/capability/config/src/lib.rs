//! 轮询进程运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 总线类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    Tcp,
    Rtu,
}

/// 串口校验位（`N` / `E` / `O`）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// 轮询进程运行配置。
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// 驱动型号，如 `Swegon/CASA`
    pub model: String,
    pub mode: BusMode,
    pub host: String,
    pub port: u16,
    /// RTU 模式下必填
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub timeout_ms: u64,
    pub slave_id: u8,
    pub scan_interval_seconds: u64,
    pub poll_timeout_seconds: u64,
}

impl AgentConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let model = env::var("MBPOLL_MODEL")
            .map_err(|_| ConfigError::Missing("MBPOLL_MODEL".to_string()))?;
        let mode = read_mode("MBPOLL_MODE")?;
        let host = env::var("MBPOLL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = read_u16_with_default("MBPOLL_PORT", 502)?;
        let serial_port = read_optional("MBPOLL_SERIAL_PORT");
        if mode == BusMode::Rtu && serial_port.is_none() {
            return Err(ConfigError::Missing("MBPOLL_SERIAL_PORT".to_string()));
        }
        let baud_rate = read_u32_with_default("MBPOLL_BAUD", 9600)?;
        let data_bits = read_u8_with_default("MBPOLL_DATA_BITS", 8)?;
        let parity = read_parity("MBPOLL_PARITY")?;
        let stop_bits = read_u8_with_default("MBPOLL_STOP_BITS", 1)?;
        let timeout_ms = read_u64_with_default("MBPOLL_TIMEOUT_MS", 3000)?;
        let slave_id = read_u8_with_default("MBPOLL_SLAVE_ID", 1)?;
        let scan_interval_seconds = read_u64_with_default("MBPOLL_SCAN_INTERVAL_SECONDS", 30)?;
        let poll_timeout_seconds = read_u64_with_default("MBPOLL_POLL_TIMEOUT_SECONDS", 20)?;
        if scan_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "MBPOLL_SCAN_INTERVAL_SECONDS".to_string(),
                "0".to_string(),
            ));
        }

        Ok(Self {
            model,
            mode,
            host,
            port,
            serial_port,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
            timeout_ms,
            slave_id,
            scan_interval_seconds,
            poll_timeout_seconds,
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_seconds)
    }

    /// 单个轮询周期的超时。
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }
}

fn read_mode(key: &str) -> Result<BusMode, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(BusMode::Tcp),
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "tcp" => Ok(BusMode::Tcp),
            "rtu" => Ok(BusMode::Rtu),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        },
    }
}

fn read_parity(key: &str) -> Result<Parity, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(Parity::None),
        Ok(value) => match value.to_ascii_uppercase().as_str() {
            "N" => Ok(Parity::None),
            "E" => Ok(Parity::Even),
            "O" => Ok(Parity::Odd),
            _ => Err(ConfigError::Invalid(key.to_string(), value)),
        },
    }
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
