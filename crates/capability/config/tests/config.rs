use mbpoll_config::{AgentConfig, BusMode, ConfigError, Parity};
use std::sync::Mutex;

// 环境变量是进程级状态，测试之间串行执行。
static ENV_LOCK: Mutex<()> = Mutex::new(());

const KEYS: &[&str] = &[
    "MBPOLL_MODEL",
    "MBPOLL_MODE",
    "MBPOLL_HOST",
    "MBPOLL_PORT",
    "MBPOLL_SERIAL_PORT",
    "MBPOLL_BAUD",
    "MBPOLL_PARITY",
    "MBPOLL_SLAVE_ID",
    "MBPOLL_SCAN_INTERVAL_SECONDS",
];

fn reset_env(vars: &[(&str, &str)]) {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        for key in KEYS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
    }
}

#[test]
fn tcp_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset_env(&[("MBPOLL_MODEL", "Renke/RS-WS-N01-8")]);

    let config = AgentConfig::from_env().expect("config");
    assert_eq!(config.model, "Renke/RS-WS-N01-8");
    assert_eq!(config.mode, BusMode::Tcp);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 502);
    assert_eq!(config.slave_id, 1);
    assert_eq!(config.scan_interval().as_secs(), 30);
    assert_eq!(config.poll_timeout().as_secs(), 20);
}

#[test]
fn rtu_settings_from_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    reset_env(&[
        ("MBPOLL_MODEL", "Swegon/CASA"),
        ("MBPOLL_MODE", "RTU"),
        ("MBPOLL_SERIAL_PORT", "/dev/ttyUSB0"),
        ("MBPOLL_BAUD", "19200"),
        ("MBPOLL_PARITY", "e"),
        ("MBPOLL_SLAVE_ID", "16"),
    ]);

    let config = AgentConfig::from_env().expect("config");
    assert_eq!(config.mode, BusMode::Rtu);
    assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyUSB0"));
    assert_eq!(config.baud_rate, 19200);
    assert_eq!(config.parity, Parity::Even);
    assert_eq!(config.slave_id, 16);
}

#[test]
fn invalid_values_are_reported() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    reset_env(&[("MBPOLL_MODEL", "Swegon/CASA"), ("MBPOLL_MODE", "rtu")]);
    let err = AgentConfig::from_env().expect_err("serial port required");
    assert!(matches!(err, ConfigError::Missing(key) if key == "MBPOLL_SERIAL_PORT"));

    reset_env(&[("MBPOLL_MODEL", "Swegon/CASA"), ("MBPOLL_PARITY", "X")]);
    let err = AgentConfig::from_env().expect_err("bad parity");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "MBPOLL_PARITY"));

    reset_env(&[("MBPOLL_MODEL", "Swegon/CASA"), ("MBPOLL_SLAVE_ID", "300")]);
    let err = AgentConfig::from_env().expect_err("slave id out of range");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "MBPOLL_SLAVE_ID"));

    reset_env(&[]);
    let err = AgentConfig::from_env().expect_err("model required");
    assert!(matches!(err, ConfigError::Missing(key) if key == "MBPOLL_MODEL"));
}
