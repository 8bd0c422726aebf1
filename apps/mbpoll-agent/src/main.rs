//! 单设备轮询进程：按固定间隔执行轮询周期，ctrl-c 退出。

use domain::DeviceInfo;
use mbpoll_bus::{BusChannel, BusRegistry, SerialParity, SerialSettings, TcpEndpointConfig};
use mbpoll_config::{AgentConfig, BusMode, ConfigError, Parity};
use mbpoll_engine::{DeviceSession, DriverRegistry, EngineError};
use mbpoll_telemetry::{init_tracing, metrics, new_session_id};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AgentConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    let drivers = DriverRegistry::with_builtin();
    let driver = drivers.create(&config.model)?;
    let buses = BusRegistry::new();
    let session_id = new_session_id();
    let channel = open_channel(&buses, &config, &session_id)?;

    let mut session = DeviceSession::new(driver, channel, config.slave_id)?;
    info!(
        session_id = %session_id,
        model = %config.model,
        slave_id = config.slave_id,
        interval_seconds = config.scan_interval_seconds,
        "device session started"
    );

    let mut ticker = tokio::time::interval(config.scan_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => poll_once(&mut session, &config).await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    session.close().await;
    let released = buses.prune();
    let stats = session.statistics();
    let totals = metrics().snapshot();
    info!(
        released,
        tx_packets = stats.tx_packets,
        rx_packets = stats.rx_packets,
        poll_cycles = totals.poll_cycles,
        poll_failures = totals.poll_failures,
        "device session closed"
    );
    Ok(())
}

/// 按配置取得总线通道；会话 ID 作为总线使用者标识。
fn open_channel(
    buses: &BusRegistry,
    config: &AgentConfig,
    owner: &str,
) -> Result<Arc<dyn BusChannel>, Box<dyn std::error::Error>> {
    match config.mode {
        BusMode::Tcp => {
            let mut endpoint = TcpEndpointConfig::new(config.host.clone(), config.port);
            endpoint.timeout_ms = config.timeout_ms;
            let channel: Arc<dyn BusChannel> = Arc::new(buses.tcp_channel(&endpoint, owner));
            Ok(channel)
        }
        BusMode::Rtu => {
            let port = config
                .serial_port
                .clone()
                .ok_or_else(|| ConfigError::Missing("MBPOLL_SERIAL_PORT".to_string()))?;
            let settings = SerialSettings {
                baud_rate: config.baud_rate,
                data_bits: config.data_bits,
                parity: match config.parity {
                    Parity::None => SerialParity::None,
                    Parity::Even => SerialParity::Even,
                    Parity::Odd => SerialParity::Odd,
                },
                stop_bits: config.stop_bits,
                timeout_ms: config.timeout_ms,
                ..SerialSettings::new(port)
            };
            let channel: Arc<dyn BusChannel> = Arc::new(buses.rtu_channel(&settings, owner)?);
            Ok(channel)
        }
    }
}

/// 执行一个带超时的轮询周期；失败只记录日志，下一个间隔重试。
async fn poll_once(session: &mut DeviceSession, config: &AgentConfig) {
    match tokio::time::timeout(config.poll_timeout(), session.poll_cycle()).await {
        Ok(Ok(())) => {
            let DeviceInfo {
                serial_number,
                sw_version,
                ..
            } = session.info();
            match serde_json::to_string(&session.snapshot()) {
                Ok(values) => debug!(
                    serial_number = serial_number.as_deref().unwrap_or("-"),
                    sw_version = sw_version.as_deref().unwrap_or("-"),
                    values = %values,
                    "poll cycle complete"
                ),
                Err(e) => warn!(error = %e, "failed to serialize snapshot"),
            }
        }
        Ok(Err(EngineError::Bus(e))) if e.is_recoverable() => {
            warn!(error = %e, "bus error, retrying next interval")
        }
        Ok(Err(e)) => error!(error = %e, "poll cycle failed"),
        Err(_) => warn!(
            timeout_seconds = config.poll_timeout_seconds,
            "poll cycle timed out"
        ),
    }
}
