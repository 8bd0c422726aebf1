//! 基于 tokio-modbus 的传输实现（TCP 与 RTU）。

use crate::error::BusError;
use crate::settings::{SerialParity, SerialSettings, TcpEndpointConfig};
use crate::transport::ModbusTransport;
use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::prelude::*;
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::{debug, warn};

/// 传输端点。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(TcpEndpointConfig),
    Rtu(SerialSettings),
}

impl Endpoint {
    /// 端点标识：串口名或 `host:port`。
    pub fn name(&self) -> String {
        match self {
            Endpoint::Tcp(config) => config.endpoint(),
            Endpoint::Rtu(settings) => settings.port.clone(),
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            Endpoint::Tcp(config) => Duration::from_millis(config.timeout_ms),
            Endpoint::Rtu(settings) => Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// tokio-modbus 传输。连接在 `connect` 时建立；传输层失败后丢弃连接，下次事务前重连。
///
/// 事务 future 在完成前被丢弃时，连接上可能残留迟到的响应，该连接同样作废。
pub struct TokioModbusTransport {
    endpoint: Endpoint,
    timeout: Duration,
    ctx: Option<Context>,
    /// 已发出请求但尚未收尾
    in_flight: bool,
}

impl TokioModbusTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        let timeout = endpoint.timeout();
        Self {
            endpoint,
            timeout,
            ctx: None,
            in_flight: false,
        }
    }

    pub fn tcp(config: TcpEndpointConfig) -> Self {
        Self::new(Endpoint::Tcp(config))
    }

    pub fn rtu(settings: SerialSettings) -> Self {
        Self::new(Endpoint::Rtu(settings))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn context(&mut self, unit: u8) -> Result<&mut Context, BusError> {
        self.discard_cancelled();
        let ctx = self
            .ctx
            .as_mut()
            .ok_or_else(|| BusError::Connection(format!("{} not connected", self.endpoint.name())))?;
        self.in_flight = true;
        ctx.set_slave(Slave(unit));
        Ok(ctx)
    }

    /// 上一次事务被取消时丢弃连接。
    fn discard_cancelled(&mut self) {
        if !self.in_flight {
            return;
        }
        self.in_flight = false;
        if self.ctx.take().is_some() {
            warn!(
                target: "mbpoll.bus",
                endpoint = %self.endpoint.name(),
                "discarding modbus connection after cancelled transaction"
            );
        }
    }

    fn finish<T>(&mut self, result: &Result<T, BusError>) {
        self.in_flight = false;
        if let Err(e) = result {
            if !e.is_exception() {
                warn!(
                    target: "mbpoll.bus",
                    endpoint = %self.endpoint.name(),
                    error = %e,
                    "dropping modbus connection after transport failure"
                );
                self.ctx = None;
            }
        }
    }

    async fn open_tcp(config: &TcpEndpointConfig, timeout: Duration) -> Result<Context, BusError> {
        let endpoint = config.endpoint();
        let addr = tokio::time::timeout(timeout, tokio::net::lookup_host(endpoint.clone()))
            .await
            .map_err(|_| BusError::Timeout(format!("resolve {endpoint}")))?
            .map_err(|e| BusError::ConfigParse(format!("invalid address {endpoint}: {e}")))?
            .next()
            .ok_or_else(|| BusError::ConfigParse(format!("no address for {endpoint}")))?;

        tokio::time::timeout(timeout, tcp::connect(addr))
            .await
            .map_err(|_| BusError::Timeout(format!("connect {endpoint}")))?
            .map_err(|e| BusError::Connection(e.to_string()))
    }

    fn open_rtu(settings: &SerialSettings) -> Result<Context, BusError> {
        let builder = tokio_serial::new(settings.port.as_str(), settings.baud_rate)
            .parity(map_parity(settings.parity))
            .data_bits(map_data_bits(settings.data_bits)?)
            .stop_bits(map_stop_bits(settings.stop_bits)?)
            .timeout(Duration::from_millis(settings.timeout_ms));

        let port = SerialStream::open(&builder)
            .map_err(|e| BusError::Connection(format!("{}: {e}", settings.port)))?;
        Ok(rtu::attach_slave(port, Slave(1)))
    }
}

/// 执行一次 tokio-modbus 调用，拆开 `Result<Result<T, ExceptionCode>, Error>`。
async fn call<T, E, X, F>(timeout: Duration, what: &str, fut: F) -> Result<T, BusError>
where
    F: Future<Output = Result<Result<T, X>, E>>,
    E: Display,
    X: Debug,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BusError::Timeout(what.to_string()))?
        .map_err(|e| BusError::Transport(e.to_string()))?
        .map_err(|e| BusError::Exception(format!("{what}: {e:?}")))
}

#[async_trait]
impl ModbusTransport for TokioModbusTransport {
    async fn connect(&mut self) -> Result<(), BusError> {
        self.discard_cancelled();
        if self.ctx.is_some() {
            return Ok(());
        }
        let ctx = match &self.endpoint {
            Endpoint::Tcp(config) => Self::open_tcp(config, self.timeout).await?,
            Endpoint::Rtu(settings) => Self::open_rtu(settings)?,
        };
        debug!(target: "mbpoll.bus", endpoint = %self.endpoint.name(), "modbus transport connected");
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn close(&mut self) {
        self.in_flight = false;
        if let Some(mut ctx) = self.ctx.take() {
            let _ = ctx.disconnect().await;
            debug!(target: "mbpoll.bus", endpoint = %self.endpoint.name(), "modbus transport closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.ctx.is_some() && !self.in_flight
    }

    async fn read_coils(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(timeout, "read_coils", ctx.read_coils(address, count)).await;
        self.finish(&result);
        result
    }

    async fn read_discrete_inputs(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "read_discrete_inputs",
            ctx.read_discrete_inputs(address, count),
        )
        .await;
        self.finish(&result);
        result
    }

    async fn read_holding_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "read_holding_registers",
            ctx.read_holding_registers(address, count),
        )
        .await;
        self.finish(&result);
        result
    }

    async fn read_input_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "read_input_registers",
            ctx.read_input_registers(address, count),
        )
        .await;
        self.finish(&result);
        result
    }

    async fn write_register(&mut self, unit: u8, address: u16, value: u16) -> Result<(), BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "write_single_register",
            ctx.write_single_register(address, value),
        )
        .await;
        self.finish(&result);
        result
    }

    async fn write_registers(
        &mut self,
        unit: u8,
        address: u16,
        values: &[u16],
    ) -> Result<(), BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "write_multiple_registers",
            ctx.write_multiple_registers(address, values),
        )
        .await;
        self.finish(&result);
        result
    }

    async fn write_coil(&mut self, unit: u8, address: u16, value: bool) -> Result<(), BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(timeout, "write_single_coil", ctx.write_single_coil(address, value)).await;
        self.finish(&result);
        result
    }

    async fn write_coils(
        &mut self,
        unit: u8,
        address: u16,
        values: &[bool],
    ) -> Result<(), BusError> {
        let timeout = self.timeout;
        let ctx = self.context(unit)?;
        let result = call(
            timeout,
            "write_multiple_coils",
            ctx.write_multiple_coils(address, values),
        )
        .await;
        self.finish(&result);
        result
    }
}

fn map_parity(parity: SerialParity) -> Parity {
    match parity {
        SerialParity::None => Parity::None,
        SerialParity::Even => Parity::Even,
        SerialParity::Odd => Parity::Odd,
    }
}

fn map_data_bits(bits: u8) -> Result<DataBits, BusError> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(BusError::ConfigParse(format!("unsupported data bits: {other}"))),
    }
}

fn map_stop_bits(bits: u8) -> Result<StopBits, BusError> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(BusError::ConfigParse(format!("unsupported stop bits: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_name() {
        let tcp = Endpoint::Tcp(TcpEndpointConfig::new("10.0.0.5", 1502));
        assert_eq!(tcp.name(), "10.0.0.5:1502");
        let rtu = Endpoint::Rtu(SerialSettings::new("/dev/ttyUSB0"));
        assert_eq!(rtu.name(), "/dev/ttyUSB0");
    }

    #[test]
    fn test_serial_mapping() {
        assert_eq!(map_data_bits(8).unwrap(), DataBits::Eight);
        assert_eq!(map_stop_bits(2).unwrap(), StopBits::Two);
        assert!(matches!(map_data_bits(9), Err(BusError::ConfigParse(_))));
        assert!(matches!(map_stop_bits(3), Err(BusError::ConfigParse(_))));
    }

    #[tokio::test]
    async fn test_read_without_connect_fails() {
        let mut transport = TokioModbusTransport::tcp(TcpEndpointConfig::new("127.0.0.1", 502));
        assert!(!transport.is_connected());
        let err = transport.read_holding_registers(1, 0, 1).await.unwrap_err();
        assert!(matches!(err, BusError::Connection(_)));
    }
}
