//! Modbus 主站传输接口。

use crate::error::BusError;
use crate::request::{Request, Response};
use async_trait::async_trait;

/// 一条已连接（或可连接）的 Modbus 主站传输。
///
/// 只列出轮询引擎需要的原语；实现者负责超时，异常响应映射为 [`BusError::Exception`]。
#[async_trait]
pub trait ModbusTransport: Send {
    async fn connect(&mut self) -> Result<(), BusError>;

    /// 关闭连接；未连接时无操作。
    async fn close(&mut self);

    fn is_connected(&self) -> bool;

    async fn read_coils(&mut self, unit: u8, address: u16, count: u16)
        -> Result<Vec<bool>, BusError>;

    async fn read_discrete_inputs(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, BusError>;

    async fn read_holding_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError>;

    async fn read_input_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, BusError>;

    async fn write_register(&mut self, unit: u8, address: u16, value: u16)
        -> Result<(), BusError>;

    async fn write_registers(
        &mut self,
        unit: u8,
        address: u16,
        values: &[u16],
    ) -> Result<(), BusError>;

    async fn write_coil(&mut self, unit: u8, address: u16, value: bool) -> Result<(), BusError>;

    async fn write_coils(&mut self, unit: u8, address: u16, values: &[bool])
        -> Result<(), BusError>;

    /// 按请求类型分派到对应原语。
    async fn dispatch(&mut self, unit: u8, request: &Request) -> Result<Response, BusError> {
        match request {
            Request::ReadCoils { address, count } => self
                .read_coils(unit, *address, *count)
                .await
                .map(Response::Bits),
            Request::ReadDiscreteInputs { address, count } => self
                .read_discrete_inputs(unit, *address, *count)
                .await
                .map(Response::Bits),
            Request::ReadHoldingRegisters { address, count } => self
                .read_holding_registers(unit, *address, *count)
                .await
                .map(Response::Registers),
            Request::ReadInputRegisters { address, count } => self
                .read_input_registers(unit, *address, *count)
                .await
                .map(Response::Registers),
            Request::WriteSingleRegister { address, value } => {
                self.write_register(unit, *address, *value).await?;
                Ok(Response::Written)
            }
            Request::WriteMultipleRegisters { address, values } => {
                self.write_registers(unit, *address, values).await?;
                Ok(Response::Written)
            }
            Request::WriteSingleCoil { address, value } => {
                self.write_coil(unit, *address, *value).await?;
                Ok(Response::Written)
            }
            Request::WriteMultipleCoils { address, values } => {
                self.write_coils(unit, *address, values).await?;
                Ok(Response::Written)
            }
        }
    }
}
