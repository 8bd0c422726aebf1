//! 线上字节数估算（看板用，不参与协议处理）。
//!
//! 帧开销：RTU 为地址 + 功能码 + CRC 共 4 字节，TCP 为 MBAP 头 8 字节。

use crate::request::Request;

/// 帧格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Rtu,
    Tcp,
}

impl Framing {
    pub const fn overhead(self) -> u64 {
        match self {
            Framing::Rtu => 4,
            Framing::Tcp => 8,
        }
    }
}

fn packed_bits(count: usize) -> u64 {
    (count as u64).div_ceil(8)
}

/// 请求帧字节数。
pub fn request_bytes(framing: Framing, request: &Request) -> u64 {
    let body = match request {
        // 地址 2 + 数量 2
        Request::ReadCoils { .. }
        | Request::ReadDiscreteInputs { .. }
        | Request::ReadHoldingRegisters { .. }
        | Request::ReadInputRegisters { .. } => 4,
        // 地址 2 + 值 2
        Request::WriteSingleRegister { .. } | Request::WriteSingleCoil { .. } => 4,
        // 地址 2 + 数量 2 + 字节数 1 + 数据
        Request::WriteMultipleRegisters { values, .. } => 5 + 2 * values.len() as u64,
        Request::WriteMultipleCoils { values, .. } => 5 + packed_bits(values.len()),
    };
    framing.overhead() + body
}

/// 响应帧字节数。
pub fn response_bytes(framing: Framing, request: &Request) -> u64 {
    let body = match request {
        Request::ReadCoils { count, .. } | Request::ReadDiscreteInputs { count, .. } => {
            1 + packed_bits(usize::from(*count))
        }
        Request::ReadHoldingRegisters { count, .. } | Request::ReadInputRegisters { count, .. } => {
            1 + 2 * u64::from(*count)
        }
        // 写响应回显地址与数量/值
        Request::WriteSingleRegister { .. }
        | Request::WriteSingleCoil { .. }
        | Request::WriteMultipleRegisters { .. }
        | Request::WriteMultipleCoils { .. } => 4,
    };
    framing.overhead() + body
}
