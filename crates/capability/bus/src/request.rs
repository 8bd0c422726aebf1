//! 单次 Modbus 事务的请求与响应。

/// Modbus 请求（地址 0 起始）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadCoils { address: u16, count: u16 },
    ReadDiscreteInputs { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    ReadInputRegisters { address: u16, count: u16 },
    WriteSingleRegister { address: u16, value: u16 },
    WriteMultipleRegisters { address: u16, values: Vec<u16> },
    WriteSingleCoil { address: u16, value: bool },
    WriteMultipleCoils { address: u16, values: Vec<bool> },
}

impl Request {
    pub fn address(&self) -> u16 {
        match self {
            Request::ReadCoils { address, .. }
            | Request::ReadDiscreteInputs { address, .. }
            | Request::ReadHoldingRegisters { address, .. }
            | Request::ReadInputRegisters { address, .. }
            | Request::WriteSingleRegister { address, .. }
            | Request::WriteMultipleRegisters { address, .. }
            | Request::WriteSingleCoil { address, .. }
            | Request::WriteMultipleCoils { address, .. } => *address,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::WriteSingleRegister { .. }
                | Request::WriteMultipleRegisters { .. }
                | Request::WriteSingleCoil { .. }
                | Request::WriteMultipleCoils { .. }
        )
    }

    /// 请求涉及的寄存器/线圈数量。
    pub fn quantity(&self) -> usize {
        match self {
            Request::ReadCoils { count, .. }
            | Request::ReadDiscreteInputs { count, .. }
            | Request::ReadHoldingRegisters { count, .. }
            | Request::ReadInputRegisters { count, .. } => usize::from(*count),
            Request::WriteSingleRegister { .. } | Request::WriteSingleCoil { .. } => 1,
            Request::WriteMultipleRegisters { values, .. } => values.len(),
            Request::WriteMultipleCoils { values, .. } => values.len(),
        }
    }

    /// 简短名称，用于日志。
    pub fn name(&self) -> &'static str {
        match self {
            Request::ReadCoils { .. } => "read_coils",
            Request::ReadDiscreteInputs { .. } => "read_discrete_inputs",
            Request::ReadHoldingRegisters { .. } => "read_holding_registers",
            Request::ReadInputRegisters { .. } => "read_input_registers",
            Request::WriteSingleRegister { .. } => "write_single_register",
            Request::WriteMultipleRegisters { .. } => "write_multiple_registers",
            Request::WriteSingleCoil { .. } => "write_single_coil",
            Request::WriteMultipleCoils { .. } => "write_multiple_coils",
        }
    }
}

/// Modbus 响应。异常响应以 `Err(BusError::Exception)` 返回，不出现在这里。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Bits(Vec<bool>),
    Registers(Vec<u16>),
    Written,
}

impl Response {
    /// 以 16 位字视图返回读结果，线圈按 0/1 展开。
    pub fn into_words(self) -> Option<Vec<u16>> {
        match self {
            Response::Registers(registers) => Some(registers),
            Response::Bits(bits) => Some(bits.into_iter().map(u16::from).collect()),
            Response::Written => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_expand_to_words() {
        let words = Response::Bits(vec![true, false, true]).into_words();
        assert_eq!(words, Some(vec![1, 0, 1]));
        assert_eq!(Response::Written.into_words(), None);
    }

    #[test]
    fn request_quantity() {
        let request = Request::WriteMultipleCoils {
            address: 3,
            values: vec![true; 9],
        };
        assert_eq!(request.quantity(), 9);
        assert_eq!(request.address(), 3);
        assert!(request.is_write());
    }
}
