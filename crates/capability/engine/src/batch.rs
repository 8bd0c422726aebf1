//! 分组批量读取规划：一个分组合并为一次连续读取。

use crate::error::EngineError;
use domain::{Datapoint, ModbusMode};
use mbpoll_bus::Request;

/// 寄存器读取功能码单次上限。
pub const MAX_REGISTERS_PER_READ: u32 = 125;
/// 线圈 / 离散输入读取单次上限。
pub const MAX_BITS_PER_READ: u32 = 2000;

/// 一次读取覆盖的地址区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpan {
    pub start: u16,
    pub count: u16,
}

impl ReadSpan {
    /// 点位在响应数据中的下标区间。
    pub fn slice_of(&self, dp: &Datapoint) -> std::ops::Range<usize> {
        let offset = usize::from(dp.address - self.start);
        offset..offset + usize::from(dp.register_count)
    }
}

pub fn max_per_read(mode: ModbusMode) -> u32 {
    if mode.is_bit_access() {
        MAX_BITS_PER_READ
    } else {
        MAX_REGISTERS_PER_READ
    }
}

/// `start = min(address)`，`end = max(address + count)`，在 u32 中计算以免越界。
fn bounds<'a>(datapoints: impl IntoIterator<Item = &'a Datapoint>) -> Option<(u32, u32)> {
    datapoints.into_iter().fold(None, |acc, dp| {
        let start = u32::from(dp.address);
        let end = dp.end_address();
        Some(match acc {
            None => (start, end),
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
        })
    })
}

/// 规划分组读取。空分组返回 `None`；跨度超过上限返回 `BatchTooLarge`。
pub fn plan_read<'a>(
    group: &str,
    mode: ModbusMode,
    datapoints: impl IntoIterator<Item = &'a Datapoint>,
) -> Result<Option<ReadSpan>, EngineError> {
    let Some((start, end)) = bounds(datapoints) else {
        return Ok(None);
    };
    let requested = end - start;
    let max = max_per_read(mode);
    if requested > max {
        return Err(EngineError::BatchTooLarge {
            group: group.to_string(),
            requested,
            max,
        });
    }
    // requested <= 2000，start 来自 u16
    Ok(Some(ReadSpan {
        start: start as u16,
        count: requested as u16,
    }))
}

/// 分组模式对应的读请求；计算型分组无请求。
pub fn read_request(mode: ModbusMode, span: ReadSpan) -> Option<Request> {
    let ReadSpan { start, count } = span;
    match mode {
        ModbusMode::Coils => Some(Request::ReadCoils {
            address: start,
            count,
        }),
        ModbusMode::DiscreteInputs => Some(Request::ReadDiscreteInputs {
            address: start,
            count,
        }),
        ModbusMode::Holding => Some(Request::ReadHoldingRegisters {
            address: start,
            count,
        }),
        ModbusMode::Input => Some(Request::ReadInputRegisters {
            address: start,
            count,
        }),
        ModbusMode::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_covers_all_datapoints() {
        let points = [Datapoint::new(10).registers(2), Datapoint::new(15)];
        let span = plan_read("sensors", ModbusMode::Holding, &points)
            .unwrap()
            .unwrap();
        assert_eq!(span, ReadSpan { start: 10, count: 6 });
        assert_eq!(span.slice_of(&points[0]), 0..2);
        assert_eq!(span.slice_of(&points[1]), 5..6);
    }

    #[test]
    fn empty_group_has_no_span() {
        let points: [Datapoint; 0] = [];
        assert_eq!(plan_read("empty", ModbusMode::Input, &points).unwrap(), None);
    }

    #[test]
    fn register_ceiling_is_enforced() {
        let points = [Datapoint::new(0), Datapoint::new(125)];
        let err = plan_read("wide", ModbusMode::Input, &points).unwrap_err();
        assert!(matches!(
            err,
            EngineError::BatchTooLarge {
                requested: 126,
                max: 125,
                ..
            }
        ));

        let points = [Datapoint::new(0), Datapoint::new(124)];
        assert!(plan_read("edge", ModbusMode::Input, &points).is_ok());
    }

    #[test]
    fn bit_groups_use_coil_ceiling() {
        let points = [Datapoint::new(0), Datapoint::new(1999)];
        let span = plan_read("coils", ModbusMode::Coils, &points)
            .unwrap()
            .unwrap();
        assert_eq!(span.count, 2000);
    }

    #[test]
    fn top_of_address_space_does_not_overflow() {
        let points = [Datapoint::new(65534).registers(2)];
        let span = plan_read("top", ModbusMode::Holding, &points)
            .unwrap()
            .unwrap();
        assert_eq!(span, ReadSpan { start: 65534, count: 2 });
    }

    #[test]
    fn virtual_groups_have_no_request() {
        let span = ReadSpan { start: 0, count: 1 };
        assert_eq!(read_request(ModbusMode::None, span), None);
        assert_eq!(
            read_request(ModbusMode::Coils, span),
            Some(Request::ReadCoils {
                address: 0,
                count: 1
            })
        );
    }
}
