//! 内置参考驱动。

pub mod lk;
pub mod renke;
pub mod swegon;

use crate::error::DriverError;
use domain::{DatapointMap, Value};

/// 读取钩子依赖的点位值，缺失时报错。
pub(crate) fn required<'a>(
    layout: &'a DatapointMap,
    group: &str,
    key: &str,
) -> Result<&'a Value, DriverError> {
    layout
        .lookup(group, key)
        .map(|dp| &dp.value)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DriverError::MissingValue(format!("{group}/{key}")))
}

/// `a.b.c` 形式的版本号。
pub(crate) fn version_string(parts: [&Value; 3]) -> String {
    let [a, b, c] = parts;
    format!("{a}.{b}.{c}")
}
