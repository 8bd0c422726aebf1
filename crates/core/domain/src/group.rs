//! 点位分组：共享 Modbus 功能族与轮询策略。
//!
//! 分组的身份是 [`GroupId`]（点位表分配的句柄），语义比较用 [`GroupKind`]。
//! 两个 `(mode, poll_mode)` 相同的分组语义上相等，但在点位表里仍是两个独立条目。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Modbus 功能族。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModbusMode {
    Coils,
    DiscreteInputs,
    Holding,
    Input,
    /// 计算型分组，从不上总线
    None,
}

impl ModbusMode {
    /// 线圈/离散输入按位访问。
    pub fn is_bit_access(self) -> bool {
        matches!(self, ModbusMode::Coils | ModbusMode::DiscreteInputs)
    }

    pub fn is_virtual(self) -> bool {
        self == ModbusMode::None
    }

    pub fn is_writable(self) -> bool {
        matches!(self, ModbusMode::Coils | ModbusMode::Holding)
    }
}

/// 轮询策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// 不自动读取
    Off,
    /// 每个轮询周期读取
    OnPoll,
    /// 仅首个周期读取
    Once,
}

/// 分组句柄，由 [`crate::DatapointMap`] 分配，在会话内稳定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(u32);

impl GroupId {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 分组的语义类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKind {
    pub mode: ModbusMode,
    pub poll_mode: PollMode,
}

/// 点位分组。
#[derive(Debug, Clone)]
pub struct Group {
    id: GroupId,
    name: String,
    mode: ModbusMode,
    poll_mode: PollMode,
}

impl Group {
    pub(crate) fn new(id: GroupId, name: String, mode: ModbusMode, poll_mode: PollMode) -> Self {
        Self {
            id,
            name,
            mode,
            poll_mode,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> ModbusMode {
        self.mode
    }

    pub fn poll_mode(&self) -> PollMode {
        self.poll_mode
    }

    pub fn kind(&self) -> GroupKind {
        GroupKind {
            mode: self.mode,
            poll_mode: self.poll_mode,
        }
    }

    /// 本周期是否需要读取。`first_read` 为 true 时 `Once` 分组也到期。
    pub fn is_due(&self, first_read: bool) -> bool {
        if self.mode.is_virtual() {
            return false;
        }
        match self.poll_mode {
            PollMode::OnPoll => true,
            PollMode::Once => first_read,
            PollMode::Off => false,
        }
    }
}

/// 语义相等：只比较 `(mode, poll_mode)`，不比较句柄与名称。
impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u32, mode: ModbusMode, poll_mode: PollMode) -> Group {
        Group::new(GroupId::new(id), format!("g{id}"), mode, poll_mode)
    }

    #[test]
    fn kind_equality_ignores_identity() {
        let a = group(0, ModbusMode::Input, PollMode::OnPoll);
        let b = group(1, ModbusMode::Input, PollMode::OnPoll);
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a, b);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, group(2, ModbusMode::Input, PollMode::Once));
    }

    #[test]
    fn due_groups() {
        assert!(group(0, ModbusMode::Holding, PollMode::OnPoll).is_due(false));
        assert!(group(0, ModbusMode::Input, PollMode::Once).is_due(true));
        assert!(!group(0, ModbusMode::Input, PollMode::Once).is_due(false));
        assert!(!group(0, ModbusMode::Holding, PollMode::Off).is_due(true));
        assert!(!group(0, ModbusMode::None, PollMode::OnPoll).is_due(true));
    }
}
