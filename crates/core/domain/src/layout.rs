//! 设备点位表：分组句柄 → 名称 → 数据点。

use crate::data::Value;
use crate::datapoint::Datapoint;
use crate::group::{Group, GroupId, ModbusMode, PollMode};
use std::collections::BTreeMap;

/// 默认配置分组（保持寄存器，不轮询）。
pub const CONFIG_GROUP: &str = "config";
/// 默认展示分组（计算型，不轮询）。
pub const UI_GROUP: &str = "ui";

/// 点位表操作错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("duplicate group: {0}")]
    DuplicateGroup(String),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("unknown datapoint {key} in group {group}")]
    UnknownDatapoint { group: String, key: String },
}

/// 设备变体对基础点位表的修改项，按顺序应用。
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOverride {
    SetScaling {
        group: String,
        key: String,
        scaling: f64,
    },
    SetPrecision {
        group: String,
        key: String,
        precision: Option<u8>,
    },
    /// 替换已存在的点位
    Replace {
        group: String,
        key: String,
        datapoint: Datapoint,
    },
    /// 新增或覆盖点位
    Insert {
        group: String,
        key: String,
        datapoint: Datapoint,
    },
    Remove {
        group: String,
        key: String,
    },
}

impl LayoutOverride {
    pub fn set_scaling(group: &str, key: &str, scaling: f64) -> Self {
        Self::SetScaling {
            group: group.to_string(),
            key: key.to_string(),
            scaling,
        }
    }

    pub fn set_precision(group: &str, key: &str, precision: Option<u8>) -> Self {
        Self::SetPrecision {
            group: group.to_string(),
            key: key.to_string(),
            precision,
        }
    }

    pub fn replace(group: &str, key: &str, datapoint: Datapoint) -> Self {
        Self::Replace {
            group: group.to_string(),
            key: key.to_string(),
            datapoint,
        }
    }

    pub fn insert(group: &str, key: &str, datapoint: Datapoint) -> Self {
        Self::Insert {
            group: group.to_string(),
            key: key.to_string(),
            datapoint,
        }
    }

    pub fn remove(group: &str, key: &str) -> Self {
        Self::Remove {
            group: group.to_string(),
            key: key.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct GroupEntry {
    group: Group,
    datapoints: BTreeMap<String, Datapoint>,
}

/// 设备的完整点位表。
///
/// 以 [`GroupId`] 为键，分组名在表内唯一；同一 `(mode, poll_mode)` 可出现多个分组。
#[derive(Debug, Clone, Default)]
pub struct DatapointMap {
    entries: BTreeMap<GroupId, GroupEntry>,
    next_id: u32,
}

impl DatapointMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带默认分组 `config`（Holding/Off）与 `ui`（None/Off）的点位表。
    pub fn with_default_groups() -> Self {
        let mut map = Self::new();
        map.push_group(CONFIG_GROUP.to_string(), ModbusMode::Holding, PollMode::Off);
        map.push_group(UI_GROUP.to_string(), ModbusMode::None, PollMode::Off);
        map
    }

    /// 新建分组并返回其句柄。
    pub fn add_group(
        &mut self,
        name: impl Into<String>,
        mode: ModbusMode,
        poll_mode: PollMode,
    ) -> Result<GroupId, LayoutError> {
        let name = name.into();
        if self.group_id(&name).is_some() {
            return Err(LayoutError::DuplicateGroup(name));
        }
        Ok(self.push_group(name, mode, poll_mode))
    }

    fn push_group(&mut self, name: String, mode: ModbusMode, poll_mode: PollMode) -> GroupId {
        let id = GroupId::new(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            GroupEntry {
                group: Group::new(id, name, mode, poll_mode),
                datapoints: BTreeMap::new(),
            },
        );
        id
    }

    pub fn group_id(&self, name: &str) -> Option<GroupId> {
        self.entries
            .values()
            .find(|entry| entry.group.name() == name)
            .map(|entry| entry.group.id())
    }

    /// 按名称查找分组，不存在时报错。
    pub fn require_group(&self, name: &str) -> Result<GroupId, LayoutError> {
        self.group_id(name)
            .ok_or_else(|| LayoutError::UnknownGroup(name.to_string()))
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.entries.get(&id).map(|entry| &entry.group)
    }

    /// 按创建顺序遍历分组。
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.entries.values().map(|entry| &entry.group)
    }

    pub fn remove_group(&mut self, id: GroupId) -> Option<Group> {
        self.entries.remove(&id).map(|entry| entry.group)
    }

    /// 插入点位，返回被覆盖的旧点位。
    pub fn insert(
        &mut self,
        id: GroupId,
        key: impl Into<String>,
        datapoint: Datapoint,
    ) -> Result<Option<Datapoint>, LayoutError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or_else(|| LayoutError::UnknownGroup(id.to_string()))?;
        Ok(entry.datapoints.insert(key.into(), datapoint))
    }

    pub fn remove(&mut self, id: GroupId, key: &str) -> Option<Datapoint> {
        self.entries
            .get_mut(&id)
            .and_then(|entry| entry.datapoints.remove(key))
    }

    pub fn datapoints(&self, id: GroupId) -> Option<&BTreeMap<String, Datapoint>> {
        self.entries.get(&id).map(|entry| &entry.datapoints)
    }

    pub fn datapoints_mut(&mut self, id: GroupId) -> Option<&mut BTreeMap<String, Datapoint>> {
        self.entries.get_mut(&id).map(|entry| &mut entry.datapoints)
    }

    pub fn datapoint(&self, id: GroupId, key: &str) -> Option<&Datapoint> {
        self.datapoints(id).and_then(|points| points.get(key))
    }

    pub fn datapoint_mut(&mut self, id: GroupId, key: &str) -> Option<&mut Datapoint> {
        self.datapoints_mut(id).and_then(|points| points.get_mut(key))
    }

    pub fn value(&self, id: GroupId, key: &str) -> Option<&Value> {
        self.datapoint(id, key).map(|dp| &dp.value)
    }

    /// 按分组名与点位名查找。
    pub fn lookup(&self, group: &str, key: &str) -> Option<&Datapoint> {
        self.group_id(group).and_then(|id| self.datapoint(id, key))
    }

    pub fn lookup_mut(&mut self, group: &str, key: &str) -> Result<&mut Datapoint, LayoutError> {
        let id = self.require_group(group)?;
        self.datapoint_mut(id, key)
            .ok_or_else(|| LayoutError::UnknownDatapoint {
                group: group.to_string(),
                key: key.to_string(),
            })
    }

    /// 写入计算型点位的值。
    pub fn set_value(&mut self, group: &str, key: &str, value: Value) -> Result<(), LayoutError> {
        self.lookup_mut(group, key)?.value = value;
        Ok(())
    }

    /// 点位总数。
    pub fn len(&self) -> usize {
        self.entries.values().map(|entry| entry.datapoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按顺序应用变体修改；任一项失败立即返回，之前的修改保留。
    pub fn apply(&mut self, overrides: &[LayoutOverride]) -> Result<(), LayoutError> {
        for item in overrides {
            match item {
                LayoutOverride::SetScaling {
                    group,
                    key,
                    scaling,
                } => self.lookup_mut(group, key)?.scaling = *scaling,
                LayoutOverride::SetPrecision {
                    group,
                    key,
                    precision,
                } => self.lookup_mut(group, key)?.precision = *precision,
                LayoutOverride::Replace {
                    group,
                    key,
                    datapoint,
                } => *self.lookup_mut(group, key)? = datapoint.clone(),
                LayoutOverride::Insert {
                    group,
                    key,
                    datapoint,
                } => {
                    let id = self.require_group(group)?;
                    self.insert(id, key.clone(), datapoint.clone())?;
                }
                LayoutOverride::Remove { group, key } => {
                    let id = self.require_group(group)?;
                    if self.remove(id, key).is_none() {
                        return Err(LayoutError::UnknownDatapoint {
                            group: group.clone(),
                            key: key.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
