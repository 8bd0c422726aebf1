//! 设备会话：一个设备的点位表、轮询周期与单点读写。

use crate::batch::{self, ReadSpan};
use crate::driver::DeviceDriver;
use crate::error::EngineError;
use domain::{ByteOrder, DatapointMap, DeviceInfo, GroupId, ModbusMode, PollMode, Value, WordOrder};
use mbpoll_bus::{BusChannel, BusError, Request, Response, wire};
use mbpoll_codec::{CodecError, CodecSpec, decode, encode};
use mbpoll_telemetry::{
    TrafficCounters, TrafficSnapshot, record_decode_failure, record_poll_cycle,
    record_poll_failure, record_write_failure, record_write_success,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// 会话状态。
///
/// `Disconnected → Connecting → Polling{first_read: true} → Polling{first_read: false} → Closed`；
/// 连接失败回到 `Disconnected`，首个周期任何失败都保持 `first_read`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Polling { first_read: bool },
    Closed,
}

/// 单个设备的轮询会话。
///
/// 缓存值只在本会话内更新：读取成功后整组替换，写入成功后乐观更新。
pub struct DeviceSession {
    driver: Box<dyn DeviceDriver>,
    channel: Arc<dyn BusChannel>,
    unit_id: u8,
    layout: DatapointMap,
    state: SessionState,
    first_read: bool,
    counters: TrafficCounters,
}

impl DeviceSession {
    /// 构建静态点位表并校验编解码参数与分组跨度。
    pub fn new(
        driver: Box<dyn DeviceDriver>,
        channel: Arc<dyn BusChannel>,
        unit_id: u8,
    ) -> Result<Self, EngineError> {
        let layout = driver.build_layout()?;
        validate_layout(&layout, driver.byte_order(), driver.word_order())?;
        let info = driver.info();
        debug!(
            target: "mbpoll.engine",
            manufacturer = %info.manufacturer,
            model = %info.model,
            datapoints = layout.len(),
            endpoint = channel.endpoint(),
            unit_id,
            "loaded datapoints"
        );
        Ok(Self {
            driver,
            channel,
            unit_id,
            layout,
            state: SessionState::Disconnected,
            first_read: true,
            counters: TrafficCounters::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_first_read(&self) -> bool {
        self.first_read
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn layout(&self) -> &DatapointMap {
        &self.layout
    }

    /// 设备信息；首个周期后可能含序列号与固件版本。
    pub fn info(&self) -> DeviceInfo {
        self.driver.info()
    }

    pub fn value(&self, group: &str, key: &str) -> Option<&Value> {
        self.layout.lookup(group, key).map(|dp| &dp.value)
    }

    pub fn attrs(&self, group: &str, key: &str) -> Option<&BTreeMap<String, String>> {
        self.layout.lookup(group, key).map(|dp| &dp.attrs)
    }

    /// 本设备的收发统计。
    pub fn statistics(&self) -> TrafficSnapshot {
        self.counters.snapshot()
    }

    /// 分组名 → 点位名 → 当前值。
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        self.layout
            .groups()
            .map(|group| {
                let values = self
                    .layout
                    .datapoints(group.id())
                    .map(|points| {
                        points
                            .iter()
                            .map(|(key, dp)| (key.clone(), dp.value.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                (group.name().to_string(), values)
            })
            .collect()
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.state == SessionState::Closed {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    /// 执行一个轮询周期：读取所有到期分组，遇到第一个错误即中止。
    pub async fn poll_cycle(&mut self) -> Result<(), EngineError> {
        self.ensure_open()?;
        let result = self.run_cycle().await;
        match &result {
            Ok(()) => record_poll_cycle(),
            Err(e) => {
                record_poll_failure();
                warn!(
                    target: "mbpoll.engine",
                    endpoint = self.channel.endpoint(),
                    unit_id = self.unit_id,
                    first_read = self.first_read,
                    error = %e,
                    "poll cycle failed"
                );
            }
        }
        result
    }

    async fn run_cycle(&mut self) -> Result<(), EngineError> {
        if !matches!(self.state, SessionState::Polling { .. }) {
            self.state = SessionState::Connecting;
            if let Err(e) = self.channel.connect().await {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
            self.state = SessionState::Polling {
                first_read: self.first_read,
            };
        }

        self.driver.before_read(&mut self.layout);

        let due: Vec<GroupId> = self
            .layout
            .groups()
            .filter(|group| group.is_due(self.first_read))
            .map(|group| group.id())
            .collect();
        for id in due {
            self.read_group(id).await?;
        }

        if self.first_read {
            self.driver.after_first_read(&mut self.layout)?;
            validate_layout(
                &self.layout,
                self.driver.byte_order(),
                self.driver.word_order(),
            )?;
        }

        self.driver.after_read(&mut self.layout)?;

        // 整个首个周期（含钩子）成功后才退出首次读取
        if self.first_read {
            self.first_read = false;
            self.state = SessionState::Polling { first_read: false };
            let info = self.driver.info();
            info!(
                target: "mbpoll.engine",
                manufacturer = %info.manufacturer,
                model = %info.model,
                serial_number = info.serial_number.as_deref().unwrap_or("-"),
                sw_version = info.sw_version.as_deref().unwrap_or("-"),
                groups = self.layout.groups().count(),
                "first read complete"
            );
        }
        Ok(())
    }

    /// 以一次事务读取整个分组；全部解码成功后才替换缓存值。
    async fn read_group(&mut self, id: GroupId) -> Result<(), EngineError> {
        let (name, mode, span) = {
            let group = self
                .layout
                .group(id)
                .ok_or_else(|| EngineError::UnknownGroup(id.to_string()))?;
            if group.mode().is_virtual() {
                return Ok(());
            }
            let points = self
                .layout
                .datapoints(id)
                .ok_or_else(|| EngineError::UnknownGroup(group.name().to_string()))?;
            match batch::plan_read(group.name(), group.mode(), points.values())? {
                Some(span) => (group.name().to_string(), group.mode(), span),
                None => return Ok(()),
            }
        };
        let Some(request) = batch::read_request(mode, span) else {
            return Ok(());
        };

        let words = self.read_words(&name, span, request).await?;
        debug!(
            target: "mbpoll.engine",
            group = %name,
            start = span.start,
            count = span.count,
            data = ?words,
            "read group"
        );

        let (byte_order, word_order) = (self.driver.byte_order(), self.driver.word_order());
        let mut decoded = Vec::new();
        if let Some(points) = self.layout.datapoints(id) {
            for (key, dp) in points {
                let raw = &words[span.slice_of(dp)];
                let spec = CodecSpec::for_datapoint(dp, byte_order, word_order);
                match decode(raw, &spec) {
                    Ok(value) => decoded.push((key.clone(), value)),
                    Err(e) => {
                        record_decode_failure();
                        warn!(
                            target: "mbpoll.engine",
                            datapoint = %key,
                            group = %name,
                            address = dp.address,
                            count = dp.register_count,
                            raw = ?raw,
                            error = %e,
                            "failed to decode datapoint"
                        );
                        return Err(e.into());
                    }
                }
            }
        }

        if let Some(points) = self.layout.datapoints_mut(id) {
            for (key, value) in decoded {
                if let Some(dp) = points.get_mut(&key) {
                    dp.value = value;
                }
            }
        }
        Ok(())
    }

    /// 读取单个点位并更新缓存。
    pub async fn read_single(&mut self, group: &str, key: &str) -> Result<Value, EngineError> {
        self.ensure_open()?;
        let (id, mode, span, spec) = {
            let (id, mode) = self.resolve(group, key)?;
            if mode.is_virtual() {
                return Err(EngineError::NotReadable(group.to_string()));
            }
            let dp = self
                .layout
                .datapoint(id, key)
                .ok_or_else(|| unknown_datapoint(group, key))?;
            let span = batch::plan_read(group, mode, std::iter::once(dp))?
                .ok_or_else(|| unknown_datapoint(group, key))?;
            let spec =
                CodecSpec::for_datapoint(dp, self.driver.byte_order(), self.driver.word_order());
            (id, mode, span, spec)
        };
        let request =
            batch::read_request(mode, span).ok_or_else(|| EngineError::NotReadable(group.to_string()))?;

        let words = self.read_words(group, span, request).await?;
        let raw = &words[..usize::from(span.count)];
        let value = decode(raw, &spec).inspect_err(|e| {
            record_decode_failure();
            warn!(
                target: "mbpoll.engine",
                datapoint = key,
                group,
                address = span.start,
                count = span.count,
                raw = ?raw,
                error = %e,
                "failed to decode datapoint"
            );
        })?;

        if let Some(dp) = self.layout.datapoint_mut(id, key) {
            dp.value = value.clone();
        }
        Ok(value)
    }

    /// 编码并写入单个点位（1 或 2 个寄存器），成功后乐观更新缓存。
    pub async fn write_single(
        &mut self,
        group: &str,
        key: &str,
        value: Value,
    ) -> Result<(), EngineError> {
        self.ensure_open()?;
        let (id, mode) = self.resolve(group, key)?;
        if !mode.is_writable() {
            return Err(EngineError::NotWritable(group.to_string()));
        }
        let dp = self
            .layout
            .datapoint(id, key)
            .ok_or_else(|| unknown_datapoint(group, key))?;
        if dp.register_count > 2 {
            return Err(CodecError::UnsupportedRegisterCount {
                value_type: dp.value_type,
                count: dp.register_count,
            }
            .into());
        }
        let address = dp.address;
        let spec = CodecSpec::for_datapoint(dp, self.driver.byte_order(), self.driver.word_order());
        let words = encode(&value, &spec)?;
        let request = write_request(mode, address, words, group)?;
        debug!(
            target: "mbpoll.engine",
            group,
            datapoint = key,
            %value,
            request = request.name(),
            "writing datapoint"
        );

        match self.transact(request).await {
            Ok(_) => {
                record_write_success();
                if let Some(dp) = self.layout.datapoint_mut(id, key) {
                    dp.value = value;
                }
                Ok(())
            }
            Err(e) => {
                record_write_failure();
                Err(e)
            }
        }
    }

    /// 释放总线占用。重复调用无副作用。
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let info = self.driver.info();
        debug!(
            target: "mbpoll.engine",
            manufacturer = %info.manufacturer,
            model = %info.model,
            "closing device session"
        );
        self.channel.close().await;
        self.state = SessionState::Closed;
    }

    fn resolve(&self, group: &str, key: &str) -> Result<(GroupId, ModbusMode), EngineError> {
        let id = self
            .layout
            .group_id(group)
            .ok_or_else(|| EngineError::UnknownGroup(group.to_string()))?;
        let mode = self
            .layout
            .group(id)
            .map(|g| g.mode())
            .ok_or_else(|| EngineError::UnknownGroup(group.to_string()))?;
        if self.layout.datapoint(id, key).is_none() {
            return Err(unknown_datapoint(group, key));
        }
        Ok((id, mode))
    }

    async fn read_words(
        &self,
        group: &str,
        span: ReadSpan,
        request: Request,
    ) -> Result<Vec<u16>, EngineError> {
        let response = self.transact(request).await?;
        let words = response.into_words().ok_or_else(|| {
            BusError::UnexpectedResponse(format!("write acknowledgement for read of {group}"))
        })?;
        let expected = usize::from(span.count);
        if words.len() < expected {
            return Err(EngineError::ShortResponse {
                group: group.to_string(),
                expected,
                actual: words.len(),
            });
        }
        Ok(words)
    }

    async fn transact(&self, request: Request) -> Result<Response, EngineError> {
        let framing = self.channel.framing();
        let tx_bytes = wire::request_bytes(framing, &request);
        let rx_bytes = wire::response_bytes(framing, &request);
        trace!(
            target: "mbpoll.engine",
            unit_id = self.unit_id,
            request = request.name(),
            address = request.address(),
            quantity = request.quantity(),
            "modbus transaction"
        );
        let response = self.channel.transact(self.unit_id, request).await?;
        self.counters.record(tx_bytes, rx_bytes);
        Ok(response)
    }
}

fn unknown_datapoint(group: &str, key: &str) -> EngineError {
    EngineError::UnknownDatapoint {
        group: group.to_string(),
        key: key.to_string(),
    }
}

fn write_request(
    mode: ModbusMode,
    address: u16,
    words: Vec<u16>,
    group: &str,
) -> Result<Request, EngineError> {
    match mode {
        ModbusMode::Holding => Ok(if let [value] = words[..] {
            Request::WriteSingleRegister { address, value }
        } else {
            Request::WriteMultipleRegisters {
                address,
                values: words,
            }
        }),
        ModbusMode::Coils => {
            let bits: Vec<bool> = words.iter().map(|w| *w != 0).collect();
            Ok(if let [value] = bits[..] {
                Request::WriteSingleCoil { address, value }
            } else {
                Request::WriteMultipleCoils {
                    address,
                    values: bits,
                }
            })
        }
        _ => Err(EngineError::NotWritable(group.to_string())),
    }
}

/// 校验所有非计算型点位的编解码参数，以及轮询分组跨度与单点读取的上限。
fn validate_layout(
    layout: &DatapointMap,
    byte_order: ByteOrder,
    word_order: WordOrder,
) -> Result<(), EngineError> {
    for group in layout.groups() {
        if group.mode().is_virtual() {
            continue;
        }
        let Some(points) = layout.datapoints(group.id()) else {
            continue;
        };
        for dp in points.values() {
            CodecSpec::for_datapoint(dp, byte_order, word_order).validate()?;
        }
        if group.poll_mode() == PollMode::Off {
            // 不轮询的分组只会单点读取，逐点检查上限
            for dp in points.values() {
                batch::plan_read(group.name(), group.mode(), std::iter::once(dp))?;
            }
        } else {
            batch::plan_read(group.name(), group.mode(), points.values())?;
        }
    }
    Ok(())
}
