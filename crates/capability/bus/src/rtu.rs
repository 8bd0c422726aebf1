//! RTU 串口总线：共享连接、互斥事务、引用计数。

use crate::channel::BusChannel;
use crate::error::BusError;
use crate::modbus::TokioModbusTransport;
use crate::request::{Request, Response};
use crate::settings::SerialSettings;
use crate::transport::ModbusTransport;
use crate::wire::{self, Framing};
use async_trait::async_trait;
use mbpoll_telemetry::{endpoint_statistics, TrafficCounters, TrafficSnapshot};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// `execute` 中单次事务返回的 future，借用被锁住的传输。
pub type TransactionFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, BusError>> + Send + 't>>;

/// 单个串口的总线管理器。
///
/// 同一串口任一时刻最多一个在途事务；连接在首次事务时打开，最后一个使用者离开时关闭。
pub struct RtuBusManager {
    settings: SerialSettings,
    transport: Mutex<Box<dyn ModbusTransport>>,
    users: StdMutex<HashSet<String>>,
    counters: TrafficCounters,
}

impl RtuBusManager {
    pub fn new(settings: SerialSettings) -> Self {
        let transport = Box::new(TokioModbusTransport::rtu(settings.clone()));
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(settings: SerialSettings, transport: Box<dyn ModbusTransport>) -> Self {
        Self {
            settings,
            transport: Mutex::new(transport),
            users: StdMutex::new(HashSet::new()),
            counters: TrafficCounters::new(),
        }
    }

    pub fn port(&self) -> &str {
        &self.settings.port
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn lock_users(&self) -> MutexGuard<'_, HashSet<String>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 登记使用者（幂等）。串口参数与已有配置不一致时拒绝。
    pub fn attach(&self, owner: &str, requested: &SerialSettings) -> Result<(), BusError> {
        if let Some(detail) = self.settings.mismatch(requested) {
            warn!(
                target: "mbpoll.bus",
                port = %self.settings.port,
                owner,
                %detail,
                "rejecting device with incompatible serial settings"
            );
            return Err(BusError::ConfigMismatch {
                port: self.settings.port.clone(),
                detail,
            });
        }
        let mut users = self.lock_users();
        if users.insert(owner.to_string()) {
            debug!(
                target: "mbpoll.bus",
                port = %self.settings.port,
                owner,
                users = users.len(),
                "device attached to rtu bus"
            );
        }
        Ok(())
    }

    /// 注销使用者。若为最后一个使用者返回 true，并在总线锁内关闭连接。
    pub async fn detach(&self, owner: &str) -> bool {
        let last = {
            let mut users = self.lock_users();
            users.remove(owner) && users.is_empty()
        };
        if !last {
            return false;
        }

        let mut transport = self.transport.lock().await;
        // 等锁期间可能有新设备接入
        if self.user_count() == 0 && transport.is_connected() {
            transport.close().await;
            info!(target: "mbpoll.bus", port = %self.settings.port, "rtu bus closed");
        }
        true
    }

    /// 持锁执行恰好一次事务；连接未打开时先打开。
    ///
    /// 锁随 guard 释放，正常返回、出错或 future 被丢弃时都会释放。
    pub async fn execute<T, F>(&self, transaction: F) -> Result<T, BusError>
    where
        F: for<'t> FnOnce(&'t mut (dyn ModbusTransport + 'static)) -> TransactionFuture<'t, T>
            + Send,
        T: Send,
    {
        let mut transport = self.transport.lock().await;
        if !transport.is_connected() {
            transport.connect().await?;
            info!(
                target: "mbpoll.bus",
                port = %self.settings.port,
                baud_rate = self.settings.baud_rate,
                "rtu bus opened"
            );
        }
        transaction(&mut **transport).await
    }

    pub fn user_count(&self) -> usize {
        self.lock_users().len()
    }

    pub fn has_user(&self, owner: &str) -> bool {
        self.lock_users().contains(owner)
    }

    /// 当前使用者，按名称排序。
    pub fn users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.lock_users().iter().cloned().collect();
        users.sort();
        users
    }

    /// 记录一次成功事务。
    pub fn record(&self, tx_bytes: u64, rx_bytes: u64) {
        self.counters.record(tx_bytes, rx_bytes);
        endpoint_statistics().record(&self.settings.port, tx_bytes, rx_bytes);
    }

    /// 串口累计流量。
    pub fn statistics(&self) -> TrafficSnapshot {
        self.counters.snapshot()
    }

    /// 连接是否打开（会等待在途事务结束）。
    pub async fn is_open(&self) -> bool {
        self.transport.lock().await.is_connected()
    }
}

/// 设备侧 RTU 通道：每次事务都经过共享管理器的锁。
pub struct RtuBusClient {
    manager: Arc<RtuBusManager>,
    owner: String,
}

impl RtuBusClient {
    pub fn new(manager: Arc<RtuBusManager>, owner: impl Into<String>) -> Self {
        Self {
            manager,
            owner: owner.into(),
        }
    }

    pub fn manager(&self) -> &Arc<RtuBusManager> {
        &self.manager
    }
}

#[async_trait]
impl BusChannel for RtuBusClient {
    async fn connect(&self) -> Result<(), BusError> {
        self.manager
            .execute(|_| Box::pin(async { Ok::<(), BusError>(()) }))
            .await
    }

    async fn close(&self) {
        self.manager.detach(&self.owner).await;
    }

    async fn transact(&self, unit: u8, request: Request) -> Result<Response, BusError> {
        let tx_bytes = wire::request_bytes(Framing::Rtu, &request);
        let rx_bytes = wire::response_bytes(Framing::Rtu, &request);
        let response = self
            .manager
            .execute(move |transport| {
                Box::pin(async move { transport.dispatch(unit, &request).await })
            })
            .await?;
        self.manager.record(tx_bytes, rx_bytes);
        Ok(response)
    }

    fn framing(&self) -> Framing {
        Framing::Rtu
    }

    fn endpoint(&self) -> &str {
        self.manager.port()
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}
