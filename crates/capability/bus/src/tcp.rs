//! TCP 端点：每个设备独立连接，端点级流量汇总。

use crate::channel::BusChannel;
use crate::error::BusError;
use crate::request::{Request, Response};
use crate::settings::TcpEndpointConfig;
use crate::transport::ModbusTransport;
use crate::wire::{self, Framing};
use async_trait::async_trait;
use mbpoll_telemetry::{endpoint_statistics, TrafficCounters, TrafficSnapshot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::debug;

/// 同一 `host:port` 的设备集合与累计流量。无共享连接，无锁。
pub struct TcpBusManager {
    config: TcpEndpointConfig,
    endpoint: String,
    users: StdMutex<HashSet<String>>,
    counters: TrafficCounters,
}

impl TcpBusManager {
    pub fn new(config: TcpEndpointConfig) -> Self {
        let endpoint = config.endpoint();
        Self {
            config,
            endpoint,
            users: StdMutex::new(HashSet::new()),
            counters: TrafficCounters::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn config(&self) -> &TcpEndpointConfig {
        &self.config
    }

    fn lock_users(&self) -> MutexGuard<'_, HashSet<String>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 登记使用者（幂等）。
    pub fn attach(&self, owner: &str) {
        let mut users = self.lock_users();
        if users.insert(owner.to_string()) {
            debug!(
                target: "mbpoll.bus",
                endpoint = %self.endpoint,
                owner,
                users = users.len(),
                "device attached to tcp endpoint"
            );
        }
    }

    /// 注销使用者，若为最后一个返回 true。
    pub fn detach(&self, owner: &str) -> bool {
        let mut users = self.lock_users();
        users.remove(owner) && users.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.lock_users().len()
    }

    /// 记录一次成功事务。
    pub fn record(&self, tx_bytes: u64, rx_bytes: u64) {
        self.counters.record(tx_bytes, rx_bytes);
        endpoint_statistics().record(&self.endpoint, tx_bytes, rx_bytes);
    }

    pub fn statistics(&self) -> TrafficSnapshot {
        self.counters.snapshot()
    }
}

/// 设备侧 TCP 通道，持有设备自己的连接。
pub struct TcpBusClient {
    manager: Arc<TcpBusManager>,
    transport: Mutex<Box<dyn ModbusTransport>>,
    owner: String,
}

impl TcpBusClient {
    pub fn new(
        manager: Arc<TcpBusManager>,
        transport: Box<dyn ModbusTransport>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            manager,
            transport: Mutex::new(transport),
            owner: owner.into(),
        }
    }

    pub fn manager(&self) -> &Arc<TcpBusManager> {
        &self.manager
    }
}

#[async_trait]
impl BusChannel for TcpBusClient {
    async fn connect(&self) -> Result<(), BusError> {
        let mut transport = self.transport.lock().await;
        if !transport.is_connected() {
            transport.connect().await?;
        }
        Ok(())
    }

    async fn close(&self) {
        self.transport.lock().await.close().await;
        self.manager.detach(&self.owner);
    }

    async fn transact(&self, unit: u8, request: Request) -> Result<Response, BusError> {
        let mut transport = self.transport.lock().await;
        if !transport.is_connected() {
            transport.connect().await?;
        }
        let response = transport.dispatch(unit, &request).await?;
        self.manager.record(
            wire::request_bytes(Framing::Tcp, &request),
            wire::response_bytes(Framing::Tcp, &request),
        );
        Ok(response)
    }

    fn framing(&self) -> Framing {
        Framing::Tcp
    }

    fn endpoint(&self) -> &str {
        self.manager.endpoint()
    }

    fn owner(&self) -> &str {
        &self.owner
    }
}
