//! 总线注册表：按串口 / 端点复用管理器。

use crate::error::BusError;
use crate::modbus::TokioModbusTransport;
use crate::rtu::{RtuBusClient, RtuBusManager};
use crate::settings::{SerialSettings, TcpEndpointConfig};
use crate::tcp::{TcpBusClient, TcpBusManager};
use crate::transport::ModbusTransport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// 传输工厂，测试中替换为内存实现。
pub trait TransportFactory: Send + Sync {
    fn rtu(&self, settings: &SerialSettings) -> Box<dyn ModbusTransport>;
    fn tcp(&self, config: &TcpEndpointConfig) -> Box<dyn ModbusTransport>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTransportFactory;

impl TransportFactory for TokioTransportFactory {
    fn rtu(&self, settings: &SerialSettings) -> Box<dyn ModbusTransport> {
        Box::new(TokioModbusTransport::rtu(settings.clone()))
    }

    fn tcp(&self, config: &TcpEndpointConfig) -> Box<dyn ModbusTransport> {
        Box::new(TokioModbusTransport::tcp(config.clone()))
    }
}

/// 进程内的总线表。同一串口共享一个 `RtuBusManager`，同一 `host:port` 共享一个 `TcpBusManager`。
pub struct BusRegistry {
    factory: Arc<dyn TransportFactory>,
    rtu: Mutex<HashMap<String, Arc<RtuBusManager>>>,
    tcp: Mutex<HashMap<String, Arc<TcpBusManager>>>,
}

impl Default for BusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(TokioTransportFactory))
    }

    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            rtu: Mutex::new(HashMap::new()),
            tcp: Mutex::new(HashMap::new()),
        }
    }

    /// 为设备取得 RTU 通道。首次使用某串口时创建管理器；串口参数冲突时返回 `ConfigMismatch`。
    pub fn rtu_channel(
        &self,
        settings: &SerialSettings,
        owner: &str,
    ) -> Result<RtuBusClient, BusError> {
        let mut buses = lock(&self.rtu);
        let manager = buses
            .entry(settings.port.clone())
            .or_insert_with(|| {
                info!(target: "mbpoll.bus", port = %settings.port, "registering rtu bus");
                Arc::new(RtuBusManager::with_transport(
                    settings.clone(),
                    self.factory.rtu(settings),
                ))
            })
            .clone();
        manager.attach(owner, settings)?;
        Ok(RtuBusClient::new(manager, owner))
    }

    /// 为设备取得 TCP 通道，连接归设备独有。
    pub fn tcp_channel(&self, config: &TcpEndpointConfig, owner: &str) -> TcpBusClient {
        let manager = {
            let mut endpoints = lock(&self.tcp);
            let manager = endpoints
                .entry(config.endpoint())
                .or_insert_with(|| Arc::new(TcpBusManager::new(config.clone())))
                .clone();
            manager.attach(owner);
            manager
        };
        TcpBusClient::new(manager, self.factory.tcp(config), owner)
    }

    pub fn rtu_manager(&self, port: &str) -> Option<Arc<RtuBusManager>> {
        lock(&self.rtu).get(port).cloned()
    }

    pub fn tcp_manager(&self, endpoint: &str) -> Option<Arc<TcpBusManager>> {
        lock(&self.tcp).get(endpoint).cloned()
    }

    /// 移除没有使用者的管理器，返回移除数量。
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        {
            let mut buses = lock(&self.rtu);
            let before = buses.len();
            buses.retain(|_, manager| manager.user_count() > 0);
            removed += before - buses.len();
        }
        {
            let mut endpoints = lock(&self.tcp);
            let before = endpoints.len();
            endpoints.retain(|_, manager| manager.user_count() > 0);
            removed += before - endpoints.len();
        }
        removed
    }
}
