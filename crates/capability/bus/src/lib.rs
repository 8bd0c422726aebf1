//! # 总线能力模块
//!
//! 为设备会话提供 Modbus 事务通道：
//! - **RTU**：每个串口一个共享连接，懒打开、互斥访问、按使用者引用计数
//! - **TCP**：每个设备独立连接，同一端点的设备共享流量计数
//!
//! ## 架构设计
//!
//! ```text
//! DeviceSession
//!       │ transact(unit, Request)
//!       ▼
//! BusChannel ──┬── RtuBusClient ──▶ RtuBusManager (tokio Mutex) ──▶ ModbusTransport
//!              └── TcpBusClient ──▶ 独立 ModbusTransport
//!                        │
//!                        ▼
//!                  TcpBusManager（端点计数）
//! ```
//!
//! ## 配置格式
//!
//! ### RTU
//! ```json
//! { "port": "/dev/ttyUSB0", "baud_rate": 9600, "data_bits": 8, "parity": "none", "stop_bits": 1, "timeout_ms": 3000 }
//! ```
//!
//! ### TCP
//! ```json
//! { "host": "192.168.1.100", "port": 502, "timeout_ms": 3000 }
//! ```

mod channel;
mod error;
mod modbus;
mod registry;
mod request;
mod rtu;
mod settings;
mod tcp;
mod transport;
pub mod wire;

pub use channel::BusChannel;
pub use error::BusError;
pub use modbus::{Endpoint, TokioModbusTransport};
pub use registry::{BusRegistry, TokioTransportFactory, TransportFactory};
pub use request::{Request, Response};
pub use rtu::{RtuBusClient, RtuBusManager, TransactionFuture};
pub use settings::{SerialParity, SerialSettings, TcpEndpointConfig};
pub use tcp::{TcpBusClient, TcpBusManager};
pub use transport::ModbusTransport;
pub use wire::Framing;
