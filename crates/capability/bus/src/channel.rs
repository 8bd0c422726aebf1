//! 设备侧总线通道接口。

use crate::error::BusError;
use crate::request::{Request, Response};
use crate::wire::Framing;
use async_trait::async_trait;

/// 设备会话使用的事务通道。
///
/// RTU 实现经共享串口锁转发，TCP 实现持有设备自己的连接。
#[async_trait]
pub trait BusChannel: Send + Sync {
    /// 确保底层连接已打开。
    async fn connect(&self) -> Result<(), BusError>;

    /// 释放本设备对总线的占用。
    async fn close(&self);

    /// 执行恰好一次事务。
    async fn transact(&self, unit: u8, request: Request) -> Result<Response, BusError>;

    fn framing(&self) -> Framing;

    /// 端点标识：串口名或 `host:port`。
    fn endpoint(&self) -> &str;

    /// 使用者标识（设备会话 ID）。
    fn owner(&self) -> &str;
}
