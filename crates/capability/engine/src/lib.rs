//! # 轮询引擎
//!
//! 每个设备一个 [`DeviceSession`]：由 [`DeviceDriver`] 给出点位表与钩子，
//! 经 [`mbpoll_bus::BusChannel`] 执行事务，经 `mbpoll_codec` 解码寄存器。
//!
//! ## 轮询周期
//!
//! ```text
//! poll_cycle
//!   ├─ connect（未处于 Polling 时）
//!   ├─ driver.before_read
//!   ├─ 逐个到期分组：plan_read → 一次读事务 → 全组解码 → 替换缓存
//!   ├─ driver.after_first_read（仅首个成功周期，可追加分组）
//!   └─ driver.after_read（更新计算型点位）
//! ```
//!
//! 任一分组失败即中止本周期，缓存保留上次成功的值；首个周期失败后下次继续按首次读取处理。

mod batch;
mod driver;
pub mod drivers;
mod error;
mod registry;
mod session;

pub use batch::{MAX_BITS_PER_READ, MAX_REGISTERS_PER_READ, ReadSpan, max_per_read, plan_read};
pub use driver::DeviceDriver;
pub use error::{DriverError, EngineError};
pub use registry::{DriverFactory, DriverRegistry};
pub use session::{DeviceSession, SessionState};
