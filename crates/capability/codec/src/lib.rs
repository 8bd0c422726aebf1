//! # 寄存器编解码能力模块
//!
//! 在 16 位寄存器序列与类型化取值之间转换，无状态。
//!
//! ## 解码流程
//!
//! ```text
//! [u16; n] ──按字节序拆字节──▶ [u8; 2n] ──字序交换（可选）──▶ 大端解释
//!                                                          │
//!                 Int/UInt（补码） / Float（binary32/64） / String
//!                                                          │
//!                                         raw * scaling + offset ──▶ 取整规则 ──▶ Value
//! ```
//!
//! 编码是解码的逆过程。

mod codec;
mod error;
mod order;
mod spec;

pub use codec::{decode, encode};
pub use error::CodecError;
pub use order::{bytes_to_registers, registers_to_bytes, swap_words};
pub use spec::CodecSpec;
