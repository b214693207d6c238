//! 收款找零控制器核心库
//!
//! 不依赖具体硬件：脉冲计数、面额映射、交易账本、串口命令协议、
//! 退币器闭环控制与找零拆分都在这里，固件只负责把引脚、串口和时钟接进来。

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod change;
pub mod config;
pub mod controller;
pub mod denomination;
pub mod error;
pub mod hopper;
pub mod protocol;
pub mod pulse;
pub mod session;
pub mod status;

pub use change::{ChangeBreakdown, ChangeDispenser, ChangeOutcome};
pub use config::{AcceptorConfig, ControllerConfig, HopperConfig};
pub use controller::Controller;
pub use denomination::AcceptorKind;
pub use error::{Error, Result};
pub use hopper::{Hopper, HopperDrive, HopperReport, StopReason};
pub use protocol::{Command, Line, LineCodec, LINE_CAPACITY};
pub use pulse::PulseCounter;
pub use session::{Completion, PaymentSession, SessionState};
pub use status::{HopperRole, Status, StatusSink};
