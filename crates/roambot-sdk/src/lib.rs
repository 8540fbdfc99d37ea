//! Roambot SDK - 两轮差速小车核心控制
//!
//! 超声波测距与差速运动控制，硬件访问全部位于抽象协作者之下。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **硬件抽象层** (`hal`): 数字 IO / 边沿中断、执行器命令通道、时间戳、Mock 后端
//! - **配置** (`tools`): TOML 配置文件
//! - **驱动层** (`driver`): `RangeSensor`、`MotionController`、速度映射、代际取消
//!
//! # 快速开始
//!
//! ```rust
//! use roambot_sdk::prelude::*;
//! ```
//!
//! 日志通过 [`init_logging`] 初始化，`RUST_LOG` 环境变量优先于默认指令。

pub use roambot_driver as driver;
pub use roambot_hal as hal;
pub use roambot_tools as tools;

pub mod logging;
pub mod prelude;

// --- 用户以此为界 ---

pub use logging::{LoggingError, init_logging};

pub use roambot_driver::{
    ConfigurationError, DriverError, MotionController, MoveType, RangeSensor, RoambotBuilder,
    WheelSide,
};
pub use roambot_hal::{ActuatorBus, DigitalIo, HalError};
pub use roambot_tools::{ConfigError, RoambotConfig};
