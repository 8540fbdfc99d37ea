//! 驱动层模块
//!
//! 本模块提供 Roambot 的两个核心组件：
//! - [`RangeSensor`]：中断驱动的超声波测距
//! - [`MotionController`]：异步运动任务 + 代际计数取消
//!
//! 两者互不依赖、没有共享状态，分别只依赖硬件抽象层中的一个协作者
//! （[`DigitalIo`](roambot_hal::DigitalIo) / [`ActuatorBus`](roambot_hal::ActuatorBus)）。
//!
//! # 使用场景
//!
//! 由上层命令分发器按解析出的命令调用对应组件。通常通过 [`RoambotBuilder`]
//! 从配置文件构造。

mod builder;
mod error;
pub mod generation;
pub mod mapping;
pub mod metrics;
pub mod motion;
pub mod sonar;
pub mod state;

pub use builder::RoambotBuilder;
pub use error::{ConfigurationError, DriverError};
pub use generation::MoveGeneration;
pub use mapping::{
    ActuatorCommand, ActuatorMapping, BipolarCenteredMapping, SignedVelocityMapping, WheelSide,
    mapping_from_config,
};
pub use metrics::{MotionMetrics, MotionMetricsSnapshot, SonarMetrics, SonarMetricsSnapshot};
pub use motion::{MotionController, MoveDescriptor, MoveType, WheelChannels};
pub use sonar::{RangeSensor, SonarTiming};
pub use state::{AtomicMotionState, MotionState};
