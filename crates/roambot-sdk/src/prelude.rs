//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use roambot_sdk::prelude::*;
//! ```

// 组件
pub use crate::driver::{MotionController, RangeSensor, RoambotBuilder};
pub use crate::driver::{MoveDescriptor, MoveType, MotionState, SonarTiming, WheelChannels};

// 速度映射
pub use crate::driver::{
    ActuatorMapping, BipolarCenteredMapping, SignedVelocityMapping, WheelSide,
};

// 协作者 Trait
pub use crate::hal::{ActuatorBus, DigitalIo, EdgeHandler, PulseEdgeEvent, Timestamp};

// 配置
pub use crate::tools::{MappingKind, RoambotConfig};

// 错误类型
pub use crate::driver::{ConfigurationError, DriverError};
pub use crate::hal::HalError;
pub use crate::tools::ConfigError;

pub use crate::init_logging;
