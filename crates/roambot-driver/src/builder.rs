//! Builder 模式实现
//!
//! 由 [`RoambotConfig`] 构造 [`RangeSensor`] 与 [`MotionController`]。

use crate::error::DriverError;
use crate::mapping::mapping_from_config;
use crate::motion::{MotionController, WheelChannels};
use crate::sonar::{RangeSensor, SonarTiming};
use roambot_hal::{ActuatorBus, DigitalIo};
use roambot_tools::{MotionConfig, RoambotConfig, SonarConfig};
use std::path::Path;
use std::sync::Arc;

/// Roambot Builder（链式构造）
///
/// # Example
///
/// ```
/// use roambot_driver::RoambotBuilder;
/// use roambot_hal::mock::{MockActuatorBus, MockGpio};
/// use roambot_tools::{MappingKind, MotionConfig};
/// use std::sync::Arc;
///
/// let builder = RoambotBuilder::new().motion(MotionConfig {
///     mapping: MappingKind::SignedVelocity,
///     ..MotionConfig::default()
/// });
///
/// let sensor = builder.range_sensor(Arc::new(MockGpio::new())).unwrap();
/// let motion = builder.motion_controller(Arc::new(MockActuatorBus::new())).unwrap();
/// assert_eq!(sensor.get_distance_cm(), 0);
/// assert!(motion.is_done_moving());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoambotBuilder {
    config: RoambotConfig,
}

impl RoambotBuilder {
    /// 使用默认配置
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RoambotConfig) -> Self {
        Self { config }
    }

    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DriverError> {
        Ok(Self::from_config(RoambotConfig::load_from_file(path)?))
    }

    /// 替换声纳配置
    pub fn sonar(mut self, sonar: SonarConfig) -> Self {
        self.config.sonar = sonar;
        self
    }

    /// 替换电机配置
    pub fn motion(mut self, motion: MotionConfig) -> Self {
        self.config.motion = motion;
        self
    }

    pub fn config(&self) -> &RoambotConfig {
        &self.config
    }

    /// 构造测距传感器（未开始读取）
    pub fn range_sensor<I: DigitalIo>(&self, io: Arc<I>) -> Result<RangeSensor<I>, DriverError> {
        self.config.validate()?;
        let sonar = &self.config.sonar;
        RangeSensor::configure(io, sonar.trigger_pin, sonar.echo_pin, SonarTiming::from(sonar))
    }

    /// 构造运动控制器
    pub fn motion_controller<B: ActuatorBus + 'static>(
        &self,
        bus: B,
    ) -> Result<MotionController<B>, DriverError> {
        self.config.validate()?;
        let motion = &self.config.motion;
        MotionController::new(
            bus,
            mapping_from_config(motion),
            WheelChannels::new(motion.left_channel, motion.right_channel),
        )
    }
}
