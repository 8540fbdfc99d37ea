//! 速度到执行器命令的映射
//!
//! 两类平台的电机接口差异很大，统一抽象为 [`ActuatorMapping`]，在构造控制器时选定：
//!
//! - [`BipolarCenteredMapping`]：连续 PWM 型（3 线）电机，命令域 0-255，中点 132.5
//! - [`SignedVelocityMapping`]：轨迹速度型（2 线 + 编码器）电机，有符号速度直通
//!
//! 输入是逻辑速度（正值表示车体前进方向），左右轮机械镜像的处理由映射负责。

use roambot_hal::{ActuatorBus, ChannelId, HalError, VelocityGains};
use roambot_tools::{MappingKind, MotionConfig};
use std::fmt;
use std::sync::Arc;

/// 车轮位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelSide {
    Left,
    Right,
}

impl fmt::Display for WheelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WheelSide::Left => write!(f, "left"),
            WheelSide::Right => write!(f, "right"),
        }
    }
}

/// 单个通道上的执行器命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCommand {
    /// PWM 命令值（`set_command`）
    Servo(f32),
    /// 速度 + 加速度（`move_velocity`）
    Velocity { velocity: i32, accel: i32 },
    /// 制动（`stop`）
    Halt,
}

impl ActuatorCommand {
    /// 在指定通道上执行命令
    pub fn apply(&self, bus: &dyn ActuatorBus, channel: ChannelId) -> Result<(), HalError> {
        match *self {
            ActuatorCommand::Servo(value) => bus.set_command(channel, value),
            ActuatorCommand::Velocity { velocity, accel } => {
                bus.move_velocity(channel, velocity, accel)
            },
            ActuatorCommand::Halt => bus.stop(channel),
        }
    }
}

/// 速度映射策略
///
/// 输入：对称范围内的有符号速度、非负加速度；输出：对应通道上的合法命令。
pub trait ActuatorMapping: Send + Sync + fmt::Debug {
    /// 将逻辑速度映射为某一侧车轮的命令（运动任务使用）
    fn command(&self, side: WheelSide, velocity: i32, accel: i32) -> ActuatorCommand;

    /// 直接设置轮速时的命令（`set_velocity` 使用），默认与 [`command`](Self::command) 相同
    fn direct_command(&self, side: WheelSide, velocity: i32, accel: i32) -> ActuatorCommand {
        self.command(side, velocity, accel)
    }

    /// 零运动命令（两侧相同）
    fn neutral(&self) -> ActuatorCommand;

    /// 通道绑定时的一次性初始化
    fn prepare_channel(&self, bus: &dyn ActuatorBus, channel: ChannelId) -> Result<(), HalError> {
        let _ = (bus, channel);
        Ok(())
    }
}

/// 连续 PWM 型映射
///
/// 132.5 为静止点，中点附近存在死区，因此以 112.5 / 152.5 作为起点：
///
/// | 速度 | 左轮 | 右轮 |
/// | ---- | ---- | ---- |
/// | 0    | 132.5 | 132.5 |
/// | v > 0 | 112.5 - v | 152.5 + v |
/// | v < 0 | 152.5 - v | 112.5 + v |
///
/// 结果截断到 0-255。加速度被忽略。
#[derive(Debug, Clone, Copy, Default)]
pub struct BipolarCenteredMapping;

impl BipolarCenteredMapping {
    pub const CENTER: f32 = 132.5;
    pub const LOW_BASE: f32 = 112.5;
    pub const HIGH_BASE: f32 = 152.5;
    pub const MIN_COMMAND: f32 = 0.0;
    pub const MAX_COMMAND: f32 = 255.0;

    pub fn new() -> Self {
        Self
    }
}

impl ActuatorMapping for BipolarCenteredMapping {
    fn command(&self, side: WheelSide, velocity: i32, _accel: i32) -> ActuatorCommand {
        let vel = velocity as f32;
        let raw = match (side, velocity.signum()) {
            (_, 0) => Self::CENTER,
            (WheelSide::Left, 1) => Self::LOW_BASE - vel,
            (WheelSide::Left, _) => Self::HIGH_BASE - vel,
            (WheelSide::Right, 1) => Self::HIGH_BASE + vel,
            (WheelSide::Right, _) => Self::LOW_BASE + vel,
        };
        ActuatorCommand::Servo(raw.clamp(Self::MIN_COMMAND, Self::MAX_COMMAND))
    }

    fn neutral(&self) -> ActuatorCommand {
        ActuatorCommand::Servo(Self::CENTER)
    }
}

/// 轨迹速度型映射
///
/// 运动路径上速度直通，右轮取反（电机镜像安装），负加速度按 0 处理。
/// 直接设置轮速（`set_velocity`）时速度与加速度再乘以 `direct_scale`。
/// 可选的 `velocity_limit` 在缩放前截断输入速度，默认不限制。
/// 绑定通道时写入速度环增益。
#[derive(Debug, Clone, Copy)]
pub struct SignedVelocityMapping {
    direct_scale: i32,
    velocity_limit: Option<i32>,
    gains: VelocityGains,
}

impl SignedVelocityMapping {
    /// 默认速度环增益（p=100, i=0, d=500, ff=0）
    pub const DEFAULT_GAINS: VelocityGains = VelocityGains {
        p: 100,
        i: 0,
        d: 500,
        feed_forward: 0,
    };

    pub fn new(direct_scale: i32, gains: VelocityGains) -> Self {
        Self {
            direct_scale,
            velocity_limit: None,
            gains,
        }
    }

    /// 设置输入速度上限（对两条路径都生效）
    pub fn with_velocity_limit(mut self, limit: i32) -> Self {
        self.velocity_limit = Some(limit.max(0));
        self
    }

    pub fn direct_scale(&self) -> i32 {
        self.direct_scale
    }

    pub fn velocity_limit(&self) -> Option<i32> {
        self.velocity_limit
    }

    pub fn gains(&self) -> VelocityGains {
        self.gains
    }

    fn scaled(&self, side: WheelSide, velocity: i32, accel: i32, scale: i32) -> ActuatorCommand {
        let limited = match self.velocity_limit {
            Some(limit) => velocity.clamp(-limit, limit),
            None => velocity,
        };
        let scaled = limited.saturating_mul(scale);
        let velocity = match side {
            WheelSide::Left => scaled,
            WheelSide::Right => scaled.saturating_neg(),
        };
        ActuatorCommand::Velocity {
            velocity,
            accel: accel.max(0).saturating_mul(scale.saturating_abs()),
        }
    }
}

impl Default for SignedVelocityMapping {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_GAINS)
    }
}

impl ActuatorMapping for SignedVelocityMapping {
    fn command(&self, side: WheelSide, velocity: i32, accel: i32) -> ActuatorCommand {
        self.scaled(side, velocity, accel, 1)
    }

    fn direct_command(&self, side: WheelSide, velocity: i32, accel: i32) -> ActuatorCommand {
        self.scaled(side, velocity, accel, self.direct_scale)
    }

    fn neutral(&self) -> ActuatorCommand {
        ActuatorCommand::Halt
    }

    fn prepare_channel(&self, bus: &dyn ActuatorBus, channel: ChannelId) -> Result<(), HalError> {
        tracing::debug!(channel, gains = %self.gains, "programming velocity gains");
        bus.set_velocity_gains(channel, self.gains)
    }
}

/// 按配置选择映射
pub fn mapping_from_config(config: &MotionConfig) -> Arc<dyn ActuatorMapping> {
    match config.mapping {
        MappingKind::BipolarCentered => Arc::new(BipolarCenteredMapping::new()),
        MappingKind::SignedVelocity => {
            let mapping = SignedVelocityMapping::new(
                config.direct_velocity_scale,
                VelocityGains {
                    p: config.gains.p,
                    i: config.gains.i,
                    d: config.gains.d,
                    feed_forward: config.gains.feed_forward,
                },
            );
            match config.velocity_limit {
                Some(limit) => Arc::new(mapping.with_velocity_limit(limit)),
                None => Arc::new(mapping),
            }
        },
    }
}
