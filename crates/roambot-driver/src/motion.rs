//! 差速运动控制
//!
//! 每次 [`MotionController::start_move`] 都在独立线程中执行一个运动任务，调用方立即返回。
//! 任务不被跟踪、不被 join；已被取代的任务可以同时有任意多个在休眠。
//!
//! # 取消
//!
//! 没有显式的取消操作。定时运动醒来后先比较自己的代际号与 [`MoveGeneration`] 的当前值，
//! 只有仍是最新运动时才下发停止命令；否则跳过停止，由新运动的命令（或它自己的停止）生效。
//! 这一比较是整个控制器唯一的并发正确性机制。
//!
//! `stop()` 是硬停止：不看代际，立即向两侧下发零运动命令。
//!
//! # 状态
//!
//! [`MotionState`] 只作观察用。没有任何操作会把它置为 `Moving`，
//! 因此 [`MotionController::is_done_moving`] 总是返回 `true`。

use crate::error::{ConfigurationError, DriverError};
use crate::generation::MoveGeneration;
use crate::mapping::{ActuatorCommand, ActuatorMapping, WheelSide};
use crate::metrics::{MotionMetrics, bump};
use crate::state::{AtomicMotionState, MotionState};
use arc_swap::ArcSwap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use roambot_hal::{ActuatorBus, ChannelId, HalError};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 运动类型
///
/// 数值编码与命令协议一致（`FwdContinuous = 0` … `Idle = 12`），可由 `u8` 转换：
///
/// ```
/// use roambot_driver::MoveType;
///
/// assert_eq!(MoveType::try_from(2u8).unwrap(), MoveType::FwdDuration);
/// assert!(MoveType::try_from(13u8).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum MoveType {
    /// 持续前进
    FwdContinuous = 0,
    /// 持续后退
    BwdContinuous = 1,
    /// 前进指定时长后停止
    FwdDuration = 2,
    BwdDuration = 3,
    FwdDistance = 4,
    BwdDistance = 5,
    /// 持续右转
    TurnRightContinuous = 6,
    /// 持续左转
    TurnLeftContinuous = 7,
    TurnLeftDuration = 8,
    TurnRightDuration = 9,
    TurnLeftAngle = 10,
    TurnRightAngle = 11,
    /// 无运动
    #[default]
    Idle = 12,
}

impl MoveType {
    /// 是否有执行逻辑
    ///
    /// 按距离/角度/其余时长的类型只在类型上声明，执行时为空操作。
    pub fn is_supported(self) -> bool {
        matches!(
            self,
            MoveType::FwdContinuous
                | MoveType::BwdContinuous
                | MoveType::TurnLeftContinuous
                | MoveType::TurnRightContinuous
                | MoveType::FwdDuration
        )
    }

    /// 逻辑轮速方向（左, 右）；无执行逻辑的类型返回 `None`
    fn wheel_velocities(self, left: i32, right: i32) -> Option<(i32, i32)> {
        match self {
            MoveType::FwdContinuous | MoveType::FwdDuration => Some((left, right)),
            MoveType::BwdContinuous => Some((left.saturating_neg(), right.saturating_neg())),
            MoveType::TurnLeftContinuous => Some((left.saturating_neg(), right)),
            MoveType::TurnRightContinuous => Some((left, right.saturating_neg())),
            _ => None,
        }
    }
}

/// 运动描述
///
/// 每次 `start_move` 新建一份，被任务捕获后不再改变；下一次 `start_move` 取代而非修改它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveDescriptor {
    pub move_type: MoveType,
    pub left_velocity: i32,
    pub right_velocity: i32,
    pub left_accel: i32,
    pub right_accel: i32,
    /// 位移（当前没有按位移执行的类型）
    pub displacement: i32,
    pub duration_ms: u64,
    /// 发起时分配的代际号
    pub generation_id: u64,
}

/// 左右轮通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelChannels {
    pub left: ChannelId,
    pub right: ChannelId,
}

impl WheelChannels {
    pub fn new(left: ChannelId, right: ChannelId) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: WheelSide) -> ChannelId {
        match side {
            WheelSide::Left => self.left,
            WheelSide::Right => self.right,
        }
    }

    fn validate(&self, count: u8) -> Result<(), ConfigurationError> {
        for channel in [self.left, self.right] {
            if channel >= count {
                return Err(ConfigurationError::ChannelOutOfRange { channel, count });
            }
        }
        if self.left == self.right {
            return Err(ConfigurationError::DuplicateChannel {
                channel: self.left,
            });
        }
        Ok(())
    }
}

impl Default for WheelChannels {
    fn default() -> Self {
        Self { left: 0, right: 1 }
    }
}

/// 控制器与运动任务共享的状态
struct Shared<B> {
    bus: B,
    mapping: Arc<dyn ActuatorMapping>,
    channels: ArcSwap<WheelChannels>,
    current_move: ArcSwap<MoveDescriptor>,
    generation: MoveGeneration,
    state: AtomicMotionState,
    metrics: MotionMetrics,
}

impl<B: ActuatorBus> Shared<B> {
    /// 向两侧下发命令；两侧都会尝试，返回第一个错误
    fn command_pair(
        &self,
        channels: WheelChannels,
        left: ActuatorCommand,
        right: ActuatorCommand,
    ) -> Result<(), HalError> {
        let left_result = left.apply(&self.bus, channels.left);
        let right_result = right.apply(&self.bus, channels.right);
        left_result.and(right_result)
    }

    fn drive(
        &self,
        channels: WheelChannels,
        (left_vel, right_vel): (i32, i32),
        (left_accel, right_accel): (i32, i32),
    ) -> Result<(), HalError> {
        let left = self.mapping.command(WheelSide::Left, left_vel, left_accel);
        let right = self.mapping.command(WheelSide::Right, right_vel, right_accel);
        debug!(?left, ?right, "driving wheels");
        self.command_pair(channels, left, right)
    }

    fn halt(&self, channels: WheelChannels) -> Result<(), HalError> {
        let neutral = self.mapping.neutral();
        self.command_pair(channels, neutral, neutral)
    }

    fn report_failure(&self, what: &str, id: u64, e: HalError) {
        warn!("Move {} failed to {}: {}", id, what, e);
        bump(&self.metrics.command_failures);
    }

    /// 运动任务主体（在独立线程中运行）
    fn execute(&self, mv: MoveDescriptor, channels: WheelChannels) {
        let id = mv.generation_id;
        let Some(velocities) = mv.move_type.wheel_velocities(mv.left_velocity, mv.right_velocity)
        else {
            debug!(move_type = ?mv.move_type, id, "move type has no execution logic");
            bump(&self.metrics.unsupported_moves);
            return;
        };

        if let Err(e) = self.drive(channels, velocities, (mv.left_accel, mv.right_accel)) {
            self.report_failure("drive", id, e);
        }

        if mv.move_type != MoveType::FwdDuration {
            return;
        }

        thread::sleep(Duration::from_millis(mv.duration_ms));

        if !self.generation.is_current(id) {
            debug!(id, current = self.generation.current(), "move superseded, skipping stop");
            bump(&self.metrics.stale_stops_suppressed);
            return;
        }

        match self.halt(channels) {
            Ok(()) => {
                bump(&self.metrics.stops_issued);
                debug!(id, "timed move finished");
            },
            Err(e) => self.report_failure("stop", id, e),
        }
    }
}

/// 差速运动控制器
///
/// 轻量句柄：克隆后共享同一组状态，可传给任何需要下发运动命令的地方。
///
/// # Example
///
/// ```
/// use roambot_driver::{BipolarCenteredMapping, MotionController, MoveType, WheelChannels};
/// use roambot_hal::mock::MockActuatorBus;
/// use std::sync::Arc;
///
/// let bus = Arc::new(MockActuatorBus::new());
/// let motion = MotionController::new(
///     bus.clone(),
///     Arc::new(BipolarCenteredMapping::new()),
///     WheelChannels::default(),
/// )
/// .unwrap();
///
/// motion.set_velocity(40, 40, 100, 100).unwrap();
/// assert!(motion.is_done_moving());
///
/// motion.start_move(MoveType::FwdDuration, 40, 100, 500, 0);
/// assert_eq!(motion.generation(), 1);
///
/// motion.stop().unwrap();
/// ```
pub struct MotionController<B: ActuatorBus + 'static> {
    shared: Arc<Shared<B>>,
}

impl<B: ActuatorBus + 'static> MotionController<B> {
    /// 创建控制器并初始化两侧通道
    ///
    /// # Errors
    ///
    /// - 通道越界：[`ConfigurationError::ChannelOutOfRange`]
    /// - 左右通道相同：[`ConfigurationError::DuplicateChannel`]
    /// - 通道初始化失败（如写入速度环增益）：[`DriverError::Hal`]
    pub fn new(
        bus: B,
        mapping: Arc<dyn ActuatorMapping>,
        channels: WheelChannels,
    ) -> Result<Self, DriverError> {
        channels.validate(bus.channel_count())?;
        mapping.prepare_channel(&bus, channels.left)?;
        mapping.prepare_channel(&bus, channels.right)?;

        info!(left = channels.left, right = channels.right, ?mapping, "motion controller ready");

        Ok(Self {
            shared: Arc::new(Shared {
                bus,
                mapping,
                channels: ArcSwap::from_pointee(channels),
                current_move: ArcSwap::from_pointee(MoveDescriptor::default()),
                generation: MoveGeneration::new(),
                state: AtomicMotionState::default(),
                metrics: MotionMetrics::new(),
            }),
        })
    }

    /// 重新绑定左右轮通道
    ///
    /// 已在运行的任务继续使用启动时的通道。
    pub fn set_channels(&self, left: ChannelId, right: ChannelId) -> Result<(), DriverError> {
        let channels = WheelChannels::new(left, right);
        channels.validate(self.shared.bus.channel_count())?;
        self.shared.mapping.prepare_channel(&self.shared.bus, left)?;
        self.shared.mapping.prepare_channel(&self.shared.bus, right)?;
        self.shared.channels.store(Arc::new(channels));
        debug!(left, right, "wheel channels rebound");
        Ok(())
    }

    /// 立即按给定轮速下发命令，不等待完成
    ///
    /// 使用映射的直接速度路径（[`ActuatorMapping::direct_command`]）。
    /// 不推进代际：仍在休眠的定时运动醒来后照常停止。
    pub fn set_velocity(
        &self,
        left_vel: i32,
        right_vel: i32,
        left_accel: i32,
        right_accel: i32,
    ) -> Result<(), DriverError> {
        debug!(left_vel, right_vel, left_accel, right_accel, "setting wheel velocities");
        let mapping = &self.shared.mapping;
        let left = mapping.direct_command(WheelSide::Left, left_vel, left_accel);
        let right = mapping.direct_command(WheelSide::Right, right_vel, right_accel);
        self.shared.command_pair(self.channels(), left, right)?;
        Ok(())
    }

    /// 发起一次运动（立即返回，无结果）
    ///
    /// 代际在调用方线程中推进，先于任务启动，因此任何任务都不会把自己误认为更新的运动。
    /// 两个并发发起的运动谁的初始命令先到达执行器不作保证，只保证过期任务不会停车。
    pub fn start_move(
        &self,
        move_type: MoveType,
        velocity: i32,
        accel: i32,
        duration_ms: u64,
        displacement: i32,
    ) {
        let generation_id = self.shared.generation.advance();
        let descriptor = MoveDescriptor {
            move_type,
            left_velocity: velocity,
            right_velocity: velocity,
            left_accel: accel,
            right_accel: accel,
            displacement,
            duration_ms,
            generation_id,
        };

        // 并发发起时只保留代际号最大的描述
        self.shared.current_move.rcu(|current| {
            if current.generation_id > generation_id {
                Arc::clone(current)
            } else {
                Arc::new(descriptor)
            }
        });
        bump(&self.shared.metrics.moves_issued);

        let channels = self.channels();
        let shared = Arc::clone(&self.shared);
        debug!(?move_type, velocity, accel, duration_ms, generation_id, "move issued");

        let spawned = thread::Builder::new()
            .name(format!("roambot-move-{}", generation_id))
            .spawn(move || shared.execute(descriptor, channels));
        if let Err(e) = spawned {
            error!("Failed to spawn move task {}: {}", generation_id, e);
            bump(&self.shared.metrics.command_failures);
        }
    }

    /// 硬停止：两侧立即下发零运动命令，与代际无关
    ///
    /// 两侧都会尝试；任一侧失败时返回错误且不计入 `stops_issued`。
    pub fn stop(&self) -> Result<(), DriverError> {
        self.shared.halt(self.channels())?;
        self.shared.state.set(MotionState::NotMoving);
        bump(&self.shared.metrics.stops_issued);
        debug!("wheels stopped");
        Ok(())
    }

    /// 状态是否为静止
    ///
    /// 仅供观察，不能用作同步手段：它只读状态，不比较代际。
    /// 状态从不被置为运动中，因此总是返回 `true`。
    pub fn is_done_moving(&self) -> bool {
        !self.shared.state.get().is_moving()
    }

    /// 回读某侧通道最近一次的命令值
    pub fn channel_command(&self, side: WheelSide) -> Result<f32, DriverError> {
        let channel = self.channels().get(side);
        Ok(self.shared.bus.get_command(channel)?)
    }

    pub fn channels(&self) -> WheelChannels {
        **self.shared.channels.load()
    }

    /// 最近一次发起的运动
    pub fn current_move(&self) -> MoveDescriptor {
        **self.shared.current_move.load()
    }

    /// 当前代际号（已发起的运动次数）
    pub fn generation(&self) -> u64 {
        self.shared.generation.current()
    }

    pub fn state(&self) -> MotionState {
        self.shared.state.get()
    }

    pub fn mapping(&self) -> &dyn ActuatorMapping {
        self.shared.mapping.as_ref()
    }

    pub fn bus(&self) -> &B {
        &self.shared.bus
    }

    pub fn metrics(&self) -> &MotionMetrics {
        &self.shared.metrics
    }
}

impl<B: ActuatorBus + 'static> Clone for MotionController<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: ActuatorBus + 'static> fmt::Debug for MotionController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionController")
            .field("channels", &self.channels())
            .field("mapping", &self.shared.mapping)
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish()
    }
}
