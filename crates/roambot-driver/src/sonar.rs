//! 超声波测距
//!
//! 两根数字线：触发线（发出 ping）与回波线（回波到达）。两根线上的下降沿都注册
//! 中断回调，回调根据两个边沿的时间差计算距离：
//!
//! ```text
//! distance_cm = (elapsed_us - bias_us) / us_per_cm
//! ```
//!
//! # 状态
//!
//! - `pulse_in_flight`：触发沿已观测、有效回波未到
//! - `trigger_timestamp`：最近一次触发沿的时间
//! - `last_distance_cm`：最近一次有效读数（单槽，不做平均；首次读数前为 0）
//!
//! 回调运行在异步中断上下文中，只做原子读写，不加锁、不分配、不做 IO。
//! 同一协作者上的回调由协作者串行化，因此时间戳的两个字段不会被并发写入。

use crate::error::{ConfigurationError, DriverError};
use crate::metrics::{SonarMetrics, bump};
use roambot_hal::{
    DigitalIo, EdgeHandler, EdgePolarity, PinDirection, PinId, PinLevel, PulseEdgeEvent,
    Timestamp,
};
use roambot_tools::SonarConfig;
use spin_sleep::SpinSleeper;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 测距时序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SonarTiming {
    /// 固定偏置（μs），不超过此值的回波视为噪声
    pub bias_us: u32,
    /// 往返每厘米耗时（μs）
    pub us_per_cm: u32,
    /// 触发线拉高保持时间
    pub pulse_high: Duration,
    /// 触发线拉低后的稳定时间
    pub pulse_settle: Duration,
}

impl SonarTiming {
    pub const DEFAULT_BIAS_US: u32 = 300;
    pub const DEFAULT_US_PER_CM: u32 = 58;

    /// 由往返时间计算距离；不超过偏置时返回 `None`
    pub fn distance_cm(&self, elapsed_us: u64) -> Option<u32> {
        let bias = u64::from(self.bias_us);
        if elapsed_us <= bias || self.us_per_cm == 0 {
            return None;
        }
        let cm = (elapsed_us - bias) / u64::from(self.us_per_cm);
        Some(u32::try_from(cm).unwrap_or(u32::MAX))
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.us_per_cm == 0 {
            return Err(ConfigurationError::InvalidTiming(
                "us_per_cm must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SonarTiming {
    fn default() -> Self {
        Self {
            bias_us: Self::DEFAULT_BIAS_US,
            us_per_cm: Self::DEFAULT_US_PER_CM,
            pulse_high: Duration::from_millis(10),
            pulse_settle: Duration::from_millis(10),
        }
    }
}

impl From<&SonarConfig> for SonarTiming {
    fn from(config: &SonarConfig) -> Self {
        Self {
            bias_us: config.bias_us,
            us_per_cm: config.us_per_cm,
            pulse_high: Duration::from_micros(config.pulse_high_us),
            pulse_settle: Duration::from_micros(config.pulse_settle_us),
        }
    }
}

/// 回调状态（注册到 IO 协作者上的就是它）
///
/// 运行在中断上下文：只更新自身原子状态和计数器，不记日志、不加锁。
#[derive(Debug)]
struct EchoTracker {
    trigger_pin: PinId,
    echo_pin: PinId,
    timing: SonarTiming,
    pulse_in_flight: AtomicBool,
    trigger_secs: AtomicU64,
    trigger_micros: AtomicU32,
    last_distance_cm: AtomicU32,
    metrics: Arc<SonarMetrics>,
}

impl EchoTracker {
    fn trigger_timestamp(&self) -> Timestamp {
        Timestamp::new(
            self.trigger_secs.load(Ordering::Relaxed),
            self.trigger_micros.load(Ordering::Relaxed),
        )
    }

    fn on_trigger(&self, timestamp: Timestamp) {
        if self.pulse_in_flight.load(Ordering::Acquire) {
            bump(&self.metrics.abandoned_pulses);
        }
        self.trigger_secs.store(timestamp.secs(), Ordering::Relaxed);
        self.trigger_micros.store(timestamp.subsec_micros(), Ordering::Relaxed);
        self.pulse_in_flight.store(true, Ordering::Release);
    }

    fn on_echo(&self, timestamp: Timestamp) {
        if !self.pulse_in_flight.load(Ordering::Acquire) {
            bump(&self.metrics.orphan_echoes);
            return;
        }

        let elapsed = timestamp.micros_since(&self.trigger_timestamp());
        match self.timing.distance_cm(elapsed) {
            Some(cm) => {
                self.last_distance_cm.store(cm, Ordering::Release);
                self.pulse_in_flight.store(false, Ordering::Release);
                bump(&self.metrics.echoes_accepted);
            },
            None => bump(&self.metrics.echoes_discarded),
        }
    }
}

impl EdgeHandler for EchoTracker {
    fn on_edge(&self, event: PulseEdgeEvent) {
        if event.pin == self.trigger_pin {
            self.on_trigger(event.timestamp);
        } else if event.pin == self.echo_pin {
            self.on_echo(event.timestamp);
        }
    }
}

/// 超声波测距传感器
///
/// 每个实例在 IO 协作者上按引脚注册自己的回调，多个实例可同时工作（引脚不同即可）。
/// 析构时注销回调。
///
/// # Example
///
/// ```
/// use roambot_driver::{RangeSensor, SonarTiming};
/// use roambot_hal::mock::MockGpio;
/// use std::sync::Arc;
///
/// let gpio = Arc::new(MockGpio::new());
/// let sensor = RangeSensor::configure(gpio, 0, 1, SonarTiming::default()).unwrap();
/// sensor.start_reading().unwrap();
/// assert_eq!(sensor.get_distance_cm(), 0);
/// ```
pub struct RangeSensor<I: DigitalIo> {
    io: Arc<I>,
    tracker: Arc<EchoTracker>,
    reading: AtomicBool,
    sleeper: SpinSleeper,
}

impl<I: DigitalIo> RangeSensor<I> {
    /// 绑定引脚并复位
    ///
    /// 所有引脚拉低，触发线设为输出；回波线保持不变。
    ///
    /// # Errors
    ///
    /// - 引脚越界：[`ConfigurationError::PinOutOfRange`]
    /// - 触发线与回波线相同：[`ConfigurationError::DuplicatePin`]
    /// - 时序参数非法：[`ConfigurationError::InvalidTiming`]
    pub fn configure(
        io: Arc<I>,
        trigger_pin: PinId,
        echo_pin: PinId,
        timing: SonarTiming,
    ) -> Result<Self, DriverError> {
        let count = io.pin_count();
        for pin in [trigger_pin, echo_pin] {
            if pin >= count {
                return Err(ConfigurationError::PinOutOfRange { pin, count }.into());
            }
        }
        if trigger_pin == echo_pin {
            return Err(ConfigurationError::DuplicatePin { pin: trigger_pin }.into());
        }
        timing.validate()?;

        io.set_all_pins(PinLevel::Low)?;
        io.set_pin_direction(trigger_pin, PinDirection::Output)?;

        debug!(trigger_pin, echo_pin, ?timing, "range sensor configured");

        Ok(Self {
            io,
            tracker: Arc::new(EchoTracker {
                trigger_pin,
                echo_pin,
                timing,
                pulse_in_flight: AtomicBool::new(false),
                trigger_secs: AtomicU64::new(0),
                trigger_micros: AtomicU32::new(0),
                last_distance_cm: AtomicU32::new(0),
                metrics: Arc::new(SonarMetrics::new()),
            }),
            reading: AtomicBool::new(false),
            sleeper: SpinSleeper::default(),
        })
    }

    /// 在两根线上注册下降沿回调；已在读取时为空操作
    pub fn start_reading(&self) -> Result<(), DriverError> {
        if self
            .reading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let handler: Arc<dyn EdgeHandler> = self.tracker.clone();
        if let Err(e) =
            self.io
                .register_edge_callback(self.trigger_pin(), EdgePolarity::Falling, handler.clone())
        {
            self.reading.store(false, Ordering::Release);
            return Err(e.into());
        }
        if let Err(e) =
            self.io.register_edge_callback(self.echo_pin(), EdgePolarity::Falling, handler)
        {
            if let Err(rollback) = self.io.unregister_callback(self.trigger_pin()) {
                warn!("Failed to roll back trigger registration: {}", rollback);
            }
            self.reading.store(false, Ordering::Release);
            return Err(e.into());
        }

        info!(
            trigger_pin = self.trigger_pin(),
            echo_pin = self.echo_pin(),
            "range sensor reading started"
        );
        Ok(())
    }

    /// 注销两根线上的回调；未在读取时为空操作
    ///
    /// 任一注销失败时保持读取状态并返回错误，可以重试（析构时也会再试一次）。
    pub fn stop_reading(&self) -> Result<(), DriverError> {
        if self
            .reading
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let trigger = self.io.unregister_callback(self.trigger_pin());
        let echo = self.io.unregister_callback(self.echo_pin());
        if let Err(e) = trigger.and(echo) {
            self.reading.store(true, Ordering::Release);
            return Err(e.into());
        }

        info!("range sensor reading stopped");
        Ok(())
    }

    /// 发出一次 ping
    ///
    /// 触发线拉高保持 `pulse_high`，再拉低保持 `pulse_settle`。
    ///
    /// ⚠️ 阻塞调用方两段忙等时间（毫秒级），不可中断，不要在中断上下文中调用。
    pub fn send_pulse(&self) -> Result<(), DriverError> {
        let timing = &self.tracker.timing;
        self.io.set_pin_value(self.trigger_pin(), PinLevel::High)?;
        self.sleeper.sleep(timing.pulse_high);
        self.io.set_pin_value(self.trigger_pin(), PinLevel::Low)?;
        self.sleeper.sleep(timing.pulse_settle);

        bump(&self.tracker.metrics.pulses_sent);
        Ok(())
    }

    /// 最近一次有效读数（厘米）
    ///
    /// 不阻塞。首次读数前返回 0，与真实的 0 厘米无法区分。
    pub fn get_distance_cm(&self) -> u32 {
        self.tracker.last_distance_cm.load(Ordering::Acquire)
    }

    /// 直接处理一个边沿事件，绕过 IO 协作者的串行化，只在单线程测试中使用
    #[cfg(test)]
    fn handle_edge(&self, event: PulseEdgeEvent) {
        self.tracker.on_edge(event);
    }

    pub fn trigger_pin(&self) -> PinId {
        self.tracker.trigger_pin
    }

    pub fn echo_pin(&self) -> PinId {
        self.tracker.echo_pin
    }

    pub fn timing(&self) -> SonarTiming {
        self.tracker.timing
    }

    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    pub fn pulse_in_flight(&self) -> bool {
        self.tracker.pulse_in_flight.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &SonarMetrics {
        &self.tracker.metrics
    }
}

impl<I: DigitalIo> Drop for RangeSensor<I> {
    fn drop(&mut self) {
        if let Err(e) = self.stop_reading() {
            warn!("Failed to release sonar callbacks on drop: {}", e);
        }
    }
}

impl<I: DigitalIo> std::fmt::Debug for RangeSensor<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeSensor")
            .field("trigger_pin", &self.trigger_pin())
            .field("echo_pin", &self.echo_pin())
            .field("reading", &self.is_reading())
            .field("distance_cm", &self.get_distance_cm())
            .finish()
    }
}
