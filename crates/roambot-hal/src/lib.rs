//! # Roambot Hardware Abstraction Layer
//!
//! 硬件抽象层：定义核心逻辑所依赖的两类平台协作者。
//!
//! - [`DigitalIo`]：数字引脚 + 边沿中断（声纳测距使用）
//! - [`ActuatorBus`]：执行器命令通道（左右轮电机使用）
//!
//! 平台相关的寄存器/总线访问全部位于这两个 trait 之下，核心逻辑不直接接触硬件。
//!
//! # 回调注册表
//!
//! 边沿回调按引脚注册，回调对象本身（`Arc<dyn EdgeHandler>`）即为上下文，
//! 不再依赖进程级单例来定位接收者，因此多个传感器实例可以同时工作。

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod timestamp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use timestamp::Timestamp;

/// 数字引脚编号
pub type PinId = u8;

/// 执行器通道编号
pub type ChannelId = u8;

/// 硬件抽象层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HalError {
    #[error("Invalid pin {pin} (platform has {count} pins)")]
    InvalidPin { pin: PinId, count: u8 },
    #[error("Invalid actuator channel {channel} (platform has {count} channels)")]
    InvalidChannel { channel: ChannelId, count: u8 },
    #[error("Operation not supported by this backend: {0}")]
    Unsupported(&'static str),
    #[error("Device error: {0}")]
    Device(String),
}

impl From<String> for HalError {
    fn from(message: String) -> Self {
        Self::Device(message)
    }
}

impl From<&str> for HalError {
    fn from(message: &str) -> Self {
        Self::Device(message.to_string())
    }
}

/// 引脚电平
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinLevel {
    #[default]
    Low,
    High,
}

/// 引脚方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinDirection {
    #[default]
    Input,
    Output,
}

/// 中断触发边沿
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgePolarity {
    /// 下降沿（声纳硬件使用此模式）
    Falling,
    /// 上升沿
    Rising,
    /// 双边沿
    Both,
}

/// 边沿事件（由 IO 协作者产生，回调消费后即丢弃）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEdgeEvent {
    pub pin: PinId,
    pub timestamp: Timestamp,
}

impl PulseEdgeEvent {
    pub fn new(pin: PinId, timestamp: Timestamp) -> Self {
        Self { pin, timestamp }
    }
}

/// 边沿回调 Trait
///
/// # 执行上下文
///
/// 在异步中断上下文中调用，可能在任意时刻抢占主流程：
/// - 必须在有界时间内完成，不得阻塞
/// - 不得获取主上下文可能持有的锁
/// - 不得执行除自身状态更新以外的 IO
///
/// 同一协作者上的回调由协作者自身串行化。
pub trait EdgeHandler: Send + Sync {
    fn on_edge(&self, event: PulseEdgeEvent);
}

impl<F> EdgeHandler for F
where
    F: Fn(PulseEdgeEvent) + Send + Sync,
{
    fn on_edge(&self, event: PulseEdgeEvent) {
        self(event)
    }
}

/// 数字 IO / 中断协作者
///
/// 所有方法均为 `&self`：协作者通常由多个组件共享（`Arc`），内部自行同步。
/// 配置期调用（注册/注销回调）与中断上下文之间的互斥由协作者保证。
pub trait DigitalIo: Send + Sync {
    /// 平台可用引脚数量，有效引脚编号为 `0..pin_count()`
    fn pin_count(&self) -> u8;

    /// 将所有引脚设为同一电平
    fn set_all_pins(&self, level: PinLevel) -> Result<(), HalError>;

    fn set_pin_direction(&self, pin: PinId, direction: PinDirection) -> Result<(), HalError>;

    fn set_pin_value(&self, pin: PinId, level: PinLevel) -> Result<(), HalError>;

    /// 为引脚注册边沿回调（覆盖该引脚上已有的回调）
    fn register_edge_callback(
        &self,
        pin: PinId,
        polarity: EdgePolarity,
        handler: Arc<dyn EdgeHandler>,
    ) -> Result<(), HalError>;

    /// 注销引脚回调；引脚上没有回调时为空操作
    fn unregister_callback(&self, pin: PinId) -> Result<(), HalError>;

    /// 检查引脚编号是否在平台范围内
    fn check_pin(&self, pin: PinId) -> Result<(), HalError> {
        let count = self.pin_count();
        if pin < count {
            Ok(())
        } else {
            Err(HalError::InvalidPin { pin, count })
        }
    }
}

/// 速度环 PID 增益（轨迹/速度控制型执行器使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityGains {
    pub p: i32,
    pub i: i32,
    pub d: i32,
    pub feed_forward: i32,
}

impl fmt::Display for VelocityGains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p={} i={} d={} ff={}",
            self.p, self.i, self.d, self.feed_forward
        )
    }
}

/// 执行器命令协作者
///
/// 两类平台共用此接口：
/// - 连续 PWM 型（3 线舵机式电机）：`set_command` / `get_command`
/// - 轨迹速度型（2 线电机 + 编码器）：`move_velocity` / `stop`
///
/// 后端只需实现自身支持的方法，其余方法默认返回 [`HalError::Unsupported`]。
pub trait ActuatorBus: Send + Sync {
    /// 平台可用通道数量，有效通道编号为 `0..channel_count()`
    fn channel_count(&self) -> u8;

    fn set_command(&self, channel: ChannelId, value: f32) -> Result<(), HalError> {
        let _ = (channel, value);
        Err(HalError::Unsupported("set_command"))
    }

    /// 读取通道最近一次的命令值（仅用于诊断和回读）
    fn get_command(&self, channel: ChannelId) -> Result<f32, HalError> {
        let _ = channel;
        Err(HalError::Unsupported("get_command"))
    }

    fn move_velocity(&self, channel: ChannelId, velocity: i32, accel: i32) -> Result<(), HalError> {
        let _ = (channel, velocity, accel);
        Err(HalError::Unsupported("move_velocity"))
    }

    fn stop(&self, channel: ChannelId) -> Result<(), HalError> {
        let _ = channel;
        Err(HalError::Unsupported("stop"))
    }

    /// 设置速度环增益；不支持闭环速度控制的后端保持默认空操作
    fn set_velocity_gains(&self, channel: ChannelId, gains: VelocityGains) -> Result<(), HalError> {
        let _ = (channel, gains);
        Ok(())
    }

    fn check_channel(&self, channel: ChannelId) -> Result<(), HalError> {
        let count = self.channel_count();
        if channel < count {
            Ok(())
        } else {
            Err(HalError::InvalidChannel { channel, count })
        }
    }
}

impl<T: DigitalIo + ?Sized> DigitalIo for Arc<T> {
    fn pin_count(&self) -> u8 {
        (**self).pin_count()
    }

    fn set_all_pins(&self, level: PinLevel) -> Result<(), HalError> {
        (**self).set_all_pins(level)
    }

    fn set_pin_direction(&self, pin: PinId, direction: PinDirection) -> Result<(), HalError> {
        (**self).set_pin_direction(pin, direction)
    }

    fn set_pin_value(&self, pin: PinId, level: PinLevel) -> Result<(), HalError> {
        (**self).set_pin_value(pin, level)
    }

    fn register_edge_callback(
        &self,
        pin: PinId,
        polarity: EdgePolarity,
        handler: Arc<dyn EdgeHandler>,
    ) -> Result<(), HalError> {
        (**self).register_edge_callback(pin, polarity, handler)
    }

    fn unregister_callback(&self, pin: PinId) -> Result<(), HalError> {
        (**self).unregister_callback(pin)
    }
}

impl<T: ActuatorBus + ?Sized> ActuatorBus for Arc<T> {
    fn channel_count(&self) -> u8 {
        (**self).channel_count()
    }

    fn set_command(&self, channel: ChannelId, value: f32) -> Result<(), HalError> {
        (**self).set_command(channel, value)
    }

    fn get_command(&self, channel: ChannelId) -> Result<f32, HalError> {
        (**self).get_command(channel)
    }

    fn move_velocity(&self, channel: ChannelId, velocity: i32, accel: i32) -> Result<(), HalError> {
        (**self).move_velocity(channel, velocity, accel)
    }

    fn stop(&self, channel: ChannelId) -> Result<(), HalError> {
        (**self).stop(channel)
    }

    fn set_velocity_gains(&self, channel: ChannelId, gains: VelocityGains) -> Result<(), HalError> {
        (**self).set_velocity_gains(channel, gains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedIo;

    impl DigitalIo for FixedIo {
        fn pin_count(&self) -> u8 {
            16
        }
        fn set_all_pins(&self, _level: PinLevel) -> Result<(), HalError> {
            Ok(())
        }
        fn set_pin_direction(&self, pin: PinId, _direction: PinDirection) -> Result<(), HalError> {
            self.check_pin(pin)
        }
        fn set_pin_value(&self, pin: PinId, _level: PinLevel) -> Result<(), HalError> {
            self.check_pin(pin)
        }
        fn register_edge_callback(
            &self,
            pin: PinId,
            _polarity: EdgePolarity,
            _handler: Arc<dyn EdgeHandler>,
        ) -> Result<(), HalError> {
            self.check_pin(pin)
        }
        fn unregister_callback(&self, pin: PinId) -> Result<(), HalError> {
            self.check_pin(pin)
        }
    }

    struct PwmOnlyBus;

    impl ActuatorBus for PwmOnlyBus {
        fn channel_count(&self) -> u8 {
            12
        }
        fn set_command(&self, channel: ChannelId, _value: f32) -> Result<(), HalError> {
            self.check_channel(channel)
        }
    }

    #[test]
    fn test_check_pin_range() {
        let io = FixedIo;
        assert!(io.check_pin(0).is_ok());
        assert!(io.check_pin(15).is_ok());
        assert_eq!(io.check_pin(16), Err(HalError::InvalidPin { pin: 16, count: 16 }));
    }

    #[test]
    fn test_unsupported_defaults() {
        let bus = PwmOnlyBus;
        assert!(bus.set_command(3, 132.5).is_ok());
        assert_eq!(bus.move_velocity(0, 10, 10), Err(HalError::Unsupported("move_velocity")));
        assert_eq!(bus.stop(0), Err(HalError::Unsupported("stop")));
        // 增益设置默认是空操作
        assert!(bus.set_velocity_gains(0, VelocityGains { p: 1, i: 0, d: 0, feed_forward: 0 }).is_ok());
    }

    #[test]
    fn test_channel_out_of_range() {
        let bus = Arc::new(PwmOnlyBus);
        let err = bus.set_command(12, 0.0).unwrap_err();
        assert!(format!("{}", err).contains("channel 12"));
    }

    #[test]
    fn test_closure_edge_handler() {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_clone = hits.clone();
        let handler: Arc<dyn EdgeHandler> = Arc::new(move |event: PulseEdgeEvent| {
            hits_clone.fetch_add(event.pin as u32, Ordering::Relaxed);
        });

        handler.on_edge(PulseEdgeEvent::new(3, Timestamp::from_micros(10)));
        handler.on_edge(PulseEdgeEvent::new(4, Timestamp::from_micros(20)));
        assert_eq!(hits.load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_hal_error_display() {
        let err = HalError::from("bus fault");
        assert_eq!(format!("{}", err), "Device error: bus fault");
    }
}
