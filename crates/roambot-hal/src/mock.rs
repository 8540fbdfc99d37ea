//! Mock 后端
//!
//! 无硬件依赖的 [`DigitalIo`] / [`ActuatorBus`] 实现，用于单元测试、集成测试和仿真。
//!
//! - [`MockGpio`]：记录引脚电平/方向写入，维护按引脚的回调注册表，
//!   `fire_edge()` 在持有注册表锁的情况下同步调用回调，与注册/注销互斥
//! - [`EdgeDispatcher`]：独立线程投递边沿事件，模拟异步中断上下文
//! - [`MockActuatorBus`]：记录全部执行器命令（带时间），支持故障注入

use crate::{
    ActuatorBus, ChannelId, DigitalIo, EdgeHandler, EdgePolarity, HalError, PinDirection, PinId,
    PinLevel, PulseEdgeEvent, Timestamp, VelocityGains,
};
use crossbeam_channel::{Sender, unbounded};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::{Duration, Instant};

/// 引脚写入记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinWrite {
    All(PinLevel),
    Pin(PinId, PinLevel),
}

#[derive(Default)]
struct GpioState {
    levels: HashMap<PinId, PinLevel>,
    directions: HashMap<PinId, PinDirection>,
    writes: Vec<PinWrite>,
}

struct Registration {
    polarity: EdgePolarity,
    handler: Arc<dyn EdgeHandler>,
}

/// 模拟数字 IO
pub struct MockGpio {
    pin_count: u8,
    state: Mutex<GpioState>,
    /// 回调注册表（同时充当中断与配置调用之间的串行化锁）
    registry: Mutex<HashMap<PinId, Registration>>,
}

impl MockGpio {
    /// 16 个引脚（与 16 位 GPIO 端口一致）
    pub fn new() -> Self {
        Self::with_pin_count(16)
    }

    pub fn with_pin_count(pin_count: u8) -> Self {
        Self {
            pin_count,
            state: Mutex::new(GpioState::default()),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// 触发一个边沿
    ///
    /// 仅当引脚已注册回调且触发模式匹配时投递。返回是否已投递。
    pub fn fire_edge(&self, pin: PinId, edge: EdgePolarity, timestamp: Timestamp) -> bool {
        let registry = self.registry.lock();
        let Some(registration) = registry.get(&pin) else {
            tracing::trace!(pin, "edge on pin without callback dropped");
            return false;
        };

        let matches = match registration.polarity {
            EdgePolarity::Both => true,
            polarity => edge == EdgePolarity::Both || polarity == edge,
        };
        if !matches {
            return false;
        }

        registration.handler.on_edge(PulseEdgeEvent::new(pin, timestamp));
        true
    }

    /// 触发下降沿（声纳默认触发模式）
    pub fn fire_falling(&self, pin: PinId, timestamp: Timestamp) -> bool {
        self.fire_edge(pin, EdgePolarity::Falling, timestamp)
    }

    pub fn level(&self, pin: PinId) -> PinLevel {
        self.state.lock().levels.get(&pin).copied().unwrap_or_default()
    }

    pub fn direction(&self, pin: PinId) -> PinDirection {
        self.state.lock().directions.get(&pin).copied().unwrap_or_default()
    }

    /// 全部写入记录（按时间顺序）
    pub fn writes(&self) -> Vec<PinWrite> {
        self.state.lock().writes.clone()
    }

    pub fn has_callback(&self, pin: PinId) -> bool {
        self.registry.lock().contains_key(&pin)
    }

    pub fn polarity(&self, pin: PinId) -> Option<EdgePolarity> {
        self.registry.lock().get(&pin).map(|r| r.polarity)
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalIo for MockGpio {
    fn pin_count(&self) -> u8 {
        self.pin_count
    }

    fn set_all_pins(&self, level: PinLevel) -> Result<(), HalError> {
        let mut state = self.state.lock();
        for pin in 0..self.pin_count {
            state.levels.insert(pin, level);
        }
        state.writes.push(PinWrite::All(level));
        Ok(())
    }

    fn set_pin_direction(&self, pin: PinId, direction: PinDirection) -> Result<(), HalError> {
        self.check_pin(pin)?;
        self.state.lock().directions.insert(pin, direction);
        Ok(())
    }

    fn set_pin_value(&self, pin: PinId, level: PinLevel) -> Result<(), HalError> {
        self.check_pin(pin)?;
        let mut state = self.state.lock();
        state.levels.insert(pin, level);
        state.writes.push(PinWrite::Pin(pin, level));
        Ok(())
    }

    fn register_edge_callback(
        &self,
        pin: PinId,
        polarity: EdgePolarity,
        handler: Arc<dyn EdgeHandler>,
    ) -> Result<(), HalError> {
        self.check_pin(pin)?;
        self.registry.lock().insert(pin, Registration { polarity, handler });
        Ok(())
    }

    fn unregister_callback(&self, pin: PinId) -> Result<(), HalError> {
        self.check_pin(pin)?;
        self.registry.lock().remove(&pin);
        Ok(())
    }
}

/// 异步边沿投递线程
///
/// 边沿事件经 channel 送入独立线程，再由该线程调用 [`MockGpio::fire_edge`]，
/// 使回调运行在与调用方不同的上下文中。
pub struct EdgeDispatcher {
    tx: Option<Sender<(PulseEdgeEvent, EdgePolarity)>>,
    handle: Option<JoinHandle<()>>,
}

impl EdgeDispatcher {
    pub fn spawn(gpio: Arc<MockGpio>) -> Self {
        let (tx, rx) = unbounded::<(PulseEdgeEvent, EdgePolarity)>();
        let handle = spawn(move || {
            // 发送端全部关闭后退出
            for (event, edge) in rx.iter() {
                gpio.fire_edge(event.pin, edge, event.timestamp);
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// 投递下降沿事件；投递线程已退出时返回 false
    pub fn send(&self, event: PulseEdgeEvent) -> bool {
        self.send_edge(event, EdgePolarity::Falling)
    }

    pub fn send_edge(&self, event: PulseEdgeEvent, edge: EdgePolarity) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send((event, edge)).is_ok())
    }

    /// 关闭通道并等待已排队事件全部投递完成
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("edge dispatcher thread panicked");
        }
    }
}

impl Drop for EdgeDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

/// 执行器命令记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordedCommand {
    Set(f32),
    Velocity { velocity: i32, accel: i32 },
    Stop,
    Gains(VelocityGains),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusRecord {
    pub channel: ChannelId,
    pub command: RecordedCommand,
    pub at: Instant,
}

/// 模拟执行器总线（同时支持 PWM 命令和速度命令两类接口）
pub struct MockActuatorBus {
    channel_count: u8,
    journal: Mutex<Vec<BusRecord>>,
    commands: Mutex<HashMap<ChannelId, f32>>,
    failing: AtomicBool,
}

impl MockActuatorBus {
    /// 12 个通道（与 3 线电机端口数量一致）
    pub fn new() -> Self {
        Self::with_channel_count(12)
    }

    pub fn with_channel_count(channel_count: u8) -> Self {
        Self {
            channel_count,
            journal: Mutex::new(Vec::new()),
            commands: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// 故障注入：开启后所有命令返回设备错误（且不记录）
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn journal(&self) -> Vec<BusRecord> {
        self.journal.lock().clone()
    }

    pub fn clear(&self) {
        self.journal.lock().clear();
    }

    /// 某通道的命令序列
    pub fn commands_for(&self, channel: ChannelId) -> Vec<RecordedCommand> {
        self.journal
            .lock()
            .iter()
            .filter(|r| r.channel == channel)
            .map(|r| r.command)
            .collect()
    }

    pub fn last_for(&self, channel: ChannelId) -> Option<RecordedCommand> {
        self.journal
            .lock()
            .iter()
            .rev()
            .find(|r| r.channel == channel)
            .map(|r| r.command)
    }

    /// 轮询等待日志满足条件，超时返回 false
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&[BusRecord]) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.journal.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn record(&self, channel: ChannelId, command: RecordedCommand) -> Result<(), HalError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(HalError::Device(format!("channel {} not responding", channel)));
        }
        self.check_channel(channel)?;
        self.journal.lock().push(BusRecord {
            channel,
            command,
            at: Instant::now(),
        });
        Ok(())
    }
}

impl Default for MockActuatorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorBus for MockActuatorBus {
    fn channel_count(&self) -> u8 {
        self.channel_count
    }

    fn set_command(&self, channel: ChannelId, value: f32) -> Result<(), HalError> {
        self.record(channel, RecordedCommand::Set(value))?;
        self.commands.lock().insert(channel, value);
        Ok(())
    }

    fn get_command(&self, channel: ChannelId) -> Result<f32, HalError> {
        self.check_channel(channel)?;
        Ok(self.commands.lock().get(&channel).copied().unwrap_or_default())
    }

    fn move_velocity(&self, channel: ChannelId, velocity: i32, accel: i32) -> Result<(), HalError> {
        self.record(channel, RecordedCommand::Velocity { velocity, accel })
    }

    fn stop(&self, channel: ChannelId) -> Result<(), HalError> {
        self.record(channel, RecordedCommand::Stop)
    }

    fn set_velocity_gains(&self, channel: ChannelId, gains: VelocityGains) -> Result<(), HalError> {
        self.record(channel, RecordedCommand::Gains(gains))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    fn counting_handler(count: Arc<AtomicU64>) -> Arc<dyn EdgeHandler> {
        Arc::new(move |_event: PulseEdgeEvent| {
            count.fetch_add(1, Ordering::Relaxed);
        })
    }

    #[test]
    fn test_fire_edge_respects_registration_and_polarity() {
        let gpio = MockGpio::new();
        let count = Arc::new(AtomicU64::new(0));

        // 未注册：丢弃
        assert!(!gpio.fire_falling(2, Timestamp::from_micros(1)));

        gpio.register_edge_callback(2, EdgePolarity::Falling, counting_handler(count.clone()))
            .unwrap();
        assert!(gpio.fire_falling(2, Timestamp::from_micros(2)));
        assert!(!gpio.fire_edge(2, EdgePolarity::Rising, Timestamp::from_micros(3)));
        assert_eq!(count.load(Ordering::Relaxed), 1);

        gpio.unregister_callback(2).unwrap();
        assert!(!gpio.fire_falling(2, Timestamp::from_micros(4)));
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_pin_writes_recorded() {
        let gpio = MockGpio::with_pin_count(4);
        gpio.set_all_pins(PinLevel::Low).unwrap();
        gpio.set_pin_value(1, PinLevel::High).unwrap();
        assert_eq!(gpio.level(1), PinLevel::High);
        assert_eq!(gpio.level(0), PinLevel::Low);
        assert_eq!(
            gpio.writes(),
            vec![PinWrite::All(PinLevel::Low), PinWrite::Pin(1, PinLevel::High)]
        );
        assert!(gpio.set_pin_value(4, PinLevel::High).is_err());
    }

    #[test]
    fn test_dispatcher_delivers_in_order() {
        let gpio = Arc::new(MockGpio::new());
        let (tx, rx) = unbounded::<u64>();
        let handler: Arc<dyn EdgeHandler> = Arc::new(move |event: PulseEdgeEvent| {
            let _ = tx.send(event.timestamp.subsec_micros() as u64);
        });
        gpio.register_edge_callback(0, EdgePolarity::Falling, handler).unwrap();

        let dispatcher = EdgeDispatcher::spawn(gpio.clone());
        for t in [10u64, 20, 30] {
            assert!(dispatcher.send(PulseEdgeEvent::new(0, Timestamp::from_micros(t))));
        }
        dispatcher.shutdown();

        let received: Vec<u64> = rx.try_iter().collect();
        assert_eq!(received, vec![10, 20, 30]);
    }

    #[test]
    fn test_bus_journal_and_failure_injection() {
        let bus = MockActuatorBus::new();
        bus.set_command(0, 132.5).unwrap();
        bus.move_velocity(1, 40, 100).unwrap();
        bus.stop(1).unwrap();

        assert_eq!(bus.get_command(0).unwrap(), 132.5);
        assert_eq!(bus.last_for(1), Some(RecordedCommand::Stop));
        assert_eq!(bus.commands_for(1).len(), 2);

        bus.set_failing(true);
        assert!(bus.set_command(0, 10.0).is_err());
        assert_eq!(bus.journal().len(), 3);
        assert_eq!(bus.get_command(0).unwrap(), 132.5);
    }

    #[test]
    fn test_wait_for_times_out() {
        let bus = MockActuatorBus::new();
        assert!(!bus.wait_for(Duration::from_millis(5), |j| !j.is_empty()));
        bus.stop(0).unwrap();
        assert!(bus.wait_for(Duration::from_millis(5), |j| j.len() == 1));
    }
}
