//! 仿真演示
//!
//! 使用 Mock 后端运行一个简单的避障循环：持续前进，障碍物距离低于阈值时
//! 停车并原地右转一段时间。边沿由独立线程投递，模拟声纳硬件。
//!
//! ```bash
//! RUST_LOG=roambot_driver=debug cargo run -p roambot-sdk --example sim_demo --features mock
//! ```

use roambot_hal::mock::{EdgeDispatcher, MockActuatorBus, MockGpio};
use roambot_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const STOP_DISTANCE_CM: u32 = 30;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info")?;

    let config = RoambotConfig::default();
    let builder = RoambotBuilder::from_config(config.clone());

    let gpio = Arc::new(MockGpio::new());
    let bus = Arc::new(MockActuatorBus::new());
    let sensor = builder.range_sensor(gpio.clone())?;
    let motion = builder.motion_controller(bus.clone())?;
    sensor.start_reading()?;

    let dispatcher = EdgeDispatcher::spawn(gpio.clone());
    let trigger = config.sonar.trigger_pin;
    let echo = config.sonar.echo_pin;

    // 模拟障碍物逐渐靠近
    let obstacle_cm = [120u64, 90, 60, 40, 25, 80, 150];

    motion.start_move(MoveType::FwdContinuous, 40, 100, 0, 0);

    for cm in obstacle_cm {
        sensor.send_pulse()?;

        let start = Timestamp::now();
        let round_trip = u64::from(config.sonar.bias_us) + cm * u64::from(config.sonar.us_per_cm);
        let echo_at = Timestamp::from_micros(
            start.secs() * 1_000_000 + u64::from(start.subsec_micros()) + round_trip,
        );
        dispatcher.send(PulseEdgeEvent::new(trigger, start));
        dispatcher.send(PulseEdgeEvent::new(echo, echo_at));
        thread::sleep(Duration::from_millis(20));

        let distance = sensor.get_distance_cm();
        tracing::info!(distance_cm = distance, "sonar reading");

        if distance < STOP_DISTANCE_CM {
            motion.stop()?;
            tracing::info!("obstacle ahead, turning right");
            motion.start_move(MoveType::TurnRightContinuous, 30, 100, 0, 0);
            thread::sleep(Duration::from_millis(100));
            motion.start_move(MoveType::FwdDuration, 40, 100, 300, 0);
        }
    }

    thread::sleep(Duration::from_millis(400));
    dispatcher.shutdown();

    let sonar = sensor.metrics().snapshot();
    let moves = motion.metrics().snapshot();
    tracing::info!(?sonar, "sonar metrics");
    tracing::info!(?moves, done = motion.is_done_moving(), "motion metrics");
    tracing::info!(commands = bus.journal().len(), "actuator commands issued");

    motion.stop()?;
    sensor.stop_reading()?;
    Ok(())
}
