//! 运动控制集成测试
//!
//! 验证代际取消的核心语义：
//! 1. 被取代的定时运动醒来后不停车
//! 2. `stop()` 总是立即向两侧下发零运动命令
//! 3. 大量过期任务同时休眠时，只有最新运动的停止生效

use roambot_hal::mock::{BusRecord, MockActuatorBus, RecordedCommand};
use roambot_sdk::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const LEFT: u8 = 0;
const RIGHT: u8 = 1;
const WAIT: Duration = Duration::from_secs(3);

fn controller(
    mapping: Arc<dyn ActuatorMapping>,
) -> (Arc<MockActuatorBus>, MotionController<Arc<MockActuatorBus>>) {
    let bus = Arc::new(MockActuatorBus::new());
    let motion = MotionController::new(bus.clone(), mapping, WheelChannels::new(LEFT, RIGHT))
        .expect("channels are valid");
    (bus, motion)
}

fn wait_until(predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    predicate()
}

fn is_neutral(record: &BusRecord) -> bool {
    matches!(record.command, RecordedCommand::Set(v) if v == 132.5)
        || record.command == RecordedCommand::Stop
}

/// FWD_DURATION 被 BWD_CONTINUOUS 取代后，前者到期时不下发停止，后退保持
#[test]
fn test_superseded_timed_move_leaves_backward_motion_active() {
    let (bus, motion) = controller(Arc::new(BipolarCenteredMapping::new()));

    motion.start_move(MoveType::FwdDuration, 40, 100, 400, 0);
    assert_eq!(motion.generation(), 1);
    assert!(bus.wait_for(WAIT, |j| j.len() >= 2));

    thread::sleep(Duration::from_millis(100));
    motion.start_move(MoveType::BwdContinuous, 40, 100, 0, 0);
    assert_eq!(motion.generation(), 2);
    assert_eq!(motion.current_move().move_type, MoveType::BwdContinuous);

    // 等到第一个任务醒来并跳过停止
    assert!(wait_until(|| motion.metrics().snapshot().stale_stops_suppressed == 1));

    let journal = bus.journal();
    assert!(
        !journal.iter().any(is_neutral),
        "stale task must not stop the wheels: {:?}",
        journal
    );
    assert_eq!(bus.last_for(LEFT), Some(RecordedCommand::Set(192.5)));
    assert_eq!(bus.last_for(RIGHT), Some(RecordedCommand::Set(72.5)));
    // 状态只作观察，运动中也报告静止
    assert!(motion.is_done_moving());
}

/// 轨迹速度型映射：运动路径的速度原样下发，不截断
#[test]
fn test_signed_velocity_move_passes_large_velocity() {
    let (bus, motion) = controller(Arc::new(SignedVelocityMapping::default()));
    bus.clear();

    motion.start_move(MoveType::FwdContinuous, 500, 300, 0, 0);
    assert!(bus.wait_for(WAIT, |j| j.len() == 2));
    assert_eq!(
        bus.last_for(LEFT),
        Some(RecordedCommand::Velocity { velocity: 500, accel: 300 })
    );
    assert_eq!(
        bus.last_for(RIGHT),
        Some(RecordedCommand::Velocity { velocity: -500, accel: 300 })
    );
}

/// 同一场景下轨迹速度型映射：后退命令为 (-v, +v)，没有 Stop
#[test]
fn test_superseded_timed_move_signed_velocity() {
    let (bus, motion) = controller(Arc::new(SignedVelocityMapping::default()));
    bus.clear();

    motion.start_move(MoveType::FwdDuration, 40, 100, 200, 0);
    assert!(bus.wait_for(WAIT, |j| j.len() >= 2));
    motion.start_move(MoveType::BwdContinuous, 40, 100, 0, 0);

    assert!(wait_until(|| motion.metrics().snapshot().stale_stops_suppressed == 1));
    assert!(bus.commands_for(LEFT).iter().all(|c| *c != RecordedCommand::Stop));
    assert_eq!(
        bus.last_for(LEFT),
        Some(RecordedCommand::Velocity { velocity: -40, accel: 100 })
    );
    assert_eq!(
        bus.last_for(RIGHT),
        Some(RecordedCommand::Velocity { velocity: 40, accel: 100 })
    );
}

/// 未被取代的定时运动到期后两侧都停止
#[test]
fn test_authoritative_timed_move_stops_both_wheels() {
    let (bus, motion) = controller(Arc::new(SignedVelocityMapping::default()));
    bus.clear();

    let started = Instant::now();
    motion.start_move(MoveType::FwdDuration, 25, 10, 60, 0);
    assert!(bus.wait_for(WAIT, |j| j.iter().filter(|r| is_neutral(r)).count() == 2));
    assert!(started.elapsed() >= Duration::from_millis(60));

    assert_eq!(bus.last_for(LEFT), Some(RecordedCommand::Stop));
    assert_eq!(bus.last_for(RIGHT), Some(RecordedCommand::Stop));
    assert!(wait_until(|| motion.is_done_moving()));
}

/// stop() 与任何在途运动的代际无关，立即生效
#[test]
fn test_stop_always_neutral() {
    let (bus, motion) = controller(Arc::new(BipolarCenteredMapping::new()));

    motion.start_move(MoveType::FwdDuration, 60, 100, 1_000, 0);
    assert!(bus.wait_for(WAIT, |j| j.len() >= 2));
    motion.start_move(MoveType::TurnLeftContinuous, 30, 100, 0, 0);
    assert!(bus.wait_for(WAIT, |j| j.len() >= 4));

    let generation = motion.generation();
    motion.stop().expect("mock bus accepts commands");

    assert_eq!(motion.generation(), generation);
    assert_eq!(motion.channel_command(WheelSide::Left).unwrap(), 132.5);
    assert_eq!(motion.channel_command(WheelSide::Right).unwrap(), 132.5);
    assert!(motion.is_done_moving());
}

/// 连续发起大量定时运动：只有最后一个任务停车
#[test]
fn test_burst_of_timed_moves_only_last_stops() {
    let (bus, motion) = controller(Arc::new(BipolarCenteredMapping::new()));

    for _ in 0..20 {
        motion.start_move(MoveType::FwdDuration, 40, 100, 80, 0);
    }
    assert_eq!(motion.generation(), 20);

    assert!(wait_until(|| {
        let m = motion.metrics().snapshot();
        m.stale_stops_suppressed + m.stops_issued == 20
    }));

    let metrics = motion.metrics().snapshot();
    assert_eq!(metrics.moves_issued, 20);
    assert_eq!(metrics.stops_issued, 1);
    assert_eq!(metrics.stale_stops_suppressed, 19);
    assert_eq!(bus.journal().iter().filter(|r| is_neutral(r)).count(), 2);
}

/// 多线程并发发起运动：代际号唯一且连续
#[test]
fn test_concurrent_callers_get_distinct_generations() {
    let (_bus, motion) = controller(Arc::new(BipolarCenteredMapping::new()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let motion = motion.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    motion.start_move(MoveType::FwdContinuous, 10, 10, 0, 0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(motion.generation(), 100);
    assert_eq!(motion.current_move().generation_id, 100);
    assert_eq!(motion.metrics().snapshot().moves_issued, 100);
}

/// 按数值编码下发运动（命令分发器的用法）
#[test]
fn test_numeric_move_codes() {
    let (bus, motion) = controller(Arc::new(BipolarCenteredMapping::new()));

    let move_type = MoveType::try_from(6u8).expect("6 is a valid move code");
    motion.start_move(move_type, 40, 0, 0, 0);
    assert!(bus.wait_for(WAIT, |j| j.len() == 2));
    assert_eq!(bus.last_for(LEFT), Some(RecordedCommand::Set(72.5)));
    assert_eq!(bus.last_for(RIGHT), Some(RecordedCommand::Set(72.5)));

    for code in [3u8, 4, 5, 8, 9, 10, 11, 12] {
        motion.start_move(MoveType::try_from(code).unwrap(), 40, 0, 10, 10);
    }
    assert!(wait_until(|| motion.metrics().snapshot().unsupported_moves == 8));
    assert_eq!(bus.journal().len(), 2);
}
