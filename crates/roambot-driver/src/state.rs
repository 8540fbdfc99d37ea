//! 运动状态定义
//!
//! 粗粒度状态，仅用于观察，不参与正确性判断（取消逻辑只依赖代际计数器）。

use std::sync::atomic::{AtomicU8, Ordering};

/// 运动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MotionState {
    /// 运动中（控制器当前不会进入此状态）
    Moving = 0,
    /// 静止（默认）
    #[default]
    NotMoving = 1,
}

impl MotionState {
    /// 从 u8 转换，无效值视为 NotMoving
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Moving,
            _ => Self::NotMoving,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_moving(self) -> bool {
        self == Self::Moving
    }
}

/// 运动状态（原子版本，用于线程间共享）
#[derive(Debug)]
pub struct AtomicMotionState {
    inner: AtomicU8,
}

impl AtomicMotionState {
    pub fn new(state: MotionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> MotionState {
        MotionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: MotionState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }
}

impl Default for AtomicMotionState {
    fn default() -> Self {
        Self::new(MotionState::NotMoving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_state_conversions() {
        assert_eq!(MotionState::from_u8(0), MotionState::Moving);
        assert_eq!(MotionState::from_u8(1), MotionState::NotMoving);
        assert_eq!(MotionState::from_u8(255), MotionState::NotMoving); // 无效值
        assert!(MotionState::Moving.is_moving());
    }

    #[test]
    fn test_atomic_motion_state() {
        let state = AtomicMotionState::default();
        assert_eq!(state.get(), MotionState::NotMoving);
        state.set(MotionState::Moving);
        assert_eq!(state.get(), MotionState::Moving);
    }
}
