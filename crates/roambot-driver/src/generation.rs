//! 运动代际计数器（Epoch 协作式取消）
//!
//! 每次发起新运动时计数器加一。后台运动任务在休眠结束后比较自己持有的代际号与
//! 计数器当前值：相等说明期间没有新运动发起，任务仍是权威的；不等说明已被取代，
//! 任务必须跳过自己的停止命令。
//!
//! 只需一个单调递增的原子计数器，不需要锁，也不需要持有任务句柄。

use std::sync::atomic::{AtomicU64, Ordering};

/// 单调递增的代际计数器
///
/// - 写者：发起运动的调用方（`advance`）
/// - 读者：任意数量的后台运动任务（`is_current`）
#[derive(Debug, Default)]
pub struct MoveGeneration {
    counter: AtomicU64,
}

impl MoveGeneration {
    /// 创建计数器，初始代际为 0（尚未发起任何运动）
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// 进入下一代并返回新代际号
    ///
    /// 每次调用恰好加一；返回值严格大于此前任何一次调用的返回值。
    pub fn advance(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 当前代际号
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// `id` 是否仍是最新代际
    pub fn is_current(&self, id: u64) -> bool {
        self.current() == id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_advance_is_monotonic() {
        let generation = MoveGeneration::new();
        assert_eq!(generation.current(), 0);
        assert_eq!(generation.advance(), 1);
        assert_eq!(generation.advance(), 2);
        assert!(generation.is_current(2));
        assert!(!generation.is_current(1));
    }

    #[test]
    fn test_concurrent_advance_yields_unique_ids() {
        let generation = Arc::new(MoveGeneration::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generation = generation.clone();
                thread::spawn(move || (0..1000).map(|_| generation.advance()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u64> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8000);
        assert_eq!(generation.current(), 8000);
        assert_eq!(ids.last(), Some(&8000));
    }
}
