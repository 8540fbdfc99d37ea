//! 运行时计数器
//!
//! 异步上下文（边沿回调、运动任务）中的失败与丢弃不向上传播，只在这里计数，
//! 供诊断读取。全部为 `Relaxed` 原子操作，计数之间不保证一致快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 声纳计数器
#[derive(Debug, Default)]
pub struct SonarMetrics {
    /// 有效回波（已更新距离）
    pub(crate) echoes_accepted: AtomicU64,
    /// 偏置阈值内的回波（视为噪声）
    pub(crate) echoes_discarded: AtomicU64,
    /// 没有在途脉冲时到达的回波
    pub(crate) orphan_echoes: AtomicU64,
    /// 被新触发沿覆盖的未完成脉冲
    pub(crate) abandoned_pulses: AtomicU64,
    /// 已发出的 ping
    pub(crate) pulses_sent: AtomicU64,
}

/// 声纳计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SonarMetricsSnapshot {
    pub echoes_accepted: u64,
    pub echoes_discarded: u64,
    pub orphan_echoes: u64,
    pub abandoned_pulses: u64,
    pub pulses_sent: u64,
}

impl SonarMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SonarMetricsSnapshot {
        SonarMetricsSnapshot {
            echoes_accepted: self.echoes_accepted.load(Ordering::Relaxed),
            echoes_discarded: self.echoes_discarded.load(Ordering::Relaxed),
            orphan_echoes: self.orphan_echoes.load(Ordering::Relaxed),
            abandoned_pulses: self.abandoned_pulses.load(Ordering::Relaxed),
            pulses_sent: self.pulses_sent.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.echoes_accepted,
            &self.echoes_discarded,
            &self.orphan_echoes,
            &self.abandoned_pulses,
            &self.pulses_sent,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 运动计数器
#[derive(Debug, Default)]
pub struct MotionMetrics {
    /// `start_move` 调用次数
    pub(crate) moves_issued: AtomicU64,
    /// 实际下发的停止命令（`stop()` 与到期的定时运动）
    pub(crate) stops_issued: AtomicU64,
    /// 因已被新运动取代而跳过的停止
    pub(crate) stale_stops_suppressed: AtomicU64,
    /// 尚无执行逻辑的运动类型
    pub(crate) unsupported_moves: AtomicU64,
    /// 运动任务中下发失败的命令
    pub(crate) command_failures: AtomicU64,
}

/// 运动计数器快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionMetricsSnapshot {
    pub moves_issued: u64,
    pub stops_issued: u64,
    pub stale_stops_suppressed: u64,
    pub unsupported_moves: u64,
    pub command_failures: u64,
}

impl MotionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MotionMetricsSnapshot {
        MotionMetricsSnapshot {
            moves_issued: self.moves_issued.load(Ordering::Relaxed),
            stops_issued: self.stops_issued.load(Ordering::Relaxed),
            stale_stops_suppressed: self.stale_stops_suppressed.load(Ordering::Relaxed),
            unsupported_moves: self.unsupported_moves.load(Ordering::Relaxed),
            command_failures: self.command_failures.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.moves_issued,
            &self.stops_issued,
            &self.stale_stops_suppressed,
            &self.unsupported_moves,
            &self.command_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// 计数器加一
pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sonar_snapshot_and_reset() {
        let metrics = SonarMetrics::new();
        bump(&metrics.echoes_accepted);
        bump(&metrics.echoes_accepted);
        bump(&metrics.orphan_echoes);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.echoes_accepted, 2);
        assert_eq!(snapshot.orphan_echoes, 1);
        assert_eq!(snapshot.pulses_sent, 0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), SonarMetricsSnapshot::default());
    }

    #[test]
    fn test_motion_snapshot_and_reset() {
        let metrics = MotionMetrics::new();
        bump(&metrics.moves_issued);
        bump(&metrics.stale_stops_suppressed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.moves_issued, 1);
        assert_eq!(snapshot.stale_stops_suppressed, 1);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MotionMetricsSnapshot::default());
    }
}
