//! # 时间戳
//!
//! 边沿事件时间戳，采用秒 + 微秒拆分表示（与平台中断驱动提供的格式一致）。
//!
//! 差值计算显式处理秒/微秒两个字段，不假设二者共享同一线性单位。

use std::sync::OnceLock;
use std::time::Instant;

const MICROS_PER_SEC: u64 = 1_000_000;

/// 单调时钟锚点（首次访问时设置，此后不变）
static CLOCK_ANCHOR: OnceLock<Instant> = OnceLock::new();

/// 边沿事件时间戳（秒 + 微秒）
///
/// 不变式：`micros < 1_000_000`（构造时规范化）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    secs: u64,
    micros: u32,
}

impl Timestamp {
    /// 创建时间戳，超出 1 秒的微秒部分进位到秒
    pub fn new(secs: u64, micros: u32) -> Self {
        let carry = u64::from(micros) / MICROS_PER_SEC;
        Self {
            secs: secs.saturating_add(carry),
            micros: (u64::from(micros) % MICROS_PER_SEC) as u32,
        }
    }

    /// 从总微秒数创建
    pub fn from_micros(total_micros: u64) -> Self {
        Self {
            secs: total_micros / MICROS_PER_SEC,
            micros: (total_micros % MICROS_PER_SEC) as u32,
        }
    }

    /// 单调时间戳（相对进程内首次调用）
    ///
    /// 供没有硬件时钟的后端使用，不受系统时钟调整影响。
    pub fn now() -> Self {
        let anchor = CLOCK_ANCHOR.get_or_init(Instant::now);
        let elapsed = anchor.elapsed();
        Self::new(elapsed.as_secs(), elapsed.subsec_micros())
    }

    pub fn secs(&self) -> u64 {
        self.secs
    }

    pub fn subsec_micros(&self) -> u32 {
        self.micros
    }

    /// 计算自 `earlier` 起经过的微秒数
    ///
    /// 若 `earlier` 晚于 `self`（时钟异常），结果饱和为 0。
    pub fn micros_since(&self, earlier: &Timestamp) -> u64 {
        if self <= earlier {
            return 0;
        }

        let mut secs = self.secs - earlier.secs;
        let micros = if self.micros >= earlier.micros {
            u64::from(self.micros - earlier.micros)
        } else {
            // 借位：微秒字段回绕
            secs -= 1;
            u64::from(self.micros) + MICROS_PER_SEC - u64::from(earlier.micros)
        };

        secs.saturating_mul(MICROS_PER_SEC).saturating_add(micros)
    }
}
