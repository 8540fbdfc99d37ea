//! # 机器人配置
//!
//! 声纳引脚与时序、电机通道与速度映射方式的配置，以 TOML 文件保存。
//!
//! ```toml
//! [sonar]
//! trigger_pin = 0
//! echo_pin = 1
//! bias_us = 300
//! us_per_cm = 58
//!
//! [motion]
//! left_channel = 0
//! right_channel = 1
//! mapping = "signed-velocity"
//! direct_velocity_scale = 1000
//! ```
//!
//! 缺省字段使用默认值。

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoambotConfig {
    pub sonar: SonarConfig,
    pub motion: MotionConfig,
}

impl RoambotConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 保存配置到文件（保存前校验）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// 校验配置内部一致性
    ///
    /// 引脚/通道是否在平台范围内要到绑定硬件时才能确定，不在此检查。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sonar.validate()?;
        self.motion.validate()
    }
}

/// 声纳配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SonarConfig {
    /// 触发引脚
    pub trigger_pin: u8,
    /// 回波引脚
    pub echo_pin: u8,
    /// 固定偏置（μs），吸收电气/处理延迟
    pub bias_us: u32,
    /// 往返每厘米耗时（μs）
    pub us_per_cm: u32,
    /// 触发脉冲高电平保持时间（μs）
    pub pulse_high_us: u64,
    /// 触发脉冲拉低后的稳定时间（μs）
    pub pulse_settle_us: u64,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            trigger_pin: 0,
            echo_pin: 1,
            bias_us: 300,
            us_per_cm: 58,
            pulse_high_us: 10_000,
            pulse_settle_us: 10_000,
        }
    }
}

impl SonarConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.us_per_cm == 0 {
            return Err(ConfigError::Invalid("sonar.us_per_cm must be > 0".to_string()));
        }
        if self.trigger_pin == self.echo_pin {
            return Err(ConfigError::Invalid(format!(
                "sonar.trigger_pin and sonar.echo_pin are both {}",
                self.trigger_pin
            )));
        }
        Ok(())
    }
}

/// 速度映射方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MappingKind {
    /// 连续 PWM 型（0-255，中点 132.5）
    #[default]
    BipolarCentered,
    /// 轨迹速度型（有符号速度直通，右轮取反）
    SignedVelocity,
}

/// 速度环 PID 增益
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityGainsConfig {
    pub p: i32,
    pub i: i32,
    pub d: i32,
    pub feed_forward: i32,
}

impl Default for VelocityGainsConfig {
    fn default() -> Self {
        Self {
            p: 100,
            i: 0,
            d: 500,
            feed_forward: 0,
        }
    }
}

/// 电机配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub left_channel: u8,
    pub right_channel: u8,
    pub mapping: MappingKind,
    /// 直接设置轮速时的缩放（仅 signed-velocity，运动路径不缩放）
    pub direct_velocity_scale: i32,
    /// 输入速度上限（仅 signed-velocity，缩放前），缺省不限制
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_limit: Option<i32>,
    /// 速度环增益（仅 signed-velocity）
    pub gains: VelocityGainsConfig,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            left_channel: 0,
            right_channel: 1,
            mapping: MappingKind::default(),
            direct_velocity_scale: 1,
            velocity_limit: None,
            gains: VelocityGainsConfig::default(),
        }
    }
}

impl MotionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.left_channel == self.right_channel {
            return Err(ConfigError::Invalid(format!(
                "motion.left_channel and motion.right_channel are both {}",
                self.left_channel
            )));
        }
        if self.direct_velocity_scale == 0 {
            return Err(ConfigError::Invalid(
                "motion.direct_velocity_scale must be non-zero".to_string(),
            ));
        }
        if self.velocity_limit.is_some_and(|limit| limit <= 0) {
            return Err(ConfigError::Invalid("motion.velocity_limit must be > 0".to_string()));
        }
        Ok(())
    }
}
