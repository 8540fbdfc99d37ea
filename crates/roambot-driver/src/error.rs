//! 驱动层错误类型定义

use roambot_hal::{ChannelId, HalError, PinId};
use roambot_tools::ConfigError;
use thiserror::Error;

/// 配置期错误
///
/// 唯一对调用方可见的失败类别：引脚/通道编号越界或重复、时序参数非法。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Pin {pin} out of range (platform has {count} pins)")]
    PinOutOfRange { pin: PinId, count: u8 },

    #[error("Channel {channel} out of range (platform has {count} channels)")]
    ChannelOutOfRange { channel: ChannelId, count: u8 },

    #[error("Trigger and echo share pin {pin}")]
    DuplicatePin { pin: PinId },

    #[error("Left and right wheels share channel {channel}")]
    DuplicateChannel { channel: ChannelId },

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),
}

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 配置期错误
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// 协作者（IO / 执行器）错误
    #[error("Hardware error: {0}")]
    Hal(#[from] HalError),

    /// 配置文件错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl DriverError {
    /// 是否为配置期错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::from(ConfigurationError::PinOutOfRange { pin: 20, count: 16 });
        assert_eq!(format!("{}", err), "Pin 20 out of range (platform has 16 pins)");
        assert!(err.is_configuration());

        let err = DriverError::from(HalError::Device("bus fault".to_string()));
        assert!(format!("{}", err).contains("bus fault"));
        assert!(!err.is_configuration());
    }
}
