//! # Roambot Tools - 共享配置结构
//!
//! **依赖原则**: 纯数据结构，不依赖硬件抽象层和驱动层
//!
//! ## 包含模块
//!
//! - `config` - 声纳/电机配置（TOML 读写与校验）

pub mod config;

pub use config::{ConfigError, MappingKind, MotionConfig, RoambotConfig, SonarConfig, VelocityGainsConfig};
