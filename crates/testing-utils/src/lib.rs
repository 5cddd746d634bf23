//! # Coordinator Testing Utils
//!
//! 协调器各crate共用的测试工具：
//!
//! - **注册中心故障注入**: 包装任意注册中心实现，按需让指定操作失败
//! - **记录型任务单元**: 记录创建和停止顺序，可配置停止失败
//! - **Redis测试容器**: 集成测试用的临时Redis
//! - **测试数据构建器**: 策略配置和运行时记录
//!
//! ```toml
//! [dev-dependencies]
//! coordinator-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
