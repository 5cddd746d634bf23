//! 配置管理
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! 1. 内置默认值（各配置结构的 `Default` 实现）
//! 2. TOML 配置文件（`--config` 指定，或默认路径中第一个存在的文件）
//! 3. 环境变量，前缀 `COORDINATOR`，层级分隔符 `__`
//!
//! ```toml
//! [coordinator]
//! refresh_interval_ms = 2000
//!
//! [registry]
//! backend = "redis"
//! url = "redis://10.0.0.5:6379"
//!
//! [[tasks]]
//! base_task_type = "orderSync"
//! command = "/opt/jobs/order-sync.sh"
//! assign_num = 6
//! num_of_single_server = 2
//! ```

pub mod models;

pub use models::*;
