use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{
    coordinator::CoordinatorConfig, observability::ObservabilityConfig,
    registry::RegistryConfig, tasks::TaskDefinitionConfig,
};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "COORDINATOR";

/// 默认配置文件查找路径
pub const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/coordinator.toml",
    "coordinator.toml",
    "/etc/coordinator/config.toml",
];

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorConfig,
    pub registry: RegistryConfig,
    pub observability: ObservabilityConfig,
    pub tasks: Vec<TaskDefinitionConfig>,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Built-in defaults
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: COORDINATOR, separator: __)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.coordinator
            .validate()
            .context("协调引擎配置验证失败")?;
        self.registry.validate().context("注册中心配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        // 注册信息每个刷新周期续期一次
        if self.registry.session_timeout_ms <= self.coordinator.refresh_interval_ms {
            return Err(anyhow::anyhow!(
                "会话超时时间({}ms)必须大于刷新间隔({}ms)",
                self.registry.session_timeout_ms,
                self.coordinator.refresh_interval_ms
            ));
        }

        let mut task_types = HashSet::new();
        for task in &self.tasks {
            task.validate().context("任务配置验证失败")?;
            if !task_types.insert(task.base_task_type.as_str()) {
                return Err(anyhow::anyhow!(
                    "任务类型重复: {}",
                    task.base_task_type
                ));
            }
        }

        Ok(())
    }
}
