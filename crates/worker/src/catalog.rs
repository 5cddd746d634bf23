//! 本地任务目录
//!
//! 记录本进程能够执行的任务类型及其处理器，并在注册中心中
//! 为尚不存在的任务发布默认策略。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordinator_core::{
    RegistryClient, SchedulerError, SchedulerResult, StrategyConfig, StrategyKind,
    StrategyStatus, TaskDefinitionConfig, TaskDiscovery, TaskProcessor, DEFAULT_OWN_SIGN,
    TASK_TYPE_SEPARATOR,
};
use tracing::{debug, info};

use crate::ShellProcessor;

/// 一个本地定时任务的定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskDefinition {
    pub strategy_name: String,
    pub base_task_type: String,
    pub own_sign: String,
    pub interval: Duration,
    pub assign_num: u32,
    pub num_of_single_server: u32,
    pub ip_list: Vec<String>,
}

impl ScheduledTaskDefinition {
    pub fn new(base_task_type: impl Into<String>) -> Self {
        let base_task_type = base_task_type.into();
        Self {
            strategy_name: base_task_type.clone(),
            base_task_type,
            own_sign: DEFAULT_OWN_SIGN.to_string(),
            interval: Duration::from_secs(60),
            assign_num: 1,
            num_of_single_server: 0,
            ip_list: Vec::new(),
        }
    }

    pub fn with_strategy_name(mut self, strategy_name: impl Into<String>) -> Self {
        self.strategy_name = strategy_name.into();
        self
    }

    pub fn with_own_sign(mut self, own_sign: impl Into<String>) -> Self {
        self.own_sign = own_sign.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_capacity(mut self, assign_num: u32, num_of_single_server: u32) -> Self {
        self.assign_num = assign_num;
        self.num_of_single_server = num_of_single_server;
        self
    }

    pub fn with_ip_list(mut self, ip_list: Vec<String>) -> Self {
        self.ip_list = ip_list;
        self
    }

    pub fn from_config(config: &TaskDefinitionConfig) -> Self {
        Self::new(config.base_task_type.clone())
            .with_strategy_name(config.strategy_name())
            .with_own_sign(config.own_sign.clone())
            .with_interval(Duration::from_millis(config.interval_ms))
            .with_capacity(config.assign_num, config.num_of_single_server)
            .with_ip_list(config.ip_list.clone())
    }

    /// 注册中心中尚无该策略时发布的策略配置
    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            strategy_name: self.strategy_name.clone(),
            kind: StrategyKind::Schedule,
            task_name: format!(
                "{}{}{}",
                self.base_task_type, TASK_TYPE_SEPARATOR, self.own_sign
            ),
            assign_num: self.assign_num,
            num_of_single_server: self.num_of_single_server,
            status: StrategyStatus::Resume,
            ip_list: self.ip_list.clone(),
        }
    }
}

struct CatalogEntry {
    definition: ScheduledTaskDefinition,
    processor: Arc<dyn TaskProcessor>,
}

/// 任务目录，按基础任务类型索引
#[derive(Default)]
pub struct TaskCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl TaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 根据 `tasks` 配置段构建目录，每个任务由Shell处理器执行
    pub fn from_task_configs(tasks: &[TaskDefinitionConfig]) -> SchedulerResult<Self> {
        let mut catalog = Self::new();
        for task in tasks {
            catalog.register(
                ScheduledTaskDefinition::from_config(task),
                Arc::new(ShellProcessor::from_config(task)),
            )?;
        }
        Ok(catalog)
    }

    pub fn register(
        &mut self,
        definition: ScheduledTaskDefinition,
        processor: Arc<dyn TaskProcessor>,
    ) -> SchedulerResult<()> {
        if processor.base_task_type() != definition.base_task_type {
            return Err(SchedulerError::config_error(format!(
                "处理器任务类型 {} 与定义 {} 不一致",
                processor.base_task_type(),
                definition.base_task_type
            )));
        }
        if definition.interval.is_zero() {
            return Err(SchedulerError::config_error(format!(
                "任务 {} 的执行间隔必须大于0",
                definition.base_task_type
            )));
        }
        definition.to_strategy_config().validate()?;
        if self.entries.contains_key(&definition.base_task_type) {
            return Err(SchedulerError::config_error(format!(
                "任务类型重复注册: {}",
                definition.base_task_type
            )));
        }

        info!(
            "注册任务: {} -> 策略 {}",
            definition.base_task_type, definition.strategy_name
        );
        self.entries.insert(
            definition.base_task_type.clone(),
            CatalogEntry {
                definition,
                processor,
            },
        );
        Ok(())
    }

    pub fn processor(&self, base_task_type: &str) -> Option<Arc<dyn TaskProcessor>> {
        self.entries
            .get(base_task_type)
            .map(|entry| Arc::clone(&entry.processor))
    }

    pub fn definition(&self, base_task_type: &str) -> Option<&ScheduledTaskDefinition> {
        self.entries.get(base_task_type).map(|entry| &entry.definition)
    }

    /// 按策略名排序的全部定义
    pub fn definitions(&self) -> Vec<&ScheduledTaskDefinition> {
        let mut definitions: Vec<&ScheduledTaskDefinition> =
            self.entries.values().map(|entry| &entry.definition).collect();
        definitions.sort_by(|a, b| a.strategy_name.cmp(&b.strategy_name));
        definitions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TaskDiscovery for TaskCatalog {
    async fn register_with(&self, registry: &dyn RegistryClient) -> SchedulerResult<()> {
        for definition in self.definitions() {
            match registry.read_strategy_config(&definition.strategy_name).await {
                Ok(_) => {
                    debug!("策略已存在，保留注册中心配置: {}", definition.strategy_name);
                }
                Err(e) if e.is_not_found() => {
                    registry
                        .put_strategy_config(&definition.to_strategy_config())
                        .await?;
                    info!(
                        "发布策略: {} (assign_num={}, num_of_single_server={})",
                        definition.strategy_name,
                        definition.assign_num,
                        definition.num_of_single_server
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_core::ProcessorContext;
    use coordinator_infrastructure::InMemoryRegistry;

    struct NoopProcessor(&'static str);

    #[async_trait]
    impl TaskProcessor for NoopProcessor {
        fn base_task_type(&self) -> &str {
            self.0
        }

        async fn execute(&self, _context: &ProcessorContext) -> SchedulerResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_rejects_duplicates_and_mismatches() {
        let mut catalog = TaskCatalog::new();
        catalog
            .register(
                ScheduledTaskDefinition::new("orderSync"),
                Arc::new(NoopProcessor("orderSync")),
            )
            .unwrap();
        assert!(catalog
            .register(
                ScheduledTaskDefinition::new("orderSync"),
                Arc::new(NoopProcessor("orderSync")),
            )
            .is_err());
        assert!(catalog
            .register(
                ScheduledTaskDefinition::new("cleanup"),
                Arc::new(NoopProcessor("other")),
            )
            .is_err());

        assert!(catalog
            .register(
                ScheduledTaskDefinition::new("cleanup").with_interval(Duration::ZERO),
                Arc::new(NoopProcessor("cleanup")),
            )
            .is_err());

        assert_eq!(catalog.len(), 1);
        assert!(catalog.processor("orderSync").is_some());
        assert!(catalog.processor("cleanup").is_none());
    }

    #[test]
    fn test_definition_to_strategy_config() {
        let definition = ScheduledTaskDefinition::new("orderSync")
            .with_strategy_name("order-sync-east")
            .with_own_sign("EAST")
            .with_capacity(6, 2);
        let config = definition.to_strategy_config();
        assert_eq!(config.strategy_name, "order-sync-east");
        assert_eq!(config.task_name, "orderSync$EAST");
        assert_eq!(config.assign_num, 6);
        assert_eq!(config.num_of_single_server, 2);
        assert_eq!(config.kind, StrategyKind::Schedule);
    }

    #[tokio::test]
    async fn test_register_with_publishes_only_missing_strategies() {
        let registry = InMemoryRegistry::new();
        registry.connect().await.unwrap();

        let mut existing = StrategyConfig::schedule("cleanup", "cleanup$BASE", 9, 3);
        existing.ip_list = vec!["10.0.0.1".to_string()];
        registry.put_strategy_config(&existing).await.unwrap();

        let mut catalog = TaskCatalog::new();
        catalog
            .register(
                ScheduledTaskDefinition::new("cleanup").with_capacity(1, 1),
                Arc::new(NoopProcessor("cleanup")),
            )
            .unwrap();
        catalog
            .register(
                ScheduledTaskDefinition::new("orderSync").with_capacity(4, 2),
                Arc::new(NoopProcessor("orderSync")),
            )
            .unwrap();

        catalog.register_with(&registry).await.unwrap();
        // 重复调用是安全的
        catalog.register_with(&registry).await.unwrap();

        assert_eq!(registry.read_strategy_config("cleanup").await.unwrap(), existing);
        let published = registry.read_strategy_config("orderSync").await.unwrap();
        assert_eq!(published.assign_num, 4);
        assert_eq!(published.task_name, "orderSync$BASE");
    }

    #[test]
    fn test_from_task_configs() {
        let config = coordinator_core::AppConfig::from_toml(
            r#"
[[tasks]]
base_task_type = "report"
strategy_name = "daily-report"
command = "true"
interval_ms = 500
"#,
        )
        .unwrap();
        let catalog = TaskCatalog::from_task_configs(&config.tasks).unwrap();
        let definition = catalog.definition("report").unwrap();
        assert_eq!(definition.strategy_name, "daily-report");
        assert_eq!(definition.interval, Duration::from_millis(500));
    }
}
