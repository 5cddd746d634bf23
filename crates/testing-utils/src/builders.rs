//! 测试数据构建器

use coordinator_core::{StrategyConfig, StrategyKind, StrategyRuntimeRecord, StrategyStatus};

/// 策略配置构建器，默认是容量为1的 `Schedule` 策略
pub struct StrategyConfigBuilder {
    config: StrategyConfig,
}

impl StrategyConfigBuilder {
    pub fn new(strategy_name: &str) -> Self {
        Self {
            config: StrategyConfig::schedule(strategy_name, format!("{strategy_name}$BASE"), 1, 0),
        }
    }

    pub fn with_task_name(mut self, task_name: &str) -> Self {
        self.config.task_name = task_name.to_string();
        self
    }

    pub fn with_capacity(mut self, assign_num: u32, num_of_single_server: u32) -> Self {
        self.config.assign_num = assign_num;
        self.config.num_of_single_server = num_of_single_server;
        self
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.config.kind = StrategyKind::from(kind.to_string());
        self
    }

    pub fn with_ip_list(mut self, ip_list: &[&str]) -> Self {
        self.config.ip_list = ip_list.iter().map(|ip| ip.to_string()).collect();
        self
    }

    pub fn paused(mut self) -> Self {
        self.config.status = StrategyStatus::Pause;
        self
    }

    pub fn build(self) -> StrategyConfig {
        self.config
    }
}

/// 运行时记录构建器
pub struct RuntimeRecordBuilder {
    record: StrategyRuntimeRecord,
}

impl RuntimeRecordBuilder {
    pub fn new(strategy_name: &str, uuid: &str, ordinal: u64) -> Self {
        Self {
            record: StrategyRuntimeRecord {
                strategy_name: strategy_name.to_string(),
                uuid: uuid.to_string(),
                ordinal,
                request_num: 0,
            },
        }
    }

    pub fn with_request_num(mut self, request_num: u32) -> Self {
        self.record.request_num = request_num;
        self
    }

    pub fn build(self) -> StrategyRuntimeRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_builder() {
        let config = StrategyConfigBuilder::new("orderSync")
            .with_capacity(10, 4)
            .with_ip_list(&["10.0.0.1"])
            .build();
        assert_eq!(config.task_name, "orderSync$BASE");
        assert_eq!(config.assign_num, 10);
        assert_eq!(config.ip_list, vec!["10.0.0.1".to_string()]);
        assert!(config.validate().is_ok());

        let bean = StrategyConfigBuilder::new("bean").with_kind("Bean").paused().build();
        assert_eq!(bean.kind, StrategyKind::Unsupported("Bean".to_string()));
        assert_eq!(bean.status, StrategyStatus::Pause);
    }

    #[test]
    fn test_runtime_record_builder() {
        let record = RuntimeRecordBuilder::new("s1", "w$0000000003", 3)
            .with_request_num(2)
            .build();
        assert_eq!(record.ordinal, 3);
        assert_eq!(record.request_num, 2);
    }
}
