use thiserror::Error;

/// 协调器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("注册中心连接错误: {0}")]
    RegistryConnection(String),

    #[error("注册中心操作错误: {0}")]
    Registry(String),

    #[error("{kind}未找到: {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("注册中心记录格式错误: {0}")]
    MalformedRecord(String),

    #[error("策略 {strategy} 的类型不受支持")]
    UnsupportedStrategyKind { strategy: String },

    #[error("无效的任务类型: {0}")]
    InvalidTaskType(String),

    #[error("未找到任务类型 {base_task_type} 对应的处理器")]
    ProcessorNotFound { base_task_type: String },

    #[error("任务单元错误: {0}")]
    TaskUnit(String),

    #[error("操作超时: {0}")]
    Timeout(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("状态错误: {0}")]
    InvalidState(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    pub fn factory_not_found<S: Into<String>>(uuid: S) -> Self {
        Self::NotFound {
            kind: "Worker注册信息",
            key: uuid.into(),
        }
    }
    pub fn strategy_not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound {
            kind: "策略",
            key: name.into(),
        }
    }
    pub fn runtime_not_found(strategy_name: &str, uuid: &str) -> Self {
        Self::NotFound {
            kind: "策略运行时记录",
            key: format!("{strategy_name}/{uuid}"),
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulerError::NotFound { .. })
    }
    /// 策略配置问题导致的容量缺口，需要上报但不中断刷新周期
    pub fn is_degraded_capacity(&self) -> bool {
        matches!(
            self,
            SchedulerError::UnsupportedStrategyKind { .. }
                | SchedulerError::InvalidTaskType(_)
                | SchedulerError::ProcessorNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        SchedulerError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SchedulerError::strategy_not_found("s1").is_not_found());
        assert!(!SchedulerError::Registry("boom".to_string()).is_not_found());

        let unsupported = SchedulerError::UnsupportedStrategyKind {
            strategy: "s1".to_string(),
        };
        assert!(unsupported.is_degraded_capacity());
        assert!(SchedulerError::InvalidTaskType("".to_string()).is_degraded_capacity());
        assert!(!SchedulerError::Timeout("stop".to_string()).is_degraded_capacity());
    }

    #[test]
    fn test_not_found_message() {
        let err = SchedulerError::runtime_not_found("order-sync", "w$0000000001");
        assert_eq!(
            err.to_string(),
            "策略运行时记录未找到: order-sync/w$0000000001"
        );
    }
}
