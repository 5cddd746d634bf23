use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SchedulerError, SchedulerResult, WorkerIdentity};

/// 任务类型中基础类型与ownSign的分隔符
pub const TASK_TYPE_SEPARATOR: char = '$';
/// 未指定ownSign时的默认值
pub const DEFAULT_OWN_SIGN: &str = "BASE";

/// 策略类型
///
/// 目前只支持 `Schedule`，其余序列化值保留原始名称以便报错
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyKind {
    Schedule,
    Unsupported(String),
}

impl From<String> for StrategyKind {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("schedule") {
            StrategyKind::Schedule
        } else {
            StrategyKind::Unsupported(value)
        }
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Schedule => "Schedule".to_string(),
            StrategyKind::Unsupported(name) => name,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Schedule => write!(f, "Schedule"),
            StrategyKind::Unsupported(name) => write!(f, "{name}"),
        }
    }
}

/// 策略状态，暂停的策略不接受任何Worker注册
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    #[default]
    Resume,
    Pause,
}

/// 调度策略配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_name: String,
    pub kind: StrategyKind,
    /// `<baseTaskType>$<ownSign>`
    pub task_name: String,
    /// 期望的总容量
    pub assign_num: u32,
    /// 单个Worker的容量上限，0表示不限制
    pub num_of_single_server: u32,
    #[serde(default)]
    pub status: StrategyStatus,
    /// 允许参与的Worker ip或主机名，空列表表示不限制
    #[serde(default)]
    pub ip_list: Vec<String>,
}

impl StrategyConfig {
    pub fn schedule(
        strategy_name: impl Into<String>,
        task_name: impl Into<String>,
        assign_num: u32,
        num_of_single_server: u32,
    ) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            kind: StrategyKind::Schedule,
            task_name: task_name.into(),
            assign_num,
            num_of_single_server,
            status: StrategyStatus::Resume,
            ip_list: Vec::new(),
        }
    }

    pub fn task_type(&self) -> SchedulerResult<TaskType> {
        TaskType::parse(&self.task_name)
    }

    /// 判断Worker是否允许参与该策略
    pub fn admits(&self, identity: &WorkerIdentity) -> bool {
        if self.status == StrategyStatus::Pause {
            return false;
        }
        if self.ip_list.is_empty() {
            return true;
        }
        self.ip_list.iter().any(|entry| {
            let entry = entry.trim();
            entry == "*"
                || entry == "127.0.0.1"
                || entry.eq_ignore_ascii_case("localhost")
                || entry == identity.ip()
                || entry.eq_ignore_ascii_case(identity.hostname())
        })
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.strategy_name.trim().is_empty() {
            return Err(SchedulerError::config_error("策略名称不能为空"));
        }
        if self.strategy_name.contains('/') || self.strategy_name.contains(':') {
            return Err(SchedulerError::config_error(format!(
                "策略名称包含非法字符: {}",
                self.strategy_name
            )));
        }
        if self.kind == StrategyKind::Schedule {
            self.task_type()?;
        }
        Ok(())
    }
}

/// 策略运行时记录，每个（策略, Worker）一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRuntimeRecord {
    pub strategy_name: String,
    pub uuid: String,
    /// 注册中心分配的序号，Leader选举只比较该字段
    pub ordinal: u64,
    /// Leader分配给该Worker的容量
    pub request_num: u32,
}

impl StrategyRuntimeRecord {
    pub fn new(strategy_name: impl Into<String>, identity: &WorkerIdentity, ordinal: u64) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            uuid: crate::format_uuid(identity.base_uuid(), ordinal),
            ordinal,
            request_num: 0,
        }
    }
}

/// 解码后的任务类型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskType {
    pub base_task_type: String,
    pub own_sign: String,
}

impl TaskType {
    /// 解析 `base$ownSign`，没有分隔符时ownSign为 `BASE`
    pub fn parse(task_name: &str) -> SchedulerResult<Self> {
        let (base, own_sign) = match task_name.split_once(TASK_TYPE_SEPARATOR) {
            Some((base, own_sign)) => (base.trim(), own_sign.trim()),
            None => (task_name.trim(), DEFAULT_OWN_SIGN),
        };
        if base.is_empty() {
            return Err(SchedulerError::InvalidTaskType(format!(
                "任务类型缺少基础类型: '{task_name}'"
            )));
        }
        let own_sign = if own_sign.is_empty() {
            DEFAULT_OWN_SIGN
        } else {
            own_sign
        };
        Ok(Self {
            base_task_type: base.to_string(),
            own_sign: own_sign.to_string(),
        })
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.base_task_type, TASK_TYPE_SEPARATOR, self.own_sign
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse() {
        let task_type = TaskType::parse("orderSync$EAST").unwrap();
        assert_eq!(task_type.base_task_type, "orderSync");
        assert_eq!(task_type.own_sign, "EAST");
        assert_eq!(task_type.to_string(), "orderSync$EAST");

        let default_sign = TaskType::parse("orderSync").unwrap();
        assert_eq!(default_sign.own_sign, DEFAULT_OWN_SIGN);

        let empty_sign = TaskType::parse("orderSync$").unwrap();
        assert_eq!(empty_sign.own_sign, DEFAULT_OWN_SIGN);
    }

    #[test]
    fn test_task_type_requires_base() {
        assert!(matches!(
            TaskType::parse("$EAST"),
            Err(SchedulerError::InvalidTaskType(_))
        ));
        assert!(TaskType::parse("").is_err());
    }

    #[test]
    fn test_strategy_kind_serde() {
        let json = r#"{"strategy_name":"s1","kind":"Schedule","task_name":"t","assign_num":2,"num_of_single_server":1}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, StrategyKind::Schedule);
        assert_eq!(config.status, StrategyStatus::Resume);
        assert!(config.ip_list.is_empty());

        let json = r#"{"strategy_name":"s2","kind":"Bean","task_name":"t","assign_num":2,"num_of_single_server":1}"#;
        let config: StrategyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, StrategyKind::Unsupported("Bean".to_string()));
        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["kind"], "Bean");
    }

    #[test]
    fn test_admits_by_ip_list_and_status() {
        let worker = WorkerIdentity::new("10.1.2.3", "node-b");
        let mut config = StrategyConfig::schedule("s1", "t", 4, 2);
        assert!(config.admits(&worker));

        config.ip_list = vec!["10.9.9.9".to_string()];
        assert!(!config.admits(&worker));

        config.ip_list = vec!["NODE-B".to_string()];
        assert!(config.admits(&worker));

        config.ip_list = vec!["localhost".to_string()];
        assert!(config.admits(&worker));

        config.status = StrategyStatus::Pause;
        assert!(!config.admits(&worker));
    }

    #[test]
    fn test_validate() {
        assert!(StrategyConfig::schedule("s1", "t$A", 1, 1).validate().is_ok());
        assert!(StrategyConfig::schedule("", "t", 1, 1).validate().is_err());
        assert!(StrategyConfig::schedule("a:b", "t", 1, 1).validate().is_err());
        assert!(StrategyConfig::schedule("s1", "$A", 1, 1).validate().is_err());
    }
}
