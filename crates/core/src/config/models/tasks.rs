use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{StrategyConfig, StrategyKind, StrategyStatus, DEFAULT_OWN_SIGN};

/// 本地提供的定时任务，由Shell处理器执行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinitionConfig {
    pub base_task_type: String,
    /// 缺省时使用 base_task_type
    #[serde(default)]
    pub strategy_name: Option<String>,
    #[serde(default = "default_own_sign")]
    pub own_sign: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_assign_num")]
    pub assign_num: u32,
    #[serde(default)]
    pub num_of_single_server: u32,
    #[serde(default)]
    pub ip_list: Vec<String>,
}

fn default_own_sign() -> String {
    DEFAULT_OWN_SIGN.to_string()
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_assign_num() -> u32 {
    1
}

impl TaskDefinitionConfig {
    pub fn strategy_name(&self) -> &str {
        self.strategy_name
            .as_deref()
            .unwrap_or(self.base_task_type.as_str())
    }

    /// 注册中心中尚不存在该策略时发布的默认配置
    pub fn to_strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            strategy_name: self.strategy_name().to_string(),
            kind: StrategyKind::Schedule,
            task_name: format!("{}${}", self.base_task_type, self.own_sign),
            assign_num: self.assign_num,
            num_of_single_server: self.num_of_single_server,
            status: StrategyStatus::Resume,
            ip_list: self.ip_list.clone(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.base_task_type.trim().is_empty() {
            return Err(anyhow::anyhow!("任务类型不能为空"));
        }
        if self.base_task_type.contains('$') {
            return Err(anyhow::anyhow!(
                "任务类型不能包含'$': {}",
                self.base_task_type
            ));
        }
        if self.command.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "任务 {} 的命令不能为空",
                self.base_task_type
            ));
        }
        if self.interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "任务 {} 的执行间隔必须大于0",
                self.base_task_type
            ));
        }
        self.to_strategy_config()
            .validate()
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        Ok(())
    }
}
