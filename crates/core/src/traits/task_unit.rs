//! 任务单元接口定义
//!
//! - `TaskUnit`: 本地运行的一个容量单元，只暴露停止操作
//! - `TaskUnitFactory`: 按策略类型创建任务单元
//! - `TaskProcessor`: 任务单元周期性调用的实际业务逻辑

use std::time::Duration;

use async_trait::async_trait;

use crate::{SchedulerResult, StrategyConfig, WorkerIdentity};

#[async_trait]
pub trait TaskUnit: Send + Sync {
    /// 所属策略
    fn strategy_name(&self) -> &str;

    /// 请求停止任务单元，重复调用应当是无害的
    async fn stop(&self, strategy_name: &str) -> SchedulerResult<()>;
}

#[async_trait]
pub trait TaskUnitFactory: Send + Sync {
    /// 为策略创建一个新的任务单元
    ///
    /// 不支持的策略类型或配置错误返回错误，不产生任务单元
    async fn create(
        &self,
        strategy: &StrategyConfig,
        worker: &WorkerIdentity,
    ) -> SchedulerResult<Box<dyn TaskUnit>>;
}

/// 处理器执行上下文
#[derive(Debug, Clone)]
pub struct ProcessorContext {
    pub strategy_name: String,
    pub base_task_type: String,
    pub own_sign: String,
    pub worker_uuid: String,
    /// 任务单元启动后的执行次数，从0开始
    pub iteration: u64,
}

#[async_trait]
pub trait TaskProcessor: Send + Sync {
    /// 处理器对应的基础任务类型
    fn base_task_type(&self) -> &str;

    /// 执行一次调度工作
    async fn execute(&self, context: &ProcessorContext) -> SchedulerResult<()>;

    /// 单次执行的超时时间，`None` 表示不限制
    fn execution_timeout(&self) -> Option<Duration> {
        None
    }
}
