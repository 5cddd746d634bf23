//! 注册中心客户端接口
//!
//! 协调引擎通过该接口读写共享的协调存储。实现负责连接生命周期、
//! 临时记录的语义以及序号分配；引擎只关心下面这些操作的契约。

use async_trait::async_trait;

use crate::{
    FactoryRegistrationInfo, RegistrationOutcome, SchedulerResult, StrategyConfig,
    StrategyRuntimeRecord, WorkerIdentity,
};

#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 建立连接，不可达时返回 `RegistryConnection`
    async fn connect(&self) -> SchedulerResult<()>;

    /// 关闭连接，之后的调用都会失败
    async fn close(&self) -> SchedulerResult<()>;

    /// 在所有允许参与的策略下注册Worker
    ///
    /// 首次注册或注册信息丢失时分配新的序号，否则沿用已有序号。
    /// 返回之前参与、但现在不再允许参与的策略列表。
    async fn register_worker(&self, identity: &WorkerIdentity)
        -> SchedulerResult<RegistrationOutcome>;

    /// 删除Worker在所有策略下的运行时记录，保留注册信息
    async fn unregister_worker(&self, uuid: &str) -> SchedulerResult<()>;

    /// 删除Worker注册信息及全部运行时记录
    async fn remove_worker(&self, uuid: &str) -> SchedulerResult<()>;

    /// 读取Worker注册信息，不存在时返回 `NotFound`
    async fn read_factory_info(&self, uuid: &str) -> SchedulerResult<FactoryRegistrationInfo>;

    /// 管理端启停Worker
    async fn set_worker_started(&self, uuid: &str, started: bool) -> SchedulerResult<()>;

    /// 策略下所有Worker的运行时记录，按序号升序
    async fn list_runtime_records(
        &self,
        strategy_name: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>>;

    /// Worker参与的所有策略的运行时记录
    async fn list_runtime_records_for_worker(
        &self,
        uuid: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>>;

    async fn read_strategy_config(&self, strategy_name: &str) -> SchedulerResult<StrategyConfig>;

    async fn put_strategy_config(&self, config: &StrategyConfig) -> SchedulerResult<()>;

    async fn remove_strategy_config(&self, strategy_name: &str) -> SchedulerResult<()>;

    async fn list_strategy_configs(&self) -> SchedulerResult<Vec<StrategyConfig>>;

    /// 条件更新：记录不存在时返回 `NotFound`
    async fn update_request_num(
        &self,
        strategy_name: &str,
        uuid: &str,
        request_num: u32,
    ) -> SchedulerResult<()>;
}
