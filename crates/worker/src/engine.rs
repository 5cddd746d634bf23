//! 协调引擎
//!
//! 每个Worker进程一个实例，负责：
//!
//! - 向注册中心注册本Worker并维护序号
//! - 每个刷新周期选出各策略的Leader，由Leader计算并写回容量分配
//! - 按分配到的容量启动或停止本地任务单元
//!
//! 所有会修改引擎状态的操作都在同一把引擎锁内执行，刷新周期之间不会重叠。

use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use coordinator_core::{
    assign_capacity, CoordinatorConfig, FactoryRegistrationInfo, RegistryClient,
    SchedulerError, SchedulerResult, StrategyRuntimeRecord, TaskDiscovery, TaskUnit,
    TaskUnitFactory, WorkerIdentity,
};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{LocalTaskSet, RefreshTimer};

/// 引擎状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub uuid: String,
    pub ordinal: Option<u64>,
    /// 策略名 -> 本地运行的任务单元数量
    pub running: BTreeMap<String, usize>,
    /// 策略名 -> 容量不足的原因
    pub degraded: BTreeMap<String, String>,
}

struct EngineState {
    identity: WorkerIdentity,
    connected: bool,
    activated: bool,
    shut_down: bool,
    tasks: LocalTaskSet,
    degraded: BTreeMap<String, String>,
}

pub struct CoordinationEngine {
    config: CoordinatorConfig,
    ip: String,
    hostname: String,
    registry: Arc<dyn RegistryClient>,
    unit_factory: Arc<dyn TaskUnitFactory>,
    discovery: Option<Arc<dyn TaskDiscovery>>,
    state: Mutex<EngineState>,
    timer: Mutex<Option<RefreshTimer>>,
}

impl CoordinationEngine {
    pub fn new(
        config: CoordinatorConfig,
        identity: WorkerIdentity,
        registry: Arc<dyn RegistryClient>,
        unit_factory: Arc<dyn TaskUnitFactory>,
    ) -> Self {
        Self {
            ip: identity.ip().to_string(),
            hostname: identity.hostname().to_string(),
            config,
            registry,
            unit_factory,
            discovery: None,
            state: Mutex::new(EngineState {
                identity,
                connected: false,
                activated: false,
                shut_down: false,
                tasks: LocalTaskSet::new(),
                degraded: BTreeMap::new(),
            }),
            timer: Mutex::new(None),
        }
    }

    /// 设置任务发现协作者，激活时发布本地任务
    pub fn with_discovery(mut self, discovery: Arc<dyn TaskDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// 建立注册中心连接，已连接时直接返回
    pub async fn initialize(&self) -> SchedulerResult<()> {
        let mut state = self.state.lock().await;
        if state.connected {
            debug!("注册中心已连接，跳过初始化");
            return Ok(());
        }

        info!(
            "初始化协调引擎: ip={}, hostname={}",
            self.ip, self.hostname
        );
        self.registry_call("connect", self.registry.connect())
            .await
            .map_err(|e| {
                error!("连接注册中心失败: {}", e);
                e
            })?;
        state.connected = true;
        state.shut_down = false;
        Ok(())
    }

    /// 注册Worker、发布本地任务并启动刷新定时器
    ///
    /// 配置为禁用时什么也不做。注册失败只记录日志，由后续刷新周期修复。
    pub async fn activate(self: &Arc<Self>) -> SchedulerResult<()> {
        if !self.config.enabled {
            info!("协调引擎已禁用，不注册也不启动刷新定时器");
            return Ok(());
        }

        {
            let mut state = self.state.lock().await;
            if !state.connected {
                return Err(SchedulerError::InvalidState(
                    "协调引擎未初始化".to_string(),
                ));
            }
            if state.activated {
                warn!("协调引擎已激活，忽略重复调用");
                return Ok(());
            }

            match self.register(&mut state).await {
                Ok(_) => info!("Worker注册成功: {}", state.identity.uuid()),
                Err(e) => warn!("Worker注册失败，等待刷新周期重试: {}", e),
            }
            self.register_discovery().await;
            state.activated = true;
        }

        let weak = Arc::downgrade(self);
        let timer = RefreshTimer::start(
            self.config.initial_delay(),
            self.config.refresh_interval(),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(engine) = weak.upgrade() {
                        engine.refresh().await;
                    }
                }
            },
        );
        *self.timer.lock().await = Some(timer);
        Ok(())
    }

    /// 停止定时器和全部任务单元，删除注册信息并关闭注册中心连接
    ///
    /// 任何一步失败都只记录日志，其余步骤照常执行。
    pub async fn shutdown(&self) {
        info!("开始关闭协调引擎");

        // 先停定时器：进行中的刷新周期需要引擎锁才能结束
        let timer = self.timer.lock().await.take();
        if let Some(timer) = timer {
            timer.stop().await;
        }

        let mut state = self.state.lock().await;
        state.shut_down = true;
        self.stop_strategy(&mut state, None).await;

        if state.connected {
            if state.identity.is_registered() {
                let uuid = state.identity.uuid();
                if let Err(e) = self
                    .registry_call("remove_worker", self.registry.remove_worker(&uuid))
                    .await
                {
                    warn!("删除Worker注册信息失败: {}", e);
                }
            }
            if let Err(e) = self.registry_call("close", self.registry.close()).await {
                warn!("关闭注册中心连接失败: {}", e);
            }
            state.connected = false;
        }
        state.activated = false;
        info!("协调引擎已关闭");
    }

    /// 执行一个刷新周期
    ///
    /// 所有错误都在周期内处理并记录，留给下一个周期修复。
    pub async fn refresh(&self) {
        let mut state = self.state.lock().await;
        if state.shut_down || !state.connected {
            debug!("协调引擎未运行，跳过刷新");
            return;
        }

        counter!("coordinator_refresh_cycles_total").increment(1);
        let started = Instant::now();

        match self.read_factory_info(&state).await {
            Err(e) => {
                counter!("coordinator_refresh_failures_total").increment(1);
                warn!(
                    "读取Worker注册信息失败，按注册丢失处理: uuid={}, error={}",
                    state.identity.uuid(),
                    e
                );
                self.recover_lost_registration(&mut state).await;
            }
            Ok(info) if !info.started => {
                info!("Worker已被管理端停止，停止全部任务单元: {}", info.uuid);
                self.stop_strategy(&mut state, None).await;
                if let Err(e) = self.unregister(&state).await {
                    warn!("注销Worker失败: {}", e);
                }
            }
            Ok(_) => {
                if let Err(e) = self.register_and_reconcile(&mut state).await {
                    counter!("coordinator_refresh_failures_total").increment(1);
                    warn!("刷新周期失败，等待下个周期: {}", e);
                }
            }
        }

        self.publish_gauges(&state);
        histogram!("coordinator_refresh_duration_ms")
            .record(started.elapsed().as_millis() as f64);
    }

    /// 立即执行一次注册、容量分配和任务调和
    pub async fn re_register(&self) -> SchedulerResult<()> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(SchedulerError::InvalidState(
                "协调引擎未连接注册中心".to_string(),
            ));
        }
        let result = self.register_and_reconcile(&mut state).await;
        self.publish_gauges(&state);
        result
    }

    /// 判断 `worker_uuid` 是否是这组运行时记录中的Leader
    pub fn is_leader(&self, worker_uuid: &str, records: &[StrategyRuntimeRecord]) -> bool {
        coordinator_core::is_leader(worker_uuid, records)
    }

    /// 当前完整uuid，注册后带序号
    pub async fn uuid(&self) -> String {
        self.state.lock().await.identity.uuid()
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub async fn running_units(&self, strategy_name: &str) -> usize {
        self.state.lock().await.tasks.len(strategy_name)
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock().await;
        EngineSnapshot {
            uuid: state.identity.uuid(),
            ordinal: state.identity.ordinal(),
            running: state.tasks.counts(),
            degraded: state.degraded.clone(),
        }
    }

    async fn registry_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = SchedulerResult<T>>,
    ) -> SchedulerResult<T> {
        match tokio::time::timeout(self.config.registry_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::Timeout(format!(
                "注册中心调用 {operation} 超过{:?}",
                self.config.registry_timeout()
            ))),
        }
    }

    async fn read_factory_info(
        &self,
        state: &EngineState,
    ) -> SchedulerResult<FactoryRegistrationInfo> {
        let uuid = state.identity.uuid();
        self.registry_call("read_factory_info", self.registry.read_factory_info(&uuid))
            .await
    }

    /// 注册失败视为瞬时错误：停止全部任务单元、尽力注销，然后无条件重新注册
    async fn recover_lost_registration(&self, state: &mut EngineState) {
        counter!("coordinator_lost_registrations_total").increment(1);

        self.stop_strategy(state, None).await;
        if let Err(e) = self.unregister(state).await {
            warn!("注销Worker失败，继续重新注册: {}", e);
        }

        match self.register_and_reconcile(state).await {
            Ok(()) => info!("Worker重新注册成功: {}", state.identity.uuid()),
            Err(e) => error!("Worker重新注册失败: {}", e),
        }
        self.register_discovery().await;
    }

    async fn register_discovery(&self) {
        if let Some(discovery) = &self.discovery {
            if let Err(e) = self
                .registry_call(
                    "register_tasks",
                    discovery.register_with(self.registry.as_ref()),
                )
                .await
            {
                warn!("发布本地任务失败: {}", e);
            }
        }
    }

    async fn register(&self, state: &mut EngineState) -> SchedulerResult<Vec<String>> {
        let outcome = self
            .registry_call(
                "register_worker",
                self.registry.register_worker(&state.identity),
            )
            .await?;
        if state.identity.ordinal() != Some(outcome.ordinal) {
            info!(
                "Worker序号变更: {:?} -> {}",
                state.identity.ordinal(),
                outcome.ordinal
            );
            state.identity.set_ordinal(outcome.ordinal);
        }
        Ok(outcome.stopped_strategies)
    }

    async fn unregister(&self, state: &EngineState) -> SchedulerResult<()> {
        let uuid = state.identity.uuid();
        self.registry_call("unregister_worker", self.registry.unregister_worker(&uuid))
            .await
    }

    async fn register_and_reconcile(&self, state: &mut EngineState) -> SchedulerResult<()> {
        let stopped = self.register(state).await?;
        for strategy_name in &stopped {
            info!("Worker不再参与策略，停止其任务单元: {}", strategy_name);
            self.stop_strategy(state, Some(strategy_name)).await;
        }
        self.assign(state).await?;
        self.reconcile(state).await
    }

    /// Leader为每个策略计算并写回容量分配
    async fn assign(&self, state: &EngineState) -> SchedulerResult<()> {
        let uuid = state.identity.uuid();
        let participating = self
            .registry_call(
                "list_runtime_records_for_worker",
                self.registry.list_runtime_records_for_worker(&uuid),
            )
            .await?;

        for record in &participating {
            if let Err(e) = self.assign_strategy(&uuid, &record.strategy_name).await {
                warn!("策略 {} 容量分配失败: {}", record.strategy_name, e);
            }
        }
        Ok(())
    }

    async fn assign_strategy(&self, uuid: &str, strategy_name: &str) -> SchedulerResult<()> {
        let records = self
            .registry_call(
                "list_runtime_records",
                self.registry.list_runtime_records(strategy_name),
            )
            .await?;
        if records.is_empty() || !self.is_leader(uuid, &records) {
            return Ok(());
        }

        let strategy = self
            .registry_call(
                "read_strategy_config",
                self.registry.read_strategy_config(strategy_name),
            )
            .await?;
        let capacities = assign_capacity(
            records.len(),
            strategy.assign_num,
            strategy.num_of_single_server,
        );
        counter!("coordinator_leader_assignments_total", "strategy" => strategy_name.to_string())
            .increment(1);
        debug!(
            "Leader分配策略容量: strategy={}, workers={}, capacities={:?}",
            strategy_name,
            records.len(),
            capacities
        );

        for (record, request_num) in records.iter().zip(capacities) {
            if record.request_num == request_num {
                continue;
            }
            if let Err(e) = self
                .registry_call(
                    "update_request_num",
                    self.registry
                        .update_request_num(strategy_name, &record.uuid, request_num),
                )
                .await
            {
                warn!(
                    "写回容量失败: strategy={}, worker={}, error={}",
                    strategy_name, record.uuid, e
                );
            }
        }
        Ok(())
    }

    /// 按分配到的容量调整本地任务单元
    async fn reconcile(&self, state: &mut EngineState) -> SchedulerResult<()> {
        let uuid = state.identity.uuid();
        let records = self
            .registry_call(
                "list_runtime_records_for_worker",
                self.registry.list_runtime_records_for_worker(&uuid),
            )
            .await?;

        let participating: HashSet<&str> = records
            .iter()
            .map(|record| record.strategy_name.as_str())
            .collect();
        for record in &records {
            self.reconcile_strategy(state, record).await;
        }

        // 已不再参与的策略
        for strategy_name in state.tasks.strategies() {
            if !participating.contains(strategy_name.as_str()) {
                info!("策略已没有本Worker的运行时记录，停止任务单元: {}", strategy_name);
                for unit in state.tasks.take(&strategy_name).into_iter().rev() {
                    self.stop_unit(&strategy_name, unit).await;
                }
                gauge!("coordinator_running_task_units", "strategy" => strategy_name).set(0.0);
            }
        }
        state
            .degraded
            .retain(|strategy_name, _| participating.contains(strategy_name.as_str()));
        Ok(())
    }

    async fn reconcile_strategy(&self, state: &mut EngineState, record: &StrategyRuntimeRecord) {
        let strategy_name = record.strategy_name.as_str();
        let target = record.request_num as usize;

        while state.tasks.len(strategy_name) > target {
            if let Some(unit) = state.tasks.pop(strategy_name) {
                self.stop_unit(strategy_name, unit).await;
            }
        }

        if state.tasks.len(strategy_name) < target {
            let strategy = match self
                .registry_call(
                    "read_strategy_config",
                    self.registry.read_strategy_config(strategy_name),
                )
                .await
            {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!("读取策略配置失败，跳过调和: {}: {}", strategy_name, e);
                    return;
                }
            };

            while state.tasks.len(strategy_name) < target {
                match self.unit_factory.create(&strategy, &state.identity).await {
                    Ok(unit) => {
                        state.tasks.push(strategy_name, unit);
                        counter!("coordinator_task_units_started_total", "strategy" => strategy_name.to_string())
                            .increment(1);
                    }
                    Err(e) => {
                        error!(
                            "无法创建任务单元，策略容量降级: strategy={}, running={}, target={}, error={}",
                            strategy_name,
                            state.tasks.len(strategy_name),
                            target,
                            e
                        );
                        state.degraded.insert(strategy_name.to_string(), e.to_string());
                        break;
                    }
                }
            }
        }

        let running = state.tasks.len(strategy_name);
        if running >= target && state.degraded.remove(strategy_name).is_some() {
            info!("策略容量已恢复: {}", strategy_name);
        }
        gauge!("coordinator_running_task_units", "strategy" => strategy_name.to_string())
            .set(running as f64);
    }

    /// 停止并移除策略的全部任务单元，`None` 表示所有策略
    async fn stop_strategy(&self, state: &mut EngineState, strategy_name: Option<&str>) {
        for (name, units) in state.tasks.take_matching(strategy_name) {
            for unit in units.into_iter().rev() {
                self.stop_unit(&name, unit).await;
            }
            state.degraded.remove(&name);
            gauge!("coordinator_running_task_units", "strategy" => name).set(0.0);
        }
    }

    async fn stop_unit(&self, strategy_name: &str, unit: Box<dyn TaskUnit>) {
        let result =
            tokio::time::timeout(self.config.stop_timeout(), unit.stop(strategy_name)).await;
        match result {
            Ok(Ok(())) => {
                counter!("coordinator_task_units_stopped_total", "strategy" => strategy_name.to_string())
                    .increment(1);
            }
            Ok(Err(e)) => {
                counter!("coordinator_task_unit_stop_failures_total", "strategy" => strategy_name.to_string())
                    .increment(1);
                error!("停止任务单元失败: strategy={}, error={}", strategy_name, e);
            }
            Err(_) => {
                counter!("coordinator_task_unit_stop_failures_total", "strategy" => strategy_name.to_string())
                    .increment(1);
                error!(
                    "停止任务单元超时: strategy={}, timeout={:?}",
                    strategy_name,
                    self.config.stop_timeout()
                );
            }
        }
    }

    fn publish_gauges(&self, state: &EngineState) {
        gauge!("coordinator_degraded_strategies").set(state.degraded.len() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_core::StrategyConfig;
    use coordinator_infrastructure::InMemoryRegistry;
    use coordinator_testing_utils::{test_coordinator_config, RecordingTaskUnitFactory};

    async fn engine_with(
        registry: Arc<InMemoryRegistry>,
        factory: Arc<RecordingTaskUnitFactory>,
    ) -> CoordinationEngine {
        let engine = CoordinationEngine::new(
            test_coordinator_config(),
            WorkerIdentity::new("10.0.0.1", "node-a"),
            registry,
            factory,
        );
        engine.initialize().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let registry = Arc::new(InMemoryRegistry::new());
        let engine = engine_with(Arc::clone(&registry), Arc::new(RecordingTaskUnitFactory::new())).await;
        assert!(engine.initialize().await.is_ok());
        assert_eq!(engine.ip(), "10.0.0.1");
        assert_eq!(engine.hostname(), "node-a");
    }

    #[tokio::test]
    async fn test_activate_requires_initialize() {
        let engine = Arc::new(CoordinationEngine::new(
            test_coordinator_config(),
            WorkerIdentity::new("10.0.0.1", "node-a"),
            Arc::new(InMemoryRegistry::new()),
            Arc::new(RecordingTaskUnitFactory::new()),
        ));
        let err = engine.activate().await.unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_disabled_engine_does_not_register() {
        let registry = Arc::new(InMemoryRegistry::new());
        let mut config = test_coordinator_config();
        config.enabled = false;
        let engine = Arc::new(CoordinationEngine::new(
            config,
            WorkerIdentity::new("10.0.0.1", "node-a"),
            registry.clone(),
            Arc::new(RecordingTaskUnitFactory::new()),
        ));
        engine.initialize().await.unwrap();
        engine.activate().await.unwrap();
        assert!(engine.snapshot().await.ordinal.is_none());
    }

    #[tokio::test]
    async fn test_refresh_converges_to_request_num() {
        let registry = Arc::new(InMemoryRegistry::new());
        let factory = Arc::new(RecordingTaskUnitFactory::new());
        let engine = engine_with(Arc::clone(&registry), Arc::clone(&factory)).await;
        registry
            .put_strategy_config(&StrategyConfig::schedule("s1", "t$BASE", 3, 0))
            .await
            .unwrap();

        engine.refresh().await;

        assert_eq!(engine.running_units("s1").await, 3);
        let snapshot = engine.snapshot().await;
        assert!(snapshot.ordinal.is_some());
        assert_eq!(snapshot.running.get("s1"), Some(&3));
        assert!(snapshot.degraded.is_empty());
        assert_eq!(factory.created(), 3);
    }

    #[tokio::test]
    async fn test_refresh_after_shutdown_is_noop() {
        let registry = Arc::new(InMemoryRegistry::new());
        let factory = Arc::new(RecordingTaskUnitFactory::new());
        let engine = engine_with(Arc::clone(&registry), Arc::clone(&factory)).await;
        registry
            .put_strategy_config(&StrategyConfig::schedule("s1", "t$BASE", 2, 0))
            .await
            .unwrap();

        engine.shutdown().await;
        engine.refresh().await;
        assert_eq!(engine.running_units("s1").await, 0);
        assert_eq!(factory.created(), 0);
    }

    #[test]
    fn test_is_leader_delegates_to_ordinal_comparison() {
        let engine = CoordinationEngine::new(
            test_coordinator_config(),
            WorkerIdentity::new("10.0.0.1", "node-a"),
            Arc::new(InMemoryRegistry::new()),
            Arc::new(RecordingTaskUnitFactory::new()),
        );
        let records = vec![
            StrategyRuntimeRecord {
                strategy_name: "s1".to_string(),
                uuid: "b".to_string(),
                ordinal: 9,
                request_num: 0,
            },
            StrategyRuntimeRecord {
                strategy_name: "s1".to_string(),
                uuid: "a".to_string(),
                ordinal: 2,
                request_num: 0,
            },
        ];
        assert!(engine.is_leader("a", &records));
        assert!(!engine.is_leader("b", &records));
    }
}
