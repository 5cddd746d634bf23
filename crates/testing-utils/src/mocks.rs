//! 测试替身
//!
//! - `FlakyRegistry`: 包装真实的注册中心实现，可以让指定操作返回错误
//! - `RecordingTaskUnitFactory`: 创建只记录停止顺序的任务单元，停止可以失败或永不返回

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use coordinator_core::{
    FactoryRegistrationInfo, RegistrationOutcome, RegistryClient, SchedulerError,
    SchedulerResult, StrategyConfig, StrategyKind, StrategyRuntimeRecord, TaskUnit,
    TaskUnitFactory, WorkerIdentity,
};

fn injected(operation: &str) -> SchedulerError {
    SchedulerError::Registry(format!("注入的故障: {operation}"))
}

/// 可注入故障的注册中心
pub struct FlakyRegistry {
    inner: Arc<dyn RegistryClient>,
    fail_factory_read: AtomicBool,
    fail_register: AtomicBool,
    fail_unregister: AtomicBool,
    failing_request_num_updates: Mutex<HashSet<String>>,
    register_calls: AtomicUsize,
    unregister_calls: AtomicUsize,
}

impl FlakyRegistry {
    pub fn new(inner: Arc<dyn RegistryClient>) -> Self {
        Self {
            inner,
            fail_factory_read: AtomicBool::new(false),
            fail_register: AtomicBool::new(false),
            fail_unregister: AtomicBool::new(false),
            failing_request_num_updates: Mutex::new(HashSet::new()),
            register_calls: AtomicUsize::new(0),
            unregister_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_factory_read(&self, fail: bool) {
        self.fail_factory_read.store(fail, Ordering::SeqCst);
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn fail_unregister(&self, fail: bool) {
        self.fail_unregister.store(fail, Ordering::SeqCst);
    }

    /// 写回指定Worker的容量时返回错误，其他Worker不受影响
    pub fn fail_request_num_updates_for(&self, uuid: impl Into<String>) {
        self.failing_request_num_updates
            .lock()
            .unwrap()
            .insert(uuid.into());
    }

    pub fn clear_request_num_failures(&self) {
        self.failing_request_num_updates.lock().unwrap().clear();
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for FlakyRegistry {
    async fn connect(&self) -> SchedulerResult<()> {
        self.inner.connect().await
    }

    async fn close(&self) -> SchedulerResult<()> {
        self.inner.close().await
    }

    async fn register_worker(
        &self,
        identity: &WorkerIdentity,
    ) -> SchedulerResult<RegistrationOutcome> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(injected("register_worker"));
        }
        self.inner.register_worker(identity).await
    }

    async fn unregister_worker(&self, uuid: &str) -> SchedulerResult<()> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_unregister.load(Ordering::SeqCst) {
            return Err(injected("unregister_worker"));
        }
        self.inner.unregister_worker(uuid).await
    }

    async fn remove_worker(&self, uuid: &str) -> SchedulerResult<()> {
        self.inner.remove_worker(uuid).await
    }

    async fn read_factory_info(&self, uuid: &str) -> SchedulerResult<FactoryRegistrationInfo> {
        if self.fail_factory_read.load(Ordering::SeqCst) {
            return Err(injected("read_factory_info"));
        }
        self.inner.read_factory_info(uuid).await
    }

    async fn set_worker_started(&self, uuid: &str, started: bool) -> SchedulerResult<()> {
        self.inner.set_worker_started(uuid, started).await
    }

    async fn list_runtime_records(
        &self,
        strategy_name: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        self.inner.list_runtime_records(strategy_name).await
    }

    async fn list_runtime_records_for_worker(
        &self,
        uuid: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        self.inner.list_runtime_records_for_worker(uuid).await
    }

    async fn read_strategy_config(&self, strategy_name: &str) -> SchedulerResult<StrategyConfig> {
        self.inner.read_strategy_config(strategy_name).await
    }

    async fn put_strategy_config(&self, config: &StrategyConfig) -> SchedulerResult<()> {
        self.inner.put_strategy_config(config).await
    }

    async fn remove_strategy_config(&self, strategy_name: &str) -> SchedulerResult<()> {
        self.inner.remove_strategy_config(strategy_name).await
    }

    async fn list_strategy_configs(&self) -> SchedulerResult<Vec<StrategyConfig>> {
        self.inner.list_strategy_configs().await
    }

    async fn update_request_num(
        &self,
        strategy_name: &str,
        uuid: &str,
        request_num: u32,
    ) -> SchedulerResult<()> {
        if self.failing_request_num_updates.lock().unwrap().contains(uuid) {
            return Err(injected("update_request_num"));
        }
        self.inner
            .update_request_num(strategy_name, uuid, request_num)
            .await
    }
}

/// 记录型任务单元，标签形如 `<strategy>#<n>`，n按策略从1开始
pub struct RecordingTaskUnit {
    label: String,
    strategy_name: String,
    fail_stop: bool,
    hang_stop: bool,
    stop_log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTaskUnit {
    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl TaskUnit for RecordingTaskUnit {
    fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    async fn stop(&self, _strategy_name: &str) -> SchedulerResult<()> {
        self.stop_log.lock().unwrap().push(self.label.clone());
        if self.hang_stop {
            std::future::pending::<()>().await;
        }
        if self.fail_stop {
            Err(SchedulerError::TaskUnit(format!("停止失败: {}", self.label)))
        } else {
            Ok(())
        }
    }
}

/// 创建 `RecordingTaskUnit` 的工厂，和真实工厂一样拒绝不支持的策略类型
#[derive(Default)]
pub struct RecordingTaskUnitFactory {
    sequences: Mutex<HashMap<String, usize>>,
    created: AtomicUsize,
    failing_stops: Mutex<HashSet<String>>,
    hanging_stops: Mutex<HashSet<String>>,
    stop_log: Arc<Mutex<Vec<String>>>,
}

impl RecordingTaskUnitFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让指定标签的任务单元在停止时返回错误
    pub fn fail_stop_of(&self, label: impl Into<String>) {
        self.failing_stops.lock().unwrap().insert(label.into());
    }

    /// 让指定标签的任务单元停止时永不返回
    pub fn hang_stop_of(&self, label: impl Into<String>) {
        self.hanging_stops.lock().unwrap().insert(label.into());
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// 按停止顺序排列的标签，包括停止失败的
    pub fn stopped(&self) -> Vec<String> {
        self.stop_log.lock().unwrap().clone()
    }

    pub fn stopped_of(&self, strategy_name: &str) -> Vec<String> {
        let prefix = format!("{strategy_name}#");
        self.stopped()
            .into_iter()
            .filter(|label| label.starts_with(&prefix))
            .collect()
    }
}

#[async_trait]
impl TaskUnitFactory for RecordingTaskUnitFactory {
    async fn create(
        &self,
        strategy: &StrategyConfig,
        _worker: &WorkerIdentity,
    ) -> SchedulerResult<Box<dyn TaskUnit>> {
        if let StrategyKind::Unsupported(_) = strategy.kind {
            return Err(SchedulerError::UnsupportedStrategyKind {
                strategy: strategy.strategy_name.clone(),
            });
        }

        let index = {
            let mut sequences = self.sequences.lock().unwrap();
            let next = sequences.entry(strategy.strategy_name.clone()).or_insert(0);
            *next += 1;
            *next
        };
        let label = format!("{}#{}", strategy.strategy_name, index);
        let fail_stop = self.failing_stops.lock().unwrap().contains(&label);
        let hang_stop = self.hanging_stops.lock().unwrap().contains(&label);
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(RecordingTaskUnit {
            label,
            strategy_name: strategy.strategy_name.clone(),
            fail_stop,
            hang_stop,
            stop_log: Arc::clone(&self.stop_log),
        }))
    }
}
