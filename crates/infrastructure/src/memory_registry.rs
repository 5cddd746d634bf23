use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coordinator_core::{
    plan_registration, FactoryRegistrationInfo, RegistrationOutcome, RegistryClient,
    SchedulerError, SchedulerResult, StrategyConfig, StrategyRuntimeRecord, WorkerIdentity,
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 内存注册中心
///
/// 同一个存储可以派生多个客户端（`client()`），每个客户端有独立的连接状态，
/// 用于单进程部署以及多Worker场景的测试。
#[derive(Debug)]
pub struct InMemoryRegistry {
    store: Arc<RwLock<MemoryStore>>,
    connected: AtomicBool,
}

#[derive(Debug, Default)]
struct MemoryStore {
    last_ordinal: u64,
    factories: HashMap<String, FactoryRegistrationInfo>,
    strategies: BTreeMap<String, StrategyConfig>,
    /// 策略名 -> (uuid -> 运行时记录)
    runtime: HashMap<String, HashMap<String, StrategyRuntimeRecord>>,
}

impl MemoryStore {
    fn joined_strategies(&self, uuid: &str) -> HashSet<String> {
        self.runtime
            .iter()
            .filter(|(_, records)| records.contains_key(uuid))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn drop_runtime_records(&mut self, uuid: &str) {
        for records in self.runtime.values_mut() {
            records.remove(uuid);
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    /// 创建使用全新存储的注册中心
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::default())),
            connected: AtomicBool::new(false),
        }
    }

    /// 派生一个共享同一存储的新客户端，初始为未连接
    pub fn client(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            connected: AtomicBool::new(false),
        }
    }

    /// 模拟会话过期：删除Worker注册信息和全部运行时记录
    pub async fn expire_session(&self, uuid: &str) {
        let mut store = self.store.write().await;
        store.factories.remove(uuid);
        store.drop_runtime_records(uuid);
        info!("Worker会话已过期: {}", uuid);
    }

    fn ensure_connected(&self) -> SchedulerResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SchedulerError::RegistryConnection(
                "内存注册中心未连接".to_string(),
            ))
        }
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn connect(&self) -> SchedulerResult<()> {
        self.connected.store(true, Ordering::SeqCst);
        debug!("内存注册中心已连接");
        Ok(())
    }

    async fn close(&self) -> SchedulerResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        debug!("内存注册中心已关闭");
        Ok(())
    }

    async fn register_worker(
        &self,
        identity: &WorkerIdentity,
    ) -> SchedulerResult<RegistrationOutcome> {
        self.ensure_connected()?;
        let mut store = self.store.write().await;

        let existing = identity
            .ordinal()
            .filter(|_| store.factories.contains_key(&identity.uuid()));
        let ordinal = match existing {
            Some(ordinal) => ordinal,
            None => {
                if identity.is_registered() {
                    store.drop_runtime_records(&identity.uuid());
                }
                store.last_ordinal += 1;
                let ordinal = store.last_ordinal;
                let info = FactoryRegistrationInfo::new(&identity.clone().with_ordinal(ordinal));
                info!("分配Worker序号: {} -> {}", identity.base_uuid(), ordinal);
                store.factories.insert(info.uuid.clone(), info);
                ordinal
            }
        };

        let registered = identity.clone().with_ordinal(ordinal);
        let uuid = registered.uuid();
        let strategies: Vec<StrategyConfig> = store.strategies.values().cloned().collect();
        let joined = store.joined_strategies(&uuid);
        let plan = plan_registration(&strategies, &registered, &joined);

        for name in &plan.join {
            store
                .runtime
                .entry(name.clone())
                .or_default()
                .insert(uuid.clone(), StrategyRuntimeRecord::new(name.clone(), &registered, ordinal));
            debug!("Worker {} 加入策略 {}", uuid, name);
        }
        for name in &plan.leave {
            if let Some(records) = store.runtime.get_mut(name) {
                records.remove(&uuid);
            }
            debug!("Worker {} 退出策略 {}", uuid, name);
        }

        Ok(RegistrationOutcome {
            ordinal,
            stopped_strategies: plan.leave,
        })
    }

    async fn unregister_worker(&self, uuid: &str) -> SchedulerResult<()> {
        self.ensure_connected()?;
        self.store.write().await.drop_runtime_records(uuid);
        Ok(())
    }

    async fn remove_worker(&self, uuid: &str) -> SchedulerResult<()> {
        self.ensure_connected()?;
        let mut store = self.store.write().await;
        store.factories.remove(uuid);
        store.drop_runtime_records(uuid);
        Ok(())
    }

    async fn read_factory_info(&self, uuid: &str) -> SchedulerResult<FactoryRegistrationInfo> {
        self.ensure_connected()?;
        self.store
            .read()
            .await
            .factories
            .get(uuid)
            .cloned()
            .ok_or_else(|| SchedulerError::factory_not_found(uuid))
    }

    async fn set_worker_started(&self, uuid: &str, started: bool) -> SchedulerResult<()> {
        self.ensure_connected()?;
        let mut store = self.store.write().await;
        let info = store
            .factories
            .get_mut(uuid)
            .ok_or_else(|| SchedulerError::factory_not_found(uuid))?;
        info.started = started;
        Ok(())
    }

    async fn list_runtime_records(
        &self,
        strategy_name: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        self.ensure_connected()?;
        let store = self.store.read().await;
        let mut records: Vec<StrategyRuntimeRecord> = store
            .runtime
            .get(strategy_name)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|record| record.ordinal);
        Ok(records)
    }

    async fn list_runtime_records_for_worker(
        &self,
        uuid: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        self.ensure_connected()?;
        let store = self.store.read().await;
        let mut records: Vec<StrategyRuntimeRecord> = store
            .runtime
            .values()
            .filter_map(|records| records.get(uuid).cloned())
            .collect();
        records.sort_by(|a, b| a.strategy_name.cmp(&b.strategy_name));
        Ok(records)
    }

    async fn read_strategy_config(&self, strategy_name: &str) -> SchedulerResult<StrategyConfig> {
        self.ensure_connected()?;
        self.store
            .read()
            .await
            .strategies
            .get(strategy_name)
            .cloned()
            .ok_or_else(|| SchedulerError::strategy_not_found(strategy_name))
    }

    async fn put_strategy_config(&self, config: &StrategyConfig) -> SchedulerResult<()> {
        self.ensure_connected()?;
        config.validate()?;
        self.store
            .write()
            .await
            .strategies
            .insert(config.strategy_name.clone(), config.clone());
        Ok(())
    }

    async fn remove_strategy_config(&self, strategy_name: &str) -> SchedulerResult<()> {
        self.ensure_connected()?;
        let mut store = self.store.write().await;
        store.strategies.remove(strategy_name);
        store.runtime.remove(strategy_name);
        Ok(())
    }

    async fn list_strategy_configs(&self) -> SchedulerResult<Vec<StrategyConfig>> {
        self.ensure_connected()?;
        Ok(self.store.read().await.strategies.values().cloned().collect())
    }

    async fn update_request_num(
        &self,
        strategy_name: &str,
        uuid: &str,
        request_num: u32,
    ) -> SchedulerResult<()> {
        self.ensure_connected()?;
        let mut store = self.store.write().await;
        let record = store
            .runtime
            .get_mut(strategy_name)
            .and_then(|records| records.get_mut(uuid))
            .ok_or_else(|| SchedulerError::runtime_not_found(strategy_name, uuid))?;
        record.request_num = request_num;
        Ok(())
    }
}
