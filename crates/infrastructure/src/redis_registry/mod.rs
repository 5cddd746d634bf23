//! 基于Redis的注册中心
//!
//! Worker注册信息是带过期时间的hash，注册和读取注册信息都会续期；
//! Worker进程退出后，注册信息在会话超时后过期，列举运行时记录时
//! 会一并清理注册信息已过期的记录。

mod keys;
mod records;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use coordinator_core::{
    plan_registration, FactoryRegistrationInfo, RegistrationOutcome, RegistryClient,
    RegistryConfig, SchedulerError, SchedulerResult, StrategyConfig, StrategyRuntimeRecord,
    WorkerIdentity,
};
use metrics::counter;
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub use keys::RegistryKeys;

/// 键存在时才写入hash字段，返回是否写入
const SET_FIELD_IF_EXISTS: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
    return 1
end
return 0
"#;

pub struct RedisRegistry {
    config: RegistryConfig,
    keys: RegistryKeys,
    connection: RwLock<Option<ConnectionManager>>,
    set_if_exists_script: Script,
}

fn redis_error(e: redis::RedisError) -> SchedulerError {
    counter!("coordinator_registry_errors_total", "backend" => "redis").increment(1);
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
        SchedulerError::RegistryConnection(e.to_string())
    } else {
        SchedulerError::Registry(e.to_string())
    }
}

impl RedisRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let keys = RegistryKeys::new(config.key_prefix.clone());
        Self {
            config,
            keys,
            connection: RwLock::new(None),
            set_if_exists_script: Script::new(SET_FIELD_IF_EXISTS),
        }
    }

    async fn get_connection(&self) -> SchedulerResult<ConnectionManager> {
        self.connection
            .read()
            .await
            .clone()
            .ok_or_else(|| SchedulerError::RegistryConnection("Redis注册中心未连接".to_string()))
    }

    fn session_timeout_ms(&self) -> i64 {
        self.config.session_timeout_ms as i64
    }

    /// 续期注册信息，返回注册信息是否仍然存在
    async fn touch_factory(&self, conn: &mut ConnectionManager, uuid: &str) -> SchedulerResult<bool> {
        redis::cmd("PEXPIRE")
            .arg(self.keys.factory(uuid))
            .arg(self.session_timeout_ms())
            .query_async(conn)
            .await
            .map_err(redis_error)
    }

    async fn create_factory(
        &self,
        conn: &mut ConnectionManager,
        identity: &WorkerIdentity,
    ) -> SchedulerResult<u64> {
        let ordinal: u64 = redis::cmd("INCR")
            .arg(self.keys.sequence())
            .query_async(conn)
            .await
            .map_err(redis_error)?;

        let info = FactoryRegistrationInfo::new(&identity.clone().with_ordinal(ordinal));
        let key = self.keys.factory(&info.uuid);
        let () = redis::pipe()
            .atomic()
            .hset_multiple(&key, &records::factory_fields(&info))
            .ignore()
            .pexpire(&key, self.session_timeout_ms())
            .ignore()
            .query_async(conn)
            .await
            .map_err(redis_error)?;

        info!("分配Worker序号: {} -> {}", identity.base_uuid(), ordinal);
        Ok(ordinal)
    }

    async fn joined_strategies(
        &self,
        conn: &mut ConnectionManager,
        uuid: &str,
    ) -> SchedulerResult<HashSet<String>> {
        redis::cmd("SMEMBERS")
            .arg(self.keys.worker_strategies(uuid))
            .query_async(conn)
            .await
            .map_err(redis_error)
    }

    async fn join_strategy(
        &self,
        conn: &mut ConnectionManager,
        record: &StrategyRuntimeRecord,
    ) -> SchedulerResult<()> {
        let key = self.keys.runtime(&record.strategy_name, &record.uuid);
        redis::pipe()
            .atomic()
            .hset_multiple(&key, &records::runtime_fields(record))
            .ignore()
            .sadd(self.keys.runtime_members(&record.strategy_name), &record.uuid)
            .ignore()
            .sadd(self.keys.worker_strategies(&record.uuid), &record.strategy_name)
            .ignore()
            .query_async(conn)
            .await
            .map_err(redis_error)
    }

    async fn leave_strategy(
        &self,
        conn: &mut ConnectionManager,
        strategy_name: &str,
        uuid: &str,
    ) -> SchedulerResult<()> {
        redis::pipe()
            .atomic()
            .del(self.keys.runtime(strategy_name, uuid))
            .ignore()
            .srem(self.keys.runtime_members(strategy_name), uuid)
            .ignore()
            .srem(self.keys.worker_strategies(uuid), strategy_name)
            .ignore()
            .query_async(conn)
            .await
            .map_err(redis_error)
    }

    async fn drop_runtime_records(
        &self,
        conn: &mut ConnectionManager,
        uuid: &str,
    ) -> SchedulerResult<()> {
        let strategies = self.joined_strategies(conn, uuid).await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for strategy_name in &strategies {
            pipe.del(self.keys.runtime(strategy_name, uuid))
                .ignore()
                .srem(self.keys.runtime_members(strategy_name), uuid)
                .ignore();
        }
        pipe.del(self.keys.worker_strategies(uuid)).ignore();
        pipe.query_async(conn).await.map_err(redis_error)
    }

    async fn load_strategy(
        &self,
        conn: &mut ConnectionManager,
        strategy_name: &str,
    ) -> SchedulerResult<Option<StrategyConfig>> {
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.keys.strategy(strategy_name))
            .query_async(conn)
            .await
            .map_err(redis_error)?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(|e| {
                SchedulerError::MalformedRecord(format!("策略 {strategy_name}: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn set_field_if_exists(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
        field: &str,
        value: String,
    ) -> SchedulerResult<bool> {
        self.set_if_exists_script
            .key(key)
            .arg(field)
            .arg(value)
            .invoke_async(conn)
            .await
            .map_err(redis_error)
    }
}

#[async_trait]
impl RegistryClient for RedisRegistry {
    async fn connect(&self) -> SchedulerResult<()> {
        info!("连接Redis注册中心，键前缀: {}", self.config.key_prefix);

        let client = Client::open(self.config.url.as_str()).map_err(|e| {
            SchedulerError::RegistryConnection(format!("创建Redis客户端失败: {e}"))
        })?;

        let mut conn = tokio::time::timeout(
            self.config.connect_timeout(),
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            SchedulerError::RegistryConnection(format!("连接Redis超时: {:?}", self.config.connect_timeout()))
        })?
        .map_err(|e| SchedulerError::RegistryConnection(e.to_string()))?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis PING失败: {}", e);
                SchedulerError::RegistryConnection(e.to_string())
            })?;
        if pong != "PONG" {
            return Err(SchedulerError::RegistryConnection(format!(
                "Redis PING响应异常: {pong}"
            )));
        }

        *self.connection.write().await = Some(conn);
        info!("Redis注册中心连接成功");
        Ok(())
    }

    async fn close(&self) -> SchedulerResult<()> {
        if self.connection.write().await.take().is_some() {
            info!("Redis注册中心连接已关闭");
        }
        Ok(())
    }

    async fn register_worker(
        &self,
        identity: &WorkerIdentity,
    ) -> SchedulerResult<RegistrationOutcome> {
        let mut conn = self.get_connection().await?;

        let alive = match identity.ordinal() {
            Some(_) => self.touch_factory(&mut conn, &identity.uuid()).await?,
            None => false,
        };
        let ordinal = match identity.ordinal() {
            Some(ordinal) if alive => ordinal,
            previous => {
                if previous.is_some() {
                    warn!("Worker注册信息已过期，重新分配序号: {}", identity.uuid());
                    self.drop_runtime_records(&mut conn, &identity.uuid()).await?;
                }
                self.create_factory(&mut conn, identity).await?
            }
        };

        let registered = identity.clone().with_ordinal(ordinal);
        let uuid = registered.uuid();
        let strategies = self.list_strategy_configs().await?;
        let joined = self.joined_strategies(&mut conn, &uuid).await?;
        let plan = plan_registration(&strategies, &registered, &joined);

        for strategy_name in &plan.join {
            let record = StrategyRuntimeRecord::new(strategy_name.clone(), &registered, ordinal);
            self.join_strategy(&mut conn, &record).await?;
            debug!("Worker {} 加入策略 {}", uuid, strategy_name);
        }
        for strategy_name in &plan.leave {
            self.leave_strategy(&mut conn, strategy_name, &uuid).await?;
            debug!("Worker {} 退出策略 {}", uuid, strategy_name);
        }

        Ok(RegistrationOutcome {
            ordinal,
            stopped_strategies: plan.leave,
        })
    }

    async fn unregister_worker(&self, uuid: &str) -> SchedulerResult<()> {
        let mut conn = self.get_connection().await?;
        self.drop_runtime_records(&mut conn, uuid).await
    }

    async fn remove_worker(&self, uuid: &str) -> SchedulerResult<()> {
        let mut conn = self.get_connection().await?;
        self.drop_runtime_records(&mut conn, uuid).await?;
        redis::cmd("DEL")
            .arg(self.keys.factory(uuid))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn read_factory_info(&self, uuid: &str) -> SchedulerResult<FactoryRegistrationInfo> {
        let mut conn = self.get_connection().await?;
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.keys.factory(uuid))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        if fields.is_empty() {
            return Err(SchedulerError::factory_not_found(uuid));
        }
        self.touch_factory(&mut conn, uuid).await?;
        records::parse_factory(uuid, &fields)
    }

    async fn set_worker_started(&self, uuid: &str, started: bool) -> SchedulerResult<()> {
        let mut conn = self.get_connection().await?;
        let updated = self
            .set_field_if_exists(&mut conn, &self.keys.factory(uuid), "started", started.to_string())
            .await?;
        if updated {
            Ok(())
        } else {
            Err(SchedulerError::factory_not_found(uuid))
        }
    }

    async fn list_runtime_records(
        &self,
        strategy_name: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        let mut conn = self.get_connection().await?;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.keys.runtime_members(strategy_name))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        let mut records = Vec::with_capacity(members.len());
        for uuid in members {
            let alive: bool = redis::cmd("EXISTS")
                .arg(self.keys.factory(&uuid))
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            if !alive {
                debug!("清理已过期Worker的运行时记录: {}/{}", strategy_name, uuid);
                self.leave_strategy(&mut conn, strategy_name, &uuid).await?;
                continue;
            }

            let fields: HashMap<String, String> = redis::cmd("HGETALL")
                .arg(self.keys.runtime(strategy_name, &uuid))
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            if fields.is_empty() {
                continue;
            }
            records.push(records::parse_runtime(&fields)?);
        }

        records.sort_by_key(|record| record.ordinal);
        Ok(records)
    }

    async fn list_runtime_records_for_worker(
        &self,
        uuid: &str,
    ) -> SchedulerResult<Vec<StrategyRuntimeRecord>> {
        let mut conn = self.get_connection().await?;
        let mut strategies: Vec<String> = self
            .joined_strategies(&mut conn, uuid)
            .await?
            .into_iter()
            .collect();
        strategies.sort();

        let mut records = Vec::with_capacity(strategies.len());
        for strategy_name in strategies {
            let fields: HashMap<String, String> = redis::cmd("HGETALL")
                .arg(self.keys.runtime(&strategy_name, uuid))
                .query_async(&mut conn)
                .await
                .map_err(redis_error)?;
            if !fields.is_empty() {
                records.push(records::parse_runtime(&fields)?);
            }
        }
        Ok(records)
    }

    async fn read_strategy_config(&self, strategy_name: &str) -> SchedulerResult<StrategyConfig> {
        let mut conn = self.get_connection().await?;
        self.load_strategy(&mut conn, strategy_name)
            .await?
            .ok_or_else(|| SchedulerError::strategy_not_found(strategy_name))
    }

    async fn put_strategy_config(&self, config: &StrategyConfig) -> SchedulerResult<()> {
        config.validate()?;
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(config)?;
        redis::pipe()
            .atomic()
            .set(self.keys.strategy(&config.strategy_name), json)
            .ignore()
            .sadd(self.keys.strategies(), &config.strategy_name)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn remove_strategy_config(&self, strategy_name: &str) -> SchedulerResult<()> {
        let mut conn = self.get_connection().await?;
        let members: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.keys.runtime_members(strategy_name))
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .del(self.keys.strategy(strategy_name))
            .ignore()
            .srem(self.keys.strategies(), strategy_name)
            .ignore()
            .del(self.keys.runtime_members(strategy_name))
            .ignore();
        for uuid in &members {
            pipe.del(self.keys.runtime(strategy_name, uuid))
                .ignore()
                .srem(self.keys.worker_strategies(uuid), strategy_name)
                .ignore();
        }
        pipe.query_async(&mut conn).await.map_err(redis_error)
    }

    async fn list_strategy_configs(&self) -> SchedulerResult<Vec<StrategyConfig>> {
        let mut conn = self.get_connection().await?;
        let mut names: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.keys.strategies())
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        names.sort();

        let mut configs = Vec::with_capacity(names.len());
        for name in names {
            if let Some(config) = self.load_strategy(&mut conn, &name).await? {
                configs.push(config);
            }
        }
        Ok(configs)
    }

    async fn update_request_num(
        &self,
        strategy_name: &str,
        uuid: &str,
        request_num: u32,
    ) -> SchedulerResult<()> {
        let mut conn = self.get_connection().await?;
        let updated = self
            .set_field_if_exists(
                &mut conn,
                &self.keys.runtime(strategy_name, uuid),
                "request_num",
                request_num.to_string(),
            )
            .await?;
        if updated {
            Ok(())
        } else {
            Err(SchedulerError::runtime_not_found(strategy_name, uuid))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calls_fail_before_connect() {
        let registry = RedisRegistry::new(RegistryConfig::default());
        let err = registry.list_strategy_configs().await.unwrap_err();
        assert!(matches!(err, SchedulerError::RegistryConnection(_)));
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let config = RegistryConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout_ms: 500,
            ..RegistryConfig::default()
        };
        let registry = RedisRegistry::new(config);
        let err = registry.connect().await.unwrap_err();
        assert!(matches!(err, SchedulerError::RegistryConnection(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_connection_error() {
        let config = RegistryConfig {
            url: "not a url".to_string(),
            ..RegistryConfig::default()
        };
        let registry = RedisRegistry::new(config);
        assert!(registry.connect().await.is_err());
    }
}
