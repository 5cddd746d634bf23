use anyhow::Result;
use coordinator_core::{RegistryClient, StrategyConfig, WorkerIdentity};
use coordinator_infrastructure::RedisRegistry;
use coordinator_testing_utils::RedisTestContainer;

#[tokio::test]
#[ignore] // 需要Docker
async fn test_registration_and_assignment_roundtrip() -> Result<()> {
    let redis = RedisTestContainer::new().await?;
    let registry = RedisRegistry::new(redis.registry_config(1000));
    registry.connect().await?;

    registry
        .put_strategy_config(&StrategyConfig::schedule("orderSync", "orderSync$BASE", 10, 4))
        .await?;

    let a = WorkerIdentity::new("10.0.0.1", "node-a");
    let b = WorkerIdentity::new("10.0.0.2", "node-b");
    let a = a.clone().with_ordinal(registry.register_worker(&a).await?.ordinal);
    let b = b.clone().with_ordinal(registry.register_worker(&b).await?.ordinal);
    assert!(b.ordinal() > a.ordinal());

    let records = registry.list_runtime_records("orderSync").await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].uuid, a.uuid());

    registry.update_request_num("orderSync", &a.uuid(), 4).await?;
    let mine = registry.list_runtime_records_for_worker(&a.uuid()).await?;
    assert_eq!(mine[0].request_num, 4);

    let err = registry
        .update_request_num("orderSync", "missing$0000000099", 1)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // 重复注册沿用序号
    let again = registry.register_worker(&a).await?;
    assert_eq!(again.ordinal, a.ordinal().unwrap());

    registry.set_worker_started(&a.uuid(), false).await?;
    registry.unregister_worker(&a.uuid()).await?;
    assert!(!registry.read_factory_info(&a.uuid()).await?.started);
    assert_eq!(registry.list_runtime_records("orderSync").await?.len(), 1);

    registry.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore] // 需要Docker
async fn test_expired_worker_is_dropped_from_listing() -> Result<()> {
    let redis = RedisTestContainer::new().await?;
    let registry = RedisRegistry::new(redis.registry_config(1000));
    registry.connect().await?;
    registry
        .put_strategy_config(&StrategyConfig::schedule("cleanup", "cleanup", 2, 1))
        .await?;

    let worker = WorkerIdentity::new("10.0.0.1", "node-a");
    let worker = worker.clone().with_ordinal(registry.register_worker(&worker).await?.ordinal);
    assert_eq!(registry.list_runtime_records("cleanup").await?.len(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert!(registry.list_runtime_records("cleanup").await?.is_empty());
    assert!(registry.read_factory_info(&worker.uuid()).await.unwrap_err().is_not_found());

    // 会话过期后重新注册得到新序号
    let outcome = registry.register_worker(&worker).await?;
    assert!(outcome.ordinal > worker.ordinal().unwrap());
    Ok(())
}
