use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use coordinator::{Application, ShutdownManager};
use coordinator_core::AppConfig;
use coordinator_testing_utils::TestEnv;

const MEMORY_CONFIG: &str = r#"
[coordinator]
initial_delay_ms = 10
refresh_interval_ms = 50
hostname = "app-test"

[registry]
backend = "memory"

[[tasks]]
base_task_type = "heartbeat"
command = "true"
interval_ms = 50
assign_num = 2
"#;

#[cfg(unix)]
#[tokio::test]
async fn test_application_runs_configured_tasks_until_shutdown() -> Result<()> {
    let config = AppConfig::from_toml(MEMORY_CONFIG)?;
    let app = Arc::new(Application::new(config)?);
    let shutdown = ShutdownManager::new();

    let handle = {
        let app = Arc::clone(&app);
        let shutdown_rx = shutdown.subscribe().await;
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    let engine = Arc::clone(app.engine());
    let running = TestEnv::wait_for(
        || {
            let engine = Arc::clone(&engine);
            async move { engine.running_units("heartbeat").await == 2 }
        },
        Duration::from_secs(3),
    )
    .await;
    assert!(running);
    assert_eq!(engine.hostname(), "app-test");

    shutdown.shutdown().await;
    tokio::time::timeout(Duration::from_secs(5), handle).await???;

    let snapshot = engine.snapshot().await;
    assert!(snapshot.running.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unreachable_registry_fails_startup() -> Result<()> {
    let config = AppConfig::from_toml(
        r#"
[registry]
backend = "redis"
url = "redis://127.0.0.1:1"
connect_timeout_ms = 500
"#,
    )?;
    let app = Application::new(config)?;
    let shutdown = ShutdownManager::new();

    let result = app.run(shutdown.subscribe().await).await;
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("连接注册中心失败"));
    Ok(())
}

#[test]
fn test_invalid_task_definition_is_rejected() {
    let mut config = AppConfig::from_toml(MEMORY_CONFIG).unwrap();
    let duplicate = config.tasks[0].clone();
    config.tasks.push(duplicate);
    assert!(Application::new(config).is_err());

    let mut config = AppConfig::from_toml(MEMORY_CONFIG).unwrap();
    config.tasks[0].interval_ms = 0;
    assert!(Application::new(config).is_err());
}
