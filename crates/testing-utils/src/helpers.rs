//! 测试辅助函数

use std::time::Duration;

use chrono::Utc;
use coordinator_core::{CoordinatorConfig, WorkerIdentity};
use tokio::time::sleep;

/// 测试用的协调引擎配置
///
/// 初始延迟很长，定时器在测试期间不会触发，刷新周期由测试手动驱动。
pub fn test_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        enabled: true,
        refresh_interval_ms: 100,
        initial_delay_ms: 60_000,
        registry_timeout_ms: 1000,
        stop_timeout_ms: 500,
        ip_address: None,
        hostname: None,
    }
}

/// 定时器会在测试期间触发的配置
pub fn fast_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        initial_delay_ms: 10,
        refresh_interval_ms: 50,
        ..test_coordinator_config()
    }
}

/// 测试用Worker身份，ip为 `10.0.0.<n>`
pub fn test_worker(n: u8) -> WorkerIdentity {
    WorkerIdentity::new(format!("10.0.0.{n}"), format!("node-{n}"))
}

pub struct TestEnv;

impl TestEnv {
    /// 轮询直到条件成立或超时
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(20)).await;
        }

        false
    }

    /// 带时间戳的唯一名称，用作注册中心键前缀
    pub fn unique_name(prefix: &str) -> String {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        format!("{}_{}", prefix, timestamp)
    }

    /// 初始化测试日志，每个测试进程调用一次即可
    pub fn init_logging() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("debug")
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_success() {
        let mut counter = 0;
        let condition = || {
            counter += 1;
            async move { counter >= 3 }
        };

        let result = TestEnv::wait_for(condition, Duration::from_millis(500)).await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let condition = || async { false };
        let result = TestEnv::wait_for(condition, Duration::from_millis(100)).await;
        assert!(!result);
    }

    #[test]
    fn test_unique_name() {
        let name1 = TestEnv::unique_name("test");
        let name2 = TestEnv::unique_name("test");

        assert!(name1.starts_with("test_"));
        assert_ne!(name1, name2);
    }

    #[test]
    fn test_configs_are_valid() {
        assert!(test_coordinator_config().validate().is_ok());
        assert!(fast_coordinator_config().validate().is_ok());
        assert_eq!(test_worker(3).ip(), "10.0.0.3");
    }
}
