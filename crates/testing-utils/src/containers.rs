//! 集成测试用的Redis容器

use anyhow::Result;
use coordinator_core::{RegistryBackend, RegistryConfig};
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;
use tokio::time::{sleep, Duration};

use crate::TestEnv;

/// 临时Redis实例，容器随结构体一起销毁
pub struct RedisTestContainer {
    #[allow(dead_code)]
    container: ContainerAsync<Redis>,
    pub url: String,
}

impl RedisTestContainer {
    pub async fn new() -> Result<Self> {
        let container = Redis::default().with_tag("7-alpine").start().await?;
        let port = container.get_host_port_ipv4(6379).await?;
        let url = format!("redis://127.0.0.1:{port}");

        // 端口映射就绪后Redis可能还没开始接受连接
        sleep(Duration::from_millis(200)).await;

        Ok(Self { container, url })
    }

    /// 指向该容器的注册中心配置，每次调用使用不同的键前缀
    pub fn registry_config(&self, session_timeout_ms: u64) -> RegistryConfig {
        RegistryConfig {
            backend: RegistryBackend::Redis,
            url: self.url.clone(),
            key_prefix: TestEnv::unique_name("coordinator-test"),
            session_timeout_ms,
            ..RegistryConfig::default()
        }
    }
}
