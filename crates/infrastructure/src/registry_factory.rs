use std::sync::Arc;

use coordinator_core::{RegistryBackend, RegistryClient, RegistryConfig};
use tracing::info;

use crate::{InMemoryRegistry, RedisRegistry};

pub struct RegistryFactory;

impl RegistryFactory {
    /// 按配置创建注册中心客户端，连接由协调引擎初始化时建立
    pub fn create(config: &RegistryConfig) -> Arc<dyn RegistryClient> {
        match config.backend {
            RegistryBackend::Memory => {
                info!("使用内存注册中心");
                Arc::new(InMemoryRegistry::new())
            }
            RegistryBackend::Redis => {
                info!("使用Redis注册中心，键前缀: {}", config.key_prefix);
                Arc::new(RedisRegistry::new(config.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_is_usable_after_connect() {
        let registry = RegistryFactory::create(&RegistryConfig::default());
        registry.connect().await.unwrap();
        assert!(registry.list_strategy_configs().await.unwrap().is_empty());
    }
}
