use async_trait::async_trait;

use crate::{RegistryClient, SchedulerResult};

/// 任务发现协作者
///
/// 将本地提供的任务发布到注册中心。激活时调用一次，注册丢失恢复后再调用一次，
/// 实现需要保证重复调用是安全的。
#[async_trait]
pub trait TaskDiscovery: Send + Sync {
    async fn register_with(&self, registry: &dyn RegistryClient) -> SchedulerResult<()>;
}
