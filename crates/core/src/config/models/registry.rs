use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 注册中心后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// 进程内存储，适用于单机部署和测试
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub backend: RegistryBackend,
    pub url: String,
    pub key_prefix: String,
    /// Worker注册信息的存活时间，每次注册都会续期
    pub session_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: RegistryBackend::Memory,
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "coordinator".to_string(),
            session_timeout_ms: 30_000,
            connect_timeout_ms: 5000,
        }
    }
}

impl RegistryConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == RegistryBackend::Redis {
            if self.url.is_empty() {
                return Err(anyhow::anyhow!("注册中心URL不能为空"));
            }
            if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
                return Err(anyhow::anyhow!(
                    "注册中心URL必须以redis://或rediss://开头: {}",
                    self.url
                ));
            }
        }
        if self.key_prefix.contains(char::is_whitespace) {
            return Err(anyhow::anyhow!("键前缀不能包含空白字符"));
        }
        if self.session_timeout_ms == 0 {
            return Err(anyhow::anyhow!("会话超时时间必须大于0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(anyhow::anyhow!("连接超时时间必须大于0"));
        }
        Ok(())
    }
}
