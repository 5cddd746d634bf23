use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 协调引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// 为false时只建立连接，不注册也不启动刷新定时器
    pub enabled: bool,
    pub refresh_interval_ms: u64,
    pub initial_delay_ms: u64,
    /// 单次注册中心调用的超时时间
    pub registry_timeout_ms: u64,
    /// 单个任务单元停止的超时时间
    pub stop_timeout_ms: u64,
    pub ip_address: Option<String>,
    pub hostname: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            refresh_interval_ms: 2000,
            initial_delay_ms: 2000,
            registry_timeout_ms: 5000,
            stop_timeout_ms: 3000,
            ip_address: None,
            hostname: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_millis(self.registry_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(anyhow::anyhow!("刷新间隔必须大于0"));
        }
        if self.registry_timeout_ms == 0 {
            return Err(anyhow::anyhow!("注册中心调用超时时间必须大于0"));
        }
        if self.stop_timeout_ms == 0 {
            return Err(anyhow::anyhow!("任务单元停止超时时间必须大于0"));
        }
        if let Some(ip) = &self.ip_address {
            if ip.parse::<std::net::IpAddr>().is_err() {
                return Err(anyhow::anyhow!("IP地址格式无效: {}", ip));
            }
        }
        if matches!(&self.hostname, Some(name) if name.trim().is_empty()) {
            return Err(anyhow::anyhow!("主机名不能为空"));
        }
        Ok(())
    }
}
