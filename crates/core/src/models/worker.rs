use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils;

/// 完整uuid中序号的宽度，与注册中心顺序节点的格式保持一致
const ORDINAL_WIDTH: usize = 10;

/// Worker身份
///
/// `base_uuid` 在进程生命周期内不变；`ordinal` 由注册中心在注册时分配，
/// 会话丢失后重新注册会得到新的序号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerIdentity {
    base_uuid: String,
    ip: String,
    hostname: String,
    ordinal: Option<u64>,
}

impl WorkerIdentity {
    /// 创建新的Worker身份，base uuid 形如 `ip$hostname$UUID`
    pub fn new(ip: impl Into<String>, hostname: impl Into<String>) -> Self {
        let ip = ip.into();
        let hostname = hostname.into();
        let random = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self {
            base_uuid: format!("{ip}${hostname}${random}"),
            ip,
            hostname,
            ordinal: None,
        }
    }

    /// 根据本机网络信息创建身份，可覆盖ip和主机名
    pub fn local(ip: Option<String>, hostname: Option<String>) -> Self {
        let ip = ip.unwrap_or_else(utils::local_ip);
        let hostname = hostname.unwrap_or_else(utils::local_hostname);
        Self::new(ip, hostname)
    }

    pub fn with_ordinal(mut self, ordinal: u64) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn set_ordinal(&mut self, ordinal: u64) {
        self.ordinal = Some(ordinal);
    }

    /// 完整uuid：`<base>$<ordinal>`，未注册时只有base部分
    pub fn uuid(&self) -> String {
        match self.ordinal {
            Some(ordinal) => format_uuid(&self.base_uuid, ordinal),
            None => self.base_uuid.clone(),
        }
    }

    pub fn base_uuid(&self) -> &str {
        &self.base_uuid
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ordinal(&self) -> Option<u64> {
        self.ordinal
    }

    pub fn is_registered(&self) -> bool {
        self.ordinal.is_some()
    }
}

/// 拼接带序号的uuid
pub fn format_uuid(base_uuid: &str, ordinal: u64) -> String {
    format!("{base_uuid}${ordinal:0width$}", width = ORDINAL_WIDTH)
}

/// Worker注册信息，管理端通过 `started` 启停整个Worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryRegistrationInfo {
    pub uuid: String,
    pub ip: String,
    pub hostname: String,
    pub started: bool,
    pub registered_at: DateTime<Utc>,
}

impl FactoryRegistrationInfo {
    pub fn new(identity: &WorkerIdentity) -> Self {
        Self {
            uuid: identity.uuid(),
            ip: identity.ip().to_string(),
            hostname: identity.hostname().to_string(),
            started: true,
            registered_at: Utc::now(),
        }
    }
}

/// 注册结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// 注册中心分配（或沿用）的序号
    pub ordinal: u64,
    /// 之前参与、现在需要停止的策略
    pub stopped_strategies: Vec<String>,
}
