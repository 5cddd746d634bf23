//! Redis hash字段与注册记录之间的转换

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use coordinator_core::{
    FactoryRegistrationInfo, SchedulerError, SchedulerResult, StrategyRuntimeRecord,
};

pub fn factory_fields(info: &FactoryRegistrationInfo) -> Vec<(&'static str, String)> {
    vec![
        ("uuid", info.uuid.clone()),
        ("ip", info.ip.clone()),
        ("hostname", info.hostname.clone()),
        ("started", info.started.to_string()),
        ("registered_at", info.registered_at.to_rfc3339()),
    ]
}

pub fn parse_factory(
    uuid: &str,
    fields: &HashMap<String, String>,
) -> SchedulerResult<FactoryRegistrationInfo> {
    let registered_at = field(fields, "registered_at")?
        .parse::<DateTime<Utc>>()
        .map_err(|e| SchedulerError::MalformedRecord(format!("{uuid}.registered_at: {e}")))?;
    Ok(FactoryRegistrationInfo {
        uuid: field(fields, "uuid")?.to_string(),
        ip: field(fields, "ip")?.to_string(),
        hostname: field(fields, "hostname")?.to_string(),
        started: parse_field(uuid, "started", field(fields, "started")?)?,
        registered_at,
    })
}

pub fn runtime_fields(record: &StrategyRuntimeRecord) -> Vec<(&'static str, String)> {
    vec![
        ("strategy_name", record.strategy_name.clone()),
        ("uuid", record.uuid.clone()),
        ("ordinal", record.ordinal.to_string()),
        ("request_num", record.request_num.to_string()),
    ]
}

pub fn parse_runtime(fields: &HashMap<String, String>) -> SchedulerResult<StrategyRuntimeRecord> {
    let uuid = field(fields, "uuid")?;
    Ok(StrategyRuntimeRecord {
        strategy_name: field(fields, "strategy_name")?.to_string(),
        uuid: uuid.to_string(),
        ordinal: parse_field(uuid, "ordinal", field(fields, "ordinal")?)?,
        request_num: parse_field(uuid, "request_num", field(fields, "request_num")?)?,
    })
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> SchedulerResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| SchedulerError::MalformedRecord(format!("缺少字段: {name}")))
}

fn parse_field<T: std::str::FromStr>(uuid: &str, name: &str, value: &str) -> SchedulerResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| SchedulerError::MalformedRecord(format!("{uuid}.{name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordinator_core::WorkerIdentity;

    fn to_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_runtime_record_fields() {
        let identity = WorkerIdentity::new("10.0.0.1", "a").with_ordinal(7);
        let mut record = StrategyRuntimeRecord::new("s1", &identity, 7);
        record.request_num = 3;

        let parsed = parse_runtime(&to_map(runtime_fields(&record))).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_factory_fields() {
        let identity = WorkerIdentity::new("10.0.0.1", "a").with_ordinal(7);
        let mut info = FactoryRegistrationInfo::new(&identity);
        info.started = false;

        let parsed = parse_factory(&info.uuid, &to_map(factory_fields(&info))).unwrap();
        assert!(!parsed.started);
        assert_eq!(parsed.uuid, info.uuid);
    }

    #[test]
    fn test_malformed_records() {
        let mut fields = HashMap::new();
        fields.insert("uuid".to_string(), "w$1".to_string());
        assert!(matches!(
            parse_runtime(&fields),
            Err(SchedulerError::MalformedRecord(_))
        ));

        fields.insert("strategy_name".to_string(), "s1".to_string());
        fields.insert("ordinal".to_string(), "x".to_string());
        fields.insert("request_num".to_string(), "1".to_string());
        let err = parse_runtime(&fields).unwrap_err();
        assert!(err.to_string().contains("ordinal"));
    }
}
