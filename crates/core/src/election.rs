//! 每个刷新周期的Leader选举
//!
//! 没有租约也没有任期号：序号最小的已注册Worker就是本周期的Leader。
//! 序号相同时取列表中第一个出现的记录。

use crate::StrategyRuntimeRecord;

/// 选出策略的Leader记录，列表为空时返回 `None`
pub fn elect_leader(records: &[StrategyRuntimeRecord]) -> Option<&StrategyRuntimeRecord> {
    // min_by_key 在多个最小值中返回第一个
    records.iter().min_by_key(|record| record.ordinal)
}

/// 判断 `worker_uuid` 是否是本周期的Leader
pub fn is_leader(worker_uuid: &str, records: &[StrategyRuntimeRecord]) -> bool {
    elect_leader(records)
        .map(|leader| leader.uuid == worker_uuid)
        .unwrap_or(false)
}
