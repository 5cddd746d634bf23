//! 容量分配函数
//!
//! 将策略的期望总容量尽量平均地分配到已注册的Worker上，同时不超过单机上限。
//! 余数按列表顺序分给前面的Worker，列表按序号排序时结果是确定的。

/// 计算每个Worker的容量
///
/// * `worker_count` - 已注册Worker数量
/// * `total` - 期望总容量（assignNum）
/// * `per_worker_cap` - 单机上限（numOfSingleServer），0表示不限制
///
/// 返回值长度等于 `worker_count`，总和为 `min(total, worker_count * per_worker_cap)`。
pub fn assign_capacity(worker_count: usize, total: u32, per_worker_cap: u32) -> Vec<u32> {
    if worker_count == 0 {
        return Vec::new();
    }

    let workers = worker_count as u64;
    let total = total as u64;
    let mut per_worker = total / workers;
    let mut remainder = total % workers;

    if per_worker_cap > 0 && per_worker >= per_worker_cap as u64 {
        per_worker = per_worker_cap as u64;
        remainder = 0;
    }

    (0..workers)
        .map(|index| {
            let share = if index < remainder {
                per_worker + 1
            } else {
                per_worker
            };
            share as u32
        })
        .collect()
}
