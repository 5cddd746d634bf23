use std::collections::HashSet;

use crate::{StrategyConfig, WorkerIdentity};

/// 一次注册需要对运行时记录做的变更
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegistrationPlan {
    /// 允许参与但还没有运行时记录的策略
    pub join: Vec<String>,
    /// 已有运行时记录但不再允许参与的策略
    pub leave: Vec<String>,
}

/// 根据策略配置与Worker当前参与的策略计算注册变更
///
/// 两个注册中心实现共用此逻辑，保证参与规则一致。
pub fn plan_registration(
    strategies: &[StrategyConfig],
    identity: &WorkerIdentity,
    joined: &HashSet<String>,
) -> RegistrationPlan {
    let mut plan = RegistrationPlan::default();
    let mut known = HashSet::with_capacity(strategies.len());

    for strategy in strategies {
        known.insert(strategy.strategy_name.as_str());
        let participating = joined.contains(&strategy.strategy_name);
        match (strategy.admits(identity), participating) {
            (true, false) => plan.join.push(strategy.strategy_name.clone()),
            (false, true) => plan.leave.push(strategy.strategy_name.clone()),
            _ => {}
        }
    }

    // 策略被删除后遗留的记录
    for name in joined {
        if !known.contains(name.as_str()) {
            plan.leave.push(name.clone());
        }
    }

    plan.join.sort();
    plan.leave.sort();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StrategyStatus;

    #[test]
    fn test_plan_registration() {
        let worker = WorkerIdentity::new("10.0.0.1", "node-a");
        let open = StrategyConfig::schedule("open", "t", 2, 1);
        let mut paused = StrategyConfig::schedule("paused", "t", 2, 1);
        paused.status = StrategyStatus::Pause;
        let mut elsewhere = StrategyConfig::schedule("elsewhere", "t", 2, 1);
        elsewhere.ip_list = vec!["10.0.0.99".to_string()];

        let joined: HashSet<String> = ["paused", "removed"].iter().map(|s| s.to_string()).collect();
        let plan = plan_registration(&[open, paused, elsewhere], &worker, &joined);

        assert_eq!(plan.join, vec!["open".to_string()]);
        assert_eq!(plan.leave, vec!["paused".to_string(), "removed".to_string()]);
    }

    #[test]
    fn test_plan_is_empty_when_up_to_date() {
        let worker = WorkerIdentity::new("10.0.0.1", "node-a");
        let joined: HashSet<String> = ["open".to_string()].into_iter().collect();
        let plan = plan_registration(
            &[StrategyConfig::schedule("open", "t", 2, 1)],
            &worker,
            &joined,
        );
        assert_eq!(plan, RegistrationPlan::default());
    }
}
