use std::collections::{BTreeMap, HashMap};

use coordinator_core::TaskUnit;

/// 本地运行的任务单元，按策略名分组并保持创建顺序
///
/// 只由协调引擎在持有引擎锁时修改。
#[derive(Default)]
pub struct LocalTaskSet {
    units: HashMap<String, Vec<Box<dyn TaskUnit>>>,
}

impl LocalTaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, strategy_name: &str) -> usize {
        self.units.get(strategy_name).map_or(0, Vec::len)
    }

    pub fn total(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn push(&mut self, strategy_name: &str, unit: Box<dyn TaskUnit>) {
        self.units
            .entry(strategy_name.to_string())
            .or_default()
            .push(unit);
    }

    /// 取出最后创建的任务单元
    pub fn pop(&mut self, strategy_name: &str) -> Option<Box<dyn TaskUnit>> {
        let units = self.units.get_mut(strategy_name)?;
        let unit = units.pop();
        if units.is_empty() {
            self.units.remove(strategy_name);
        }
        unit
    }

    /// 取出一个策略的全部任务单元
    pub fn take(&mut self, strategy_name: &str) -> Vec<Box<dyn TaskUnit>> {
        self.units.remove(strategy_name).unwrap_or_default()
    }

    /// 取出策略名匹配（忽略大小写）的全部任务单元；`None` 匹配所有策略
    pub fn take_matching(&mut self, strategy_name: Option<&str>) -> Vec<(String, Vec<Box<dyn TaskUnit>>)> {
        let names: Vec<String> = self
            .units
            .keys()
            .filter(|name| strategy_name.map_or(true, |target| name.eq_ignore_ascii_case(target)))
            .cloned()
            .collect();
        let mut taken: Vec<(String, Vec<Box<dyn TaskUnit>>)> = names
            .into_iter()
            .filter_map(|name| self.units.remove(&name).map(|units| (name, units)))
            .collect();
        taken.sort_by(|a, b| a.0.cmp(&b.0));
        taken
    }

    pub fn strategies(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.units
            .iter()
            .map(|(name, units)| (name.clone(), units.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use coordinator_core::SchedulerResult;

    /// 以 "策略#序号" 作为名称，便于断言取出顺序
    struct NamedUnit(String);

    #[async_trait]
    impl TaskUnit for NamedUnit {
        fn strategy_name(&self) -> &str {
            &self.0
        }

        async fn stop(&self, _strategy_name: &str) -> SchedulerResult<()> {
            Ok(())
        }
    }

    fn unit(strategy: &str, index: usize) -> Box<dyn TaskUnit> {
        Box::new(NamedUnit(format!("{strategy}#{index}")))
    }

    #[test]
    fn test_pop_returns_last_created() {
        let mut set = LocalTaskSet::new();
        for i in 0..3 {
            set.push("s1", unit("s1", i));
        }
        assert_eq!(set.len("s1"), 3);

        let last = set.pop("s1").unwrap();
        assert_eq!(last.strategy_name(), "s1#2");
        assert_eq!(set.len("s1"), 2);

        assert_eq!(set.pop("s1").unwrap().strategy_name(), "s1#1");
        assert_eq!(set.pop("s1").unwrap().strategy_name(), "s1#0");
        assert!(set.pop("s1").is_none());
        assert!(set.strategies().is_empty());
    }

    #[test]
    fn test_take_matching_ignores_case() {
        let mut set = LocalTaskSet::new();
        set.push("OrderSync", unit("OrderSync", 0));
        set.push("OrderSync", unit("OrderSync", 1));
        set.push("cleanup", unit("cleanup", 0));

        let taken = set.take_matching(Some("ordersync"));
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].0, "OrderSync");
        assert_eq!(taken[0].1.len(), 2);
        assert_eq!(set.total(), 1);

        let rest = set.take_matching(None);
        assert_eq!(rest.len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_counts() {
        let mut set = LocalTaskSet::new();
        set.push("b", unit("b", 0));
        set.push("a", unit("a", 0));
        set.push("a", unit("a", 1));

        let counts = set.counts();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
        assert_eq!(set.strategies(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(set.take("a").len(), 2);
        assert_eq!(set.len("a"), 0);
    }
}
