/// 注册中心在Redis中的键布局
///
/// ```text
/// {prefix}:seq                              序号计数器
/// {prefix}:factory:{uuid}                   Worker注册信息(hash，带过期时间)
/// {prefix}:strategies                       策略名集合
/// {prefix}:strategy:{name}                  策略配置(JSON)
/// {prefix}:runtime:{strategy}               参与策略的uuid集合
/// {prefix}:runtime:{strategy}:{uuid}        策略运行时记录(hash)
/// {prefix}:worker:{uuid}:strategies         Worker参与的策略集合
/// ```
#[derive(Debug, Clone)]
pub struct RegistryKeys {
    prefix: String,
}

impl RegistryKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn build_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    pub fn sequence(&self) -> String {
        self.build_key("seq")
    }

    pub fn factory(&self, uuid: &str) -> String {
        self.build_key(&format!("factory:{uuid}"))
    }

    pub fn strategies(&self) -> String {
        self.build_key("strategies")
    }

    pub fn strategy(&self, strategy_name: &str) -> String {
        self.build_key(&format!("strategy:{strategy_name}"))
    }

    pub fn runtime_members(&self, strategy_name: &str) -> String {
        self.build_key(&format!("runtime:{strategy_name}"))
    }

    pub fn runtime(&self, strategy_name: &str, uuid: &str) -> String {
        self.build_key(&format!("runtime:{strategy_name}:{uuid}"))
    }

    pub fn worker_strategies(&self, uuid: &str) -> String {
        self.build_key(&format!("worker:{uuid}:strategies"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_use_prefix() {
        let keys = RegistryKeys::new("prod");
        assert_eq!(keys.sequence(), "prod:seq");
        assert_eq!(keys.factory("w$1"), "prod:factory:w$1");
        assert_eq!(keys.strategy("orderSync"), "prod:strategy:orderSync");
        assert_eq!(keys.runtime_members("orderSync"), "prod:runtime:orderSync");
        assert_eq!(keys.runtime("orderSync", "w$1"), "prod:runtime:orderSync:w$1");
        assert_eq!(keys.worker_strategies("w$1"), "prod:worker:w$1:strategies");
    }

    #[test]
    fn test_empty_prefix() {
        let keys = RegistryKeys::new("");
        assert_eq!(keys.strategies(), "strategies");
    }
}
