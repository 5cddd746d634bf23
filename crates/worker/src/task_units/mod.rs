pub mod schedule_runner;

use std::sync::Arc;

use async_trait::async_trait;
use coordinator_core::{
    SchedulerError, SchedulerResult, StrategyConfig, StrategyKind, TaskUnit, TaskUnitFactory,
    WorkerIdentity,
};
use tracing::debug;

pub use schedule_runner::ScheduleTaskRunner;

use crate::TaskCatalog;

/// 按策略类型创建任务单元
pub struct StrategyTaskFactory {
    catalog: Arc<TaskCatalog>,
}

impl StrategyTaskFactory {
    pub fn new(catalog: Arc<TaskCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl TaskUnitFactory for StrategyTaskFactory {
    async fn create(
        &self,
        strategy: &StrategyConfig,
        worker: &WorkerIdentity,
    ) -> SchedulerResult<Box<dyn TaskUnit>> {
        match &strategy.kind {
            StrategyKind::Schedule => {
                let task_type = strategy.task_type()?;
                let processor = self.catalog.processor(&task_type.base_task_type).ok_or_else(
                    || SchedulerError::ProcessorNotFound {
                        base_task_type: task_type.base_task_type.clone(),
                    },
                )?;
                let period = self
                    .catalog
                    .definition(&task_type.base_task_type)
                    .map(|definition| definition.interval)
                    .ok_or_else(|| SchedulerError::ProcessorNotFound {
                        base_task_type: task_type.base_task_type.clone(),
                    })?;

                debug!(
                    "创建任务单元: strategy={}, task_type={}",
                    strategy.strategy_name, task_type
                );
                Ok(Box::new(ScheduleTaskRunner::start(
                    strategy.strategy_name.clone(),
                    task_type,
                    worker.uuid(),
                    processor,
                    period,
                )))
            }
            StrategyKind::Unsupported(kind) => {
                debug!("策略 {} 的类型 {} 不受支持", strategy.strategy_name, kind);
                Err(SchedulerError::UnsupportedStrategyKind {
                    strategy: strategy.strategy_name.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScheduledTaskDefinition;
    use coordinator_core::{ProcessorContext, TaskProcessor};
    use coordinator_testing_utils::StrategyConfigBuilder;
    use std::time::Duration;

    struct NoopProcessor;

    #[async_trait]
    impl TaskProcessor for NoopProcessor {
        fn base_task_type(&self) -> &str {
            "orderSync"
        }

        async fn execute(&self, _context: &ProcessorContext) -> SchedulerResult<()> {
            Ok(())
        }
    }

    fn factory() -> StrategyTaskFactory {
        let mut catalog = TaskCatalog::new();
        catalog
            .register(
                ScheduledTaskDefinition::new("orderSync").with_interval(Duration::from_secs(60)),
                Arc::new(NoopProcessor),
            )
            .unwrap();
        StrategyTaskFactory::new(Arc::new(catalog))
    }

    #[tokio::test]
    async fn test_schedule_kind_creates_runner() {
        let worker = WorkerIdentity::new("10.0.0.1", "a").with_ordinal(1);
        let strategy = StrategyConfig::schedule("order-east", "orderSync$EAST", 2, 1);
        let unit = factory().create(&strategy, &worker).await.unwrap();
        assert_eq!(unit.strategy_name(), "order-east");
        unit.stop("order-east").await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_kind_yields_no_unit() {
        let worker = WorkerIdentity::new("10.0.0.1", "a").with_ordinal(1);
        let mut strategy = StrategyConfig::schedule("bean", "orderSync", 2, 1);
        strategy.kind = StrategyKind::Unsupported("Bean".to_string());
        let err = factory().create(&strategy, &worker).await.err().unwrap();
        assert!(matches!(err, SchedulerError::UnsupportedStrategyKind { .. }));
        assert!(err.is_degraded_capacity());
    }

    #[tokio::test]
    async fn test_unknown_task_type_is_reported() {
        let worker = WorkerIdentity::new("10.0.0.1", "a").with_ordinal(1);
        let strategy = StrategyConfig::schedule("other", "reportGen$BASE", 2, 1);
        let err = factory().create(&strategy, &worker).await.err().unwrap();
        assert!(matches!(err, SchedulerError::ProcessorNotFound { .. }));

        let broken = StrategyConfigBuilder::new("broken")
            .with_task_name("$EAST")
            .build();
        let err = factory().create(&broken, &worker).await.err().unwrap();
        assert!(matches!(err, SchedulerError::InvalidTaskType(_)));
    }
}
