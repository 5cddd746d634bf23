use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordinator_core::{
    ProcessorContext, SchedulerError, SchedulerResult, TaskProcessor, TaskType, TaskUnit,
};
use metrics::{counter, gauge};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// `Schedule` 类型策略的一个容量单元
///
/// 启动后立即执行一次处理器，之后按固定间隔执行，直到被停止。
/// 处理器返回错误只记录日志，不会结束循环。
pub struct ScheduleTaskRunner {
    strategy_name: String,
    task_type: TaskType,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduleTaskRunner {
    pub fn start(
        strategy_name: impl Into<String>,
        task_type: TaskType,
        worker_uuid: impl Into<String>,
        processor: Arc<dyn TaskProcessor>,
        period: Duration,
    ) -> Self {
        let strategy_name = strategy_name.into();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let context = ProcessorContext {
            strategy_name: strategy_name.clone(),
            base_task_type: task_type.base_task_type.clone(),
            own_sign: task_type.own_sign.clone(),
            worker_uuid: worker_uuid.into(),
            iteration: 0,
        };

        let handle = tokio::spawn(Self::run(context, processor, period, shutdown_rx));
        debug!("任务单元已启动: {} ({})", strategy_name, task_type);

        Self {
            strategy_name,
            task_type,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    async fn run(
        mut context: ProcessorContext,
        processor: Arc<dyn TaskProcessor>,
        period: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let active = gauge!("coordinator_schedule_runners_active", "strategy" => context.strategy_name.clone());
        active.increment(1.0);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
            }

            // 停止信号可以打断正在执行的处理器
            let stopped = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => true,
                result = Self::execute_once(&context, processor.as_ref()) => {
                    if let Err(e) = result {
                        counter!("coordinator_task_executions_failed_total", "strategy" => context.strategy_name.clone()).increment(1);
                        warn!(
                            "任务执行失败: strategy={}, iteration={}, error={}",
                            context.strategy_name, context.iteration, e
                        );
                    }
                    false
                }
            };
            if stopped {
                break;
            }
            context.iteration += 1;
        }

        active.decrement(1.0);
        debug!("任务单元循环结束: {}", context.strategy_name);
    }

    async fn execute_once(
        context: &ProcessorContext,
        processor: &dyn TaskProcessor,
    ) -> SchedulerResult<()> {
        counter!("coordinator_task_executions_total", "strategy" => context.strategy_name.clone())
            .increment(1);
        match processor.execution_timeout() {
            Some(limit) => tokio::time::timeout(limit, processor.execute(context))
                .await
                .map_err(|_| {
                    SchedulerError::Timeout(format!(
                        "任务执行超过{:?}: {}",
                        limit, context.strategy_name
                    ))
                })?,
            None => processor.execute(context).await,
        }
    }
}

#[async_trait]
impl TaskUnit for ScheduleTaskRunner {
    fn strategy_name(&self) -> &str {
        &self.strategy_name
    }

    async fn stop(&self, strategy_name: &str) -> SchedulerResult<()> {
        let Some(handle) = self.handle.lock().await.take() else {
            return Ok(());
        };

        let _ = self.shutdown_tx.send(());
        handle.await.map_err(|e| {
            error!("任务单元退出异常: {}: {}", strategy_name, e);
            SchedulerError::TaskUnit(format!("任务单元退出异常: {e}"))
        })?;
        info!("任务单元已停止: {} ({})", strategy_name, self.task_type);
        Ok(())
    }
}

impl Drop for ScheduleTaskRunner {
    fn drop(&mut self) {
        // 未经stop直接丢弃时也要结束后台循环
        let _ = self.shutdown_tx.send(());
    }
}
