use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// 固定周期触发刷新的定时器
///
/// 回调在定时器任务内顺序执行，不会重叠；回调耗时超过周期时跳过错过的触发。
/// `stop` 返回后不会再开始新的回调，正在执行的回调会先执行完。
pub struct RefreshTimer {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl RefreshTimer {
    pub fn start<F, Fut>(initial_delay: Duration, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(
                "刷新定时器已启动，初始延迟{:?}，周期{:?}",
                initial_delay, period
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        debug!("刷新定时器收到停止信号");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(panic) = AssertUnwindSafe(tick()).catch_unwind().await {
                            error!("刷新周期发生panic: {}", panic_message(panic.as_ref()));
                        }
                    }
                }
            }
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// 停止定时器并等待正在执行的回调结束
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            error!("刷新定时器任务异常退出: {}", e);
        }
        info!("刷新定时器已停止");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知panic".to_string()
    }
}
