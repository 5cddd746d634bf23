use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use coordinator_core::{
    ProcessorContext, SchedulerError, SchedulerResult, TaskDefinitionConfig, TaskProcessor,
};
use tokio::process::Command;
use tracing::{debug, warn};

/// Shell任务处理器
///
/// 每次调度执行一次配置的命令，命令以非零退出码结束视为失败。
/// 调度上下文通过环境变量传给命令。
#[derive(Debug, Clone)]
pub struct ShellProcessor {
    base_task_type: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
}

impl ShellProcessor {
    pub fn new(base_task_type: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            base_task_type: base_task_type.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_config(config: &TaskDefinitionConfig) -> Self {
        let processor = Self::new(config.base_task_type.clone(), config.command.clone())
            .with_args(config.args.clone())
            .with_env(config.env.clone());
        match config.timeout_ms {
            Some(ms) => processor.with_timeout(Duration::from_millis(ms)),
            None => processor,
        }
    }
}

#[async_trait]
impl TaskProcessor for ShellProcessor {
    fn base_task_type(&self) -> &str {
        &self.base_task_type
    }

    async fn execute(&self, context: &ProcessorContext) -> SchedulerResult<()> {
        debug!(
            "执行Shell任务: strategy={}, iteration={}, command={}, args={:?}",
            context.strategy_name, context.iteration, self.command, self.args
        );

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .env("COORDINATOR_STRATEGY", &context.strategy_name)
            .env("COORDINATOR_TASK_TYPE", &context.base_task_type)
            .env("COORDINATOR_OWN_SIGN", &context.own_sign)
            .env("COORDINATOR_WORKER", &context.worker_uuid)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // 任务单元停止时会丢弃执行中的future
            .kill_on_drop(true);

        let output = cmd
            .output()
            .await
            .map_err(|e| SchedulerError::TaskUnit(format!("启动Shell命令失败: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(line) = stdout.lines().last() {
            debug!("Shell任务输出: {}", line);
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output
                .status
                .code()
                .map_or_else(|| "信号终止".to_string(), |code| code.to_string());
            warn!(
                "Shell任务失败: strategy={}, exit={}, stderr={}",
                context.strategy_name,
                code,
                stderr.trim()
            );
            Err(SchedulerError::TaskUnit(format!(
                "Shell命令退出码 {code}: {}",
                stderr.trim()
            )))
        }
    }

    fn execution_timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn context() -> ProcessorContext {
        ProcessorContext {
            strategy_name: "order-sync".to_string(),
            base_task_type: "orderSync".to_string(),
            own_sign: "EAST".to_string(),
            worker_uuid: "10.0.0.1$node$ABC$0000000001".to_string(),
            iteration: 0,
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let processor = ShellProcessor::new("orderSync", "true");
        assert!(processor.execute(&context()).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails() {
        let processor = ShellProcessor::new("orderSync", "sh")
            .with_args(vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()]);
        let err = processor.execute(&context()).await.unwrap_err();
        assert!(err.to_string().contains("退出码 3"));
        assert!(err.to_string().contains("broken"));
    }

    #[tokio::test]
    async fn test_context_is_passed_as_env() {
        let script = r#"test "$COORDINATOR_STRATEGY" = order-sync \
            && test "$COORDINATOR_TASK_TYPE" = orderSync \
            && test "$COORDINATOR_OWN_SIGN" = EAST \
            && test -n "$COORDINATOR_WORKER" \
            && test "$EXTRA" = yes"#;
        let mut env = HashMap::new();
        env.insert("EXTRA".to_string(), "yes".to_string());
        let processor = ShellProcessor::new("orderSync", "sh")
            .with_args(vec!["-c".to_string(), script.to_string()])
            .with_env(env);
        assert!(processor.execute(&context()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_command_fails_to_start() {
        let processor = ShellProcessor::new("orderSync", "/nonexistent/command");
        let err = processor.execute(&context()).await.unwrap_err();
        assert!(err.to_string().contains("启动Shell命令失败"));
    }
}
