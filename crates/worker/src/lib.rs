pub mod catalog;
pub mod engine;
pub mod local_tasks;
pub mod shell_processor;
pub mod task_units;
pub mod timer;

pub use catalog::{ScheduledTaskDefinition, TaskCatalog};
pub use engine::{CoordinationEngine, EngineSnapshot};
pub use local_tasks::LocalTaskSet;
pub use shell_processor::ShellProcessor;
pub use task_units::{ScheduleTaskRunner, StrategyTaskFactory};
pub use timer::RefreshTimer;
