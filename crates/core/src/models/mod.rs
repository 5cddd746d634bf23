//! # 数据模型
//!
//! 协调器在注册中心与本地之间流转的核心数据结构。
//!
//! ## 核心模型
//!
//! ### WorkerIdentity - Worker身份
//! 进程级唯一标识（ip、主机名、随机UUID），注册后附带注册中心分配的序号。
//! 序号单调递增，用于每个刷新周期的Leader选举。
//!
//! ### StrategyConfig - 调度策略
//! 由注册中心持有，描述策略期望的总容量（`assign_num`）与单机上限
//! （`num_of_single_server`）。协调器只读。
//!
//! ### StrategyRuntimeRecord - 策略运行时记录
//! 每个（策略, Worker）一条的临时记录，`request_num` 由Leader写入，
//! 表示该Worker应在本地运行的任务单元数量。
//!
//! ### FactoryRegistrationInfo - Worker注册信息
//! 记录Worker是否被管理端启用，每个刷新周期都会读取。
//!
//! ## 状态流转
//!
//! ```text
//! Unregistered → Registered → Leader / Follower → Reconciled
//!       ↑                                              │
//!       └──────────────── 每个刷新周期 ─────────────────┘
//! ```

pub mod strategy;
pub mod worker;

pub use strategy::*;
pub use worker::*;
