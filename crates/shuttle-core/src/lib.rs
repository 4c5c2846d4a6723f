//! shuttle-core
//!
//! Task placement and fault recovery for a cluster job scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, task, options, report, errors）
//! - **ports**: 抽象化レイヤー（Scheduler, HostResolver, Clock, IdGenerator）
//! - **impls**: ports の実装（RecordingScheduler, StaticResolver, SystemResolver）
//! - **job**: `Job` trait と `SimpleJob`（offer 割り当て、状態更新、タイムアウト検出）
//! - **app**: tokio 上で job を駆動する `JobDriver`

pub mod app;
pub mod domain;
pub mod impls;
pub mod job;
pub mod ports;

pub use crate::app::{JobDriver, TimeoutTicker};
pub use crate::job::{Job, SimpleJob};
pub use crate::job::simple::{BuildError, SimpleJobBuilder};
