//! Impls - ports の実装
//!
//! - **RecordingScheduler**: 呼び出しを記録する Scheduler（テスト・シミュレーション用）
//! - **StaticResolver / SystemResolver**: HostResolver

pub mod recording;
pub mod resolver;

pub use self::recording::{RecordingScheduler, SchedulerEvent};
pub use self::resolver::{StaticResolver, SystemResolver};
