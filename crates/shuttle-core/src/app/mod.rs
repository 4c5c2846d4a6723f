//! App - アプリケーション層
//!
//! job を非同期ランタイムから駆動するためのラッパー。
//!
//! # 主要コンポーネント
//! - **JobDriver**: job をロックで包み、offer / status update / timeout check を直列化
//! - **TimeoutTicker**: `check_task_timeout` を定期実行するバックグラウンドタスク

pub mod driver;

pub use self::driver::{JobDriver, TimeoutTicker};
