//! IdGenerator port - ID 生成の抽象化
//!
//! Task ids are ULIDs whose timestamp part comes from a `Clock`, so tests with a
//! `FixedClock` get predictable timestamps.

use crate::domain::ids::TaskId;
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// UlidGenerator は ULID ベースの ID 生成器
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        TaskId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
