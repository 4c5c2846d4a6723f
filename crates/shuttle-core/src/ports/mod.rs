//! Ports - 抽象化レイヤー
//!
//! The job core only talks to the outside world through these traits:
//! - Scheduler: notifications, kills, shutdown, resource requests
//! - HostResolver: host name expansion for locality matching
//! - Clock / IdGenerator: time and ids, swappable in tests

pub mod clock;
pub mod id_generator;
pub mod resolver;
pub mod scheduler;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::resolver::{HostIdentity, HostResolver};
pub use self::scheduler::Scheduler;
