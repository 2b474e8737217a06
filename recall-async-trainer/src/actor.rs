mod base;
mod stat;
pub use base::{Actor, Producer};
pub use stat::{actor_stats_fmt, ActorStat};
