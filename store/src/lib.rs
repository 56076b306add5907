pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::{MemoryConfigStore, MemoryEntityStore, MemoryTimelineStore};
pub use postgres::{PgConfigStore, PgEntityStore, PgTimelineStore};
pub use traits::{ConfigStore, EntityStore, TimelineStore};
