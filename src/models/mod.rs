pub mod insight;
pub mod reflection;
pub mod sync;

pub use insight::InsightRecord;
pub use reflection::Reflection;
pub use sync::SyncState;
