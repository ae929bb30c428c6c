pub mod feeds;
pub mod manager;

pub use feeds::FeedEvent;
pub use manager::{month_key, CallbackId, LiveEvent, RealtimeManager, RealtimeStatus, Snapshot};
