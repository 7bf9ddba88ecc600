pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod listener;
pub mod websocket;

pub use dedup::{DedupCache, DedupStats};
pub use error::{MonitorError, MonitorResult};
pub use fetcher::{TransactionFetcher, TransactionSource};
pub use listener::{NotificationSink, StreamListener};
pub use websocket::{StreamFrame, WebSocketManager};
