pub mod metrics;
pub mod storage;

pub use metrics::PrometheusCookieMetrics;
pub use storage::{InMemoryReceiptRepository, SeaOrmReceiptRepository};
