use std::sync::Arc;

/// One successful generation's analytics entry. The timestamp is assigned
/// server-side at write time, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub user_id: String,
    pub model: String,
    pub message_chars: i64,
    pub response_chars: i64,
}

/// Append-only analytics seam. Implementations must not block and must not
/// surface failures to the request path.
pub trait UsageSink: Send + Sync {
    fn record(&self, record: UsageRecord);
}

pub type SharedUsageSink = Arc<dyn UsageSink>;

#[derive(Debug, Default)]
pub struct NoopUsageSink;

impl UsageSink for NoopUsageSink {
    fn record(&self, _record: UsageRecord) {}
}
