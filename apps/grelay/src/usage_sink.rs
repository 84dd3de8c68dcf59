use grelay_core::{UsageRecord, UsageSink};
use grelay_storage::UsageBus;
use tokio::sync::mpsc;

/// Bridges the core usage seam onto the storage bus. `try_send` keeps the
/// response path non-blocking; a full or closed channel drops the record.
#[derive(Clone)]
pub(crate) struct BusUsageSink {
    tx: mpsc::Sender<UsageRecord>,
}

impl BusUsageSink {
    pub(crate) fn new(bus: &UsageBus) -> Self {
        Self {
            tx: bus.usage_tx.clone(),
        }
    }
}

impl UsageSink for BusUsageSink {
    fn record(&self, record: UsageRecord) {
        let _ = self.tx.try_send(record);
    }
}
