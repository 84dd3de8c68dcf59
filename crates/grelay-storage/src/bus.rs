use std::time::Duration;

use sea_orm::{ActiveValue, EntityTrait};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self as tokio_time, MissedTickBehavior};
use tracing::warn;

use grelay_core::UsageRecord;

use crate::entities;
use crate::storage::UsageStorage;

#[derive(Debug, Clone)]
pub struct UsageBusConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for UsageBusConfig {
    fn default() -> Self {
        Self {
            capacity: 65_536,
            batch_size: 200,
            flush_interval: Duration::from_millis(200),
        }
    }
}

/// Detached writer draining usage records into storage. A failed batch is
/// dropped after a diagnostic log line; the request path never observes it.
pub struct UsageBus {
    pub usage_tx: mpsc::Sender<UsageRecord>,
    _handle: JoinHandle<()>,
}

impl UsageBus {
    pub fn spawn(storage: UsageStorage, config: UsageBusConfig) -> Self {
        let (usage_tx, usage_rx) = mpsc::channel(config.capacity);
        let handle = tokio::spawn(usage_writer(
            storage,
            usage_rx,
            config.batch_size,
            config.flush_interval,
        ));
        Self {
            usage_tx,
            _handle: handle,
        }
    }
}

async fn usage_writer(
    storage: UsageStorage,
    mut rx: mpsc::Receiver<UsageRecord>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut buffer = Vec::with_capacity(batch_size);
    let mut ticker = tokio_time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(record) = rx.recv() => {
                buffer.push(record);
                if buffer.len() >= batch_size {
                    flush_usage(&storage, &mut buffer).await;
                }
            }
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush_usage(&storage, &mut buffer).await;
                }
            }
            else => {
                if !buffer.is_empty() {
                    flush_usage(&storage, &mut buffer).await;
                }
                break;
            }
        }
    }
}

async fn flush_usage(storage: &UsageStorage, buffer: &mut Vec<UsageRecord>) {
    let mut batch = Vec::new();
    std::mem::swap(buffer, &mut batch);

    let now = OffsetDateTime::now_utc();
    let models = batch.into_iter().map(|record| {
        let mut active: entities::usage_records::ActiveModel = record.into();
        active.created_at = ActiveValue::Set(now);
        active
    });

    if let Err(err) = entities::UsageRecords::insert_many(models)
        .exec(storage.connection())
        .await
    {
        warn!(error = %err, "usage batch write failed, records dropped");
    }
}
