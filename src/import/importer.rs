//! Writes normalized rows through a [`SubscriptionSink`], either as paced
//! upsert batches or row by row with a success/skipped/error tally.

use std::collections::HashMap;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::store::{StoreError, SubscriptionSink};
use crate::config::ImportConfig;
use crate::subscriptions::model::NewSubscription;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub rows_imported: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowTally {
    pub success: usize,
    pub skipped: usize,
    pub error: usize,
}

/// One row per client, keyed case-insensitively. The last occurrence's
/// values win but the client keeps the position of its first occurrence.
pub fn dedup_last_wins(rows: Vec<NewSubscription>) -> Vec<NewSubscription> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<NewSubscription> = Vec::with_capacity(rows.len());
    for row in rows {
        match index.get(&row.dedup_key()) {
            Some(&at) => unique[at] = row,
            None => {
                index.insert(row.dedup_key(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

/// Doubling delays starting at `retry_base`, no jitter. `max_retries`
/// counts total attempts, so the backoff allows one fewer retry.
pub fn backoff(config: &ImportConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config.retry_base)
        .with_factor(2.0)
        .with_max_times(config.max_retries.saturating_sub(1) as usize)
}

pub struct Importer<'a> {
    sink: &'a dyn SubscriptionSink,
    config: &'a ImportConfig,
}

impl<'a> Importer<'a> {
    pub fn new(sink: &'a dyn SubscriptionSink, config: &'a ImportConfig) -> Self {
        Self { sink, config }
    }

    /// Dedups, then upserts sequentially in batches with a pause between
    /// them. A batch that still fails after its retries aborts the import;
    /// batches already written stay written.
    pub async fn import_batched(&self, rows: Vec<NewSubscription>) -> Result<BatchReport, StoreError> {
        let unique = dedup_last_wins(rows);
        let mut report = BatchReport::default();

        for (n, batch) in unique.chunks(self.config.batch_size.max(1)).enumerate() {
            if n > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            debug!(batch = n + 1, size = batch.len(), "upserting batch");
            (|| self.sink.upsert_batch(batch))
                .retry(backoff(self.config))
                .notify(|err: &StoreError, delay: Duration| {
                    warn!(batch = n + 1, ?delay, error = %err, "import batch failed, retrying");
                })
                .await
                .inspect_err(|err| error!(batch = n + 1, error = %err, "import batch gave up"))?;

            report.rows_imported += batch.len();
            report.batches += 1;
        }

        info!(rows = report.rows_imported, batches = report.batches, "batched import finished");
        Ok(report)
    }

    /// Inserts rows one at a time, skipping clients that already exist.
    /// Individual failures are counted, never propagated.
    pub async fn import_rows(&self, rows: Vec<NewSubscription>) -> RowTally {
        let mut tally = RowTally::default();

        for row in rows {
            match self.sink.exists_by_name(&row.client_name).await {
                Ok(true) => {
                    debug!(client = %row.client_name, "client exists, skipping");
                    tally.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(client = %row.client_name, error = %err, "existence check failed");
                    tally.error += 1;
                    continue;
                }
            }

            match self.sink.insert(&row).await {
                Ok(()) => tally.success += 1,
                Err(StoreError::Duplicate(name)) => {
                    debug!(client = %name, "duplicate on insert, skipping");
                    tally.skipped += 1;
                }
                Err(err) => {
                    error!(client = %row.client_name, error = %err, "row import failed");
                    tally.error += 1;
                }
            }
        }

        info!(
            success = tally.success,
            skipped = tally.skipped,
            error = tally.error,
            "row import finished"
        );
        tally
    }
}
