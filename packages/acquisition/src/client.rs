//! Batched acquisition of a whole remote layer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt as _;
use region_map_geometry_models::remote::RemoteRecord;
use serde_json::Value;

use crate::AcquisitionError;
use crate::partition::{Batch, PartitionStrategy};
use crate::progress::ProgressCallback;
use crate::query::{Endpoint, MATCH_ALL, QueryRequest, QueryTemplate};
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// Per-request timeouts by request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Count-only requests.
    pub count: Duration,
    /// The single request of [`PartitionStrategy::Whole`].
    pub whole: Duration,
    /// Each [`PartitionStrategy::IdRange`] batch.
    pub id_range: Duration,
    /// Each [`PartitionStrategy::PartitionKey`] batch.
    pub partition_key: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            count: Duration::from_secs(30),
            whole: Duration::from_secs(30),
            id_range: Duration::from_secs(90),
            partition_key: Duration::from_secs(60),
        }
    }
}

impl Timeouts {
    const fn for_strategy(&self, strategy: &PartitionStrategy) -> Duration {
        match strategy {
            PartitionStrategy::IdRange { .. } => self.id_range,
            PartitionStrategy::PartitionKey { .. } => self.partition_key,
            PartitionStrategy::Whole { .. } => self.whole,
        }
    }
}

/// Cooperative cancellation flag shared between a load and its owner.
///
/// Checked before each batch is issued; a batch already in flight runs to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// Creates an un-cancelled flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Batch outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Batches that returned a valid response.
    pub succeeded: usize,
    /// Batches that exhausted their retries.
    pub failed: usize,
}

/// Records gathered by [`AcquisitionClient::fetch_all`].
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Records from every successful batch. Order across batches is not
    /// significant.
    pub records: Vec<RemoteRecord>,
    /// Batch outcome counts.
    pub stats: FetchStats,
}

/// Issues partitioned queries against a remote layer.
#[derive(Clone)]
pub struct AcquisitionClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    timeouts: Timeouts,
    concurrency: usize,
}

impl std::fmt::Debug for AcquisitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionClient")
            .field("retry", &self.retry)
            .field("timeouts", &self.timeouts)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl AcquisitionClient {
    /// Creates a client with the default retry policy and timeouts,
    /// issuing batches one at a time.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            timeouts: Timeouts::default(),
            concurrency: 1,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the per-request timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Sets how many batches may be in flight at once (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the number of records matching `where_clause`.
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt failed, or
    /// [`AcquisitionError::Malformed`] if the response has no `count`.
    pub async fn query_count(
        &self,
        endpoint: &Endpoint,
        where_clause: &str,
    ) -> Result<u64, AcquisitionError> {
        let request = QueryRequest {
            url: endpoint.url.clone(),
            params: QueryTemplate::count_params(where_clause),
            timeout: self.timeouts.count,
        };
        let label = format!("{} count", endpoint.label);
        let transport = &self.transport;

        self.retry
            .run(&label, |_| {
                let request = request.clone();
                async move {
                    let body = transport.get_json(&request).await?;
                    check_error_envelope(&body)?;
                    body.get("count")
                        .and_then(Value::as_u64)
                        .ok_or_else(|| AcquisitionError::Malformed {
                            message: "count response has no numeric \"count\"".to_string(),
                        })
                }
            })
            .await
    }

    /// Fetches every batch of `strategy` and gathers the records.
    ///
    /// Failed batches are logged, counted in [`FetchStats::failed`], and
    /// skipped. `progress` is told the batch total up front and receives
    /// a status message after each batch.
    ///
    /// # Errors
    ///
    /// * [`AcquisitionError::NoRecords`] if no batch produced a record,
    ///   including when the count query reports zero records.
    /// * [`AcquisitionError::Cancelled`] if `cancel` was triggered.
    /// * The count query's error for [`PartitionStrategy::IdRange`].
    pub async fn fetch_all(
        &self,
        endpoint: &Endpoint,
        template: &QueryTemplate,
        strategy: &PartitionStrategy,
        progress: &dyn ProgressCallback,
        cancel: &Cancellation,
    ) -> Result<FetchOutcome, AcquisitionError> {
        let label = endpoint.label.as_str();

        if cancel.is_cancelled() {
            log::info!("{label}: cancelled before the first request");
            return Err(AcquisitionError::Cancelled {
                label: label.to_string(),
            });
        }

        let total = if strategy.needs_count() {
            progress.set_message(format!("{label}: counting records..."));
            let total = self.query_count(endpoint, MATCH_ALL).await?;
            log::info!("{label}: {total} records to fetch");
            if total == 0 {
                return Err(AcquisitionError::NoRecords {
                    label: label.to_string(),
                    reason: "the service reported 0 records".to_string(),
                });
            }
            total
        } else {
            0
        };

        let batches = strategy.batches(total);
        if batches.is_empty() {
            return Err(AcquisitionError::NoRecords {
                label: label.to_string(),
                reason: "no batches to fetch".to_string(),
            });
        }

        let batch_count = batches.len();
        let timeout = self.timeouts.for_strategy(strategy);
        progress.set_total(batch_count as u64);

        let mut results = futures::stream::iter(batches)
            .map(|batch| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let result = self.fetch_batch(endpoint, template, &batch, timeout).await;
                Some((batch, result))
            })
            .buffer_unordered(self.concurrency);

        let mut outcome = FetchOutcome::default();
        let mut done = 0;

        while let Some(item) = results.next().await {
            let Some((batch, result)) = item else {
                continue;
            };
            done += 1;
            match result {
                Ok(records) => {
                    log::debug!("{label} [{}]: {} records", batch.label, records.len());
                    outcome.stats.succeeded += 1;
                    outcome.records.extend(records);
                }
                Err(e) => {
                    log::warn!("{label} [{}]: batch failed: {e}", batch.label);
                    outcome.stats.failed += 1;
                }
            }
            progress.inc(1);
            progress.set_message(format!(
                "{label}: fetched {done}/{batch_count} batches ({} records)",
                outcome.records.len()
            ));
        }

        if cancel.is_cancelled() {
            log::info!("{label}: cancelled after {done}/{batch_count} batches");
            return Err(AcquisitionError::Cancelled {
                label: label.to_string(),
            });
        }

        log::info!(
            "{label}: {} batches succeeded, {} failed, {} records",
            outcome.stats.succeeded,
            outcome.stats.failed,
            outcome.records.len()
        );

        if outcome.records.is_empty() {
            let reason = if outcome.stats.failed > 0 {
                format!(
                    "{} of {batch_count} batches failed and the rest returned no features",
                    outcome.stats.failed
                )
            } else {
                "every batch returned no features".to_string()
            };
            log::error!("{label}: no records acquired: {reason}");
            return Err(AcquisitionError::NoRecords {
                label: label.to_string(),
                reason,
            });
        }

        progress.finish(format!(
            "{label}: {} records from {} batches",
            outcome.records.len(),
            outcome.stats.succeeded
        ));

        Ok(outcome)
    }

    async fn fetch_batch(
        &self,
        endpoint: &Endpoint,
        template: &QueryTemplate,
        batch: &Batch,
        timeout: Duration,
    ) -> Result<Vec<RemoteRecord>, AcquisitionError> {
        let request = QueryRequest {
            url: endpoint.url.clone(),
            params: template.params(&batch.where_clause, batch.record_limit),
            timeout,
        };
        let label = format!("{} [{}]", endpoint.label, batch.label);
        let transport = &self.transport;

        self.retry
            .run(&label, |_| {
                let request = request.clone();
                async move {
                    let body = transport.get_json(&request).await?;
                    check_error_envelope(&body)?;
                    parse_features(&body)
                }
            })
            .await
    }
}

/// Fails if the body is an `{"error": {"code", "message"}}` envelope.
///
/// # Errors
///
/// Returns [`AcquisitionError::Remote`] carrying the reported code and
/// message.
pub fn check_error_envelope(body: &Value) -> Result<(), AcquisitionError> {
    let Some(error) = body.get("error") else {
        return Ok(());
    };
    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    Err(AcquisitionError::Remote { code, message })
}

/// Extracts the records of a feature-query response. An empty `features`
/// array is a valid, empty result.
///
/// # Errors
///
/// Returns [`AcquisitionError::Malformed`] if there is no `features` array.
pub fn parse_features(body: &Value) -> Result<Vec<RemoteRecord>, AcquisitionError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| AcquisitionError::Malformed {
            message: "response has no \"features\" array".to_string(),
        })?;
    Ok(features.iter().map(RemoteRecord::from_feature).collect())
}
