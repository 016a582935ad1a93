//! Splitting a remote layer into independently retriable batches.

use crate::query::MATCH_ALL;

/// How a bulk layer is split into request batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStrategy {
    /// Contiguous ranges of a 1-based numeric ID field. Needs the total
    /// record count up front.
    IdRange {
        /// Numeric ID field (e.g. `OBJECTID`).
        id_field: String,
        /// Records per batch.
        batch_size: u64,
    },
    /// One batch per distinct value of a discrete key field.
    PartitionKey {
        /// Key field (e.g. `STATE`).
        field: String,
        /// Key values, one batch each, in order.
        keys: Vec<String>,
    },
    /// The whole layer in a single request.
    Whole {
        /// Predicate for the single request.
        where_clause: String,
    },
}

/// One batch of a partitioned query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Short description for logs (e.g. `"OBJECTID 1-150"`).
    pub label: String,
    /// `where` predicate selecting the batch.
    pub where_clause: String,
    /// Explicit `resultRecordCount`, if any.
    pub record_limit: Option<u64>,
}

impl PartitionStrategy {
    /// ID-range batching over `OBJECTID`.
    #[must_use]
    pub fn object_ids(batch_size: u64) -> Self {
        Self::IdRange {
            id_field: "OBJECTID".to_string(),
            batch_size,
        }
    }

    /// Single request matching every record.
    #[must_use]
    pub fn whole() -> Self {
        Self::Whole {
            where_clause: MATCH_ALL.to_string(),
        }
    }

    /// Returns `true` if [`Self::batches`] needs the total record count.
    #[must_use]
    pub const fn needs_count(&self) -> bool {
        matches!(self, Self::IdRange { .. })
    }

    /// Expands the strategy into batches. `total` is only consulted for
    /// [`Self::IdRange`].
    #[must_use]
    pub fn batches(&self, total: u64) -> Vec<Batch> {
        match self {
            Self::IdRange {
                id_field,
                batch_size,
            } => id_ranges(total, *batch_size)
                .into_iter()
                .map(|(start, end)| Batch {
                    label: format!("{id_field} {start}-{end}"),
                    where_clause: format!("{id_field} >= {start} AND {id_field} <= {end}"),
                    record_limit: Some(*batch_size),
                })
                .collect(),
            Self::PartitionKey { field, keys } => keys
                .iter()
                .map(|key| Batch {
                    label: format!("{field}={key}"),
                    where_clause: format!("{field} = {}", quote_literal(key)),
                    record_limit: None,
                })
                .collect(),
            Self::Whole { where_clause } => vec![Batch {
                label: "all".to_string(),
                where_clause: where_clause.clone(),
                record_limit: None,
            }],
        }
    }
}

/// Inclusive 1-based ranges covering `[1, total]` in steps of
/// `batch_size`. The last range is clipped to `total`.
#[must_use]
pub fn id_ranges(total: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    let mut ranges = Vec::new();
    let mut start = 1;
    while start <= total {
        let end = start.saturating_add(batch_size - 1).min(total);
        ranges.push((start, end));
        start = end + 1;
    }
    ranges
}

/// SQL string literal with embedded quotes doubled.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
