#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote boundary acquisition.
//!
//! Pulls administrative-boundary records from an `ArcGIS` REST query
//! endpoint (the Census `TIGERweb` service by default). A bulk layer is
//! split into independently retriable batches by a [`PartitionStrategy`];
//! each batch runs under a [`RetryPolicy`], failed batches are counted and
//! skipped, and the call only fails when no batch produced any records.

pub mod client;
pub mod partition;
pub mod progress;
pub mod query;
pub mod retry;
pub mod transport;

pub use client::{AcquisitionClient, Cancellation, FetchOutcome, FetchStats, Timeouts};
pub use partition::{Batch, PartitionStrategy};
pub use progress::{
    ChannelProgress, MessagesOnly, NullProgress, ProgressCallback, ProgressEvent, null_progress,
};
pub use query::{Endpoint, QueryRequest, QueryTemplate};
pub use retry::{Backoff, RetryPolicy};
pub use transport::{HttpTransport, ScriptedTransport, Transport};

use thiserror::Error;

/// Errors that can occur while acquiring remote records.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// The service returned an `{"error": {...}}` envelope.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Error code reported by the service.
        code: i64,
        /// Error message reported by the service.
        message: String,
    },

    /// The response parsed but did not have the expected shape.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what was missing.
        message: String,
    },

    /// No batch produced any records.
    #[error("No records acquired for {label}: {reason}")]
    NoRecords {
        /// Endpoint label.
        label: String,
        /// Why nothing was acquired.
        reason: String,
    },

    /// The caller abandoned the operation.
    #[error("Acquisition of {label} was cancelled")]
    Cancelled {
        /// Endpoint label.
        label: String,
    },
}

impl AcquisitionError {
    /// Returns `true` for errors that a fresh attempt of the same request
    /// might not hit again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Json(_) | Self::Status { .. } | Self::Remote { .. } | Self::Malformed { .. }
        )
    }

    /// Returns `true` if the error came from the transport rather than
    /// from a response the service produced on purpose.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }
}
