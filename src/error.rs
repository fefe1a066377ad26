//! # Error Types
//!
//! This module defines error types used throughout the certiflow library.
//!
//! The variants follow the engine's recovery policy: `TemplateLoad`,
//! `QuotaExceeded` and `Precondition` are fatal to a whole campaign batch,
//! while `Render` and `TransportRejected` are per-recipient failures that the
//! campaign runner converts into a FAILURE row status instead of propagating.

use thiserror::Error;

/// Main error type for certiflow operations
#[derive(Debug, Error)]
pub enum CertiflowError {
    /// The template bytes could not be decoded (fatal to the batch)
    #[error("Template load error: {0}")]
    TemplateLoad(String),

    /// A field could not be drawn (per-recipient)
    #[error("Render error: {0}")]
    Render(String),

    /// The message transport refused the delivery (per-recipient)
    #[error("Transport rejected: {0}")]
    TransportRejected(String),

    /// Admitting the batch would exceed the daily plan limit (fatal, checked
    /// before any recipient is processed)
    #[error("Quota exceeded: {used} of {limit} daily sends used, batch of {requested} rejected")]
    QuotaExceeded {
        limit: u32,
        used: u32,
        requested: u32,
    },

    /// A run was started without the inputs it needs (fatal)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The quota store could not be read or written
    #[error("Quota store error: {0}")]
    QuotaStore(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CertiflowError {
    /// Whether this error aborts the whole batch, as opposed to failing a
    /// single recipient's delivery.
    pub fn is_batch_fatal(&self) -> bool {
        !matches!(
            self,
            CertiflowError::Render(_) | CertiflowError::TransportRejected(_)
        )
    }
}
