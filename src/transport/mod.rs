//! # Message Transport
//!
//! The delivery seam the campaign runner talks to. The engine only needs
//! "send this message with this attachment, tell me if it was accepted";
//! everything else (relay selection, credentials, TLS mode) lives in the
//! transport implementation.
//!
//! [`SmtpTransport`] delivers over SMTP via lettre, either through the
//! platform default relay or a per-user configured one. [`MockTransport`]
//! is a scriptable stand-in for tests and dry runs.

pub mod smtp;

pub use smtp::{SmtpEncryption, SmtpRelayConfig, SmtpTransport};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CertiflowError;

/// One outgoing delivery: rendered copy plus the certificate artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Rendered certificate bytes.
    pub attachment: Vec<u8>,
    /// Attachment filename, e.g. `certificate.png` or `certificate.pdf`.
    pub attachment_name: String,
}

/// Capability to deliver one message.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Deliver the message. A rejected or failed delivery returns
    /// [`CertiflowError::TransportRejected`]; the campaign runner converts
    /// that into a FAILURE row rather than aborting the batch.
    async fn send(&self, message: &OutgoingMessage) -> Result<(), CertiflowError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Scriptable in-memory transport for tests and `--dry-run`.
///
/// Records every message it is handed and fails the sends whose (0-based)
/// sequence numbers were marked with [`MockTransport::fail_on`].
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
    fail_indices: Vec<usize>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the nth send attempts (0-based, counted across the transport's
    /// lifetime).
    pub fn fail_on(mut self, indices: &[usize]) -> Self {
        self.fail_indices = indices.to_vec();
        self
    }

    /// Messages accepted so far, in delivery order.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Total send attempts, accepted or not.
    pub fn attempts(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), CertiflowError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_indices.contains(&call) {
            return Err(CertiflowError::TransportRejected(format!(
                "mock transport refused delivery to {}",
                message.to
            )));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
