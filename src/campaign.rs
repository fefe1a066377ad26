//! # Campaign Runner
//!
//! Executes a campaign: renders each recipient's certificate, delivers it
//! through the message transport, and tracks per-row status, cumulative
//! stats, audit entries and the user's daily quota.
//!
//! ## Execution model
//!
//! Recipients are processed strictly sequentially, never concurrently. That
//! guarantees deterministic audit ordering, exact quota accounting (no two
//! in-flight sends racing the admission check) and bounded memory — one
//! artifact lives in memory at a time. Each render+send is a natural await
//! point, but the next recipient never starts until the current one reaches
//! a terminal state.
//!
//! ## Failure policy
//!
//! Per-recipient failures (render, transport) are recovered locally: the row
//! flips to FAILURE, an audit entry records the error class, and the loop
//! continues. Batch-level failures (empty subset, missing template,
//! quota, undecodable template) abort before any row is touched.
//!
//! ## Quota accounting
//!
//! Admission is all-or-nothing against the usage read at batch start. The
//! counter is then flushed after every successful send rather than once at
//! batch end, so an interrupted run keeps credit for what it completed.
//! Failed sends never consume quota. A failing flush never aborts the batch:
//! rows and stats were already mutated, so the write is retried at batch end
//! and under-counts with a warning if the store stays down.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditSink};
use crate::error::CertiflowError;
use crate::project::{DeliveryStatus, Project};
use crate::quota::QuotaStore;
use crate::render::{self, Template};
use crate::resolve::fill_copy;
use crate::transport::{MessageTransport, OutgoingMessage};

/// Which recipients a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSelection {
    /// Every recipient, regardless of current status.
    All,
    /// Only rows currently in FAILURE state (the retry path). SUCCESS rows
    /// are never re-entered.
    FailedOnly,
}

/// Incremental run notifications, delivered over an optional channel so a
/// caller can drive a live progress indicator.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// Emitted after each recipient reaches a terminal state.
    Progress {
        done: usize,
        total: usize,
        percent: u8,
    },
    Delivered {
        email: String,
    },
    Failed {
        email: String,
        reason: String,
    },
}

/// Counters for one run session (not cumulative across runs — see
/// [`crate::project::ProjectStats`] for those).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    /// True when the run stopped early on a cancellation signal.
    pub cancelled: bool,
}

/// The campaign runner and its collaborators.
///
/// Everything the runner touches is passed in explicitly — transport, quota
/// store, audit sink — so there is no ambient configuration to reason about.
pub struct CampaignRunner<'a> {
    transport: &'a dyn MessageTransport,
    quota: &'a dyn QuotaStore,
    audit: &'a dyn AuditSink,
    cancel: CancellationToken,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl<'a> CampaignRunner<'a> {
    pub fn new(
        transport: &'a dyn MessageTransport,
        quota: &'a dyn QuotaStore,
        audit: &'a dyn AuditSink,
    ) -> Self {
        Self {
            transport,
            quota,
            audit,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Attach a cancellation token. Cancellation is cooperative and checked
    /// between recipients, never mid-recipient.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach an event channel for progress reporting.
    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the campaign for `user_id` over the selected recipient subset.
    ///
    /// On success the project's per-row statuses and cumulative stats are
    /// updated in place. Batch-level errors leave them untouched.
    pub async fn run(
        &self,
        project: &mut Project,
        user_id: &str,
        template_bytes: &[u8],
        selection: RunSelection,
    ) -> Result<RunOutcome, CertiflowError> {
        let subset: Vec<usize> = project
            .recipients
            .iter()
            .enumerate()
            .filter(|(_, r)| match selection {
                RunSelection::All => true,
                RunSelection::FailedOnly => r.status == DeliveryStatus::Failure,
            })
            .map(|(i, _)| i)
            .collect();

        if subset.is_empty() {
            return Err(CertiflowError::Precondition(
                "empty audience: add recipients before launching".to_string(),
            ));
        }
        let template_kind = project.template_kind.ok_or_else(|| {
            CertiflowError::Precondition(
                "missing template: upload a certificate background first".to_string(),
            )
        })?;

        // All-or-nothing admission against the usage read once, up front.
        let quota = self.quota.quota_state(user_id).await?;
        let batch_size = subset.len() as u32;
        if !crate::quota::can_admit(quota.plan_limit, quota.current_usage, batch_size) {
            return Err(CertiflowError::QuotaExceeded {
                limit: quota.plan_limit,
                used: quota.current_usage,
                requested: batch_size,
            });
        }

        // Decoded once for the whole batch; an undecodable template fails
        // here, before any row is touched.
        let template = Template::load(template_kind, template_bytes)?;
        let attachment_name = format!("certificate.{}", template.artifact_extension());

        info!(
            project = %project.name,
            recipients = subset.len(),
            transport = self.transport.name(),
            "campaign run started"
        );

        let total = subset.len();
        let mut outcome = RunOutcome::default();
        let mut flush_pending = false;

        for (done, &idx) in subset.iter().enumerate() {
            if self.cancel.is_cancelled() {
                // Rows not yet reached stay PENDING (or keep their previous
                // terminal state on a retry run).
                outcome.cancelled = true;
                warn!(remaining = total - done, "campaign run cancelled");
                break;
            }

            let (email, delivery) = {
                let recipient = &project.recipients[idx];
                let email = recipient.email.clone();
                let delivery = self
                    .deliver(&template, project, idx, &attachment_name)
                    .await;
                (email, delivery)
            };

            outcome.processed += 1;
            match delivery {
                Ok(()) => {
                    project.recipients[idx].status = DeliveryStatus::Success;
                    project.stats.success += 1;
                    outcome.sent += 1;
                    self.audit.record(AuditEntry::success(&email)).await;
                    self.emit(RunEvent::Delivered {
                        email: email.clone(),
                    });
                    // Incremental flush: an interrupted batch keeps credit
                    // for every send that already succeeded. A store write
                    // failure must not abort the batch after rows were
                    // mutated; the counter is retried at batch end.
                    flush_pending = match self
                        .quota
                        .set_usage(user_id, quota.current_usage + outcome.sent as u32)
                        .await
                    {
                        Ok(()) => false,
                        Err(err) => {
                            warn!(%err, "quota flush failed, retrying at batch end");
                            true
                        }
                    };
                }
                Err(err) => {
                    let reason = match &err {
                        CertiflowError::TransportRejected(msg) => {
                            format!("transport rejected: {msg}")
                        }
                        other => format!("render failed: {other}"),
                    };
                    project.recipients[idx].status = DeliveryStatus::Failure;
                    project.stats.failed += 1;
                    outcome.failed += 1;
                    warn!(%email, %reason, "delivery failed");
                    self.audit.record(AuditEntry::failure(&email, &reason)).await;
                    self.emit(RunEvent::Failed {
                        email: email.clone(),
                        reason,
                    });
                }
            }

            self.emit(RunEvent::Progress {
                done: done + 1,
                total,
                percent: ((done + 1) * 100 / total) as u8,
            });
        }

        if flush_pending {
            if let Err(err) = self
                .quota
                .set_usage(user_id, quota.current_usage + outcome.sent as u32)
                .await
            {
                warn!(
                    %err,
                    sent = outcome.sent,
                    "quota flush still failing, usage counter under-counts this run"
                );
            }
        }

        project.touch();
        info!(
            sent = outcome.sent,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "campaign run finished"
        );
        Ok(outcome)
    }

    /// Retry every recipient currently in FAILURE state.
    ///
    /// A campaign with no failed rows is a no-op: no sends, no quota reads,
    /// no error. Rows that fail again stay FAILURE and can be retried
    /// without bound.
    pub async fn retry_failed(
        &self,
        project: &mut Project,
        user_id: &str,
        template_bytes: &[u8],
    ) -> Result<RunOutcome, CertiflowError> {
        if project.failed_recipients().is_empty() {
            return Ok(RunOutcome::default());
        }
        self.run(project, user_id, template_bytes, RunSelection::FailedOnly)
            .await
    }

    /// Render and send for one recipient. Any error here is a per-recipient
    /// failure, recovered by the caller.
    async fn deliver(
        &self,
        template: &Template,
        project: &Project,
        idx: usize,
        attachment_name: &str,
    ) -> Result<(), CertiflowError> {
        let recipient = &project.recipients[idx];
        let artifact = render::render(
            template,
            &project.fields,
            &recipient.data,
            &recipient.cert_id,
        )?;

        let message = OutgoingMessage {
            to: recipient.email.clone(),
            subject: fill_copy(&project.email_subject, &recipient.data, &recipient.cert_id),
            body: fill_copy(&project.email_body, &recipient.data, &recipient.cert_id),
            attachment: artifact,
            attachment_name: attachment_name.to_string(),
        };
        self.transport.send(&message).await
    }

    /// Fire-and-forget event emission: a slow or dropped listener must not
    /// stall the run.
    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }
}
