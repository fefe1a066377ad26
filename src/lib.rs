//! # CertiFlow - Certificate Generation and Delivery Engine
//!
//! CertiFlow stamps per-recipient text and QR placeholder fields onto a
//! certificate template (raster image or PDF) and delivers the rendered
//! artifacts by email, tracking per-recipient status, cumulative stats and
//! a daily usage quota along the way. It provides:
//!
//! - **Field model**: declarative, percentage-positioned text/QR fields
//! - **Placeholder resolution**: reserved certificate-ID keys,
//!   case-insensitive data lookup, visible `[key]` markers for misses
//! - **Rendering**: one placement algorithm, two variants (pixel canvas
//!   and PDF overlay)
//! - **Campaign running**: sequential delivery with quota admission,
//!   per-row status, audit trail, live progress and retry of failures
//!
//! ## Quick Start
//!
//! ```no_run
//! use certiflow::{
//!     audit::MemoryAuditLog,
//!     campaign::{CampaignRunner, RunSelection},
//!     project::Project,
//!     quota::MemoryQuotaStore,
//!     transport::MockTransport,
//! };
//!
//! # async fn example(mut project: Project, template: Vec<u8>) -> Result<(), certiflow::CertiflowError> {
//! let transport = MockTransport::new();
//! let quota = MemoryQuotaStore::new(50);
//! let audit = MemoryAuditLog::new();
//!
//! let runner = CampaignRunner::new(&transport, &quota, &audit);
//! let outcome = runner
//!     .run(&mut project, "user-1", &template, RunSelection::All)
//!     .await?;
//! println!("sent {} / failed {}", outcome.sent, outcome.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`field`] | Field schema: kind, position, styling |
//! | [`resolve`] | Placeholder resolution and email copy substitution |
//! | [`render`] | Raster and PDF rendering variants |
//! | [`project`] | Campaign, recipient and stats records |
//! | [`campaign`] | The sequential campaign runner |
//! | [`quota`] | Plan tiers, admission check, usage store seam |
//! | [`audit`] | Append-only delivery audit log |
//! | [`transport`] | Message delivery seam (SMTP, mock) |
//! | [`server`] | HTTP job surface |
//! | [`error`] | Error types |

pub mod audit;
pub mod campaign;
pub mod error;
pub mod field;
pub mod project;
pub mod quota;
pub mod render;
pub mod resolve;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use campaign::{CampaignRunner, RunOutcome, RunSelection};
pub use error::CertiflowError;
pub use field::{Field, FieldKind, TextAlign};
pub use project::{DeliveryStatus, Project, Recipient};
pub use render::Template;
