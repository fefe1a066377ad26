//! # Campaign Records
//!
//! The persisted shape of a campaign: one template, a field layout, a
//! recipient list with per-row delivery status, email copy, and cumulative
//! delivery stats. The serde representation matches the JSON the editor
//! saves (camelCase keys), so project files round-trip unchanged.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::field::Field;

/// Delivery state of one recipient. Rows start PENDING and are flipped to a
/// terminal state only by the campaign runner, never by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Success,
    Failure,
}

/// One row of the recipient list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: String,
    /// Delivery address, stored lower-cased.
    pub email: String,
    /// Field key → value mapping from the uploaded CSV row.
    pub data: HashMap<String, String>,
    /// Stable certificate ID: generated once when the row is created and
    /// never regenerated, so retries and re-renders keep the same ID.
    pub cert_id: String,
    #[serde(default)]
    pub status: DeliveryStatus,
}

impl Recipient {
    /// Create a new pending recipient with a freshly generated certificate ID.
    pub fn new(email: impl Into<String>, data: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into().trim().to_lowercase(),
            data,
            cert_id: generate_cert_id(),
            status: DeliveryStatus::Pending,
        }
    }
}

/// Generate a human-readable certificate ID (`CF-` + uppercase UUID prefix).
pub fn generate_cert_id() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("CF-{}", &raw[..10])
}

/// Kind of template asset a project carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Image,
    Pdf,
}

/// Cumulative delivery counters across all runs of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectStats {
    pub success: u32,
    pub failed: u32,
}

/// A user-owned campaign: template + field layout + recipients + email copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Set once a template has been uploaded; `None` means the campaign
    /// cannot run yet.
    pub template_kind: Option<TemplateKind>,
    pub fields: Vec<Field>,
    pub recipients: Vec<Recipient>,
    pub email_subject: String,
    pub email_body: String,
    #[serde(default)]
    pub stats: ProjectStats,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create an empty project with the default field layout and email copy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            template_kind: None,
            fields: Field::default_layout(),
            recipients: Vec::new(),
            email_subject: "Your Certification of Achievement".to_string(),
            email_body: "Dear {Name},\n\nWe are pleased to attach your official certificate \
                         (ID: {CertID}) for your recent completion.\n\nKeep growing,\nCertiFlow Team"
                .to_string(),
            stats: ProjectStats::default(),
            updated_at: Utc::now(),
        }
    }

    /// Recipients currently in FAILURE state (the retry subset).
    pub fn failed_recipients(&self) -> Vec<String> {
        self.recipients
            .iter()
            .filter(|r| r.status == DeliveryStatus::Failure)
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
