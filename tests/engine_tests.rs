//! # Engine Scenario Tests
//!
//! End-to-end coverage of the rendering + campaign pipeline through the
//! public API: a template is built in memory, a campaign is run against the
//! mock transport, and the resulting statuses, stats, quota debits and
//! artifacts are checked against the engine's contracts.

use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use pretty_assertions::assert_eq;

use certiflow::audit::MemoryAuditLog;
use certiflow::campaign::{CampaignRunner, RunSelection};
use certiflow::field::{Field, TextAlign};
use certiflow::project::{DeliveryStatus, Project, Recipient, TemplateKind};
use certiflow::quota::MemoryQuotaStore;
use certiflow::render::{self, Template};
use certiflow::transport::MockTransport;
use certiflow::CertiflowError;

fn png_template(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn name_field() -> Field {
    Field {
        x_percent: 50.0,
        y_percent: 50.0,
        font_size: 40.0,
        font_color: "#000000".to_string(),
        text_align: TextAlign::Center,
        ..Field::text("1", "Name")
    }
}

fn recipient(name: &str, email: &str) -> Recipient {
    Recipient::new(
        email,
        HashMap::from([("Name".to_string(), name.to_string())]),
    )
}

fn project(recipients: Vec<Recipient>) -> Project {
    let mut project = Project::new("Graduation 2026");
    project.template_kind = Some(TemplateKind::Image);
    project.fields = vec![name_field()];
    project.recipients = recipients;
    project
}

/// Spec scenario: 600×400 template, centered 40px "Name" at (50%, 50%) →
/// the recipient's name lands centered on pixel (300, 200).
#[test]
fn rendered_name_is_centered_on_the_anchor() {
    let template = Template::load(TemplateKind::Image, &png_template(600, 400)).unwrap();
    let data = HashMap::from([("Name".to_string(), "Asha Rao".to_string())]);

    let artifact = render::render(&template, &[name_field()], &data, "ID-0001").unwrap();
    let img = image::load_from_memory(&artifact).unwrap();
    assert_eq!((img.width(), img.height()), (600, 400));

    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    for (x, y, px) in img.pixels() {
        if px.0[0..3] != [255, 255, 255] {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
    }
    assert!(max.0 > min.0, "the artifact should contain the name's ink");

    let mid_x = (min.0 + max.0) as f32 / 2.0;
    let mid_y = (min.1 + max.1) as f32 / 2.0;
    assert!((mid_x - 300.0).abs() <= 12.0, "mid_x = {mid_x}");
    assert!((mid_y - 200.0).abs() <= 12.0, "mid_y = {mid_y}");
}

/// Re-rendering the same (template, fields, data, certId) tuple twice
/// produces byte-identical artifacts.
#[test]
fn rendering_is_idempotent() {
    let template = Template::load(TemplateKind::Image, &png_template(600, 400)).unwrap();
    let data = HashMap::from([("Name".to_string(), "Asha Rao".to_string())]);

    let first = render::render(&template, &[name_field()], &data, "ID-0001").unwrap();
    let second = render::render(&template, &[name_field()], &data, "ID-0001").unwrap();
    assert_eq!(first, second);
}

/// Spec scenario: plan limit 50, usage 48, batch of 5 → the whole batch is
/// rejected, every row stays PENDING, usage stays 48.
#[tokio::test]
async fn over_quota_batch_is_rejected_wholesale() {
    let transport = MockTransport::new();
    let quota = MemoryQuotaStore::new(50).with_usage("u1", 48);
    let audit = MemoryAuditLog::new();
    let runner = CampaignRunner::new(&transport, &quota, &audit);

    let mut project = project(
        (0..5)
            .map(|i| recipient("R", &format!("r{i}@x.com")))
            .collect(),
    );
    let err = runner
        .run(&mut project, "u1", &png_template(600, 400), RunSelection::All)
        .await
        .unwrap_err();

    assert!(matches!(err, CertiflowError::QuotaExceeded { .. }));
    assert!(project
        .recipients
        .iter()
        .all(|r| r.status == DeliveryStatus::Pending));
    assert_eq!(quota.usage_of("u1"), 48);
    assert_eq!(transport.attempts(), 0);
}

/// Spec scenario: 3 recipients with the transport failing the 2nd →
/// statuses [SUCCESS, FAILURE, SUCCESS], stats {2, 1}, usage +2 not +3.
#[tokio::test]
async fn partial_failure_keeps_siblings_and_debits_successes() {
    let transport = MockTransport::new().fail_on(&[1]);
    let quota = MemoryQuotaStore::new(50);
    let audit = MemoryAuditLog::new();
    let runner = CampaignRunner::new(&transport, &quota, &audit);

    let mut project = project(vec![
        recipient("Asha Rao", "a@x.com"),
        recipient("Borna Kos", "b@x.com"),
        recipient("Chidi Eze", "c@x.com"),
    ]);
    let outcome = runner
        .run(&mut project, "u1", &png_template(600, 400), RunSelection::All)
        .await
        .unwrap();

    let statuses: Vec<_> = project.recipients.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            DeliveryStatus::Success,
            DeliveryStatus::Failure,
            DeliveryStatus::Success
        ]
    );
    assert_eq!((outcome.sent, outcome.failed), (2, 1));
    assert_eq!(project.stats.success, 2);
    assert_eq!(project.stats.failed, 1);
    assert_eq!(quota.usage_of("u1"), 2);

    // Delivery order is input order, never re-sorted.
    let sent: Vec<_> = transport.sent().iter().map(|m| m.to.clone()).collect();
    assert_eq!(sent, vec!["a@x.com", "c@x.com"]);
}

/// Retrying failures converges: the failed row is re-entered, the succeeded
/// rows are left alone, and their cert IDs never change across retries.
#[tokio::test]
async fn retry_reuses_stable_cert_ids() {
    let transport = MockTransport::new().fail_on(&[0]);
    let quota = MemoryQuotaStore::new(50);
    let audit = MemoryAuditLog::new();
    let runner = CampaignRunner::new(&transport, &quota, &audit);

    let mut project = project(vec![recipient("Asha Rao", "a@x.com")]);
    let cert_id_before = project.recipients[0].cert_id.clone();

    runner
        .run(&mut project, "u1", &png_template(600, 400), RunSelection::All)
        .await
        .unwrap();
    assert_eq!(project.recipients[0].status, DeliveryStatus::Failure);

    let outcome = runner
        .retry_failed(&mut project, "u1", &png_template(600, 400))
        .await
        .unwrap();
    assert_eq!(outcome.sent, 1);
    assert_eq!(project.recipients[0].status, DeliveryStatus::Success);
    assert_eq!(project.recipients[0].cert_id, cert_id_before);

    // The retried delivery carried the stable ID in the body.
    let body = &transport.sent()[0].body;
    assert!(body.contains(&cert_id_before), "body: {body}");
}

/// The email copy reaches the transport with every placeholder filled.
#[tokio::test]
async fn delivered_copy_is_fully_substituted() {
    let transport = MockTransport::new();
    let quota = MemoryQuotaStore::new(50);
    let audit = MemoryAuditLog::new();
    let runner = CampaignRunner::new(&transport, &quota, &audit);

    let mut project = project(vec![recipient("Asha Rao", "A@X.com")]);
    project.email_subject = "Your Certification of Achievement".to_string();

    runner
        .run(&mut project, "u1", &png_template(600, 400), RunSelection::All)
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    // Recipient addresses are stored lower-cased.
    assert_eq!(sent[0].to, "a@x.com");
    assert!(sent[0].body.contains("Dear Asha Rao"));
    assert!(!sent[0].body.contains("{Name}"));
    assert!(!sent[0].body.contains("{CertID}"));
    assert_eq!(sent[0].attachment_name, "certificate.png");
    // The attachment is a decodable PNG artifact.
    image::load_from_memory(&sent[0].attachment).unwrap();
}
