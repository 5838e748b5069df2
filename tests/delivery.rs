//! Render and email contracts.

mod common;

use common::{fast_config, orchestrator, Reply, ScriptedBackend, StubServer};
use research_sidekick::config::MailerChoice;
use research_sidekick::delivery::{self, RelayMailer, RemotePdfRenderer, SendGridMailer};
use research_sidekick::{ReportDocument, Services, SidekickError};
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

async fn report_with(stages: &[&str]) -> ReportDocument {
    let backend = ScriptedBackend::new();
    backend.push_ok("curse", "Crucial: yes <4/5>");
    let orch = orchestrator(backend, &fast_config().build().unwrap());
    for id in stages {
        assert_ok!(orch.run_stage(id).await);
    }
    orch.report()
}

#[tokio::test]
async fn download_posts_html_and_returns_pdf_bytes() {
    let server = StubServer::start(vec![Reply::bytes(200, "application/pdf", b"%PDF-1.7 rendered")]).await;
    let renderer = RemotePdfRenderer::new(reqwest::Client::new(), server.url("/api/convert-to-pdf"));
    let report = report_with(&["jtbd-analysis", "curse"]).await;

    let pdf = assert_ok!(delivery::download_report(&report, &renderer).await);

    assert_eq!(pdf.bytes, b"%PDF-1.7 rendered");
    assert!(pdf.file_name.starts_with("Customer Research Analysis Report - "));
    assert!(pdf.file_name.ends_with(".pdf"));

    let body = server.requests()[0].json();
    assert_eq!(body["fileName"], "Text Analysis_analysis");
    let html = body["htmlContent"].as_str().unwrap();
    assert!(html.contains("<h1>Customer Analyst Side Kick - Text Analysis</h1>"));
    assert!(html.contains("<h2>JTBD Goal Analysis</h2>"));
    assert!(html.contains("<pre>Crucial: yes &lt;4/5&gt;</pre>"));
    assert!(html.find("JTBD Goal Analysis").unwrap() < html.find("CURSE Problem Analyst").unwrap());
}

#[tokio::test]
async fn empty_pdf_body_is_an_error() {
    let server = StubServer::start(vec![Reply::bytes(200, "application/pdf", b"")]).await;
    let renderer = RemotePdfRenderer::new(reqwest::Client::new(), server.url("/api/convert-to-pdf"));
    let report = report_with(&["needs"]).await;

    let err = assert_err!(delivery::download_report(&report, &renderer).await);
    assert!(
        matches!(err, SidekickError::RemoteService { ref message, .. } if message == "Generated PDF is empty")
    );
}

#[tokio::test]
async fn render_failure_surfaces_details() {
    let server = StubServer::start(vec![Reply::json(
        500,
        json!({"error": "Failed to generate PDF", "details": "Chromium crashed"}),
    )])
    .await;
    let renderer = RemotePdfRenderer::new(reqwest::Client::new(), server.url("/api/convert-to-pdf"));
    let report = report_with(&["needs"]).await;

    let err = assert_err!(delivery::download_report(&report, &renderer).await);
    assert!(err.to_string().contains("Chromium crashed"), "got: {err}");
}

#[tokio::test]
async fn share_posts_recipient_and_returns_confirmation() {
    let server = StubServer::start(vec![Reply::json(200, json!({"message": "Email sent successfully"}))]).await;
    let mailer = RelayMailer::new(reqwest::Client::new(), server.url("/api/share-pdf"));
    let report = report_with(&["demand"]).await;

    let msg = assert_ok!(delivery::share_report(&report, &mailer, "pm@example.com").await);
    assert_eq!(msg, "Email sent successfully");

    let body = server.requests()[0].json();
    assert_eq!(body["recipientEmail"], "pm@example.com");
    assert_eq!(body["fileName"], "Text Analysis_analysis");
    assert!(body["htmlContent"].as_str().unwrap().contains("Demand Analyst"));
}

#[tokio::test]
async fn invalid_recipient_or_empty_report_sends_nothing() {
    let server = StubServer::start(vec![Reply::json(200, json!({"message": "ok"}))]).await;
    let mailer = RelayMailer::new(reqwest::Client::new(), server.url("/api/share-pdf"));

    let report = report_with(&["demand"]).await;
    let err = assert_err!(delivery::share_report(&report, &mailer, "not-an-address").await);
    assert!(matches!(err, SidekickError::InvalidRecipient { .. }));

    let empty = report_with(&[]).await;
    let err = assert_err!(delivery::share_report(&empty, &mailer, "pm@example.com").await);
    assert!(matches!(err, SidekickError::NothingCompleted));

    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn sendgrid_mailer_renders_then_attaches_pdf() {
    let render = StubServer::start(vec![Reply::bytes(200, "application/pdf", b"%PDF")]).await;
    let sendgrid = StubServer::start(vec![Reply::bytes(202, "text/plain", b"")]).await;
    let mailer = SendGridMailer::new(
        reqwest::Client::new(),
        sendgrid.url("/v3/mail/send"),
        "SG.test-key",
        "reports@example.com",
        Arc::new(RemotePdfRenderer::new(
            reqwest::Client::new(),
            render.url("/api/convert-to-pdf"),
        )),
    );
    let report = report_with(&["opportunity"]).await;

    assert_ok!(delivery::share_report(&report, &mailer, "pm@example.com").await);

    assert_eq!(render.requests().len(), 1);
    let req = &sendgrid.requests()[0];
    assert_eq!(req.header("authorization"), Some("Bearer SG.test-key"));
    let mail = req.json();
    assert_eq!(mail["subject"], "Customer Research Analysis Report - Text Analysis_analysis");
    assert_eq!(mail["attachments"][0]["content"], "JVBERg==");
    assert_eq!(mail["attachments"][0]["filename"], "Text Analysis_analysis.pdf");
}

#[tokio::test]
async fn sendgrid_errors_are_joined() {
    let render = StubServer::start(vec![Reply::bytes(200, "application/pdf", b"%PDF")]).await;
    let sendgrid = StubServer::start(vec![Reply::json(
        403,
        json!({"errors": [{"message": "The from address does not match a verified Sender Identity."}]}),
    )])
    .await;
    let config = fast_config()
        .relay_url("http://127.0.0.1:9/api/analyze")
        .render_url(render.url("/api/convert-to-pdf"))
        .mailer(MailerChoice::SendGrid)
        .sendgrid("SG.k", "reports@example.com")
        .sendgrid_url(sendgrid.url("/v3/mail/send"))
        .build()
        .unwrap();
    let services = Services::from_config(config).unwrap();
    let report = report_with(&["needs"]).await;

    let err = assert_err!(services.share(&report, "pm@example.com").await);
    match err {
        SidekickError::RemoteService { status, message, .. } => {
            assert_eq!(status, Some(403));
            assert!(message.contains("verified Sender Identity"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}
