//! End-to-End Pipeline Tests
//!
//! Runs documents on disk through extraction, classification, linking and
//! export. The Gemini classifier is pointed at a local HTTP server that
//! replays canned responses.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use vaguelink::classifier::{AnalysisMode, ClassifierConfig, RetryPolicy};
use vaguelink::report::render;
use vaguelink::{Analyzer, Classifier, ClassifierError, ExportFormat, FileClassifier, GeminiClassifier};

const CONTRACT: &str = "Services Agreement\n\n\
The contractor will deliver the\nsoftware in the near future.\n\n\
Payment is due within thirty days of invoice.\x0C\
Support will be provided for a reasonable period after some-\nwhat extended testing.\n";

/// Canned HTTP response: status line and body
type Reply = (u16, String);

/// Serve one reply per connection, in order, recording each raw request
async fn spawn_mock(replies: Vec<Reply>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        for (status, body) in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            recorded.lock().await.push(request);

            let reason = if status == 200 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{}/v1beta", addr), requests)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn gemini_body(findings: serde_json::Value) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": findings.to_string() }], "role": "model" },
            "finishReason": "STOP"
        }]
    })
    .to_string()
}

fn gemini_config(endpoint: String) -> ClassifierConfig {
    ClassifierConfig {
        endpoint,
        api_key: Some("test-key".to_string()),
        timeout_seconds: 5,
        chunk_chars: 10_000,
        min_paragraph_chars: 10_000,
        retry_policy: RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 2.0,
        },
        ..Default::default()
    }
}

fn write_document(temp: &TempDir) -> std::path::PathBuf {
    let path = temp.path().join("contract.txt");
    std::fs::write(&path, CONTRACT).unwrap();
    path
}

#[tokio::test]
async fn test_analyze_with_findings_file() {
    let temp = TempDir::new().unwrap();
    let document = write_document(&temp);
    let findings = temp.path().join("findings.json");
    std::fs::write(
        &findings,
        r#"```json
        {"findings": [
            {"sentence": "The contractor will deliver the software in the near future.",
             "reason": "No delivery date", "suggestion": "Name a date."},
            {"sentence": "Support will be provided for a reasonable period after somewhat extended testing.",
             "reason": "Undefined period", "suggestion": "State the number of months."},
            {"sentence": "Refunds are processed quickly.", "reason": "Not in the text"}
        ]}
        ```"#,
    )
    .unwrap();

    let report = Analyzer::default()
        .analyze(&document, &FileClassifier::new(&findings))
        .await
        .unwrap();

    assert_eq!(report.classifier, "file");
    assert_eq!(report.page_count, 2);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.resolved, 2);
    assert_eq!(report.summary.exact, 2);
    assert_eq!(report.summary.unresolved, 1);

    let delivery = &report.findings[0];
    assert_eq!(delivery.page, Some(1));
    assert_eq!(delivery.line, Some(3));
    assert_eq!(delivery.column, Some(1));
    assert!(delivery.slice_sha256.as_deref().unwrap().starts_with("sha256:"));

    let support = &report.findings[1];
    assert_eq!(support.page, Some(2));
    assert_eq!(support.raw_start, Some(0));
    assert!(!support.crosses_page);

    let csv = render(&report, ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().nth(3).unwrap().contains("no_match"));

    let markdown = render(&report, ExportFormat::Markdown).unwrap();
    assert!(!markdown.contains("Clarity Score"));
    assert!(markdown.contains("### 1. Page 1, line 3"));
    assert!(markdown.contains("### 2. Page 2, line 1"));
    assert!(markdown.contains("**Match:** not located (no_match)"));

    let jsonl = render(&report, ExportFormat::Jsonl).unwrap();
    assert_eq!(jsonl.lines().count(), 3);
    for line in jsonl.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("ordinal").is_some());
    }
}

#[tokio::test]
async fn test_analyze_rejects_empty_document() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("blank.txt");
    std::fs::write(&path, "  \n\x0C\n ").unwrap();
    let findings = temp.path().join("findings.json");
    std::fs::write(&findings, "[]").unwrap();

    let result = Analyzer::default()
        .analyze(&path, &FileClassifier::new(&findings))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_gemini_classifier_against_mock_server() {
    let findings = serde_json::json!([
        {
            "sentence": "The contractor will deliver the software in the near future.",
            "reason": "Vague time reference",
            "suggestion": "The contractor will deliver the software by 1 March."
        }
    ]);
    let (endpoint, requests) = spawn_mock(vec![(200, gemini_body(findings))]).await;

    let temp = TempDir::new().unwrap();
    let document = write_document(&temp);
    let classifier = GeminiClassifier::from_config(gemini_config(endpoint)).unwrap();

    let report = Analyzer::default().analyze(&document, &classifier).await.unwrap();

    assert_eq!(report.classifier, "gemini");
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.resolved, 1);
    assert_eq!(report.findings[0].explanation, "Vague time reference");

    let units = report.summary.units.unwrap();
    assert_eq!(units.mode, AnalysisMode::Paragraph);
    assert_eq!((units.analyzed, units.vague), (1, 1));
    assert_eq!(report.summary.clarity_score, Some(0.0));

    let requests = requests.lock().await;
    assert_eq!(requests.len(), 1);
    let request = requests[0].to_lowercase();
    assert!(request.starts_with("post /v1beta/models/gemini-2.5-flash:generatecontent"));
    assert!(request.contains("x-goog-api-key: test-key"));
    assert!(request.contains("in the near future"));
    assert!(request.contains("somewhat extended testing"));
}

#[tokio::test]
async fn test_gemini_sentence_mode_counts_units() {
    let document_text = "Delivery will happen soon.\n\nPayment is due within thirty days.";
    let (endpoint, requests) = spawn_mock(vec![
        (
            200,
            gemini_body(serde_json::json!({
                "is_vague": true,
                "reason": "No date",
                "suggestion": "Delivery will happen by 1 March."
            })),
        ),
        (
            200,
            gemini_body(serde_json::json!({ "is_vague": false, "reason": "", "suggestion": "" })),
        ),
    ])
    .await;

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("terms.txt");
    std::fs::write(&path, document_text).unwrap();

    let config = ClassifierConfig {
        mode: AnalysisMode::Sentence,
        ..gemini_config(endpoint)
    };
    let classifier = GeminiClassifier::from_config(config).unwrap();
    let report = Analyzer::default().analyze(&path, &classifier).await.unwrap();

    let units = report.summary.units.unwrap();
    assert_eq!(units.mode, AnalysisMode::Sentence);
    assert_eq!((units.analyzed, units.vague, units.clear()), (2, 1, 1));
    assert_eq!(report.summary.clarity_score, Some(50.0));

    assert_eq!(report.summary.total, 1);
    let finding = &report.findings[0];
    assert_eq!(finding.quoted_text, "Delivery will happen soon.");
    assert_eq!(finding.raw_start, Some(0));
    assert_eq!(finding.explanation, "No date");

    let requests = requests.lock().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("Sentence: \\\"Delivery will happen soon.\\\""));
    assert!(requests[0].contains("Context: Payment is due within thirty days."));

    let markdown = render(&report, ExportFormat::Markdown).unwrap();
    assert!(markdown.contains("- Total sentences analyzed: 2"));
    assert!(markdown.contains("- Clarity Score: 50.0%"));
}

#[tokio::test]
async fn test_gemini_reply_without_finding_fields_is_retried() {
    let findings = serde_json::json!([{ "sentence": "Payment is due within thirty days of invoice." }]);
    let (endpoint, requests) = spawn_mock(vec![
        (200, gemini_body(serde_json::json!({ "error": "quota exceeded" }))),
        (200, gemini_body(findings)),
    ])
    .await;

    let classifier = GeminiClassifier::from_config(gemini_config(endpoint)).unwrap();
    let result = classifier
        .classify("Payment is due within thirty days of invoice.")
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(requests.lock().await.len(), 2);
}

#[tokio::test]
async fn test_gemini_classifier_retries_unavailable() {
    let findings = serde_json::json!([{ "sentence": "Payment is due within thirty days of invoice." }]);
    let (endpoint, requests) = spawn_mock(vec![
        (503, r#"{"error": {"code": 503, "message": "The model is overloaded."}}"#.to_string()),
        (200, gemini_body(findings)),
    ])
    .await;

    let classifier = GeminiClassifier::from_config(gemini_config(endpoint)).unwrap();
    let result = classifier
        .classify("Payment is due within thirty days of invoice.")
        .await
        .unwrap();

    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].ordinal, 0);
    assert_eq!(requests.lock().await.len(), 2);
}

#[tokio::test]
async fn test_gemini_classifier_does_not_retry_client_errors() {
    let (endpoint, requests) = spawn_mock(vec![(
        400,
        r#"{"error": {"code": 400, "message": "API key not valid."}}"#.to_string(),
    )])
    .await;

    let classifier = GeminiClassifier::from_config(gemini_config(endpoint)).unwrap();
    let err = classifier
        .classify("Payment is due within thirty days of invoice.")
        .await
        .unwrap_err();

    match err {
        ClassifierError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert_eq!(requests.lock().await.len(), 1);
}
