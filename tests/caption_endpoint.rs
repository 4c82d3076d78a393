//! Captioning HTTP behaviour against a canned local endpoint.
//!
//! A throwaway TCP listener answers each connection with the next scripted
//! HTTP response, which is enough to drive the client through its whole
//! status-code contract without any real endpoint: 429 retries within a
//! bounded budget, 401 aborts a run, other non-2xx failures are recorded
//! per image while the run continues, and an empty predictions array is a
//! valid (empty) caption.

use deckalt::{ops, CaptionConfig, CaptionError, CaptionLedger, DeckAltError};
use std::net::SocketAddr;
use std::path::Path;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Bind a listener that serves one scripted response per connection,
/// in order, then stops accepting.
async fn canned_server(responses: Vec<String>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            read_full_request(&mut socket).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    addr
}

/// Read headers plus `content-length` body bytes so the client is never cut
/// off mid-upload.
async fn read_full_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut header_end: Option<usize> = None;
    let mut content_length = 0usize;
    loop {
        if let Some(end) = header_end {
            if buf.len() >= end + content_length {
                return;
            }
        }
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if header_end.is_none() {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                header_end = Some(pos + 4);
                content_length = String::from_utf8_lossy(&buf[..pos])
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse().ok())
                    .unwrap_or(0);
            }
        }
    }
}

fn config_for(addr: SocketAddr, max_retries: u32) -> CaptionConfig {
    CaptionConfig::builder()
        .endpoint_override(format!("http://{addr}/predict"))
        .access_token("test-token")
        .request_delay_ms(0)
        .retry_delay_ms(0)
        .max_retries(max_retries)
        .build()
        .unwrap()
}

fn write_image(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"\x89PNG\r\n\x1a\nfakepixels").unwrap();
}

#[tokio::test]
async fn rate_limited_request_recovers_within_budget() {
    let addr = canned_server(vec![
        response("429 Too Many Requests", ""),
        response("200 OK", r#"{"predictions": ["a red barn"]}"#),
    ])
    .await;

    let tmp = TempDir::new().unwrap();
    write_image(tmp.path(), "image_pg0_idx0.png");

    let caption = ops::caption_file(
        tmp.path().join("image_pg0_idx0.png"),
        None,
        &config_for(addr, 3),
    )
    .await
    .unwrap();
    assert_eq!(caption, "a red barn");
}

#[tokio::test]
async fn rate_limit_budget_exhausts_into_rate_limited() {
    // max_retries = 1 means two attempts total; both answer 429.
    let addr = canned_server(vec![
        response("429 Too Many Requests", ""),
        response("429 Too Many Requests", ""),
    ])
    .await;

    let tmp = TempDir::new().unwrap();
    write_image(tmp.path(), "image_pg0_idx0.png");

    let err = ops::caption_file(
        tmp.path().join("image_pg0_idx0.png"),
        None,
        &config_for(addr, 1),
    )
    .await
    .unwrap_err();
    match err {
        DeckAltError::CaptionFailed {
            source: CaptionError::RateLimited { attempts },
            ..
        } => assert_eq!(attempts, 2),
        other => panic!("expected RateLimited, got: {other}"),
    }
}

#[tokio::test]
async fn auth_rejection_aborts_a_directory_run() {
    let addr = canned_server(vec![response(
        "401 Unauthorized",
        r#"{"error": "invalid authentication credentials"}"#,
    )])
    .await;

    let tmp = TempDir::new().unwrap();
    write_image(tmp.path(), "image_pg0_idx0.png");
    write_image(tmp.path(), "image_pg0_idx1.png");

    let ledger_path = tmp.path().join("captions.csv");
    let err = ops::caption_directory(tmp.path(), &ledger_path, &config_for(addr, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, DeckAltError::AuthRejected { status: 401, .. }));
    // The run aborted before any caption was paid for or recorded.
    assert!(!ledger_path.exists());
}

#[tokio::test]
async fn server_error_is_recorded_and_the_run_continues() {
    let addr = canned_server(vec![
        response("500 Internal Server Error", r#"{"error": "backend"}"#),
        response("200 OK", r#"{"predictions": ["a red barn"]}"#),
    ])
    .await;

    let tmp = TempDir::new().unwrap();
    write_image(tmp.path(), "image_pg0_idx0.png");
    write_image(tmp.path(), "image_pg0_idx1.png");

    let ledger_path = tmp.path().join("captions.csv");
    let summary = ops::caption_directory(tmp.path(), &ledger_path, &config_for(addr, 0))
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.success_count(), 1);
    match &summary.outcomes[0].error {
        Some(CaptionError::RequestFailed { status: 500, .. }) => {}
        other => panic!("expected RequestFailed 500, got: {other:?}"),
    }
    assert_eq!(summary.outcomes[1].caption.as_deref(), Some("a red barn"));

    // Only the successful image reached the ledger.
    let ledger = CaptionLedger::load(&ledger_path).unwrap();
    assert_eq!(ledger.records().len(), 1);
    assert_eq!(ledger.lookup("image_pg0_idx1.png"), Some("a red barn"));
}

#[tokio::test]
async fn empty_predictions_are_ledgered_as_an_empty_caption() {
    let addr = canned_server(vec![response("200 OK", "{}")]).await;

    let tmp = TempDir::new().unwrap();
    write_image(tmp.path(), "image_pg0_idx0.png");

    let ledger_path = tmp.path().join("captions.csv");
    let summary = ops::caption_directory(tmp.path(), &ledger_path, &config_for(addr, 0))
        .await
        .unwrap();
    assert_eq!(summary.success_count(), 1);
    assert_eq!(summary.outcomes[0].caption.as_deref(), Some(""));

    // An empty caption still counts as recorded: a rerun has nothing to do.
    let missing = ops::missing_captions(tmp.path(), &ledger_path).unwrap();
    assert!(missing.is_empty());
}
