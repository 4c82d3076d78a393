//! Minimal web front-end (behind the `web` feature).
//!
//! A single page: upload a deck, pick an operation, get a file back. Only
//! the alt-text reset operation is wired end to end; the other options are
//! placeholders that report as much. The CLI is the complete interface —
//! this form exists for users who have a deck and a browser and nothing
//! else.

use crate::ops;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tracing::{error, info};

/// Decks come in tens of megabytes; cap uploads at 100 MB.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

const FORM_PAGE: &str = r#"<!doctype html>
<title>Upload a PPTX File</title>
<h1 style="text-align: center;">Upload a PPTX File</h1>
<form style="text-align: center;" method=post enctype=multipart/form-data>
  <input type=file name=file>
  <select name=option>
    <option value="list">List alt-text for all images in the deck</option>
    <option value="extract">Extract all images from the deck</option>
    <option value="caption">Get auto-captions for the extracted images</option>
    <option value="apply">Write ledgered captions into the deck</option>
    <option value="reset" selected>Reset the alt-text of every image to the empty string</option>
  </select>
  <input type=submit value=Upload>
</form>"#;

/// Build the router for the upload form.
pub fn router() -> Router {
    Router::new()
        .route("/", get(form_page).post(handle_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Bind and serve the upload form until the process is stopped.
pub async fn serve(addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving upload form on http://{addr}/");
    axum::serve(listener, router()).await
}

async fn form_page() -> Html<&'static str> {
    Html(FORM_PAGE)
}

async fn handle_upload(mut multipart: Multipart) -> Response {
    let mut file_name = String::new();
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut option = String::new();

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("file") => {
                    file_name = sanitize_file_name(field.file_name().unwrap_or("upload.pptx"));
                    match field.bytes().await {
                        Ok(bytes) => file_bytes = bytes.to_vec(),
                        Err(e) => return bad_request(format!("reading upload: {e}")),
                    }
                }
                Some("option") => match field.text().await {
                    Ok(text) => option = text,
                    Err(e) => return bad_request(format!("reading option: {e}")),
                },
                _ => {}
            },
            Ok(None) => break,
            Err(e) => return bad_request(format!("malformed multipart body: {e}")),
        }
    }

    if file_bytes.is_empty() {
        return bad_request("no file uploaded".to_string());
    }

    match option.as_str() {
        "reset" => reset_and_download(&file_name, file_bytes).await,
        other => {
            info!("Option '{}' selected from the form; not wired up", other);
            Html(format!(
                "{FORM_PAGE}\n<p style=\"text-align: center;\">Option \
                 &quot;{other}&quot; is only available from the command line.</p>"
            ))
            .into_response()
        }
    }
}

/// Save, reset, and hand the deck back as a download.
async fn reset_and_download(file_name: &str, bytes: Vec<u8>) -> Response {
    let file_name = file_name.to_string();
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, crate::DeckAltError> {
        let dir = tempfile::tempdir().map_err(|e| {
            crate::DeckAltError::Internal(format!("creating temp dir: {e}"))
        })?;
        let path = dir.path().join(&file_name);
        std::fs::write(&path, bytes).map_err(|e| crate::DeckAltError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
        ops::reset_alt_text(&path, None)?;
        std::fs::read(&path).map_err(|e| crate::DeckAltError::OutputWriteFailed {
            path,
            source: e,
        })
    })
    .await;

    match result {
        Ok(Ok(deck)) => {
            let disposition = format!("attachment; filename=\"{}\"", file_name);
            (
                [
                    (
                        header::CONTENT_TYPE,
                        "application/vnd.openxmlformats-officedocument.presentationml.presentation"
                            .to_string(),
                    ),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                deck,
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!("Reset failed for '{}': {}", file_name, e);
            (StatusCode::UNPROCESSABLE_ENTITY, format!("Reset failed: {e}")).into_response()
        }
        Err(e) => {
            error!("Reset task panicked: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()).into_response()
        }
    }
}

fn bad_request(detail: String) -> Response {
    (StatusCode::BAD_REQUEST, detail).into_response()
}

/// Strip path separators and anything exotic from an uploaded file name.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() || cleaned.starts_with('.') {
        format!("upload{cleaned}")
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\decks\\q3.pptx"), "q3.pptx");
    }

    #[test]
    fn sanitize_keeps_normal_names() {
        assert_eq!(sanitize_file_name("Q3 review (final).pptx"), "Q3reviewfinal.pptx");
    }

    #[test]
    fn sanitize_never_returns_hidden_or_empty() {
        assert_eq!(sanitize_file_name(".hidden"), "upload.hidden");
        assert_eq!(sanitize_file_name("///"), "upload");
    }

    #[test]
    fn form_mentions_every_option() {
        for option in ["list", "extract", "caption", "apply", "reset"] {
            assert!(FORM_PAGE.contains(&format!("value=\"{option}\"")));
        }
    }
}
