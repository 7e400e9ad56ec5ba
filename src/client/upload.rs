//! Multipart file upload.
//!
//! Files live client-side on their file inputs until a submit dispatch
//! carries them. The uploader then validates every file against the
//! per-file size limit, POSTs one multipart request to the flavor's
//! upload endpoint with the page's token in `X-Upload-Token`, and returns
//! the server's `{field: uploadId}` map. The shell merges those ids into
//! the event's `formData` before the event itself is sent.
//!
//! Any failure here aborts the submission that triggered it; attached
//! files stay on their inputs.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::dom::AttachedFile;
use crate::error::{Error, Result};
use crate::identifiers::UploadId;
use crate::protocol::Endpoints;

// ============================================================================
// Constants
// ============================================================================

/// Per-file size limit: 10 MiB, matching the server's default.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Header carrying the page's upload token.
pub(crate) const UPLOAD_TOKEN_HEADER: &str = "X-Upload-Token";

// ============================================================================
// Validation
// ============================================================================

/// Checks every file against the per-file limit.
///
/// # Errors
///
/// Returns [`Error::UploadTooLarge`] naming the first offending field.
pub(crate) fn validate_files(files: &[(String, AttachedFile)]) -> Result<()> {
    for (field, file) in files {
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(Error::upload_too_large(field, file.bytes.len(), MAX_UPLOAD_BYTES));
        }
    }
    Ok(())
}

// ============================================================================
// Uploader
// ============================================================================

/// Sends attached files ahead of the submit event that references them.
#[derive(Debug, Clone)]
pub(crate) struct Uploader {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl Uploader {
    pub(crate) fn new(http: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { http, endpoints }
    }

    /// Uploads the files of one submission in a single multipart request.
    ///
    /// # Errors
    ///
    /// - [`Error::UploadTooLarge`] before any bytes leave the client
    /// - [`Error::Upload`] for a rejected token (403), a server-side size
    ///   rejection (413), any other non-success status, or a malformed
    ///   response body
    pub(crate) async fn upload(
        &self,
        token: &str,
        files: &[(String, AttachedFile)],
    ) -> Result<BTreeMap<String, UploadId>> {
        validate_files(files)?;

        let mut form = Form::new();
        for (field, file) in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| Error::upload(format!("bad content type for {field}: {e}")))?;
            form = form.part(field.clone(), part);
        }

        let url = self.endpoints.upload_url()?;
        debug!(files = files.len(), "Uploading attached files");

        let response = self
            .http
            .post(url)
            .header(UPLOAD_TOKEN_HEADER, token)
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::FORBIDDEN => {
                return Err(Error::upload("upload token rejected"));
            }
            StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(Error::upload("server rejected upload size"));
            }
            status => {
                return Err(Error::upload(format!("upload failed with status {status}")));
            }
        }

        let ids: BTreeMap<String, UploadId> = response
            .json()
            .await
            .map_err(|e| Error::upload(format!("malformed upload response: {e}")))?;
        debug!(ids = ids.len(), "Upload accepted");
        Ok(ids)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{header, method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::protocol::Flavor;

    fn uploader(server: &MockServer) -> Uploader {
        Uploader::new(
            reqwest::Client::new(),
            Endpoints::new(Url::parse(&server.uri()).unwrap(), Flavor::PyWire),
        )
    }

    fn file(field: &str, bytes: usize) -> (String, AttachedFile) {
        (
            field.to_string(),
            AttachedFile::new("report.pdf", "application/pdf", vec![0u8; bytes]),
        )
    }

    #[test]
    fn test_validate_accepts_at_limit() {
        assert!(validate_files(&[file("doc", MAX_UPLOAD_BYTES)]).is_ok());
    }

    #[test]
    fn test_validate_rejects_over_limit() {
        let err = validate_files(&[file("doc", MAX_UPLOAD_BYTES + 1)]).unwrap_err();
        let Error::UploadTooLarge { field, size, limit } = err else {
            panic!("expected UploadTooLarge, got {err}");
        };
        assert_eq!(field, "doc");
        assert_eq!(size, MAX_UPLOAD_BYTES + 1);
        assert_eq!(limit, MAX_UPLOAD_BYTES);
    }

    #[tokio::test]
    async fn test_upload_returns_field_id_map() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/_pywire/upload"))
            .and(header(UPLOAD_TOKEN_HEADER, "tok-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"doc": "u-1", "avatar": "u-2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ids = uploader(&server)
            .upload("tok-1", &[file("doc", 64), file("avatar", 16)])
            .await
            .unwrap();

        assert_eq!(ids.get("doc").unwrap().as_str(), "u-1");
        assert_eq!(ids.get("avatar").unwrap().as_str(), "u-2");
    }

    #[tokio::test]
    async fn test_oversize_file_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload("tok-1", &[file("doc", MAX_UPLOAD_BYTES + 1)])
            .await
            .unwrap_err();
        assert!(err.is_upload_error());
    }

    #[tokio::test]
    async fn test_rejected_token_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/_pywire/upload"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload("stale", &[file("doc", 8)])
            .await
            .unwrap_err();
        assert!(err.is_upload_error());
        assert!(err.to_string().contains("token"), "got: {err}");
    }

    #[tokio::test]
    async fn test_server_size_rejection_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/_pywire/upload"))
            .respond_with(ResponseTemplate::new(413))
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload("tok-1", &[file("doc", 8)])
            .await
            .unwrap_err();
        assert!(err.is_upload_error());
    }

    #[tokio::test]
    async fn test_malformed_response_is_upload_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(url_path("/_pywire/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = uploader(&server)
            .upload("tok-1", &[file("doc", 8)])
            .await
            .unwrap_err();
        assert!(err.is_upload_error());
    }
}
