//! Blob operations for registry client
//!
//! Implements Docker Registry v2 blob operations:
//! - Blob existence checks (HEAD /v2/{name}/blobs/{digest})
//! - Monolithic blob upload (POST /v2/{name}/blobs/uploads/ then PUT ?digest=)

use crate::error::handlers::HttpErrorHandler;
use crate::error::{ResolverError, Result};
use crate::image::DigestUtils;
use crate::logging::Logger;
use crate::registry::credentials::Credentials;
use crate::registry::reference::Reference;
use crate::registry::transport::{PUSH_PULL, Transport};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use url::Url;

#[derive(Debug, Clone)]
pub struct BlobOperations {
    transport: Transport,
    output: Logger,
}

impl BlobOperations {
    pub fn new(transport: Transport, output: Logger) -> Self {
        Self { transport, output }
    }

    /// Check if blob exists using Docker Registry v2 HEAD request
    pub async fn blob_exists(
        &self,
        reference: &Reference,
        credentials: &Credentials,
        digest: &str,
    ) -> Result<bool> {
        let url = format!(
            "{}/v2/{}/blobs/{}",
            reference.api_base(),
            reference.repository_str(),
            digest
        );

        let response = self
            .transport
            .send(reference, credentials, PUSH_PULL, "blob existence check", |client| {
                client.head(&url)
            })
            .await?;

        match response.status().as_u16() {
            200 => {
                self.output.detail(&format!(
                    "Blob {} already exists",
                    DigestUtils::format_digest_short(digest)
                ));
                Ok(true)
            }
            404 => Ok(false),
            _ => {
                let status = response.status();
                let error_text = response.text().await.unwrap_or_default();
                Err(HttpErrorHandler::handle_registry_error(
                    status,
                    &error_text,
                    "blob existence check",
                ))
            }
        }
    }

    /// Upload a blob unless the registry already has it
    pub async fn push_blob(
        &self,
        reference: &Reference,
        credentials: &Credentials,
        digest: &str,
        data: &[u8],
    ) -> Result<()> {
        if self.blob_exists(reference, credentials, digest).await? {
            return Ok(());
        }
        self.upload_blob(reference, credentials, digest, data).await
    }

    pub async fn upload_blob(
        &self,
        reference: &Reference,
        credentials: &Credentials,
        digest: &str,
        data: &[u8],
    ) -> Result<()> {
        let base = reference.api_base();
        let start_url = format!("{}/v2/{}/blobs/uploads/", base, reference.repository_str());

        let response = self
            .transport
            .send(reference, credentials, PUSH_PULL, "blob upload start", |client| {
                client.post(&start_url).header(CONTENT_LENGTH, 0)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                "blob upload start",
            ));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ResolverError::Registry("upload session response has no Location header".to_string())
            })?;

        let mut upload_url = Url::parse(&base)?.join(location)?;
        upload_url.query_pairs_mut().append_pair("digest", digest);

        self.output.detail(&format!(
            "Uploading blob {} ({})",
            DigestUtils::format_digest_short(digest),
            self.output.format_size(data.len() as u64)
        ));

        let response = self
            .transport
            .send(reference, credentials, PUSH_PULL, "blob upload", |client| {
                client
                    .put(upload_url.clone())
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.to_vec())
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                "blob upload",
            ))
        }
    }
}
