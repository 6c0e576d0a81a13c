//! Manifest operations for registry client
//!
//! Implements Docker Registry v2 and OCI manifest operations:
//! - Manifest upload (PUT /v2/{name}/manifests/{tag})
//! - Descriptor lookup (GET /v2/{name}/manifests/{tag}) accepting every manifest flavour

use crate::error::handlers::HttpErrorHandler;
use crate::error::Result;
use crate::image::manifest::{content_type_of, MANIFEST_ACCEPT};
use crate::image::{Descriptor, DigestUtils};
use crate::logging::Logger;
use crate::registry::credentials::Credentials;
use crate::registry::reference::Reference;
use crate::registry::transport::{PULL, PUSH_PULL, Transport};
use reqwest::header::{ACCEPT, CONTENT_TYPE};

#[derive(Debug, Clone)]
pub struct ManifestOperations {
    transport: Transport,
    output: Logger,
}

impl ManifestOperations {
    pub fn new(transport: Transport, output: Logger) -> Self {
        Self { transport, output }
    }

    fn manifest_url(reference: &Reference) -> String {
        format!(
            "{}/v2/{}/manifests/{}",
            reference.api_base(),
            reference.repository_str(),
            reference.tag()
        )
    }

    pub async fn put_manifest(
        &self,
        reference: &Reference,
        credentials: &Credentials,
        manifest: &[u8],
    ) -> Result<()> {
        let url = Self::manifest_url(reference);
        let content_type = content_type_of(manifest);

        self.output.verbose(&format!(
            "Uploading manifest with content-type: {}",
            content_type
        ));

        let response = self
            .transport
            .send(reference, credentials, PUSH_PULL, "manifest upload", |client| {
                client
                    .put(&url)
                    .header(CONTENT_TYPE, content_type)
                    .body(manifest.to_vec())
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            self.output
                .detail(&format!("Manifest uploaded for {}", reference));
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(HttpErrorHandler::handle_upload_error(
                status,
                &error_text,
                "manifest upload",
            ))
        }
    }

    /// Fetch the manifest a tag points to and describe it. The digest is computed over the
    /// exact bytes served.
    pub async fn get_descriptor(
        &self,
        reference: &Reference,
        credentials: &Credentials,
    ) -> Result<Descriptor> {
        let url = Self::manifest_url(reference);

        let response = self
            .transport
            .send(reference, credentials, PULL, "manifest fetch", |client| {
                client.get(&url).header(ACCEPT, MANIFEST_ACCEPT)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HttpErrorHandler::handle_registry_error(
                status,
                &error_text,
                "manifest fetch",
            ));
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let body = response.bytes().await?;
        let digest = DigestUtils::compute_docker_digest(&body);
        let media_type = header_type.unwrap_or_else(|| content_type_of(&body).to_string());

        Ok(Descriptor {
            media_type,
            size: body.len() as u64,
            digest,
        })
    }
}
