// RegistryClient talks to Docker Registry HTTP API v2 endpoints: it pushes
// materialized images and looks up the manifest a tag currently points to.

use crate::error::{ResolverError, Result};
use crate::image::{Descriptor, DigestUtils, Image};
use crate::logging::Logger;
use crate::registry::credentials::Credentials;
use crate::registry::operations::{BlobOperations, ManifestOperations};
use crate::registry::reference::Reference;
use crate::registry::transport::Transport;
use crate::registry::Registry;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

pub struct RegistryClientBuilder {
    output: Logger,
    skip_tls: bool,
    timeout: Option<Duration>,
    user_agent: String,
}

impl RegistryClientBuilder {
    pub fn new(output: Logger) -> Self {
        Self {
            output,
            skip_tls: false,
            timeout: None,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let mut builder = Client::builder().user_agent(self.user_agent);
        if self.skip_tls {
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ResolverError::Network(format!("Failed to create HTTP client: {}", e)))?;

        let transport = Transport::new(client, self.output.clone());
        Ok(RegistryClient {
            blobs: BlobOperations::new(transport.clone(), self.output.clone()),
            manifests: ManifestOperations::new(transport, self.output.clone()),
            output: self.output,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RegistryClient {
    blobs: BlobOperations,
    manifests: ManifestOperations,
    output: Logger,
}

impl RegistryClient {
    pub fn new(output: Logger) -> Result<Self> {
        Self::builder(output).build()
    }

    pub fn builder(output: Logger) -> RegistryClientBuilder {
        RegistryClientBuilder::new(output)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn push(
        &self,
        reference: &Reference,
        image: &Image,
        credentials: &Credentials,
    ) -> Result<()> {
        self.output.step(&format!(
            "Pushing {} ({})",
            reference,
            self.output.format_size(image.total_size())
        ));

        for layer in &image.layers {
            self.blobs
                .push_blob(reference, credentials, &layer.digest, &layer.data)
                .await?;
        }
        self.blobs
            .push_blob(reference, credentials, &image.config_digest, &image.config)
            .await?;
        self.manifests
            .put_manifest(reference, credentials, image.manifest())
            .await?;

        self.output.success(&format!(
            "Pushed {} as {}",
            reference,
            DigestUtils::format_digest_short(&image.digest())
        ));
        Ok(())
    }

    async fn fetch_descriptor(
        &self,
        reference: &Reference,
        credentials: &Credentials,
    ) -> Result<Descriptor> {
        self.manifests.get_descriptor(reference, credentials).await
    }
}
