//! Registry module for Docker registry interactions
//!
//! This module provides reference parsing, credential lookup, authentication and the
//! HTTP client for Docker Registry HTTP API v2. The [`Registry`] trait is the seam the
//! publisher and the tag resolver depend on.

pub mod auth;
pub mod client;
pub mod credentials;
pub mod operations;
pub mod reference;
pub mod token_manager;
pub mod transport;

use crate::error::Result;
use crate::image::{Descriptor, Image};
use async_trait::async_trait;

pub use auth::Auth;
pub use client::{RegistryClient, RegistryClientBuilder};
pub use credentials::{AnonymousKeychain, CredentialProvider, Credentials, DockerConfigKeychain};
pub use reference::{Reference, Validation, join_chroot};

/// Remote image operations
#[async_trait]
pub trait Registry: Send + Sync {
    /// Upload every blob of `image` and its manifest under the reference's tag
    async fn push(&self, reference: &Reference, image: &Image, credentials: &Credentials)
    -> Result<()>;

    /// Describe the manifest the reference's tag currently points to
    async fn fetch_descriptor(
        &self,
        reference: &Reference,
        credentials: &Credentials,
    ) -> Result<Descriptor>;
}
