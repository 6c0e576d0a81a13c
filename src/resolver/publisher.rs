//! Image publishing
//!
//! Each [`ImageSpec`] is materialized, optionally pushed, and mapped from its original
//! (unstamped) name to the `registry/repository@digest` reference of the built image.

use crate::error::{ResolverError, Result};
use crate::image::{ImageParts, ImageReader, ImageSpec};
use crate::logging::Logger;
use crate::registry::{CredentialProvider, Reference, Registry, join_chroot};
use crate::stamp::Stamper;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub struct Publisher {
    registry: Arc<dyn Registry>,
    keychain: Arc<dyn CredentialProvider>,
    stamper: Stamper,
    reader: ImageReader,
    push: bool,
    chroot: Option<String>,
    output: Logger,
}

impl Publisher {
    pub fn new(
        registry: Arc<dyn Registry>,
        keychain: Arc<dyn CredentialProvider>,
        stamper: Stamper,
        output: Logger,
    ) -> Self {
        Self {
            registry,
            keychain,
            stamper,
            reader: ImageReader::new(output.clone()),
            push: true,
            chroot: None,
            output,
        }
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn with_chroot(mut self, chroot: Option<String>) -> Self {
        self.chroot = chroot.filter(|c| !c.is_empty());
        self
    }

    /// Publish one image and return its digest reference.
    pub async fn publish_single(&self, spec: &ImageSpec) -> Result<String> {
        let layers = spec.layers().map_err(|e| {
            publish_error(
                format!(
                    "unable to convert the layer parts in image spec for {} into a single comma separated argument",
                    spec.name
                ),
                e,
            )
        })?;
        let parts = ImageParts::from_args(&spec.config, &spec.tarball, &layers).map_err(|e| {
            publish_error(
                "unable to determine parts of the image from the specified arguments",
                e,
            )
        })?;
        let image = self
            .reader
            .read_image(&parts)
            .map_err(|e| publish_error("error reading image", e))?;

        let stamped = self.stamper.stamp(&spec.name);
        let name = match &self.chroot {
            Some(chroot) => join_chroot(chroot, &stamped),
            None => stamped,
        };
        let reference = Reference::weak(&name).map_err(|e| {
            publish_error(
                format!("unable to create a docker tag from stamped name {:?}", name),
                e,
            )
        })?;

        let credentials = self
            .keychain
            .resolve(reference.registry_str())
            .map_err(|e| {
                publish_error(format!("unable to get authenticator for image {}", reference), e)
            })?;

        if self.push {
            self.registry
                .push(&reference, &image, &credentials)
                .await
                .map_err(|e| publish_error(format!("unable to push image {}", reference), e))?;
        } else {
            self.output
                .verbose(&format!("Skipping push of {}", reference));
        }

        Ok(reference.digest_reference(&image.digest()))
    }

    /// Publish every spec in order, stopping at the first failure.
    /// Returns the name to digest reference overrides and the set of published names.
    pub async fn publish(
        &self,
        specs: &[ImageSpec],
    ) -> Result<(HashMap<String, String>, BTreeSet<String>)> {
        let mut overrides = HashMap::with_capacity(specs.len());
        let mut unseen = BTreeSet::new();

        for spec in specs {
            let digest_ref = self.publish_single(spec).await?;
            self.output
                .detail(&format!("{} => {}", spec.name, digest_ref));
            overrides.insert(spec.name.clone(), digest_ref);
            unseen.insert(spec.name.clone());
        }

        Ok((overrides, unseen))
    }
}

fn publish_error(context: impl std::fmt::Display, err: ResolverError) -> ResolverError {
    ResolverError::Publish(format!("{}: {}", context, err))
}
