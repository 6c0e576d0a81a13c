//! Runner tying the publish and resolve stages together

use crate::cli::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::image::ImageSpec;
use crate::logging::Logger;
use crate::registry::{CredentialProvider, DockerConfigKeychain, Registry, RegistryClient};
use crate::resolver::{
    DocumentResolver, Publisher, ResolverState, Substitutions, TagResolver, resolve_stream,
};
use crate::stamp::Stamper;
use std::io::Write;
use std::sync::Arc;

pub struct Runner {
    config: ResolverConfig,
    output: Logger,
}

impl Runner {
    pub fn new(config: ResolverConfig) -> Self {
        let output = if config.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(config.verbose)
        };
        Self { config, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    /// Run against the real registry and keychain, writing the resolved stream to stdout.
    pub async fn run(&self) -> Result<()> {
        let mut builder = RegistryClient::builder(self.output.clone())
            .with_skip_tls(self.config.skip_tls);
        if let Some(timeout) = self.config.timeout {
            builder = builder.with_timeout(timeout);
        }
        let registry: Arc<dyn Registry> = Arc::new(builder.build()?);
        let keychain: Arc<dyn CredentialProvider> = Arc::new(DockerConfigKeychain::load()?);

        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.run_with(registry, keychain, &mut handle).await
    }

    pub async fn run_with<W: Write>(
        &self,
        registry: Arc<dyn Registry>,
        keychain: Arc<dyn CredentialProvider>,
        out: &mut W,
    ) -> Result<()> {
        self.output.section("Resolving image references");

        let stamper = Stamper::from_files(self.config.stamp_info_files.as_slice())
            .map_err(|e| e.context("Failed to initialize the stamper"))?;

        let specs = self.parse_specs()?;

        let substitutions = match &self.config.substitutions {
            Some(path) => Substitutions::from_file(path, &stamper)?,
            None => Substitutions::default(),
        };

        self.output.subsection("Publishing images");
        let publisher = Publisher::new(registry.clone(), keychain.clone(), stamper, self.output.clone())
            .with_push(self.config.push)
            .with_chroot(self.config.image_chroot.clone());
        let (resolved_images, unseen) = publisher
            .publish(&specs)
            .await
            .map_err(|e| e.context("Unable to publish images"))?;
        self.output
            .step(&format!("Published {} image(s)", resolved_images.len()));

        self.output.subsection("Resolving template");
        let template = std::fs::read(&self.config.template).map_err(|e| {
            ResolverError::Io(format!(
                "unable to read template file {:?}: {}",
                self.config.template, e
            ))
        })?;
        let template = substitutions.apply(&template, &self.output);

        let policy = TagResolver::new(
            registry,
            keychain,
            ResolverState::new(resolved_images, unseen),
            self.output.clone(),
        );
        let mut resolver = DocumentResolver::new(policy);
        let resolved = resolve_stream(&template, &mut resolver)
            .await
            .map_err(|e| e.context(format!("Unable to resolve template file {:?}", self.config.template)))?;

        out.write_all(&resolved)?;
        out.flush()?;

        let documents = resolver.documents();
        let policy = resolver.into_policy();
        let stats = policy.stats();
        self.output.verbose(&format!(
            "{} document(s): {} resolved, {} cached, {} not references, {} credential failures, {} fetch failures",
            documents,
            stats.resolved,
            stats.cache_hits,
            stats.not_a_reference,
            stats.credential_failures,
            stats.fetch_failures
        ));

        self.check_unseen(policy.into_state())?;

        self.output.success(&format!(
            "Template resolved in {}",
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    fn parse_specs(&self) -> Result<Vec<ImageSpec>> {
        self.config
            .image_specs
            .iter()
            .map(|s| {
                ImageSpec::parse(s).map_err(|e| e.context(format!("Unable to parse image spec {:?}", s)))
            })
            .collect()
    }

    fn check_unseen(&self, state: ResolverState) -> Result<()> {
        if state.unseen.is_empty() {
            return Ok(());
        }
        let unseen: Vec<String> = state.unseen.into_iter().collect();
        if self.config.allow_unused_images {
            self.output.verbose(&format!(
                "Ignoring {} unused image(s): {}",
                unseen.len(),
                unseen.join(", ")
            ));
            return Ok(());
        }
        self.output.list(
            "The following images given as --image-spec were not found in the template:",
            &unseen,
        );
        self.output
            .error("--allow-unused-images can be specified to ignore this error.");
        Err(ResolverError::UnusedImages(unseen))
    }
}
