//! Tag to digest resolution
//!
//! [`TagResolver`] is the default [`StringResolver`]. It never fails: a string that is not a
//! strict image reference, or whose registry cannot be queried, is returned unchanged. Each
//! of those outcomes is logged and counted in [`ResolveStats`].

use crate::error::Result;
use crate::logging::Logger;
use crate::registry::{CredentialProvider, Reference, Registry};
use crate::resolver::document::StringResolver;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Memoized resolutions and the declared images not yet referenced
#[derive(Debug, Clone, Default)]
pub struct ResolverState {
    pub resolved_images: HashMap<String, String>,
    pub unseen: BTreeSet<String>,
}

impl ResolverState {
    pub fn new(resolved_images: HashMap<String, String>, unseen: BTreeSet<String>) -> Self {
        Self {
            resolved_images,
            unseen,
        }
    }
}

/// How each string handed to the resolver was handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub cache_hits: usize,
    pub not_a_reference: usize,
    pub credential_failures: usize,
    pub fetch_failures: usize,
    pub resolved: usize,
}

pub struct TagResolver {
    registry: Arc<dyn Registry>,
    keychain: Arc<dyn CredentialProvider>,
    state: ResolverState,
    stats: ResolveStats,
    output: Logger,
}

impl TagResolver {
    pub fn new(
        registry: Arc<dyn Registry>,
        keychain: Arc<dyn CredentialProvider>,
        state: ResolverState,
        output: Logger,
    ) -> Self {
        Self {
            registry,
            keychain,
            state,
            stats: ResolveStats::default(),
            output,
        }
    }

    pub fn state(&self) -> &ResolverState {
        &self.state
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    pub fn into_state(self) -> ResolverState {
        self.state
    }

    async fn lookup(&mut self, value: &str) -> Option<String> {
        let reference = match Reference::strict(value) {
            Ok(reference) => reference,
            Err(e) => {
                self.stats.not_a_reference += 1;
                self.output
                    .detail(&format!("Leaving {:?} unchanged: not an image reference: {}", value, e));
                return None;
            }
        };

        let credentials = match self.keychain.resolve(reference.registry_str()) {
            Ok(credentials) => credentials,
            Err(e) => {
                self.stats.credential_failures += 1;
                self.output.verbose(&format!(
                    "Leaving {} unchanged: unable to get credentials for {}: {}",
                    value,
                    reference.registry_str(),
                    e
                ));
                return None;
            }
        };

        match self.registry.fetch_descriptor(&reference, &credentials).await {
            Ok(descriptor) => Some(reference.digest_reference(&descriptor.digest)),
            Err(e) => {
                self.stats.fetch_failures += 1;
                self.output.verbose(&format!(
                    "Leaving {} unchanged: unable to fetch its manifest: {}",
                    value, e
                ));
                None
            }
        }
    }
}

#[async_trait]
impl StringResolver for TagResolver {
    async fn resolve(&mut self, value: &str) -> Result<String> {
        self.state.unseen.remove(value);

        if let Some(resolved) = self.state.resolved_images.get(value) {
            self.stats.cache_hits += 1;
            self.output
                .detail(&format!("{} resolved from cache to {}", value, resolved));
            return Ok(resolved.clone());
        }

        match self.lookup(value).await {
            Some(resolved) => {
                self.stats.resolved += 1;
                self.output
                    .verbose(&format!("Resolved {} to {}", value, resolved));
                self.state
                    .resolved_images
                    .insert(value.to_string(), resolved.clone());
                Ok(resolved)
            }
            None => Ok(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use crate::image::{Descriptor, Image};
    use crate::registry::Credentials;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRegistry {
        fetches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn push(&self, _: &Reference, _: &Image, _: &Credentials) -> Result<()> {
            Ok(())
        }

        async fn fetch_descriptor(&self, reference: &Reference, _: &Credentials) -> Result<Descriptor> {
            self.fetches.lock().unwrap().push(reference.to_string());
            if reference.repository_str().starts_with("missing") {
                return Err(ResolverError::Registry("MANIFEST_UNKNOWN".to_string()));
            }
            Ok(Descriptor {
                media_type: "application/vnd.docker.distribution.manifest.v2+json".to_string(),
                size: 10,
                digest: format!("sha256:{}", "d".repeat(64)),
            })
        }
    }

    struct Keychain;

    impl CredentialProvider for Keychain {
        fn resolve(&self, registry: &str) -> Result<Credentials> {
            if registry == "locked.example.com" {
                Err(ResolverError::Auth("helper crashed".to_string()))
            } else {
                Ok(Credentials::Anonymous)
            }
        }
    }

    fn resolver(state: ResolverState) -> (TagResolver, Arc<FakeRegistry>) {
        resolver_with(state, Logger::new_quiet())
    }

    fn resolver_with(state: ResolverState, output: Logger) -> (TagResolver, Arc<FakeRegistry>) {
        let registry = Arc::new(FakeRegistry::default());
        let resolver = TagResolver::new(registry.clone(), Arc::new(Keychain), state, output);
        (resolver, registry)
    }

    #[tokio::test]
    async fn test_resolves_and_caches() {
        let (mut r, registry) = resolver(ResolverState::default());
        let want = format!("gcr.io/foo/bar@sha256:{}", "d".repeat(64));

        assert_eq!(r.resolve("gcr.io/foo/bar:v1").await.unwrap(), want);
        assert_eq!(r.resolve("gcr.io/foo/bar:v1").await.unwrap(), want);

        assert_eq!(registry.fetches.lock().unwrap().len(), 1);
        assert_eq!(r.stats().resolved, 1);
        assert_eq!(r.stats().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_non_references_pass_through_uncached() {
        let (mut r, registry) = resolver(ResolverState::default());
        for s in ["not-an-image", "nginx:1.25", "hello world", ""] {
            assert_eq!(r.resolve(s).await.unwrap(), s);
        }
        assert!(r.state().resolved_images.is_empty());
        assert!(registry.fetches.lock().unwrap().is_empty());
        assert_eq!(r.stats().not_a_reference, 4);
    }

    #[tokio::test]
    async fn test_each_outcome_counted_separately_in_verbose_mode() {
        let (mut r, _) = resolver_with(ResolverState::default(), Logger::new(true));
        r.resolve("plain text").await.unwrap();
        r.resolve("gcr.io/missing/img:v1").await.unwrap();
        r.resolve("locked.example.com/team/app:v2").await.unwrap();
        r.resolve("gcr.io/foo/bar:v1").await.unwrap();
        r.resolve("gcr.io/foo/bar:v1").await.unwrap();

        assert_eq!(
            r.stats(),
            ResolveStats {
                cache_hits: 1,
                not_a_reference: 1,
                credential_failures: 1,
                fetch_failures: 1,
                resolved: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_failures_are_absorbed() {
        let (mut r, _) = resolver(ResolverState::default());
        assert_eq!(
            r.resolve("gcr.io/missing/img:v1").await.unwrap(),
            "gcr.io/missing/img:v1"
        );
        assert_eq!(
            r.resolve("locked.example.com/team/app:v2").await.unwrap(),
            "locked.example.com/team/app:v2"
        );
        assert!(r.state().resolved_images.is_empty());
        assert_eq!(r.stats().fetch_failures, 1);
        assert_eq!(r.stats().credential_failures, 1);
    }

    #[tokio::test]
    async fn test_unseen_tracking_and_overrides() {
        let overrides = HashMap::from([(
            "bazel/app:dev".to_string(),
            "us.gcr.io/proj/app@sha256:abc".to_string(),
        )]);
        let unseen = BTreeSet::from(["bazel/app:dev".to_string(), "bazel/other:dev".to_string()]);
        let (mut r, registry) = resolver(ResolverState::new(overrides, unseen));

        assert_eq!(
            r.resolve("bazel/app:dev").await.unwrap(),
            "us.gcr.io/proj/app@sha256:abc"
        );
        assert!(registry.fetches.lock().unwrap().is_empty());

        let state = r.into_state();
        assert_eq!(
            state.unseen.into_iter().collect::<Vec<_>>(),
            vec!["bazel/other:dev".to_string()]
        );
    }
}
