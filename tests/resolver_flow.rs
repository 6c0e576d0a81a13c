//! End-to-end publish and resolve runs against an in-memory registry

use async_trait::async_trait;
use k8s_digest_resolver::cli::{ResolverConfig, Runner};
use k8s_digest_resolver::error::{ResolverError, Result};
use k8s_digest_resolver::image::{Descriptor, Image, ImageParts, ImageReader};
use k8s_digest_resolver::logging::Logger;
use k8s_digest_resolver::registry::{AnonymousKeychain, Credentials, Reference, Registry};
use k8s_digest_resolver::resolver::{
    DocumentResolver, Publisher, ResolverState, TagResolver, resolve_stream,
};
use k8s_digest_resolver::stamp::Stamper;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Registry double: records pushes and serves digests for known tags
#[derive(Default)]
struct FakeRegistry {
    remote: HashMap<String, String>,
    pushes: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeRegistry {
    fn with_remote(tags: &[(&str, &str)]) -> Self {
        Self {
            remote: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn push(&self, reference: &Reference, _image: &Image, _: &Credentials) -> Result<()> {
        self.pushes.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    async fn fetch_descriptor(&self, reference: &Reference, _: &Credentials) -> Result<Descriptor> {
        let name = reference.to_string();
        self.fetches.lock().unwrap().push(name.clone());
        match self.remote.get(&name) {
            Some(digest) => Ok(Descriptor {
                media_type: MANIFEST_V2.to_string(),
                size: 100,
                digest: digest.clone(),
            }),
            None => Err(ResolverError::Registry(format!("MANIFEST_UNKNOWN: {}", name))),
        }
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// A config-only image spec and the digest its image will have
fn config_image(dir: &Path, file: &str, name: &str) -> (String, String) {
    let config = write(dir, file, &format!(r#"{{"architecture":"amd64","os":"linux","name":"{}"}}"#, name));
    let config = config.to_str().unwrap().to_string();
    let image = ImageReader::new(Logger::new_quiet())
        .read_image(&ImageParts::from_args(&config, "", &[]).unwrap())
        .unwrap();
    (format!("name={};config={}", name, config), image.digest())
}

fn config(template: PathBuf, specs: Vec<String>) -> ResolverConfig {
    ResolverConfig {
        image_specs: specs,
        template,
        push: true,
        quiet: true,
        ..ResolverConfig::default()
    }
}

async fn run(config: ResolverConfig, registry: Arc<FakeRegistry>) -> (Result<()>, String) {
    let mut out = Vec::new();
    let result = Runner::new(config)
        .run_with(registry, Arc::new(AnonymousKeychain), &mut out)
        .await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_published_image_is_pinned() {
    let dir = TempDir::new().unwrap();
    let (spec, digest) = config_image(dir.path(), "bar.json", "gcr.io/foo/bar:v1");
    let template = write(dir.path(), "t.yaml", r#"{"image": "gcr.io/foo/bar:v1"}"#);
    let registry = Arc::new(FakeRegistry::default());

    let (result, out) = run(config(template, vec![spec]), registry.clone()).await;

    result.unwrap();
    assert_eq!(out, format!("image: gcr.io/foo/bar@{}\n", digest));
    assert_eq!(registry.pushes(), vec!["gcr.io/foo/bar:v1"]);
    // Published names never hit the registry during resolution
    assert!(registry.fetches().is_empty());
}

#[tokio::test]
async fn test_non_image_strings_untouched() {
    let dir = TempDir::new().unwrap();
    let template = write(
        dir.path(),
        "t.yaml",
        "name: not-an-image\nargs:\n  - port=8080\n  - gcr.io/unknown/img:v9\nversion: 1.2\nreplicas: 3\n",
    );
    let registry = Arc::new(FakeRegistry::default());

    let (result, out) = run(config(template, vec![]), registry.clone()).await;

    result.unwrap();
    assert_eq!(
        out,
        "name: not-an-image\nargs:\n- port=8080\n- gcr.io/unknown/img:v9\nversion: 1.2\nreplicas: 3\n"
    );
    // Only the strict reference was looked up, and its failure was absorbed
    assert_eq!(registry.fetches(), vec!["gcr.io/unknown/img:v9"]);
}

#[tokio::test]
async fn test_remote_tags_resolved_once() {
    let dir = TempDir::new().unwrap();
    let template = write(
        dir.path(),
        "t.yaml",
        "a: quay.io/team/app:1.0\n---\nb: quay.io/team/app:1.0\n",
    );
    let registry = Arc::new(FakeRegistry::with_remote(&[(
        "quay.io/team/app:1.0",
        "sha256:feed",
    )]));

    let (result, out) = run(config(template, vec![]), registry.clone()).await;

    result.unwrap();
    assert_eq!(
        out,
        "a: quay.io/team/app@sha256:feed\n---\nb: quay.io/team/app@sha256:feed\n"
    );
    assert_eq!(registry.fetches().len(), 1);
}

#[tokio::test]
async fn test_unused_images_fail_unless_allowed() {
    let dir = TempDir::new().unwrap();
    let (spec_a, digest_a) = config_image(dir.path(), "a.json", "gcr.io/proj/a:v1");
    let (spec_b, _) = config_image(dir.path(), "b.json", "gcr.io/proj/b:v1");
    let template = write(dir.path(), "t.yaml", "image: gcr.io/proj/a:v1\n");

    let (result, out) = run(
        config(template.clone(), vec![spec_a.clone(), spec_b.clone()]),
        Arc::new(FakeRegistry::default()),
    )
    .await;
    match result {
        Err(ResolverError::UnusedImages(names)) => assert_eq!(names, vec!["gcr.io/proj/b:v1"]),
        other => panic!("expected unused images error, got {:?}", other),
    }
    // The resolved stream is still written
    assert_eq!(out, format!("image: gcr.io/proj/a@{}\n", digest_a));

    let mut allowed = config(template, vec![spec_a, spec_b]);
    allowed.allow_unused_images = true;
    let (result, _) = run(allowed, Arc::new(FakeRegistry::default())).await;
    result.unwrap();
}

#[tokio::test]
async fn test_substitutions_apply_before_resolution() {
    let dir = TempDir::new().unwrap();
    let template = write(
        dir.path(),
        "t.yaml",
        "image: gcr.io/{BUILD_USER}/app:v1\nowner: \"{BUILD_USER}\"\n",
    );
    let subs = write(
        dir.path(),
        "subs.json",
        r#"{"substitutions": {"{BUILD_USER}": "alice"}}"#,
    );
    let registry = Arc::new(FakeRegistry::with_remote(&[(
        "gcr.io/alice/app:v1",
        "sha256:a11ce",
    )]));

    let mut cfg = config(template, vec![]);
    cfg.substitutions = Some(subs);
    let (result, out) = run(cfg, registry.clone()).await;

    result.unwrap();
    assert_eq!(out, "image: gcr.io/alice/app@sha256:a11ce\nowner: alice\n");
    assert_eq!(registry.fetches(), vec!["gcr.io/alice/app:v1"]);
}

#[tokio::test]
async fn test_null_documents_dropped_from_output() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "a: 1\n---\n~\n---\nb: 2\n---\n");

    let (result, out) = run(config(template, vec![]), Arc::new(FakeRegistry::default())).await;

    result.unwrap();
    assert_eq!(out, "a: 1\n---\nb: 2\n");
}

#[tokio::test]
async fn test_publish_stops_at_first_failure() {
    let dir = TempDir::new().unwrap();
    let (good, _) = config_image(dir.path(), "good.json", "gcr.io/proj/good:v1");
    let (after, _) = config_image(dir.path(), "after.json", "gcr.io/proj/after:v1");
    let bad = "name=gcr.io/proj/bad:v1;config=/nonexistent/config.json".to_string();
    let template = write(dir.path(), "t.yaml", "image: gcr.io/proj/good:v1\n");
    let registry = Arc::new(FakeRegistry::default());

    let (result, out) = run(config(template, vec![good, bad, after]), registry.clone()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, ResolverError::Publish(_)), "{:?}", err);
    assert!(err.to_string().contains("error reading image"));
    assert_eq!(registry.pushes(), vec!["gcr.io/proj/good:v1"]);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_unknown_spec_field_rejected() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "t.yaml", "a: b\n");

    let (result, _) = run(
        config(template, vec!["name=gcr.io/a/b:c;colour=blue".to_string()]),
        Arc::new(FakeRegistry::default()),
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, ResolverError::Parse(_)));
    assert!(err.to_string().contains("unknown image spec field \"colour\""));
}

#[tokio::test]
async fn test_missing_template_is_io_error() {
    let (result, _) = run(
        config(PathBuf::from("/nonexistent/template.yaml"), vec![]),
        Arc::new(FakeRegistry::default()),
    )
    .await;
    assert!(matches!(result, Err(ResolverError::Io(_))));
}

#[tokio::test]
async fn test_publisher_chroot_stamp_and_no_push() {
    let dir = TempDir::new().unwrap();
    let (spec, digest) = config_image(dir.path(), "app.json", "gcr.io/foo/{USER}:v1");
    let registry = Arc::new(FakeRegistry::default());

    let publisher = Publisher::new(
        registry.clone(),
        Arc::new(AnonymousKeychain),
        Stamper::from_pairs([("USER", "alice")]),
        Logger::new_quiet(),
    )
    .with_push(false)
    .with_chroot(Some("us.gcr.io/proj".to_string()));

    let specs = vec![spec.parse().unwrap()];
    let (overrides, unseen) = publisher.publish(&specs).await.unwrap();

    assert_eq!(
        overrides.get("gcr.io/foo/{USER}:v1"),
        Some(&format!("us.gcr.io/proj/gcr.io/foo/alice@{}", digest))
    );
    assert_eq!(unseen, BTreeSet::from(["gcr.io/foo/{USER}:v1".to_string()]));
    assert!(registry.pushes().is_empty());
}

#[tokio::test]
async fn test_unseen_set_tracks_document_usage() {
    let overrides = HashMap::from([
        ("gcr.io/p/a:v1".to_string(), "gcr.io/p/a@sha256:1".to_string()),
        ("gcr.io/p/b:v1".to_string(), "gcr.io/p/b@sha256:2".to_string()),
    ]);
    let names: BTreeSet<String> = overrides.keys().cloned().collect();
    let registry = Arc::new(FakeRegistry::default());

    // A document with none of the published names leaves the set unchanged
    let mut resolver = DocumentResolver::new(TagResolver::new(
        registry.clone(),
        Arc::new(AnonymousKeychain),
        ResolverState::new(overrides.clone(), names.clone()),
        Logger::new_quiet(),
    ));
    resolve_stream(b"x: y\n", &mut resolver).await.unwrap();
    assert_eq!(resolver.into_policy().into_state().unseen, names);

    // Referencing every name, even as map keys, empties it
    let mut resolver = DocumentResolver::new(TagResolver::new(
        registry,
        Arc::new(AnonymousKeychain),
        ResolverState::new(overrides, names),
        Logger::new_quiet(),
    ));
    let out = resolve_stream(b"gcr.io/p/a:v1:\n- gcr.io/p/b:v1\n", &mut resolver)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "gcr.io/p/a@sha256:1:\n- gcr.io/p/b@sha256:2\n"
    );
    assert!(resolver.into_policy().into_state().unseen.is_empty());
}
