//! Tagged image references
//!
//! `Strict` validation accepts only fully spelled out references
//! (`registry/repository:tag`) and is used to decide whether an arbitrary string in a
//! template is an image at all. `Weak` validation fills in Docker defaults and is used for
//! names the user explicitly declared as images.

use crate::error::{ResolverError, Result};
use std::fmt;

pub const DEFAULT_REGISTRY: &str = "index.docker.io";
pub const DEFAULT_TAG: &str = "latest";
const DOCKER_HUB_API: &str = "registry-1.docker.io";

const REPOSITORY_CHARS: &str = "abcdefghijklmnopqrstuvwxyz0123456789_-./";
const TAG_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Strict,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    registry: String,
    repository: String,
    tag: String,
}

impl Reference {
    pub fn parse(name: &str, validation: Validation) -> Result<Self> {
        let strict = validation == Validation::Strict;

        let (base, tag) = match name.rsplit_once(':') {
            Some((base, tag)) if !tag.contains('/') => (base, tag),
            _ => (name, ""),
        };
        if !tag.is_empty() || strict {
            check_element("tag", tag, TAG_CHARS, 1, 128)?;
        }
        let tag = if tag.is_empty() { DEFAULT_TAG } else { tag };

        let (registry, repository) = match base.split_once('/') {
            Some((host, rest)) if host.contains('.') || host.contains(':') || host == "localhost" => {
                (host, rest)
            }
            _ => ("", base),
        };
        check_element("repository", repository, REPOSITORY_CHARS, 2, 255)?;

        if registry.is_empty() && strict {
            return Err(bad_name(
                "strict validation requires the registry to be explicitly defined",
            ));
        }
        let registry = match registry {
            "" | "docker.io" => DEFAULT_REGISTRY,
            other => other,
        };
        check_registry(registry)?;

        if strict && registry == DEFAULT_REGISTRY && !repository.contains('/') {
            return Err(bad_name(
                "strict validation requires the full repository path (missing 'library')",
            ));
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn strict(name: &str) -> Result<Self> {
        Self::parse(name, Validation::Strict)
    }

    pub fn weak(name: &str) -> Result<Self> {
        Self::parse(name, Validation::Weak)
    }

    pub fn registry_str(&self) -> &str {
        &self.registry
    }

    pub fn repository_str(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// `registry/repository@digest`
    pub fn digest_reference(&self, digest: &str) -> String {
        format!("{}/{}@{}", self.registry, self.repository, digest)
    }

    /// Base URL of the registry's HTTP API
    pub fn api_base(&self) -> String {
        if self.registry == DEFAULT_REGISTRY {
            return format!("https://{}", DOCKER_HUB_API);
        }
        format!("{}://{}", self.scheme(), self.registry)
    }

    fn scheme(&self) -> &'static str {
        let host = self
            .registry
            .rsplit_once(':')
            .filter(|(_, port)| port.chars().all(|c| c.is_ascii_digit()))
            .map_or(self.registry.as_str(), |(host, _)| host);
        if host == "localhost"
            || host == "127.0.0.1"
            || host == "[::1]"
            || host.ends_with(".localhost")
            || host.ends_with(".local")
        {
            "http"
        } else {
            "https"
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

/// Place `name` under the `chroot` repository prefix.
pub fn join_chroot(chroot: &str, name: &str) -> String {
    let chroot = chroot.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if chroot.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", chroot, name)
    }
}

fn bad_name(message: &str) -> ResolverError {
    ResolverError::Validation(message.to_string())
}

fn check_element(kind: &str, value: &str, allowed: &str, min: usize, max: usize) -> Result<()> {
    if value.len() < min || value.len() > max {
        return Err(ResolverError::Validation(format!(
            "invalid {} {:?}: must be between {} and {} characters",
            kind, value, min, max
        )));
    }
    if let Some(c) = value.chars().find(|c| !allowed.contains(*c)) {
        return Err(ResolverError::Validation(format!(
            "invalid {} {:?}: character {:?} is not allowed",
            kind, value, c
        )));
    }
    Ok(())
}

fn check_registry(registry: &str) -> Result<()> {
    let (host, port) = if let Some(rest) = registry.strip_prefix('[') {
        match rest.split_once(']') {
            Some((_, tail)) => (registry, tail.strip_prefix(':')),
            None => return Err(bad_name("invalid registry: unterminated IPv6 address")),
        }
    } else {
        match registry.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (registry, None),
        }
    };
    let host_ok = host.starts_with('[')
        || (!host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if host_ok && port_ok {
        Ok(())
    } else {
        Err(ResolverError::Validation(format!(
            "invalid registry {:?}",
            registry
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_full_reference() {
        let r = Reference::strict("gcr.io/foo/bar:v1").unwrap();
        assert_eq!(r.registry_str(), "gcr.io");
        assert_eq!(r.repository_str(), "foo/bar");
        assert_eq!(r.tag(), "v1");
        assert_eq!(r.to_string(), "gcr.io/foo/bar:v1");
        assert_eq!(
            r.digest_reference("sha256:abc"),
            "gcr.io/foo/bar@sha256:abc"
        );
    }

    #[test]
    fn test_strict_rejects_non_images() {
        for s in [
            "not-an-image",
            "nginx:1.25",
            "gcr.io/foo/bar",
            "docker.io/ubuntu:22.04",
            "gcr.io/Foo/bar:v1",
            "gcr.io/foo/bar:",
            "http://example.com/path",
            "some text with spaces",
            "gcr.io/foo/bar@sha256:abcd",
            "",
        ] {
            assert!(Reference::strict(s).is_err(), "{:?} should not parse", s);
        }
    }

    #[test]
    fn test_strict_registry_with_port() {
        let r = Reference::strict("localhost:5000/app:dev").unwrap();
        assert_eq!(r.registry_str(), "localhost:5000");
        assert_eq!(r.repository_str(), "app");
        assert_eq!(r.api_base(), "http://localhost:5000");
    }

    #[test]
    fn test_weak_defaults() {
        let r = Reference::weak("ubuntu").unwrap();
        assert_eq!(r.registry_str(), "index.docker.io");
        assert_eq!(r.repository_str(), "ubuntu");
        assert_eq!(r.tag(), "latest");
        assert_eq!(r.api_base(), "https://registry-1.docker.io");

        let r = Reference::weak("docker.io/library/ubuntu:22.04").unwrap();
        assert_eq!(r.registry_str(), "index.docker.io");
        assert_eq!(r.tag(), "22.04");
    }

    #[test]
    fn test_api_base_https_for_remote() {
        let r = Reference::strict("us.gcr.io/proj/img:tag").unwrap();
        assert_eq!(r.api_base(), "https://us.gcr.io");
        let r = Reference::strict("127.0.0.1:8080/proj/img:tag").unwrap();
        assert_eq!(r.api_base(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_join_chroot() {
        assert_eq!(
            join_chroot("us.gcr.io/proj/chroot/", "gcr.io/foo/bar:v1"),
            "us.gcr.io/proj/chroot/gcr.io/foo/bar:v1"
        );
        assert_eq!(join_chroot("", "gcr.io/a/b:c"), "gcr.io/a/b:c");
    }
}
