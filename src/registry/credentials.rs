//! Registry credential lookup
//!
//! Credentials are provided through the [`CredentialProvider`] trait so the publisher and
//! the tag resolver can be driven by a substitute in tests. The default implementation,
//! [`DockerConfigKeychain`], reads the Docker CLI configuration file.

use crate::error::{ResolverError, Result};
use crate::registry::reference::DEFAULT_REGISTRY;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const DOCKER_HUB_CONFIG_KEY: &str = "https://index.docker.io/v1/";

#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Anonymous,
    Basic { username: String, password: String },
    /// Registry token sent as-is in a `Bearer` authorization header
    Bearer { token: String },
    /// OAuth2 refresh token, exchanged at the token realm for an access token
    IdentityToken { token: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Basic { username, .. } => write!(f, "Basic({}, ****)", username),
            Credentials::Bearer { .. } => write!(f, "Bearer(****)"),
            Credentials::IdentityToken { .. } => write!(f, "IdentityToken(****)"),
        }
    }
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Credentials::Anonymous)
    }
}

/// Resolves the credentials to use for a registry host
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self, registry: &str) -> Result<Credentials>;
}

/// Always anonymous; useful for public registries and tests
#[derive(Debug, Clone, Default)]
pub struct AnonymousKeychain;

impl CredentialProvider for AnonymousKeychain {
    fn resolve(&self, _registry: &str) -> Result<Credentials> {
        Ok(Credentials::Anonymous)
    }
}

/// Docker config.json format
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: HashMap<String, DockerAuth>,
    #[serde(default)]
    pub cred_helpers: HashMap<String, String>,
    #[serde(default)]
    pub creds_store: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerAuth {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub identitytoken: Option<String>,
    #[serde(default)]
    pub registrytoken: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// Credential provider backed by the Docker CLI configuration
#[derive(Debug, Clone, Default)]
pub struct DockerConfigKeychain {
    config: DockerConfig,
}

impl DockerConfigKeychain {
    /// Load from `$DOCKER_CONFIG/config.json`, falling back to `~/.docker/config.json`.
    /// A missing file yields an empty keychain.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: DockerConfig = serde_json::from_str(&content).map_err(|e| {
            ResolverError::Config(format!("invalid docker config {}: {}", path.display(), e))
        })?;
        Ok(Self { config })
    }

    pub fn from_config(config: DockerConfig) -> Self {
        Self { config }
    }

    fn config_keys(registry: &str) -> Vec<String> {
        let mut keys = vec![
            registry.to_string(),
            format!("https://{}", registry),
            format!("http://{}", registry),
        ];
        if registry == DEFAULT_REGISTRY {
            keys.insert(0, DOCKER_HUB_CONFIG_KEY.to_string());
            keys.push("docker.io".to_string());
        }
        keys
    }

    fn lookup_auth(&self, registry: &str) -> Option<&DockerAuth> {
        for key in Self::config_keys(registry) {
            if let Some(auth) = self.config.auths.get(&key) {
                return Some(auth);
            }
        }
        // Keys such as "https://gcr.io/v1/" carry a scheme and a path.
        self.config
            .auths
            .iter()
            .find(|(key, _)| host_of(key) == registry)
            .map(|(_, auth)| auth)
    }

    fn registry_helper(&self, registry: &str) -> Option<&str> {
        Self::config_keys(registry)
            .iter()
            .find_map(|key| self.config.cred_helpers.get(key))
            .map(String::as_str)
    }

    fn decode(auth: &DockerAuth) -> Result<Credentials> {
        if let Some(token) = auth.registrytoken.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Bearer {
                token: token.clone(),
            });
        }
        if let Some(token) = auth.identitytoken.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::IdentityToken {
                token: token.clone(),
            });
        }
        if let Some(encoded) = auth.auth.as_deref().filter(|a| !a.is_empty()) {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map_err(|e| ResolverError::Auth(format!("invalid base64 auth entry: {}", e)))?;
            let decoded = String::from_utf8(decoded)?;
            let (username, password) = decoded.split_once(':').ok_or_else(|| {
                ResolverError::Auth("auth entry is not of the form user:password".to_string())
            })?;
            return Ok(Credentials::basic(username, password));
        }
        match (&auth.username, &auth.password) {
            (Some(u), Some(p)) => Ok(Credentials::basic(u.clone(), p.clone())),
            _ => Ok(Credentials::Anonymous),
        }
    }

    fn run_helper(helper: &str, registry: &str) -> Result<Credentials> {
        let program = format!("docker-credential-{}", helper);
        let mut child = Command::new(&program)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ResolverError::Auth(format!("unable to run {}: {}", program, e)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.contains("credentials not found") {
                return Ok(Credentials::Anonymous);
            }
            return Err(ResolverError::Auth(format!(
                "{} failed for {}: {}",
                program,
                registry,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let response: HelperResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            ResolverError::Auth(format!("invalid output from {}: {}", program, e))
        })?;
        if response.username == "<token>" {
            Ok(Credentials::IdentityToken {
                token: response.secret,
            })
        } else {
            Ok(Credentials::basic(response.username, response.secret))
        }
    }
}

impl CredentialProvider for DockerConfigKeychain {
    // Order: per-registry credHelpers, stored auths, then the default credsStore.
    fn resolve(&self, registry: &str) -> Result<Credentials> {
        if let Some(helper) = self.registry_helper(registry) {
            return Self::run_helper(helper, registry);
        }
        if let Some(auth) = self.lookup_auth(registry) {
            let credentials = Self::decode(auth)?;
            if !credentials.is_anonymous() {
                return Ok(credentials);
            }
        }
        if let Some(store) = self.config.creds_store.as_deref() {
            return Self::run_helper(store, registry);
        }
        Ok(Credentials::Anonymous)
    }
}

fn host_of(key: &str) -> &str {
    let without_scheme = key.split_once("://").map_or(key, |(_, rest)| rest);
    without_scheme.split('/').next().unwrap_or(without_scheme)
}
