//! Error types for publishing images and resolving manifest templates

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Error)]
pub enum ResolverError {
    /// Malformed image spec, substitutions file or template document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Template, substitutions or image part could not be read
    #[error("IO error: {0}")]
    Io(String),
    /// An image could not be built, authenticated or pushed
    #[error("Publish error: {0}")]
    Publish(String),
    /// A document walk failed; carries the path to the offending element
    #[error("Resolution error: {0}")]
    Resolution(String),
    #[error("Registry error: {0}")]
    Registry(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Image parsing error: {0}")]
    ImageParsing(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    /// Images declared with --image-spec that never appeared in the template
    #[error("{} image(s) given as --image-spec were not found in the template: {}", .0.len(), .0.join(", "))]
    UnusedImages(Vec<String>),
}

impl From<std::io::Error> for ResolverError {
    fn from(err: std::io::Error) -> Self {
        ResolverError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ResolverError {
    fn from(err: serde_json::Error) -> Self {
        ResolverError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ResolverError {
    fn from(err: serde_yaml::Error) -> Self {
        ResolverError::Parse(format!("YAML: {}", err))
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        ResolverError::Network(err.to_string())
    }
}

impl From<url::ParseError> for ResolverError {
    fn from(err: url::ParseError) -> Self {
        ResolverError::Validation(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for ResolverError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ResolverError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}

impl ResolverError {
    /// Prefix the message with the operation that failed, keeping the variant.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            ResolverError::Parse(msg) => ResolverError::Parse(format!("{}: {}", context, msg)),
            ResolverError::Io(msg) => ResolverError::Io(format!("{}: {}", context, msg)),
            ResolverError::Publish(msg) => ResolverError::Publish(format!("{}: {}", context, msg)),
            ResolverError::Resolution(msg) => {
                ResolverError::Resolution(format!("{}: {}", context, msg))
            }
            ResolverError::Registry(msg) => {
                ResolverError::Registry(format!("{}: {}", context, msg))
            }
            ResolverError::Auth(msg) => ResolverError::Auth(format!("{}: {}", context, msg)),
            ResolverError::Network(msg) => ResolverError::Network(format!("{}: {}", context, msg)),
            ResolverError::ImageParsing(msg) => {
                ResolverError::ImageParsing(format!("{}: {}", context, msg))
            }
            ResolverError::Validation(msg) => {
                ResolverError::Validation(format!("{}: {}", context, msg))
            }
            ResolverError::Config(msg) => ResolverError::Config(format!("{}: {}", context, msg)),
            ResolverError::UnusedImages(names) => ResolverError::UnusedImages(names),
        }
    }
}
