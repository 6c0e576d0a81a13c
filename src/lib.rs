//! Kubernetes template digest resolver
//!
//! Publishes locally built images and rewrites the image tags referenced by a YAML template
//! into immutable `registry/repository@sha256:...` references.

pub mod cli;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod stamp;

pub use error::{ResolverError, Result};
pub use logging::Logger;
