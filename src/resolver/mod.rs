//! Template resolution
//!
//! - [`publisher`] pushes the declared images and seeds the resolution cache.
//! - [`substitutions`] applies literal text replacements to the raw template.
//! - [`codec`] decodes the template stream into [`Node`] documents and back.
//! - [`document`] walks each document and hands every string to a [`StringResolver`].
//! - [`tag`] is the default policy, turning tag references into digest references.

pub mod codec;
pub mod document;
pub mod node;
pub mod publisher;
pub mod substitutions;
pub mod tag;

pub use codec::resolve_stream;
pub use document::{DocumentResolver, StringResolver};
pub use node::Node;
pub use publisher::Publisher;
pub use substitutions::Substitutions;
pub use tag::{ResolveStats, ResolverState, TagResolver};
