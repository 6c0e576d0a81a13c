//! Image description and materialization
//!
//! This module turns the textual image specs handed over by the build system into images
//! that can be pushed to a registry:
//!
//! - [`spec`] parses the `key=value;...` spec mini-language into an [`ImageSpec`].
//! - [`reader`] reads the config, layer blobs and digest files (or a `docker save`
//!   tarball) into an [`Image`] with a Docker schema 2 manifest.
//! - [`digest`] and [`manifest`] hold the shared digest helpers and manifest types.

pub mod digest;
pub mod manifest;
pub mod reader;
pub mod spec;

pub use digest::DigestUtils;
pub use manifest::{Descriptor, Manifest};
pub use reader::{Image, ImageParts, ImageReader, Layer, LayerParts};
pub use spec::ImageSpec;
