//! Image spec mini-language
//!
//! A spec is a `;` separated list of `key=value` items describing one image built by the
//! build system:
//!
//! 1. `name`: tagged name of the image, possibly containing stamp placeholders.
//! 2. `tarball`: `docker save` tarball of the image.
//! 3. `config`: JSON config file of the image.
//! 4. `digest`: files with the sha256 digests of the compressed layers.
//! 5. `diff_id`: files with the sha256 digests of the uncompressed layers.
//! 6. `compressed_layer`: paths to the compressed layer tarballs.
//! 7. `uncompressed_layer`: paths to the uncompressed layer tarballs.
//!
//! The last four are comma separated lists.

use crate::error::{ResolverError, Result};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSpec {
    pub name: String,
    pub tarball: String,
    pub config: String,
    pub digests: Vec<String>,
    pub diff_ids: Vec<String>,
    pub compressed_layers: Vec<String>,
    pub uncompressed_layers: Vec<String>,
}

impl ImageSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut result = ImageSpec::default();
        for item in spec.split(';') {
            let Some((key, value)) = item.split_once('=') else {
                return Err(ResolverError::Parse(format!(
                    "image spec item {:?} split by '=' into unexpected fields, got 1, want 2",
                    item
                )));
            };
            match key {
                "name" => result.name = value.to_string(),
                "tarball" => result.tarball = value.to_string(),
                "config" => result.config = value.to_string(),
                "digest" => result.digests = split_list(value),
                "diff_id" => result.diff_ids = split_list(value),
                "compressed_layer" => result.compressed_layers = split_list(value),
                "uncompressed_layer" => result.uncompressed_layers = split_list(value),
                other => {
                    return Err(ResolverError::Parse(format!(
                        "unknown image spec field {:?}",
                        other
                    )));
                }
            }
        }
        Ok(result)
    }

    /// Pair up the per-layer parts into `compressed,uncompressed,digest,diffID` tokens.
    pub fn layers(&self) -> Result<Vec<String>> {
        let lengths = [
            self.digests.len(),
            self.diff_ids.len(),
            self.compressed_layers.len(),
            self.uncompressed_layers.len(),
        ];
        if lengths.iter().any(|&len| len != lengths[0]) {
            return Err(ResolverError::Validation(format!(
                "digest, diffID, compressed blobs & uncompressed blobs had unequal lengths for image {}, got {}, {}, {}, {}, want all of the lengths to be equal",
                self.name, lengths[0], lengths[1], lengths[2], lengths[3]
            )));
        }

        Ok(self
            .digests
            .iter()
            .zip(&self.diff_ids)
            .zip(&self.compressed_layers)
            .zip(&self.uncompressed_layers)
            .map(|(((digest, diff_id), compressed), uncompressed)| {
                format!("{},{},{},{}", compressed, uncompressed, digest, diff_id)
            })
            .collect())
    }
}

impl FromStr for ImageSpec {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        ImageSpec::parse(s)
    }
}

// Matches strings.Split semantics: an empty value is one empty element.
fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}
