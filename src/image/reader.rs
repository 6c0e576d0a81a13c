//! Building a pushable image from the files the build system produced
//!
//! An image is either read from a `docker save` tarball, or assembled from a config file
//! and per-layer parts given as `compressed,uncompressed,digest,diffID` tokens.

use crate::error::{ResolverError, Result};
use crate::image::digest::DigestUtils;
use crate::image::manifest::{Descriptor, Manifest, DOCKER_CONFIG_V1, DOCKER_LAYER_GZIP, is_gzipped};
use crate::logging::Logger;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tar::Archive;

/// Files making up one layer. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerParts {
    pub compressed: String,
    pub uncompressed: String,
    pub digest_file: String,
    pub diff_id_file: String,
}

impl LayerParts {
    pub fn from_token(token: &str) -> Result<Self> {
        let fields: Vec<&str> = token.split(',').collect();
        if fields.len() != 4 {
            return Err(ResolverError::ImageParsing(format!(
                "layer token {:?} has {} comma separated fields, want 4",
                token,
                fields.len()
            )));
        }
        Ok(Self {
            compressed: fields[0].to_string(),
            uncompressed: fields[1].to_string(),
            digest_file: fields[2].to_string(),
            diff_id_file: fields[3].to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageParts {
    pub config: String,
    pub tarball: String,
    pub layers: Vec<LayerParts>,
}

impl ImageParts {
    pub fn from_args(config: &str, tarball: &str, layer_tokens: &[String]) -> Result<Self> {
        let layers = layer_tokens
            .iter()
            .map(|token| LayerParts::from_token(token))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config: config.to_string(),
            tarball: tarball.to_string(),
            layers,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    /// Gzip compressed layer tarball, exactly as uploaded
    pub data: Vec<u8>,
    pub digest: String,
    pub diff_id: String,
    pub media_type: String,
}

impl Layer {
    pub fn descriptor(&self) -> Descriptor {
        Descriptor {
            media_type: self.media_type.clone(),
            size: self.data.len() as u64,
            digest: self.digest.clone(),
        }
    }
}

/// A fully materialized image: config blob, layer blobs and the manifest tying them together
#[derive(Debug, Clone)]
pub struct Image {
    pub config: Vec<u8>,
    pub config_digest: String,
    pub layers: Vec<Layer>,
    manifest: Vec<u8>,
}

impl Image {
    pub fn new(config: Vec<u8>, layers: Vec<Layer>) -> Result<Self> {
        let config_digest = DigestUtils::compute_docker_digest(&config);
        let manifest = Manifest::new(
            Descriptor {
                media_type: DOCKER_CONFIG_V1.to_string(),
                size: config.len() as u64,
                digest: config_digest.clone(),
            },
            layers.iter().map(Layer::descriptor).collect(),
        );
        manifest.validate().map_err(ResolverError::ImageParsing)?;
        let manifest = serde_json::to_vec(&manifest)?;
        Ok(Self {
            config,
            config_digest,
            layers,
            manifest,
        })
    }

    /// Serialized manifest; these exact bytes are pushed and hashed.
    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }

    /// Content digest of the image, i.e. of its manifest
    pub fn digest(&self) -> String {
        DigestUtils::compute_docker_digest(&self.manifest)
    }

    pub fn total_size(&self) -> u64 {
        self.config.len() as u64 + self.layers.iter().map(|l| l.data.len() as u64).sum::<u64>()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TarballManifestEntry {
    config: String,
    #[serde(default)]
    layers: Vec<String>,
}

pub struct ImageReader {
    output: Logger,
}

impl ImageReader {
    pub fn new(output: Logger) -> Self {
        Self { output }
    }

    pub fn read_image(&self, parts: &ImageParts) -> Result<Image> {
        if parts.layers.is_empty() && !parts.tarball.is_empty() {
            return self.read_tarball(Path::new(&parts.tarball));
        }
        if parts.config.is_empty() {
            return Err(ResolverError::ImageParsing(
                "an image config is required when the image is not read from a tarball"
                    .to_string(),
            ));
        }

        let config = read_file(&parts.config, "image config")?;
        let layers = parts
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                self.read_layer(layer)
                    .map_err(|e| e.context(format!("layer {}", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        let image = Image::new(config, layers)?;
        self.output.detail(&format!(
            "Read image from parts: {} layers, {}",
            image.layers.len(),
            self.output.format_size(image.total_size())
        ));
        Ok(image)
    }

    fn read_layer(&self, parts: &LayerParts) -> Result<Layer> {
        let (compressed, uncompressed) = match (parts.compressed.is_empty(), parts.uncompressed.is_empty()) {
            (false, _) => (read_file(&parts.compressed, "compressed layer")?, None),
            (true, false) => {
                let raw = read_file(&parts.uncompressed, "uncompressed layer")?;
                (gzip(&raw)?, Some(raw))
            }
            (true, true) => {
                return Err(ResolverError::ImageParsing(
                    "layer has neither a compressed nor an uncompressed blob".to_string(),
                ));
            }
        };

        let digest = if parts.digest_file.is_empty() {
            DigestUtils::compute_docker_digest(&compressed)
        } else {
            let declared = read_digest_file(&parts.digest_file)?;
            DigestUtils::verify_data_integrity(&compressed, &declared)?;
            declared
        };

        let diff_id = if !parts.diff_id_file.is_empty() {
            read_digest_file(&parts.diff_id_file)?
        } else {
            let raw = match uncompressed {
                Some(raw) => raw,
                None if !parts.uncompressed.is_empty() => {
                    read_file(&parts.uncompressed, "uncompressed layer")?
                }
                None => gunzip(&compressed)?,
            };
            DigestUtils::compute_docker_digest(&raw)
        };

        self.output.detail(&format!(
            "Layer {} ({})",
            DigestUtils::format_digest_short(&digest),
            self.output.format_size(compressed.len() as u64)
        ));

        Ok(Layer {
            data: compressed,
            digest,
            diff_id,
            media_type: DOCKER_LAYER_GZIP.to_string(),
        })
    }

    /// Read a `docker save` tarball: `manifest.json`, the config blob and layer tars.
    pub fn read_tarball(&self, tar_path: &Path) -> Result<Image> {
        let file = File::open(tar_path).map_err(|e| {
            ResolverError::Io(format!("Failed to open tar file {}: {}", tar_path.display(), e))
        })?;
        let mut archive = Archive::new(file);
        let mut entries: HashMap<String, Vec<u8>> = HashMap::new();

        let iter = archive
            .entries()
            .map_err(|e| ResolverError::ImageParsing(format!("Failed to read tar entries: {}", e)))?;
        for entry in iter {
            let mut entry = entry
                .map_err(|e| ResolverError::ImageParsing(format!("Failed to read tar entry: {}", e)))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .map_err(|e| ResolverError::ImageParsing(format!("Invalid tar entry path: {}", e)))?
                .to_string_lossy()
                .trim_start_matches("./")
                .to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.insert(path, data);
        }

        let manifest_data = entries.get("manifest.json").ok_or_else(|| {
            ResolverError::ImageParsing(format!(
                "manifest.json not found in {}",
                tar_path.display()
            ))
        })?;
        let manifests: Vec<TarballManifestEntry> = serde_json::from_slice(manifest_data)
            .map_err(|e| ResolverError::ImageParsing(format!("Invalid manifest.json: {}", e)))?;
        let [entry] = manifests.as_slice() else {
            return Err(ResolverError::ImageParsing(format!(
                "{} must contain exactly one image, found {}",
                tar_path.display(),
                manifests.len()
            )));
        };

        let config = take_entry(&mut entries, &entry.config)?;
        let mut layers = Vec::with_capacity(entry.layers.len());
        for layer_path in &entry.layers {
            let data = take_entry(&mut entries, layer_path)?;
            let (compressed, uncompressed) = if is_gzipped(&data) {
                let raw = gunzip(&data)?;
                (data, raw)
            } else {
                (gzip(&data)?, data)
            };
            layers.push(Layer {
                digest: DigestUtils::compute_docker_digest(&compressed),
                diff_id: DigestUtils::compute_docker_digest(&uncompressed),
                data: compressed,
                media_type: DOCKER_LAYER_GZIP.to_string(),
            });
        }

        let image = Image::new(config, layers)?;
        self.output.detail(&format!(
            "Read image from {}: {} layers, {}",
            tar_path.display(),
            image.layers.len(),
            self.output.format_size(image.total_size())
        ));
        Ok(image)
    }
}

fn take_entry(entries: &mut HashMap<String, Vec<u8>>, path: &str) -> Result<Vec<u8>> {
    entries
        .remove(path.trim_start_matches("./"))
        .ok_or_else(|| ResolverError::ImageParsing(format!("{} not found in tarball", path)))
}

fn read_file(path: &str, what: &str) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| ResolverError::Io(format!("unable to read {} {}: {}", what, path, e)))
}

fn read_digest_file(path: &str) -> Result<String> {
    let content = read_file(path, "digest file")?;
    let content = String::from_utf8(content)?;
    DigestUtils::normalize_digest(&content)
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ResolverError::ImageParsing(format!("Failed to decompress layer: {}", e)))?;
    Ok(out)
}
