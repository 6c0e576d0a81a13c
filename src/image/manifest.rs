use serde::{Deserialize, Serialize};

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST_V2: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_CONFIG_V1: &str = "application/vnd.docker.container.image.v1+json";
pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
pub const OCI_MANIFEST_V1: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX_V1: &str = "application/vnd.oci.image.index.v1+json";

/// Accept header value covering every manifest flavour a tag may point to
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json";

/// Content descriptor as used in manifests and returned by manifest lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// Docker image manifest, schema version 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

impl Manifest {
    pub fn new(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Manifest {
            schema_version: 2,
            media_type: DOCKER_MANIFEST_V2.to_string(),
            config,
            layers,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != 2 {
            return Err("Unsupported schema version".to_string());
        }
        if self.config.digest.is_empty() {
            return Err("Manifest must reference a config blob".to_string());
        }
        Ok(())
    }
}

/// Content type to send when uploading raw manifest bytes
pub fn content_type_of(manifest: &[u8]) -> &'static str {
    let media_type = serde_json::from_slice::<serde_json::Value>(manifest)
        .ok()
        .and_then(|v| v.get("mediaType").and_then(|m| m.as_str()).map(str::to_string));
    match media_type.as_deref() {
        Some(OCI_MANIFEST_V1) => OCI_MANIFEST_V1,
        Some(OCI_INDEX_V1) => OCI_INDEX_V1,
        Some(DOCKER_MANIFEST_LIST_V2) => DOCKER_MANIFEST_LIST_V2,
        _ => DOCKER_MANIFEST_V2,
    }
}

/// Check the gzip magic bytes
pub fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serializes_camel_case() {
        let manifest = Manifest::new(
            Descriptor {
                media_type: DOCKER_CONFIG_V1.to_string(),
                size: 10,
                digest: "sha256:c".to_string(),
            },
            vec![],
        );
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["schemaVersion"], 2);
        assert_eq!(json["mediaType"], DOCKER_MANIFEST_V2);
        assert_eq!(json["config"]["mediaType"], DOCKER_CONFIG_V1);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_content_type_detection() {
        let oci = br#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.manifest.v1+json"}"#;
        assert_eq!(content_type_of(oci), OCI_MANIFEST_V1);
        assert_eq!(content_type_of(b"not json"), DOCKER_MANIFEST_V2);
    }

    #[test]
    fn test_is_gzipped() {
        assert!(is_gzipped(&[0x1f, 0x8b, 0x08]));
        assert!(!is_gzipped(b"ustar"));
        assert!(!is_gzipped(&[0x1f]));
    }
}
