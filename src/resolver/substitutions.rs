//! Raw text substitutions applied to the template before it is decoded

use crate::error::{ResolverError, Result};
use crate::logging::Logger;
use crate::stamp::Stamper;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct SubstitutionsFile {
    #[serde(default, alias = "Substitutions")]
    substitutions: BTreeMap<String, String>,
}

/// Literal search/replace pairs, applied in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    pairs: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new(pairs: BTreeMap<String, String>) -> Self {
        Self { pairs }
    }

    /// Parse a substitutions JSON document, stamping every replacement value.
    pub fn parse(content: &[u8], stamper: &Stamper) -> Result<Self> {
        let file: SubstitutionsFile = serde_json::from_slice(content)
            .map_err(|e| ResolverError::Parse(format!("unmarshaling as JSON: {}", e)))?;
        Ok(Self {
            pairs: file
                .substitutions
                .into_iter()
                .map(|(k, v)| {
                    let stamped = stamper.stamp(&v);
                    (k, stamped)
                })
                .collect(),
        })
    }

    pub fn from_file(path: &Path, stamper: &Stamper) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| {
            ResolverError::Io(format!("unable to read file {}: {}", path.display(), e))
        })?;
        Self::parse(&content, stamper).map_err(|e| {
            e.context(format!("unable to parse substitutions file {}", path.display()))
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Replace every occurrence of each key in `template` with its value.
    pub fn apply(&self, template: &[u8], output: &Logger) -> Vec<u8> {
        let mut current = template.to_vec();
        for (search, replacement) in &self.pairs {
            if search.is_empty() {
                output.warning("Ignoring substitution with an empty search string");
                continue;
            }
            current = replace_all(&current, search.as_bytes(), replacement.as_bytes());
        }
        current
    }
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        out.extend_from_slice(&rest[..pos]);
        out.extend_from_slice(replacement);
        rest = &rest[pos + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}
