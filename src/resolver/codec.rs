//! Multi-document YAML stream codec

use crate::error::{ResolverError, Result};
use crate::resolver::document::{DocumentResolver, StringResolver};
use crate::resolver::node::Node;
use serde::Deserialize;
use serde_yaml::Value;

const DOCUMENT_SEPARATOR: &str = "---\n";

/// Decode `input` one document at a time, resolve each document and re-encode it.
/// Documents that decode to null produce no output.
pub async fn resolve_stream<S: StringResolver>(
    input: &[u8],
    resolver: &mut DocumentResolver<S>,
) -> Result<Vec<u8>> {
    let mut output = String::new();
    let mut emitted = 0usize;

    for document in serde_yaml::Deserializer::from_slice(input) {
        let value = Value::deserialize(document)?;
        let node = Node::from_document(value);

        let resolved = resolver
            .resolve_node(&node)
            .await
            .map_err(|e| e.context("error resolving YAML template"))?;
        if resolved.is_null() {
            continue;
        }

        if emitted > 0 {
            output.push_str(DOCUMENT_SEPARATOR);
        }
        output.push_str(&encode(&resolved)?);
        emitted += 1;
        resolver.record_document();
    }

    Ok(output.into_bytes())
}

pub fn encode(node: &Node) -> Result<String> {
    serde_yaml::to_string(&node.to_yaml())
        .map_err(|e| ResolverError::Parse(format!("unable to encode YAML document: {}", e)))
}
