//! Recursive document walk
//!
//! [`DocumentResolver`] rebuilds a [`Node`] tree, handing every string (map keys included)
//! to an injected [`StringResolver`]. Integers, floats, booleans and nulls are copied
//! through untouched.

use crate::error::{ResolverError, Result};
use crate::resolver::node::Node;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

/// Policy applied to each string scalar of a document
#[async_trait]
pub trait StringResolver: Send {
    async fn resolve(&mut self, value: &str) -> Result<String>;
}

pub struct DocumentResolver<S> {
    policy: S,
    documents: usize,
}

impl<S: StringResolver> DocumentResolver<S> {
    pub fn new(policy: S) -> Self {
        Self {
            policy,
            documents: 0,
        }
    }

    pub fn policy(&self) -> &S {
        &self.policy
    }

    pub fn into_policy(self) -> S {
        self.policy
    }

    /// Number of non-empty documents resolved so far
    pub fn documents(&self) -> usize {
        self.documents
    }

    pub(crate) fn record_document(&mut self) {
        self.documents += 1;
    }

    pub fn resolve_node<'a>(&'a mut self, node: &'a Node) -> BoxFuture<'a, Result<Node>> {
        async move {
            match node {
                Node::Str(s) => Ok(Node::Str(self.policy.resolve(s).await?)),
                Node::Seq(items) => {
                    let mut resolved = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        let item = self.resolve_node(item).await.map_err(|e| {
                            walk_error(
                                e,
                                format!("error resolving item {} at index {} in list", item, index),
                            )
                        })?;
                        resolved.push(item);
                    }
                    Ok(Node::Seq(resolved))
                }
                Node::Map(map) => {
                    let mut resolved = IndexMap::with_capacity(map.len());
                    for (key, value) in map {
                        let k = self.resolve_node(key).await.map_err(|e| {
                            walk_error(e, format!("error resolving key {} in map", key))
                        })?;
                        let v = self.resolve_node(value).await.map_err(|e| {
                            walk_error(e, format!("error resolving value {} in map", value))
                        })?;
                        // Keys that resolve to the same node collapse; the later pair wins.
                        resolved.insert(k, v);
                    }
                    Ok(Node::Map(resolved))
                }
                Node::Int(_) | Node::UInt(_) | Node::Float(_) | Node::Bool(_) | Node::Null => {
                    Ok(node.clone())
                }
            }
        }
        .boxed()
    }
}

fn walk_error(err: ResolverError, context: String) -> ResolverError {
    match err {
        ResolverError::Resolution(_) => err.context(context),
        other => ResolverError::Resolution(format!("{}: {}", context, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Uppercases strings and fails on "boom"
    struct Upper {
        calls: Vec<String>,
    }

    #[async_trait]
    impl StringResolver for Upper {
        async fn resolve(&mut self, value: &str) -> Result<String> {
            self.calls.push(value.to_string());
            if value == "boom" {
                return Err(ResolverError::Registry("exploded".to_string()));
            }
            Ok(value.to_uppercase())
        }
    }

    fn resolver() -> DocumentResolver<Upper> {
        DocumentResolver::new(Upper { calls: Vec::new() })
    }

    fn doc(text: &str) -> Node {
        Node::from_document(serde_yaml::from_str(text).unwrap())
    }

    #[tokio::test]
    async fn test_strings_resolved_everywhere() {
        let mut r = resolver();
        let input = doc("name: web\nports:\n  - 80\n  - http\nenabled: true\nratio: 0.5\n");
        let out = r.resolve_node(&input).await.unwrap();
        assert_eq!(
            out,
            doc("NAME: WEB\nPORTS:\n  - 80\n  - HTTP\nENABLED: true\nRATIO: 0.5\n")
        );
        // Only strings reach the policy
        assert_eq!(
            r.policy().calls,
            vec!["name", "web", "ports", "http", "enabled", "ratio"]
        );
    }

    #[tokio::test]
    async fn test_list_order_preserved() {
        let mut r = resolver();
        let out = r.resolve_node(&doc("[c, b, a]")).await.unwrap();
        assert_eq!(out, doc("[C, B, A]"));
    }

    #[tokio::test]
    async fn test_colliding_keys_last_write_wins() {
        let mut r = resolver();
        let out = r.resolve_node(&doc("a: first\nA: second\n")).await.unwrap();
        let Node::Map(map) = out else {
            panic!("expected a mapping");
        };
        assert_eq!(map.len(), 1);
        assert_eq!(
            map.get(&Node::Str("A".to_string())),
            Some(&Node::Str("SECOND".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_failure_names_item_and_index() {
        let mut r = resolver();
        let err = r.resolve_node(&doc("[ok, boom, never]")).await.unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ResolverError::Resolution(_)));
        assert!(msg.contains("item boom at index 1 in list"), "{}", msg);
        assert!(msg.contains("exploded"));
        // Aborted on the first failure
        assert_eq!(r.policy().calls, vec!["ok", "boom"]);
    }

    #[tokio::test]
    async fn test_map_failure_names_key_or_value() {
        let mut r = resolver();
        let err = r.resolve_node(&doc("boom: x\n")).await.unwrap_err();
        assert!(err.to_string().contains("error resolving key boom in map"));

        let mut r = resolver();
        let err = r
            .resolve_node(&doc("outer:\n  inner: boom\n"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("error resolving value map[inner:boom] in map"), "{}", msg);
        assert!(msg.contains("error resolving value boom in map"), "{}", msg);
    }

    #[tokio::test]
    async fn test_scalars_pass_through() {
        let mut r = resolver();
        for node in [
            Node::Int(7),
            Node::UInt(u64::MAX),
            Node::Bool(false),
            Node::Null,
            Node::Float(1.25),
        ] {
            assert_eq!(r.resolve_node(&node).await.unwrap(), node);
        }
        assert!(r.policy().calls.is_empty());
    }
}
