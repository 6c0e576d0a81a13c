//! Generic document tree
//!
//! [`Node`] is the in-memory shape of one decoded template document. Whole documents are
//! decoded with a fixed precedence (sequence, mapping, integer, boolean, string) so that an
//! unquoted all-digit document is an integer while a top-level float is kept as its text.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Number, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub enum Node {
    Seq(Vec<Node>),
    Map(IndexMap<Node, Node>),
    Int(i64),
    /// Integer above `i64::MAX`; only produced below the document root
    UInt(u64),
    /// Only produced below the document root
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
}

impl Node {
    /// Decode a whole document.
    pub fn from_document(value: Value) -> Node {
        match value {
            Value::Sequence(_) | Value::Mapping(_) | Value::Bool(_) | Value::String(_) => {
                Node::from_value(value)
            }
            Value::Number(n) => match n.as_i64() {
                Some(i) => Node::Int(i),
                // Not an integer: the document is taken as its text
                None => Node::Str(n.to_string()),
            },
            Value::Tagged(tagged) => Node::from_document(tagged.value),
            Value::Null => Node::Null,
        }
    }

    /// Decode a value nested inside a document.
    pub fn from_value(value: Value) -> Node {
        match value {
            Value::Sequence(items) => Node::Seq(items.into_iter().map(Node::from_value).collect()),
            Value::Mapping(mapping) => Node::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (Node::from_value(k), Node::from_value(v)))
                    .collect(),
            ),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Node::UInt(u)
                } else if n.is_f64() {
                    n.as_f64().map_or(Node::Str(n.to_string()), Node::Float)
                } else {
                    Node::Str(n.to_string())
                }
            }
            Value::Bool(b) => Node::Bool(b),
            Value::String(s) => Node::Str(s),
            Value::Tagged(tagged) => Node::from_value(tagged.value),
            Value::Null => Node::Null,
        }
    }

    pub fn to_yaml(&self) -> Value {
        match self {
            Node::Seq(items) => Value::Sequence(items.iter().map(Node::to_yaml).collect()),
            Node::Map(map) => {
                let mut mapping = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    mapping.insert(k.to_yaml(), v.to_yaml());
                }
                Value::Mapping(mapping)
            }
            Node::Int(i) => Value::Number(Number::from(*i)),
            Node::UInt(u) => Value::Number(Number::from(*u)),
            Node::Float(f) => Value::Number(Number::from(*f)),
            Node::Bool(b) => Value::Bool(*b),
            Node::Str(s) => Value::String(s.clone()),
            Node::Null => Value::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Seq(a), Node::Seq(b)) => a == b,
            (Node::Map(a), Node::Map(b)) => a == b,
            (Node::Int(a), Node::Int(b)) => a == b,
            (Node::UInt(a), Node::UInt(b)) => a == b,
            (Node::Float(a), Node::Float(b)) => a.to_bits() == b.to_bits(),
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::Str(a), Node::Str(b)) => a == b,
            (Node::Null, Node::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Node::Seq(items) => items.hash(state),
            // Map equality ignores order, so only the length is hashed
            Node::Map(map) => map.len().hash(state),
            Node::Int(i) => i.hash(state),
            Node::UInt(u) => u.hash(state),
            Node::Float(f) => f.to_bits().hash(state),
            Node::Bool(b) => b.hash(state),
            Node::Str(s) => s.hash(state),
            Node::Null => {}
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Node::Map(map) => {
                write!(f, "map[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}:{}", k, v)?;
                }
                write!(f, "]")
            }
            Node::Int(i) => write!(f, "{}", i),
            Node::UInt(u) => write!(f, "{}", u),
            Node::Float(x) => write!(f, "{}", x),
            Node::Bool(b) => write!(f, "{}", b),
            Node::Str(s) => write!(f, "{}", s),
            Node::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Node {
        Node::from_document(serde_yaml::from_str(text).unwrap())
    }

    #[test]
    fn test_document_decode_precedence() {
        assert!(matches!(doc("- a\n- b\n"), Node::Seq(ref items) if items.len() == 2));
        assert!(matches!(doc("a: 1\n"), Node::Map(ref m) if m.len() == 1));
        assert_eq!(doc("42"), Node::Int(42));
        assert_eq!(doc("true"), Node::Bool(true));
        assert_eq!(doc("hello"), Node::Str("hello".to_string()));
        assert_eq!(doc("'42'"), Node::Str("42".to_string()));
        assert_eq!(doc("1.5"), Node::Str("1.5".to_string()));
        assert_eq!(doc("~"), Node::Null);
    }

    #[test]
    fn test_nested_scalars() {
        let node = doc("replicas: 3\nratio: 0.5\nenabled: false\nname: web\nempty: null\n");
        let Node::Map(map) = node else {
            panic!("expected a mapping");
        };
        let get = |k: &str| map.get(&Node::Str(k.to_string())).cloned();
        assert_eq!(get("replicas"), Some(Node::Int(3)));
        assert_eq!(get("ratio"), Some(Node::Float(0.5)));
        assert_eq!(get("enabled"), Some(Node::Bool(false)));
        assert_eq!(get("name"), Some(Node::Str("web".to_string())));
        assert_eq!(get("empty"), Some(Node::Null));
    }

    #[test]
    fn test_large_unsigned_integers_stay_numeric() {
        let node = doc("big: 18446744073709551615\n");
        let Node::Map(map) = &node else {
            panic!("expected a mapping");
        };
        assert_eq!(
            map.get(&Node::Str("big".to_string())),
            Some(&Node::UInt(u64::MAX))
        );
        assert_eq!(
            serde_yaml::to_string(&node.to_yaml()).unwrap(),
            "big: 18446744073709551615\n"
        );
        // A whole document keeps the text form
        assert_eq!(
            doc("18446744073709551615"),
            Node::Str("18446744073709551615".to_string())
        );
    }

    #[test]
    fn test_tags_are_dropped() {
        assert_eq!(doc("!custom value"), Node::Str("value".to_string()));
    }

    #[test]
    fn test_to_yaml_keeps_shape() {
        let node = doc("a:\n  - 1\n  - x\n  - 2.5\nb: true\n");
        let back = Node::from_document(node.to_yaml());
        assert_eq!(node, back);
    }

    #[test]
    fn test_display() {
        assert_eq!(doc("[a, 1, true]").to_string(), "[a 1 true]");
        assert_eq!(doc("k: v").to_string(), "map[k:v]");
    }
}
