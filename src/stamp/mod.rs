//! Build-time variable stamping
//!
//! Workspace status files hold one `KEY VALUE` pair per line. Stamping replaces every
//! `{KEY}` placeholder in a string with the matching value.

use crate::error::{ResolverError, Result};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Stamper {
    values: BTreeMap<String, String>,
}

impl Stamper {
    /// Load stamp variables from the given files. Later files override earlier keys.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut values = BTreeMap::new();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| {
                ResolverError::Io(format!(
                    "unable to read stamp info file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            values.extend(Self::parse_status(&content));
        }
        Ok(Self { values })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn parse_status(content: &str) -> Vec<(String, String)> {
        content
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(' ') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (line.to_string(), String::new()),
            })
            .collect()
    }

    /// Substitute every known `{KEY}` in `input`. Unknown placeholders stay as they are.
    pub fn stamp(&self, input: &str) -> String {
        if self.values.is_empty() || !input.contains('{') {
            return input.to_string();
        }
        let mut out = input.to_string();
        for (key, value) in &self.values {
            let placeholder = format!("{{{}}}", key);
            if out.contains(&placeholder) {
                out = out.replace(&placeholder, value);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
