//! Case-insensitive link target resolution

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::graph::Node;

use super::types::strip_md;

/// Maps link targets to values by path first, then by name
///
/// Paths match with or without the `.md` extension. Names cover file
/// stems, titles and aliases. The first value inserted under a key wins.
#[derive(Debug, Clone)]
pub(crate) struct LinkIndex<V> {
    paths: HashMap<String, V>,
    names: HashMap<String, V>,
}

impl<V: Clone> LinkIndex<V> {
    pub(crate) fn new() -> Self {
        Self {
            paths: HashMap::new(),
            names: HashMap::new(),
        }
    }

    pub(crate) fn insert_path(&mut self, path: &str, value: V) {
        let key = normalize(path);
        self.paths
            .entry(strip_md(&key).to_string())
            .or_insert_with(|| value.clone());
        self.paths.entry(key).or_insert(value);
    }

    pub(crate) fn insert_name(&mut self, name: &str, value: V) {
        let key = normalize(name);
        if !key.is_empty() {
            self.names.entry(key).or_insert(value);
        }
    }

    pub(crate) fn resolve(&self, target: &str) -> Option<&V> {
        let key = normalize(target);
        if key.is_empty() {
            return None;
        }
        let stem = strip_md(&key);

        self.paths
            .get(&key)
            .or_else(|| self.paths.get(stem))
            .or_else(|| self.names.get(stem))
            .or_else(|| self.names.get(&key))
            .or_else(|| {
                let last = stem.rsplit('/').next().unwrap_or(stem);
                self.names.get(last)
            })
    }
}

/// Index imported nodes by `source_path` metadata, file stem, title and aliases
pub(crate) fn node_index(nodes: &[Node]) -> LinkIndex<&str> {
    let mut index = LinkIndex::new();
    for node in nodes {
        if let Some(path) = node.metadata_str("source_path") {
            index.insert_path(path, node.id.as_str());
            let stem = strip_md(path);
            index.insert_name(stem.rsplit('/').next().unwrap_or(stem), node.id.as_str());
        }
        index.insert_name(&node.title, node.id.as_str());
        if let Some(aliases) = node.metadata.get("aliases").and_then(Value::as_array) {
            for alias in aliases.iter().filter_map(Value::as_str) {
                index.insert_name(alias, node.id.as_str());
            }
        }
    }
    index
}

/// Outgoing `(target, count)` pairs recorded in a node's `links` metadata
pub(crate) fn node_links(node: &Node) -> Vec<(&str, usize)> {
    node.metadata
        .get("links")
        .and_then(Value::as_array)
        .map(|links| {
            links
                .iter()
                .filter_map(|link| {
                    let target = link.get("target")?.as_str()?;
                    let count = link.get("count").and_then(Value::as_u64).unwrap_or(1);
                    Some((target, count as usize))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn normalize(s: &str) -> String {
    s.trim()
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_by_path_stem_and_title() {
        let mut index = LinkIndex::new();
        index.insert_path("Projects/Alpha.md", 1);
        index.insert_name("Alpha", 1);
        index.insert_name("Alpha Project", 1);
        index.insert_path("Beta.md", 2);
        index.insert_name("Beta", 2);

        assert_eq!(index.resolve("projects/alpha"), Some(&1));
        assert_eq!(index.resolve("Projects/Alpha.md"), Some(&1));
        assert_eq!(index.resolve("ALPHA"), Some(&1));
        assert_eq!(index.resolve("alpha project"), Some(&1));
        assert_eq!(index.resolve("elsewhere/Beta"), Some(&2));
        assert_eq!(index.resolve("Gamma"), None);
        assert_eq!(index.resolve("  "), None);
    }

    #[test]
    fn test_first_insert_wins() {
        let mut index = LinkIndex::new();
        index.insert_name("dup", "first");
        index.insert_name("DUP", "second");
        assert_eq!(index.resolve("dup"), Some(&"first"));
    }
}
