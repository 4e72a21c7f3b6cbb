//! Hierarchical label-indexed record cache.
//!
//! Names are stored as reversed label paths (`web.default.svc.cluster.local`
//! lives under `local -> cluster -> svc -> default -> web`), so a wildcard
//! query is a plain descent instead of a prefix scan over a flat map.
//!
//! The tree carries no lock of its own; [`crate::resolver::ClusterDns`] wraps
//! it in a reader-writer lock and serializes all mutation.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::records::DnsRecord;

/// One node of the cache: child nodes and terminal entries, both label-keyed.
#[derive(Debug, Default, Serialize)]
pub struct TreeCache {
    children: HashMap<String, TreeCache>,
    entries: HashMap<String, Arc<DnsRecord>>,
}

impl TreeCache {
    /// Create an empty cache node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` in the node at `path`, creating intermediate
    /// nodes as needed.
    pub fn set_entry(&mut self, key: &str, value: Arc<DnsRecord>, path: &[&str]) {
        let node = self.ensure_node(path);
        node.entries.insert(key.to_string(), value);
    }

    /// Graft `sub` as the child `key` of the node at `path`, replacing any
    /// existing child wholesale. Intermediate nodes are created as needed.
    pub fn set_sub_cache(&mut self, key: &str, sub: TreeCache, path: &[&str]) {
        let node = self.ensure_node(path);
        node.children.insert(key.to_string(), sub);
    }

    /// Fetch the entry stored under `key` in the node at `path`.
    pub fn get_entry(&self, key: &str, path: &[&str]) -> Option<Arc<DnsRecord>> {
        self.node(path)
            .and_then(|node| node.entries.get(key))
            .map(Arc::clone)
    }

    /// Remove the final path component: its child subtree and any same-keyed
    /// entry on the parent node. Returns whether anything was removed.
    pub fn delete_path(&mut self, path: &[&str]) -> bool {
        let Some((leaf, prefix)) = path.split_last() else {
            return false;
        };
        let Some(parent) = self.node_mut(prefix) else {
            return false;
        };
        let removed_child = parent.children.remove(*leaf).is_some();
        let removed_entry = parent.entries.remove(*leaf).is_some();
        removed_child || removed_entry
    }

    /// Collect the records matched by `path`, where a `"*"` label matches any
    /// child at that level.
    ///
    /// The walk keeps a frontier of candidate nodes. The final label is
    /// special: a literal first selects a same-named entry on the frontier
    /// node and only descends into a same-named child when no entry matches,
    /// while `"*"` keeps the frontier node itself. Once the path is consumed,
    /// the frontier nodes' own entries are the result; deeper descendants
    /// (e.g. SRV entries below a service node) are not drained.
    pub fn values_for_path_with_wildcards(&self, path: &[&str]) -> Vec<Arc<DnsRecord>> {
        let mut found = Vec::new();
        let mut frontier: Vec<&TreeCache> = vec![self];

        for (idx, label) in path.iter().enumerate() {
            let last = idx == path.len() - 1;
            let mut next = Vec::new();
            for node in frontier {
                if *label == "*" {
                    if last {
                        next.push(node);
                    } else {
                        next.extend(node.children.values());
                    }
                } else if last {
                    if let Some(value) = node.entries.get(*label) {
                        found.push(Arc::clone(value));
                    } else if let Some(child) = node.children.get(*label) {
                        next.push(child);
                    }
                } else if let Some(child) = node.children.get(*label) {
                    next.push(child);
                }
            }
            frontier = next;
        }

        for node in frontier {
            found.extend(node.entries.values().map(Arc::clone));
        }
        found
    }

    /// Render the whole tree as pretty-printed JSON.
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total number of entries in this node and all descendants.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
            + self
                .children
                .values()
                .map(TreeCache::entry_count)
                .sum::<usize>()
    }

    fn node(&self, path: &[&str]) -> Option<&TreeCache> {
        let mut node = self;
        for label in path {
            node = node.children.get(*label)?;
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &[&str]) -> Option<&mut TreeCache> {
        let mut node = self;
        for label in path {
            node = node.children.get_mut(*label)?;
        }
        Some(node)
    }

    fn ensure_node(&mut self, path: &[&str]) -> &mut TreeCache {
        let mut node = self;
        for label in path {
            node = node.children.entry(label.to_string()).or_default();
        }
        node
    }
}
