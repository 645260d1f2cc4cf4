//! Path-segment trie keyed by absolute route prefixes.

use std::collections::HashMap;
use std::sync::Arc;

use super::index::Route;

#[derive(Debug, Default)]
pub(crate) struct PathTrie {
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    route: Option<Arc<Route>>,
    children: HashMap<String, Node>,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl PathTrie {
    /// Insert a route under its absolute prefix. Returns `false` when the
    /// prefix is already mapped.
    pub(crate) fn put(&mut self, prefix: &str, route: Arc<Route>) -> bool {
        let mut node = &mut self.root;

        for seg in segments(prefix) {
            node = node.children.entry(seg.to_string()).or_default();
        }

        if node.route.is_some() {
            return false;
        }

        node.route = Some(route);
        true
    }

    /// Visit every stored route along `path` in root-to-leaf order.
    pub(crate) fn walk_path<'t, F>(&'t self, path: &str, mut visit: F)
    where
        F: FnMut(&'t Arc<Route>),
    {
        let mut node = &self.root;

        if let Some(route) = &node.route {
            visit(route);
        }

        for seg in segments(path) {
            match node.children.get(seg) {
                Some(child) => {
                    node = child;

                    if let Some(route) = &node.route {
                        visit(route);
                    }
                }
                None => break,
            }
        }
    }
}
