//! Eager trees: dotted relation paths merged into a prefix tree
//!
//! `"authors.posts"` and `"authors.ownPosts"` share the `authors` node, so the
//! `authors` relation is fetched once for both.

use std::collections::BTreeMap;

use crate::error::{ModelError, ModelResult};

/// One relation segment and the relations nested below it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EagerNode {
    children: BTreeMap<String, EagerNode>,
}

impl EagerNode {
    pub fn children(&self) -> impl Iterator<Item = (&str, &EagerNode)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn child(&self, name: &str) -> Option<&EagerNode> {
        self.children.get(name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.depth())
            .max()
            .unwrap_or(0)
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", prefix, name)
            };
            if child.is_leaf() {
                out.push(path);
            } else {
                child.collect_paths(&path, out);
            }
        }
    }
}

/// Prefix tree of relation paths to load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EagerTree {
    root: EagerNode,
}

impl EagerTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse dotted paths, merging shared prefixes
    pub fn parse<I, S>(paths: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.add_path(path.as_ref())?;
        }
        Ok(tree)
    }

    /// Add one dotted path. Empty segments are rejected.
    pub fn add_path(&mut self, path: &str) -> ModelResult<()> {
        let segments: Vec<&str> = path.split('.').map(str::trim).collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ModelError::Configuration(format!(
                "Invalid relation path '{}'",
                path
            )));
        }

        let mut node = &mut self.root;
        for segment in segments {
            node = node.children.entry(segment.to_string()).or_default();
        }
        Ok(())
    }

    pub fn root(&self) -> &EagerNode {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    /// Length of the longest path
    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Leaf paths in sorted order
    pub fn paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_paths("", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_prefixes_merge() {
        let tree = EagerTree::parse(["authors.posts", "authors.ownPosts", "meta"]).unwrap();
        assert_eq!(tree.root().children().count(), 2);
        let authors = tree.root().child("authors").unwrap();
        assert_eq!(authors.children().count(), 2);
        assert_eq!(tree.depth(), 2);
        assert_eq!(
            tree.paths(),
            vec!["authors.ownPosts", "authors.posts", "meta"]
        );
    }

    #[test]
    fn test_duplicate_paths_collapse() {
        let tree = EagerTree::parse(["authors", "authors", "authors.posts"]).unwrap();
        assert_eq!(tree.paths(), vec!["authors.posts"]);
    }

    #[test]
    fn test_empty_segment_rejected() {
        assert!(matches!(
            EagerTree::parse(["authors..posts"]),
            Err(ModelError::Configuration(_))
        ));
        assert!(EagerTree::parse([""]).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let tree = EagerTree::parse(Vec::<String>::new()).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
    }
}
