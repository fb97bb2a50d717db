use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use super::error::RemoteError;
use super::record::{id_field, RemoteId};

/// Nested id-only category tree: `{id: {child_id: {...}}}`, children in the
/// order the remote listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryTree {
    nodes: IndexMap<RemoteId, CategoryTree>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used to spell trees out by hand.
    pub fn with(mut self, id: RemoteId, subtree: CategoryTree) -> Self {
        self.insert(id, subtree);
        self
    }

    /// A repeated id replaces the earlier entry and moves to the end.
    fn insert(&mut self, id: RemoteId, subtree: CategoryTree) {
        self.nodes.shift_remove(&id);
        self.nodes.insert(id, subtree);
    }

    /// Legacy shape: `{"category_id": 1, "children": [...]}`.
    pub fn from_legacy(payload: &Value) -> Result<Self, RemoteError> {
        Self::normalize(payload, "category_id", "children")
    }

    /// REST shape: `{"id": 1, "children_data": [...]}`.
    pub fn from_rest(payload: &Value) -> Result<Self, RemoteError> {
        Self::normalize(payload, "id", "children_data")
    }

    fn normalize(payload: &Value, id_key: &str, children_key: &str) -> Result<Self, RemoteError> {
        let (id, children) = flatten(payload, id_key, children_key)?;
        Ok(Self::new().with(id, children))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: RemoteId) -> Option<&CategoryTree> {
        self.nodes.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = RemoteId> + '_ {
        self.nodes.keys().copied()
    }

    /// Every id in the tree, parents before their children.
    pub fn depth_first_ids(&self) -> Vec<RemoteId> {
        let mut out = Vec::new();
        for (id, subtree) in &self.nodes {
            out.push(*id);
            out.extend(subtree.depth_first_ids());
        }
        out
    }
}

/// Collapse one node to `(id, merged children)`. Children are merged in payload
/// order; a repeated id replaces the earlier entry.
fn flatten(
    node: &Value,
    id_key: &str,
    children_key: &str,
) -> Result<(RemoteId, CategoryTree), RemoteError> {
    let id = id_field(node, id_key)?
        .ok_or_else(|| RemoteError::Decode(format!("tree node without `{id_key}`")))?;

    let mut children = CategoryTree::new();
    if let Some(Value::Array(nodes)) = node.get(children_key) {
        for child in nodes {
            let (child_id, grandchildren) = flatten(child, id_key, children_key)?;
            children.insert(child_id, grandchildren);
        }
    }
    Ok((id, children))
}
