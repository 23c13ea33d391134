//! Lookup cache: derived name and path indices over a [`ProjectGraph`].
//!
//! The cache only stores indices. The owning graph walks its own structure
//! and calls into the cache from every mutation, so callers never observe
//! an index that disagrees with the entities. A full [`rebuild`] happens
//! once after load; everything afterwards is incremental.
//!
//! Index entries keep their id lists sorted so that an incrementally
//! maintained cache compares equal to a freshly rebuilt one.
//!
//! [`ProjectGraph`]: super::graph::ProjectGraph
//! [`rebuild`]: super::graph::ProjectGraph::rebuilt_cache

use super::model::ObjectId;
use std::collections::HashMap;

/// Kind of hierarchy node an index entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Group,
    File,
}

/// What was recorded for a node at index time, needed to evict it again.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Recorded {
    kind: NodeKind,
    path: String,
    names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupCache {
    targets: HashMap<String, ObjectId>,
    group_paths: HashMap<String, Vec<ObjectId>>,
    group_names: HashMap<String, Vec<ObjectId>>,
    file_paths: HashMap<String, Vec<ObjectId>>,
    file_names: HashMap<String, Vec<ObjectId>>,
    parents: HashMap<ObjectId, ObjectId>,
    recorded: HashMap<ObjectId, Recorded>,
}

fn insert_sorted(map: &mut HashMap<String, Vec<ObjectId>>, key: &str, id: &ObjectId) {
    let ids = map.entry(key.to_string()).or_default();
    if let Err(pos) = ids.binary_search(id) {
        ids.insert(pos, id.clone());
    }
}

fn remove_entry(map: &mut HashMap<String, Vec<ObjectId>>, key: &str, id: &ObjectId) {
    if let Some(ids) = map.get_mut(key) {
        ids.retain(|existing| existing != id);
        if ids.is_empty() {
            map.remove(key);
        }
    }
}

/// Joins a parent's hierarchical path with a child segment.
#[must_use]
pub fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else if segment.is_empty() {
        parent.to_string()
    } else {
        format!("{parent}/{segment}")
    }
}

impl LookupCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_target(&mut self, name: &str, id: &ObjectId) {
        self.targets.insert(name.to_string(), id.clone());
    }

    pub fn evict_target(&mut self, name: &str) {
        self.targets.remove(name);
    }

    /// Records a hierarchy node under its full path and lookup names.
    pub fn index_node(
        &mut self,
        kind: NodeKind,
        id: &ObjectId,
        parent: Option<&ObjectId>,
        path: String,
        mut names: Vec<String>,
    ) {
        if self.recorded.contains_key(id) {
            self.evict_node(id);
        }
        names.retain(|n| !n.is_empty());
        names.sort();
        names.dedup();

        let (paths, by_name) = match kind {
            NodeKind::Group => (&mut self.group_paths, &mut self.group_names),
            NodeKind::File => (&mut self.file_paths, &mut self.file_names),
        };
        insert_sorted(paths, &path, id);
        for name in &names {
            insert_sorted(by_name, name, id);
        }
        if let Some(parent) = parent {
            self.parents.insert(id.clone(), parent.clone());
        }
        self.recorded.insert(id.clone(), Recorded { kind, path, names });
    }

    /// Removes every entry recorded for a node. Unknown ids are ignored.
    pub fn evict_node(&mut self, id: &ObjectId) {
        let Some(recorded) = self.recorded.remove(id) else {
            return;
        };
        let (paths, by_name) = match recorded.kind {
            NodeKind::Group => (&mut self.group_paths, &mut self.group_names),
            NodeKind::File => (&mut self.file_paths, &mut self.file_names),
        };
        remove_entry(paths, &recorded.path, id);
        for name in &recorded.names {
            remove_entry(by_name, name, id);
        }
        self.parents.remove(id);
    }

    #[must_use]
    pub fn target(&self, name: &str) -> Option<&ObjectId> {
        self.targets.get(name)
    }

    /// Nodes whose full hierarchical path equals `path`.
    #[must_use]
    pub fn at_path(&self, kind: NodeKind, path: &str) -> &[ObjectId] {
        let map = match kind {
            NodeKind::Group => &self.group_paths,
            NodeKind::File => &self.file_paths,
        };
        map.get(path).map_or(&[], Vec::as_slice)
    }

    /// Nodes whose last path component equals `name`.
    #[must_use]
    pub fn named(&self, kind: NodeKind, name: &str) -> &[ObjectId] {
        let map = match kind {
            NodeKind::Group => &self.group_names,
            NodeKind::File => &self.file_names,
        };
        map.get(name).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn parent_of(&self, id: &ObjectId) -> Option<&ObjectId> {
        self.parents.get(id)
    }

    /// Full hierarchical path of an indexed node.
    #[must_use]
    pub fn path_of(&self, id: &ObjectId) -> Option<&str> {
        self.recorded.get(id).map(|r| r.path.as_str())
    }

    /// Whether the node is reachable from the main group.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.recorded.contains_key(id)
    }
}
