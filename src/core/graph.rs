//! `ProjectGraph` - the in-memory project object graph.
//!
//! Every mutation checks all of its preconditions before touching state, so
//! a failed call leaves the graph (and its lookup cache) exactly as it was.
//! The lookup cache is updated inside the same call as the entity change.

use super::cache::{join_path, LookupCache, NodeKind};
use super::error::{PbxError, Result};
use super::model::{
    BuildFile, BuildPhase, Child, FileReference, Group, ObjectId, PhaseKind, PhaseKindTag,
    ProductType, SourceTree, Target,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// How `add_build_file` picks the phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseSelector {
    /// A specific phase of the target.
    Id(ObjectId),
    /// The target's first phase of this kind.
    Kind(PhaseKindTag),
    /// Derived from the file's extension.
    Auto,
}

/// Result of adding a file to a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "build_file", rename_all = "snake_case")]
pub enum BuildFileOutcome {
    Added(ObjectId),
    /// The phase already references this file; the existing entry is returned.
    AlreadyPresent(ObjectId),
}

impl BuildFileOutcome {
    #[must_use]
    pub const fn id(&self) -> &ObjectId {
        match self {
            Self::Added(id) | Self::AlreadyPresent(id) => id,
        }
    }
}

/// The project object graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectGraph {
    /// Project name.
    pub name: String,
    main_group: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    products_group: Option<ObjectId>,
    /// Targets in declaration order.
    #[serde(default)]
    target_order: Vec<ObjectId>,
    #[serde(default)]
    targets: BTreeMap<ObjectId, Target>,
    #[serde(default)]
    groups: BTreeMap<ObjectId, Group>,
    #[serde(default)]
    file_refs: BTreeMap<ObjectId, FileReference>,
    #[serde(default)]
    phases: BTreeMap<ObjectId, BuildPhase>,
    #[serde(default)]
    build_files: BTreeMap<ObjectId, BuildFile>,
    #[serde(skip)]
    cache: LookupCache,
}

impl PartialEq for ProjectGraph {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.main_group == other.main_group
            && self.products_group == other.products_group
            && self.target_order == other.target_order
            && self.targets == other.targets
            && self.groups == other.groups
            && self.file_refs == other.file_refs
            && self.phases == other.phases
            && self.build_files == other.build_files
    }
}

impl Eq for ProjectGraph {}

impl ProjectGraph {
    /// Creates an empty project with a main group and a Products group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let main_id = ObjectId::generate();
        let products_id = ObjectId::generate();

        let mut main = Group {
            name: None,
            path: None,
            source_tree: SourceTree::Group,
            children: Vec::new(),
        };
        main.children.push(Child::Group(products_id.clone()));

        let mut groups = BTreeMap::new();
        groups.insert(main_id.clone(), main);
        groups.insert(products_id.clone(), Group::named("Products"));

        let mut graph = Self {
            name: name.into(),
            main_group: main_id,
            products_group: Some(products_id),
            target_order: Vec::new(),
            targets: BTreeMap::new(),
            groups,
            file_refs: BTreeMap::new(),
            phases: BTreeMap::new(),
            build_files: BTreeMap::new(),
            cache: LookupCache::new(),
        };
        graph.cache = graph.rebuilt_cache();
        graph
    }

    /// Checks a decoded graph for structural soundness and builds its cache.
    ///
    /// # Errors
    /// Returns a `malformed_project` codec error if the main group is missing,
    /// a group lists a child that does not exist, the group hierarchy is not
    /// a tree, or targets point at missing phases or targets.
    pub fn prepare(mut self) -> Result<Self> {
        self.check_structure().map_err(|reason| {
            PbxError::codec(
                "malformed_project",
                format!("Project structure is malformed: {reason}"),
                "graph:prepare",
            )
        })?;
        self.cache = self.rebuilt_cache();
        Ok(self)
    }

    fn check_structure(&self) -> std::result::Result<(), String> {
        if !self.groups.contains_key(&self.main_group) {
            return Err(format!("main group {} does not exist", self.main_group));
        }

        let mut parent_count: HashMap<&ObjectId, usize> = HashMap::new();
        for (group_id, group) in &self.groups {
            for child in &group.children {
                match child {
                    Child::Group(id) if self.groups.contains_key(id) => {
                        *parent_count.entry(id).or_default() += 1;
                    }
                    Child::File(id) if self.file_refs.contains_key(id) => {}
                    Child::Group(id) | Child::File(id) => {
                        return Err(format!("group {group_id} lists missing child {id}"));
                    }
                }
            }
        }
        if parent_count.contains_key(&self.main_group) {
            return Err("main group has a parent".to_string());
        }
        if let Some((id, _)) = parent_count.iter().find(|(_, count)| **count > 1) {
            return Err(format!("group {id} has more than one parent"));
        }
        if let Some(id) = self.groups.keys().find(|id| self.group_has_cycle(id)) {
            return Err(format!("group {id} is its own ancestor"));
        }

        let declared: HashSet<&ObjectId> = self.target_order.iter().collect();
        if declared.len() != self.target_order.len()
            || declared.len() != self.targets.len()
            || self.targets.keys().any(|id| !declared.contains(id))
        {
            return Err("target list does not match target objects".to_string());
        }

        let mut names = HashSet::new();
        for target in self.targets.values() {
            if !names.insert(target.name.as_str()) {
                return Err(format!("target name '{}' is used twice", target.name));
            }
            if let Some(phase) = target.phases.iter().find(|p| !self.phases.contains_key(*p)) {
                return Err(format!("target '{}' lists missing phase {phase}", target.name));
            }
            if let Some(dep) = target
                .dependencies
                .iter()
                .find(|d| !self.targets.contains_key(*d))
            {
                return Err(format!(
                    "target '{}' depends on missing target {dep}",
                    target.name
                ));
            }
        }
        Ok(())
    }

    /// Checks whether a group can reach itself through its children using DFS.
    fn group_has_cycle(&self, start: &ObjectId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<&ObjectId> = self.child_groups(start).collect();
        while let Some(node) = stack.pop() {
            if node == start {
                return true;
            }
            if visited.insert(node) {
                stack.extend(self.child_groups(node));
            }
        }
        false
    }

    fn child_groups<'a>(&'a self, id: &ObjectId) -> impl Iterator<Item = &'a ObjectId> + 'a {
        self.groups
            .get(id)
            .into_iter()
            .flat_map(|g| g.children.iter())
            .filter_map(|c| match c {
                Child::Group(id) => Some(id),
                Child::File(_) => None,
            })
    }

    /// Builds the lookup cache from scratch.
    #[must_use]
    pub fn rebuilt_cache(&self) -> LookupCache {
        let mut cache = LookupCache::new();
        for (id, target) in &self.targets {
            cache.index_target(&target.name, id);
        }
        self.index_subtree(&mut cache, &self.main_group, None, "");
        cache
    }

    fn index_subtree(
        &self,
        cache: &mut LookupCache,
        id: &ObjectId,
        parent: Option<&ObjectId>,
        parent_path: &str,
    ) {
        let Some(group) = self.groups.get(id) else {
            return;
        };
        // The main group has no path segment of its own.
        let path = if parent.is_some() {
            join_path(parent_path, group.display_name())
        } else {
            String::new()
        };
        cache.index_node(
            NodeKind::Group,
            id,
            parent,
            path.clone(),
            vec![group.display_name().to_string()],
        );

        for child in &group.children {
            match child {
                Child::Group(child_id) => {
                    if !cache.contains(child_id) {
                        self.index_subtree(cache, child_id, Some(id), &path);
                    }
                }
                Child::File(file_id) => {
                    if let Some(file) = self.file_refs.get(file_id) {
                        cache.index_node(
                            NodeKind::File,
                            file_id,
                            Some(id),
                            join_path(&path, file.display_name()),
                            file_lookup_names(file),
                        );
                    }
                }
            }
        }
    }

    fn evict_subtree(&mut self, id: &ObjectId) {
        let mut stack = vec![id.clone()];
        while let Some(node) = stack.pop() {
            if let Some(group) = self.groups.get(&node) {
                stack.extend(group.children.iter().map(|c| c.id().clone()));
            }
            self.cache.evict_node(&node);
        }
    }

    fn reindex_subtree(&mut self, id: &ObjectId) {
        self.evict_subtree(id);
        let Some(parent) = self.find_parent(id) else {
            return;
        };
        let Some(parent_path) = self.cache.path_of(&parent).map(str::to_string) else {
            return;
        };
        let mut cache = std::mem::take(&mut self.cache);
        if self.groups.contains_key(id) {
            self.index_subtree(&mut cache, id, Some(&parent), &parent_path);
        } else if let Some(file) = self.file_refs.get(id) {
            cache.index_node(
                NodeKind::File,
                id,
                Some(&parent),
                join_path(&parent_path, file.display_name()),
                file_lookup_names(file),
            );
        }
        self.cache = cache;
    }

    // ----- read access -----

    #[must_use]
    pub const fn main_group(&self) -> &ObjectId {
        &self.main_group
    }

    /// The Products group, if it is declared and exists.
    #[must_use]
    pub fn products_group(&self) -> Option<&ObjectId> {
        self.products_group
            .as_ref()
            .filter(|id| self.groups.contains_key(*id))
    }

    #[must_use]
    pub const fn cache(&self) -> &LookupCache {
        &self.cache
    }

    #[must_use]
    pub fn target(&self, id: &ObjectId) -> Option<&Target> {
        self.targets.get(id)
    }

    /// Targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = (&ObjectId, &Target)> {
        self.target_order
            .iter()
            .filter_map(|id| self.targets.get_key_value(id))
    }

    /// Looks a target up by name.
    ///
    /// # Errors
    /// Returns `target_not_found` if no target has this name.
    pub fn target_id(&self, name: &str) -> Result<ObjectId> {
        self.cache
            .target(name)
            .cloned()
            .ok_or_else(|| PbxError::not_found("target_not_found", name, "graph:target"))
    }

    #[must_use]
    pub fn target_by_name(&self, name: &str) -> Option<(&ObjectId, &Target)> {
        self.cache
            .target(name)
            .and_then(|id| self.targets.get_key_value(id))
    }

    #[must_use]
    pub fn group(&self, id: &ObjectId) -> Option<&Group> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&ObjectId, &Group)> {
        self.groups.iter()
    }

    #[must_use]
    pub fn file_ref(&self, id: &ObjectId) -> Option<&FileReference> {
        self.file_refs.get(id)
    }

    pub fn file_refs(&self) -> impl Iterator<Item = (&ObjectId, &FileReference)> {
        self.file_refs.iter()
    }

    #[must_use]
    pub fn phase(&self, id: &ObjectId) -> Option<&BuildPhase> {
        self.phases.get(id)
    }

    /// Phases of a target in build order.
    pub fn phases_of<'a>(
        &'a self,
        target: &'a Target,
    ) -> impl Iterator<Item = (&'a ObjectId, &'a BuildPhase)> + 'a {
        target
            .phases
            .iter()
            .filter_map(|id| self.phases.get_key_value(id))
    }

    #[must_use]
    pub fn build_file(&self, id: &ObjectId) -> Option<&BuildFile> {
        self.build_files.get(id)
    }

    /// Parent group of an indexed node.
    #[must_use]
    pub fn parent_of(&self, id: &ObjectId) -> Option<&ObjectId> {
        self.cache.parent_of(id)
    }

    /// Full hierarchical path of a node reachable from the main group.
    #[must_use]
    pub fn full_path(&self, id: &ObjectId) -> Option<&str> {
        self.cache.path_of(id)
    }

    /// Product references, whether grouped or not.
    pub fn products(&self) -> impl Iterator<Item = (&ObjectId, &FileReference)> {
        self.file_refs.iter().filter(|(_, f)| f.is_product())
    }

    /// Target whose product is `product`.
    #[must_use]
    pub fn owner_of_product(&self, product: &ObjectId) -> Option<&ObjectId> {
        self.target_order
            .iter()
            .find(|id| {
                self.targets
                    .get(*id)
                    .is_some_and(|t| t.product.as_ref() == Some(product))
            })
    }

    /// The target's product, if it exists in the graph.
    #[must_use]
    pub fn live_product<'a>(&self, target: &'a Target) -> Option<&'a ObjectId> {
        target
            .product
            .as_ref()
            .filter(|id| self.file_refs.contains_key(*id))
    }

    /// The target's product, unless an earlier target in declaration order
    /// claims the same reference.
    #[must_use]
    pub fn owned_product(&self, target: &ObjectId) -> Option<&ObjectId> {
        let product = self.live_product(self.targets.get(target)?)?;
        (self.owner_of_product(product) == Some(target)).then_some(product)
    }

    /// Target that lists `phase` among its phases.
    #[must_use]
    pub fn target_of_phase(&self, phase: &ObjectId) -> Option<&ObjectId> {
        self.target_order.iter().find(|id| {
            self.targets
                .get(*id)
                .is_some_and(|t| t.phases.contains(phase))
        })
    }

    /// Parent group of any node, including nodes that are not reachable.
    fn find_parent(&self, id: &ObjectId) -> Option<ObjectId> {
        if let Some(parent) = self.cache.parent_of(id) {
            return Some(parent.clone());
        }
        self.groups
            .iter()
            .find(|(_, g)| g.children.iter().any(|c| c.id() == id))
            .map(|(gid, _)| gid.clone())
    }

    /// Whether `node` is `ancestor` or lies below it.
    fn is_within(&self, node: &ObjectId, ancestor: &ObjectId) -> bool {
        let mut current = Some(node.clone());
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if &id == ancestor {
                return true;
            }
            if !seen.insert(id.clone()) {
                return false;
            }
            current = self.find_parent(&id);
        }
        false
    }

    fn require_group(&self, id: &ObjectId, origin: &str) -> Result<()> {
        if self.groups.contains_key(id) {
            Ok(())
        } else {
            Err(PbxError::not_found("group_not_found", id.as_str(), origin))
        }
    }

    fn require_target(&self, id: &ObjectId, origin: &str) -> Result<&Target> {
        self.targets
            .get(id)
            .ok_or_else(|| PbxError::not_found("target_not_found", id.as_str(), origin))
    }

    // ----- targets -----

    /// Adds a target with its default phases and, when typed, its product.
    ///
    /// # Errors
    /// Returns `target_exists` if the name is taken.
    pub fn add_target(
        &mut self,
        name: impl Into<String>,
        product_type: Option<ProductType>,
    ) -> Result<ObjectId> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PbxError::invalid_state(
                "empty_target_name",
                "Target name cannot be empty",
                "graph:add_target",
            ));
        }
        if self.cache.target(&name).is_some() {
            return Err(PbxError::duplicate(
                "target_exists",
                format!("Target '{name}' already exists"),
                "graph:add_target",
            )
            .with_context("target", name));
        }
        if let Some(product_name) = product_type.map(|ty| ty.default_product_name(&name)) {
            if self.product_name_taken(&product_name) {
                return Err(PbxError::duplicate(
                    "product_exists",
                    format!("A product named '{product_name}' already exists"),
                    "graph:add_target",
                )
                .with_hint("Remove or link the existing product first"));
            }
        }

        let id = ObjectId::generate();
        let mut target = Target::new(name.clone(), product_type);
        for kind in product_type.map(ProductType::default_phases).unwrap_or_default() {
            let phase_id = ObjectId::generate();
            self.phases.insert(phase_id.clone(), BuildPhase::new(kind));
            target.phases.push(phase_id);
        }
        self.targets.insert(id.clone(), target);
        self.target_order.push(id.clone());
        self.cache.index_target(&name, &id);

        if product_type.is_some() {
            self.ensure_products_group();
            self.create_product(&id, None, None)?;
        }

        debug!(target = %name, id = %id, "added target");
        Ok(id)
    }

    /// Removes a target together with its phases, build files, product and
    /// every dependency edge pointing at it. A product another target also
    /// links to is kept.
    ///
    /// # Errors
    /// Returns `target_not_found` if the target does not exist.
    pub fn remove_target(&mut self, id: &ObjectId) -> Result<Target> {
        let Some(target) = self.targets.remove(id) else {
            return Err(PbxError::not_found("target_not_found", id.as_str(), "graph:remove_target"));
        };

        for phase_id in &target.phases {
            if let Some(phase) = self.phases.remove(phase_id) {
                for bf in &phase.files {
                    self.build_files.remove(bf);
                }
            }
        }
        if let Some(product) = &target.product {
            let shared = self
                .targets
                .values()
                .any(|t| t.product.as_ref() == Some(product));
            if self.file_refs.contains_key(product) && !shared {
                self.delete_file_ref(product);
            }
        }
        for other in self.targets.values_mut() {
            other.dependencies.retain(|d| d != id);
        }
        self.target_order.retain(|t| t != id);
        self.cache.evict_target(&target.name);

        debug!(target = %target.name, "removed target");
        Ok(target)
    }

    /// Adds a dependency edge `from -> to`.
    ///
    /// # Errors
    /// Returns an error if either target is missing, the edge exists, or the
    /// edge would create a cycle.
    pub fn add_dependency(&mut self, from: &ObjectId, to: &ObjectId) -> Result<()> {
        let origin = "graph:add_dependency";
        let from_name = self.require_target(from, origin)?.name.clone();
        let to_name = self.require_target(to, origin)?.name.clone();

        if from == to {
            return Err(PbxError::invalid_state(
                "self_dependency",
                format!("Target '{from_name}' cannot depend on itself"),
                origin,
            ));
        }
        if self.targets[from].dependencies.contains(to) {
            return Err(PbxError::duplicate(
                "dependency_exists",
                format!("'{from_name}' already depends on '{to_name}'"),
                origin,
            ));
        }
        if self.depends_on(to, from) {
            return Err(PbxError::invalid_state(
                "dependency_cycle",
                format!("'{to_name}' already depends on '{from_name}'; the edge would form a cycle"),
                origin,
            )
            .with_context("from", from_name)
            .with_context("to", to_name));
        }

        if let Some(target) = self.targets.get_mut(from) {
            target.dependencies.push(to.clone());
        }
        Ok(())
    }

    /// Removes a dependency edge.
    ///
    /// # Errors
    /// Returns `dependency_not_found` if the edge does not exist.
    pub fn remove_dependency(&mut self, from: &ObjectId, to: &ObjectId) -> Result<()> {
        let origin = "graph:remove_dependency";
        let target = self.require_target(from, origin)?;
        if !target.dependencies.contains(to) {
            return Err(PbxError::not_found(
                "dependency_not_found",
                &format!("{} -> {to}", target.name),
                origin,
            ));
        }
        if let Some(target) = self.targets.get_mut(from) {
            target.dependencies.retain(|d| d != to);
        }
        Ok(())
    }

    /// Whether `from` reaches `to` through dependency edges.
    #[must_use]
    pub fn depends_on(&self, from: &ObjectId, to: &ObjectId) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(target) = self.targets.get(node) {
                stack.extend(target.dependencies.iter());
            }
        }
        false
    }

    /// Appends a phase to a target.
    ///
    /// # Errors
    /// Returns `target_not_found` if the target does not exist.
    pub fn add_phase(&mut self, target: &ObjectId, kind: PhaseKind) -> Result<ObjectId> {
        self.require_target(target, "graph:add_phase")?;
        let id = ObjectId::generate();
        self.phases.insert(id.clone(), BuildPhase::new(kind));
        if let Some(t) = self.targets.get_mut(target) {
            t.phases.push(id.clone());
        }
        Ok(id)
    }

    // ----- groups and file references -----

    /// Adds a child group.
    ///
    /// # Errors
    /// Returns an error if the name is blank or contains `/`, the parent is
    /// missing, or the parent already has a child group with this name.
    pub fn add_group(
        &mut self,
        parent: &ObjectId,
        name: impl Into<String>,
        path: Option<String>,
    ) -> Result<ObjectId> {
        let origin = "graph:add_group";
        let name = name.into();
        if name.trim().is_empty() || name.contains('/') {
            return Err(PbxError::invalid_state(
                "invalid_group_name",
                format!("'{name}' is not a valid group name"),
                origin,
            )
            .with_hint("Group names must be non-empty and cannot contain '/'"));
        }
        self.require_group(parent, origin)?;
        let clash = self.child_groups(parent).any(|id| {
            self.groups
                .get(id)
                .is_some_and(|g| g.display_name() == name)
        });
        if clash {
            return Err(PbxError::duplicate(
                "group_exists",
                format!("Group '{name}' already exists here"),
                origin,
            )
            .with_context("parent", self.full_path(parent).unwrap_or_default()));
        }

        let id = ObjectId::generate();
        let mut group = Group::named(name);
        group.path = path;
        self.groups.insert(id.clone(), group);
        if let Some(p) = self.groups.get_mut(parent) {
            p.children.push(Child::Group(id.clone()));
        }
        self.reindex_subtree(&id);
        Ok(id)
    }

    /// Removes a group and everything below it, including build files that
    /// point at removed file references.
    ///
    /// # Errors
    /// Returns an error for the main group, the Products group, or a subtree
    /// containing a product still owned by a target.
    pub fn remove_group(&mut self, id: &ObjectId) -> Result<()> {
        let origin = "graph:remove_group";
        self.require_group(id, origin)?;
        if id == &self.main_group || Some(id) == self.products_group.as_ref() {
            return Err(PbxError::invalid_state(
                "protected_group",
                "The main group and the Products group cannot be removed",
                origin,
            ));
        }

        let mut subtree_groups = Vec::new();
        let mut subtree_files = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(node) = stack.pop() {
            if let Some(group) = self.groups.get(&node) {
                for child in &group.children {
                    match child {
                        Child::Group(g) => stack.push(g.clone()),
                        Child::File(f) => subtree_files.push(f.clone()),
                    }
                }
                subtree_groups.push(node);
            }
        }
        if let Some(owned) = subtree_files
            .iter()
            .find(|f| self.owner_of_product(f).is_some())
        {
            return Err(PbxError::invalid_state(
                "product_in_use",
                format!("Group contains product {owned} owned by a target"),
                origin,
            ));
        }

        self.evict_subtree(id);
        self.detach_child(id);
        for file in &subtree_files {
            self.remove_build_files_for(file);
            self.file_refs.remove(file);
        }
        for group in &subtree_groups {
            self.groups.remove(group);
        }
        debug!(group = %id, files = subtree_files.len(), "removed group");
        Ok(())
    }

    /// Moves a group or file reference under a new parent group.
    ///
    /// # Errors
    /// Returns an error if either node is missing, the node is the main group,
    /// or the move would place a group inside itself.
    pub fn move_node(&mut self, id: &ObjectId, new_parent: &ObjectId) -> Result<()> {
        let origin = "graph:move_node";
        self.require_group(new_parent, origin)?;
        let is_group = self.groups.contains_key(id);
        if !is_group && !self.file_refs.contains_key(id) {
            return Err(PbxError::not_found("node_not_found", id.as_str(), origin));
        }
        if id == &self.main_group {
            return Err(PbxError::invalid_state(
                "protected_group",
                "The main group cannot be moved",
                origin,
            ));
        }
        if is_group && self.is_within(new_parent, id) {
            return Err(PbxError::invalid_state(
                "group_cycle",
                "A group cannot be moved inside itself",
                origin,
            ));
        }
        if is_group {
            let name = self.groups[id].display_name().to_string();
            let clash = self.child_groups(new_parent).any(|g| {
                g != id
                    && self
                        .groups
                        .get(g)
                        .is_some_and(|grp| grp.display_name() == name)
            });
            if clash {
                return Err(PbxError::duplicate(
                    "group_exists",
                    format!("Group '{name}' already exists in the destination"),
                    origin,
                ));
            }
        }

        self.evict_subtree(id);
        self.detach_child(id);
        let child = if is_group {
            Child::Group(id.clone())
        } else {
            Child::File(id.clone())
        };
        if let Some(p) = self.groups.get_mut(new_parent) {
            p.children.push(child);
        }
        self.reindex_subtree(id);
        Ok(())
    }

    /// Adds a file reference to a group.
    ///
    /// # Errors
    /// Returns `group_not_found` if the group does not exist.
    pub fn add_file_reference(&mut self, group: &ObjectId, file: FileReference) -> Result<ObjectId> {
        let origin = "graph:add_file_reference";
        self.require_group(group, origin)?;
        if file.name.is_none() && file.path.is_none() {
            return Err(PbxError::invalid_state(
                "empty_file_reference",
                "A file reference needs a name or a path",
                origin,
            ));
        }

        let id = ObjectId::generate();
        self.file_refs.insert(id.clone(), file);
        if let Some(g) = self.groups.get_mut(group) {
            g.children.push(Child::File(id.clone()));
        }
        self.reindex_subtree(&id);
        Ok(id)
    }

    /// Removes a file reference and every build file pointing at it.
    /// Returns the number of build files removed.
    ///
    /// # Errors
    /// Returns an error if the reference is missing or is a target's product.
    pub fn remove_file_reference(&mut self, id: &ObjectId) -> Result<usize> {
        let origin = "graph:remove_file_reference";
        if !self.file_refs.contains_key(id) {
            return Err(PbxError::not_found("file_not_found", id.as_str(), origin));
        }
        if let Some(owner) = self.owner_of_product(id) {
            let owner = self.targets[owner].name.clone();
            return Err(PbxError::invalid_state(
                "product_in_use",
                format!("File is the product of target '{owner}'"),
                origin,
            )
            .with_hint("Remove the target instead"));
        }
        Ok(self.delete_file_ref(id))
    }

    /// Unconditionally removes a file reference, its build files and its
    /// group membership.
    fn delete_file_ref(&mut self, id: &ObjectId) -> usize {
        self.cache.evict_node(id);
        self.detach_child(id);
        let removed = self.remove_build_files_for(id);
        self.file_refs.remove(id);
        removed
    }

    fn detach_child(&mut self, id: &ObjectId) {
        for group in self.groups.values_mut() {
            group.children.retain(|c| c.id() != id);
        }
    }

    fn remove_build_files_for(&mut self, file: &ObjectId) -> usize {
        let doomed: HashSet<ObjectId> = self
            .build_files
            .iter()
            .filter(|(_, bf)| &bf.file_ref == file)
            .map(|(id, _)| id.clone())
            .collect();
        for phase in self.phases.values_mut() {
            phase.files.retain(|bf| !doomed.contains(bf));
        }
        for id in &doomed {
            self.build_files.remove(id);
        }
        doomed.len()
    }

    // ----- build files -----

    /// Adds a file to one of a target's phases. Adding a file that the phase
    /// already references returns the existing entry.
    ///
    /// # Errors
    /// Returns an error if the target, phase or file reference is missing,
    /// or the phase is a script phase.
    pub fn add_build_file(
        &mut self,
        target: &ObjectId,
        selector: &PhaseSelector,
        file_ref: &ObjectId,
    ) -> Result<BuildFileOutcome> {
        let origin = "graph:add_build_file";
        let t = self.require_target(target, origin)?;
        let Some(file) = self.file_refs.get(file_ref) else {
            return Err(PbxError::not_found("file_not_found", file_ref.as_str(), origin));
        };

        let wanted = match selector {
            PhaseSelector::Id(id) => self.phases.get(id).map(|p| p.kind.tag()),
            PhaseSelector::Kind(tag) => Some(*tag),
            PhaseSelector::Auto => Some(PhaseKindTag::for_path(
                file.path.as_deref().unwrap_or_else(|| file.display_name()),
            )),
        };
        let phase_id = match selector {
            PhaseSelector::Id(id) => t.phases.iter().find(|p| *p == id),
            PhaseSelector::Kind(_) | PhaseSelector::Auto => t.phases.iter().find(|p| {
                self.phases.get(*p).map(|ph| ph.kind.tag()) == wanted
            }),
        }
        .cloned()
        .ok_or_else(|| {
            let wanted = wanted.map_or_else(|| "requested".to_string(), |w| format!("{w:?}"));
            PbxError::not_found(
                "phase_not_found",
                &format!("{} ({wanted})", t.name),
                origin,
            )
            .with_hint("Add the phase to the target first")
        })?;

        let phase = &self.phases[&phase_id];
        if !phase.kind.accepts_files() {
            return Err(PbxError::invalid_state(
                "phase_rejects_files",
                format!("{} phases do not hold build files", phase.kind.display_name()),
                origin,
            ));
        }
        if let Some(existing) = phase
            .files
            .iter()
            .find(|bf| self.build_files.get(*bf).is_some_and(|b| &b.file_ref == file_ref))
        {
            debug!(phase = %phase_id, file = %file_ref, "build file already present");
            return Ok(BuildFileOutcome::AlreadyPresent(existing.clone()));
        }

        let id = ObjectId::generate();
        self.build_files
            .insert(id.clone(), BuildFile::new(file_ref.clone()));
        if let Some(phase) = self.phases.get_mut(&phase_id) {
            phase.files.push(id.clone());
        }
        Ok(BuildFileOutcome::Added(id))
    }

    /// Removes one entry from a phase. Entries whose build file object is
    /// already gone are removed as well.
    ///
    /// # Errors
    /// Returns an error if the phase does not list the entry.
    pub fn remove_build_file(&mut self, phase: &ObjectId, build_file: &ObjectId) -> Result<()> {
        let origin = "graph:remove_build_file";
        let Some(p) = self.phases.get_mut(phase) else {
            return Err(PbxError::not_found("phase_not_found", phase.as_str(), origin));
        };
        let Some(pos) = p.files.iter().position(|bf| bf == build_file) else {
            return Err(PbxError::not_found(
                "build_file_not_found",
                build_file.as_str(),
                origin,
            ));
        };
        p.files.remove(pos);
        // Another phase may still list the same build file object.
        if !self.phases.values().any(|ph| ph.files.contains(build_file)) {
            self.build_files.remove(build_file);
        }
        Ok(())
    }

    // ----- products -----

    /// Returns the Products group, creating it under the main group if absent.
    pub fn ensure_products_group(&mut self) -> (ObjectId, bool) {
        if let Some(id) = self.products_group().cloned() {
            return (id, false);
        }
        let id = ObjectId::generate();
        self.groups.insert(id.clone(), Group::named("Products"));
        if let Some(main) = self.groups.get_mut(&self.main_group) {
            main.children.push(Child::Group(id.clone()));
        }
        self.products_group = Some(id.clone());
        self.reindex_subtree(&id);
        debug!(group = %id, "created Products group");
        (id, true)
    }

    /// Creates a product for a target and places it in the Products group.
    /// `name` and `product_type` override the target's defaults.
    ///
    /// # Errors
    /// Returns an error if the target already has a product, has no product
    /// type, a product with that name already exists, or the Products group
    /// is missing.
    pub fn create_product(
        &mut self,
        target: &ObjectId,
        name: Option<String>,
        product_type: Option<ProductType>,
    ) -> Result<ObjectId> {
        let origin = "graph:create_product";
        let t = self.require_target(target, origin)?;
        if self.live_product(t).is_some() {
            return Err(PbxError::duplicate(
                "product_exists",
                format!("Target '{}' already has a product", t.name),
                origin,
            ));
        }
        let Some(ty) = product_type.or(t.product_type) else {
            return Err(PbxError::invalid_state(
                "no_product_type",
                format!("Target '{}' has no product type", t.name),
                origin,
            ));
        };
        let product_name = name
            .clone()
            .or_else(|| t.product_name.clone())
            .unwrap_or_else(|| ty.default_product_name(&t.name));
        let Some(group) = self.products_group().cloned() else {
            return Err(PbxError::invalid_state(
                "missing_products_group",
                "The project has no Products group",
                origin,
            ));
        };
        if self.product_name_taken(&product_name) {
            return Err(PbxError::duplicate(
                "product_exists",
                format!("A product named '{product_name}' already exists"),
                origin,
            )
            .with_hint("Link the existing product instead"));
        }

        let id = ObjectId::generate();
        self.file_refs
            .insert(id.clone(), FileReference::product(product_name, ty));
        if let Some(g) = self.groups.get_mut(&group) {
            g.children.push(Child::File(id.clone()));
        }
        if let Some(t) = self.targets.get_mut(target) {
            t.product = Some(id.clone());
            if t.product_type.is_none() {
                t.product_type = Some(ty);
            }
            if name.is_some() {
                t.product_name = name;
            }
        }
        self.reindex_subtree(&id);
        Ok(id)
    }

    fn product_name_taken(&self, name: &str) -> bool {
        self.products_group()
            .and_then(|g| self.groups.get(g))
            .is_some_and(|g| {
                g.children.iter().any(|c| {
                    self.file_refs
                        .get(c.id())
                        .is_some_and(|f| f.is_product() && f.display_name() == name)
                })
            })
    }

    /// Makes an unowned product the product of a target.
    ///
    /// # Errors
    /// Returns an error if either side is missing, the file is not a product,
    /// the target already has a product, or another target owns it.
    pub fn link_product(&mut self, target: &ObjectId, product: &ObjectId) -> Result<()> {
        let origin = "graph:link_product";
        let t = self.require_target(target, origin)?;
        if self.live_product(t).is_some() {
            return Err(PbxError::duplicate(
                "product_exists",
                format!("Target '{}' already has a product", t.name),
                origin,
            ));
        }
        match self.file_refs.get(product) {
            None => {
                return Err(PbxError::not_found("product_not_found", product.as_str(), origin))
            }
            Some(f) if !f.is_product() => {
                return Err(PbxError::invalid_state(
                    "not_a_product",
                    format!("'{}' is not a product reference", f.display_name()),
                    origin,
                ))
            }
            Some(_) => {}
        }
        if let Some(owner) = self.owner_of_product(product) {
            return Err(PbxError::duplicate(
                "product_owned",
                format!("Product is owned by target '{}'", self.targets[owner].name),
                origin,
            ));
        }
        if let Some(t) = self.targets.get_mut(target) {
            t.product = Some(product.clone());
        }
        Ok(())
    }

    /// Clears the target's product link and returns the old value. The
    /// product reference itself stays in the graph.
    ///
    /// # Errors
    /// Returns `target_not_found` if the target does not exist.
    pub fn unlink_product(&mut self, target: &ObjectId) -> Result<Option<ObjectId>> {
        let Some(t) = self.targets.get_mut(target) else {
            return Err(PbxError::not_found(
                "target_not_found",
                target.as_str(),
                "graph:unlink_product",
            ));
        };
        Ok(t.product.take())
    }

    /// Moves a product into the Products group.
    ///
    /// # Errors
    /// Returns an error if the Products group or the product is missing.
    pub fn add_to_products_group(&mut self, product: &ObjectId) -> Result<()> {
        let origin = "graph:add_to_products_group";
        let Some(group) = self.products_group().cloned() else {
            return Err(PbxError::invalid_state(
                "missing_products_group",
                "The project has no Products group",
                origin,
            ));
        };
        if !self.file_refs.get(product).is_some_and(FileReference::is_product) {
            return Err(PbxError::not_found("product_not_found", product.as_str(), origin));
        }
        self.move_node(product, &group)
    }

    /// Takes a product out of the Products group without deleting it.
    ///
    /// # Errors
    /// Returns `product_not_found` if the Products group does not list it.
    pub fn detach_from_products_group(&mut self, product: &ObjectId) -> Result<()> {
        let origin = "graph:detach_from_products_group";
        let listed = self
            .products_group()
            .and_then(|g| self.groups.get(g))
            .is_some_and(|g| g.children.iter().any(|c| c.id() == product));
        if !listed {
            return Err(PbxError::not_found("product_not_found", product.as_str(), origin));
        }
        self.cache.evict_node(product);
        if let Some(group) = self.products_group.clone().and_then(|g| self.groups.get_mut(&g)) {
            group.children.retain(|c| c.id() != product);
        }
        Ok(())
    }

    /// Removes a product that no target owns.
    ///
    /// # Errors
    /// Returns an error if the product is missing or still owned.
    pub fn remove_product(&mut self, product: &ObjectId) -> Result<()> {
        let origin = "graph:remove_product";
        if !self.file_refs.get(product).is_some_and(FileReference::is_product) {
            return Err(PbxError::not_found("product_not_found", product.as_str(), origin));
        }
        if let Some(owner) = self.owner_of_product(product) {
            return Err(PbxError::invalid_state(
                "product_in_use",
                format!("Product is owned by target '{}'", self.targets[owner].name),
                origin,
            ));
        }
        self.delete_file_ref(product);
        Ok(())
    }
}

/// Names a file can be found by: its display name and its path's file name.
fn file_lookup_names(file: &FileReference) -> Vec<String> {
    let mut names = vec![file.display_name().to_string()];
    if let Some(path) = &file.path {
        if let Some(last) = path.rsplit('/').next() {
            names.push(last.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn assert_cache_consistent(graph: &ProjectGraph) {
        assert_eq!(graph.cache(), &graph.rebuilt_cache());
    }

    fn app_graph() -> (ProjectGraph, ObjectId) {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph
            .add_target("App", Some(ProductType::Application))
            .unwrap();
        (graph, app)
    }

    fn add_file(graph: &mut ProjectGraph, group_path: &str, path: &str) -> ObjectId {
        let group = graph
            .cache()
            .at_path(NodeKind::Group, group_path)
            .first()
            .cloned()
            .unwrap();
        graph
            .add_file_reference(&group, FileReference::at_path(path))
            .unwrap()
    }

    #[test]
    fn new_graph_has_products_group() {
        let graph = ProjectGraph::new("Demo");
        let products = graph.products_group().unwrap();
        assert_eq!(graph.full_path(products), Some("Products"));
        assert_eq!(graph.parent_of(products), Some(graph.main_group()));
        assert_cache_consistent(&graph);
    }

    #[test]
    fn add_target_creates_product_and_phases() {
        let (graph, app) = app_graph();
        let target = graph.target(&app).unwrap();

        assert_eq!(target.phases.len(), 3);
        let product = graph.live_product(target).unwrap();
        assert_eq!(graph.file_ref(product).unwrap().display_name(), "App.app");
        assert_eq!(graph.full_path(product), Some("Products/App.app"));
        assert_eq!(graph.owner_of_product(product), Some(&app));
        assert_cache_consistent(&graph);
    }

    #[test]
    fn duplicate_target_is_rejected_without_change() {
        let (mut graph, _) = app_graph();
        let before = graph.clone();

        let err = graph
            .add_target("App", Some(ProductType::Framework))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateEntity);
        assert_eq!(graph, before);
    }

    #[test]
    fn remove_target_cleans_up() {
        let (mut graph, app) = app_graph();
        let tests = graph
            .add_target("AppTests", Some(ProductType::UnitTestBundle))
            .unwrap();
        graph.add_dependency(&tests, &app).unwrap();
        let products = graph.products_group().cloned().unwrap();

        graph.remove_target(&app).unwrap();

        assert!(graph.target_id("App").is_err());
        assert!(graph.target(&tests).unwrap().dependencies.is_empty());
        assert_eq!(graph.group(&products).unwrap().children.len(), 1);
        assert_eq!(graph.products().count(), 1);
        assert_cache_consistent(&graph);
    }

    #[test]
    fn shared_product_survives_removal_of_one_owner() {
        let (mut graph, app) = app_graph();
        let copy = graph.add_target("AppCopy", Some(ProductType::Application)).unwrap();
        let shared = graph.target(&app).unwrap().product.clone().unwrap();
        let own = graph.unlink_product(&copy).unwrap().unwrap();
        graph.remove_product(&own).unwrap();
        graph.targets.get_mut(&copy).unwrap().product = Some(shared.clone());

        assert_eq!(graph.owned_product(&app), Some(&shared));
        assert_eq!(graph.owned_product(&copy), None);

        graph.remove_target(&app).unwrap();

        assert!(graph.file_ref(&shared).is_some());
        assert_eq!(graph.owned_product(&copy), Some(&shared));
        assert_eq!(graph.full_path(&shared), Some("Products/App.app"));
        assert_cache_consistent(&graph);
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let mut graph = ProjectGraph::new("Demo");
        let a = graph.add_target("A", None).unwrap();
        let b = graph.add_target("B", None).unwrap();
        let c = graph.add_target("C", None).unwrap();

        graph.add_dependency(&b, &a).unwrap();
        graph.add_dependency(&c, &b).unwrap();

        let err = graph.add_dependency(&a, &c).unwrap_err();
        assert_eq!(err.code, "dependency_cycle");
        assert!(graph.target(&a).unwrap().dependencies.is_empty());

        let err = graph.add_dependency(&a, &a).unwrap_err();
        assert_eq!(err.code, "self_dependency");

        let err = graph.add_dependency(&b, &a).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateEntity);

        assert!(graph.depends_on(&c, &a));

        graph.remove_dependency(&c, &b).unwrap();
        assert!(!graph.depends_on(&c, &a));
    }

    #[test]
    fn adding_same_file_twice_keeps_one_entry() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let sources = graph.add_group(&main, "Sources", None).unwrap();
        let file = graph
            .add_file_reference(&sources, FileReference::at_path("Model.swift"))
            .unwrap();

        let first = graph
            .add_build_file(&app, &PhaseSelector::Auto, &file)
            .unwrap();
        let second = graph
            .add_build_file(&app, &PhaseSelector::Kind(PhaseKindTag::Sources), &file)
            .unwrap();

        assert!(matches!(first, BuildFileOutcome::Added(_)));
        assert_eq!(second, BuildFileOutcome::AlreadyPresent(first.id().clone()));

        let resources = graph
            .add_build_file(&app, &PhaseSelector::Kind(PhaseKindTag::Resources), &file)
            .unwrap();
        assert!(matches!(resources, BuildFileOutcome::Added(_)));

        let entries: usize = graph
            .phases_of(graph.target(&app).unwrap())
            .map(|(_, p)| p.files.len())
            .sum();
        assert_eq!(entries, 2);
    }

    #[test]
    fn distinct_references_with_same_path_are_not_merged() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let a = graph
            .add_file_reference(&main, FileReference::at_path("Shared.swift"))
            .unwrap();
        let b = graph
            .add_file_reference(&main, FileReference::at_path("Shared.swift"))
            .unwrap();

        graph.add_build_file(&app, &PhaseSelector::Auto, &a).unwrap();
        let second = graph.add_build_file(&app, &PhaseSelector::Auto, &b).unwrap();
        assert!(matches!(second, BuildFileOutcome::Added(_)));
        assert_eq!(graph.cache().at_path(NodeKind::File, "Shared.swift").len(), 2);
    }

    #[test]
    fn build_file_for_missing_reference_fails_cleanly() {
        let (mut graph, app) = app_graph();
        let before = graph.clone();

        let err = graph
            .add_build_file(&app, &PhaseSelector::Auto, &ObjectId::from("NOPE"))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReferenceNotFound);
        assert_eq!(graph, before);
    }

    #[test]
    fn script_phases_reject_files() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let phase = graph
            .add_phase(&app, PhaseKindTag::ShellScript.default_kind())
            .unwrap();
        let file = graph
            .add_file_reference(&main, FileReference::at_path("lint.sh"))
            .unwrap();

        let err = graph
            .add_build_file(&app, &PhaseSelector::Id(phase), &file)
            .unwrap_err();
        assert_eq!(err.code, "phase_rejects_files");
    }

    #[test]
    fn remove_file_reference_drops_build_files() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let file = graph
            .add_file_reference(&main, FileReference::at_path("Model.swift"))
            .unwrap();
        graph.add_build_file(&app, &PhaseSelector::Auto, &file).unwrap();

        assert_eq!(graph.remove_file_reference(&file).unwrap(), 1);
        assert!(graph
            .phases_of(graph.target(&app).unwrap())
            .all(|(_, p)| p.files.is_empty()));
        assert_cache_consistent(&graph);
    }

    #[test]
    fn owned_products_cannot_be_removed_directly() {
        let (mut graph, app) = app_graph();
        let product = graph.target(&app).unwrap().product.clone().unwrap();

        let err = graph.remove_file_reference(&product).unwrap_err();
        assert_eq!(err.code, "product_in_use");
        let err = graph.remove_product(&product).unwrap_err();
        assert_eq!(err.code, "product_in_use");
    }

    #[test]
    fn groups_cannot_move_into_themselves() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        let a = graph.add_group(&main, "A", None).unwrap();
        let b = graph.add_group(&a, "B", None).unwrap();

        let err = graph.move_node(&a, &b).unwrap_err();
        assert_eq!(err.code, "group_cycle");
        assert_eq!(graph.full_path(&b), Some("A/B"));

        let c = graph.add_group(&main, "C", None).unwrap();
        add_file(&mut graph, "A/B", "Model.swift");
        graph.move_node(&b, &c).unwrap();
        assert_eq!(graph.full_path(&b), Some("C/B"));
        assert_eq!(graph.cache().at_path(NodeKind::File, "C/B/Model.swift").len(), 1);
        assert_cache_consistent(&graph);
    }

    #[test]
    fn sibling_groups_need_distinct_names() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        graph.add_group(&main, "Sources", None).unwrap();
        let err = graph.add_group(&main, "Sources", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateEntity);
    }

    #[test]
    fn group_names_must_be_usable_path_components() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        for name in ["", "   ", "Sources/Models"] {
            let err = graph.add_group(&main, name, None).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidGraphState);
            assert_eq!(err.code, "invalid_group_name");
        }
        assert_eq!(graph.child_groups(&main).count(), 1);
        assert_cache_consistent(&graph);
    }

    #[test]
    fn remove_group_removes_subtree() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let sources = graph.add_group(&main, "Sources", None).unwrap();
        graph.add_group(&sources, "Models", None).unwrap();
        let file = add_file(&mut graph, "Sources/Models", "User.swift");
        graph.add_build_file(&app, &PhaseSelector::Auto, &file).unwrap();

        graph.remove_group(&sources).unwrap();

        assert!(graph.file_ref(&file).is_none());
        assert!(graph.cache().named(NodeKind::Group, "Models").is_empty());
        assert!(graph
            .phases_of(graph.target(&app).unwrap())
            .all(|(_, p)| p.files.is_empty()));
        assert_cache_consistent(&graph);

        let products = graph.products_group().cloned().unwrap();
        assert_eq!(graph.remove_group(&products).unwrap_err().code, "protected_group");
    }

    #[test]
    fn create_product_rejects_existing() {
        let (mut graph, app) = app_graph();
        let err = graph.create_product(&app, None, None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateEntity);
    }

    #[test]
    fn detached_products_can_be_regrouped() {
        let (mut graph, app) = app_graph();
        let product = graph.target(&app).unwrap().product.clone().unwrap();

        graph.detach_from_products_group(&product).unwrap();
        assert!(graph.full_path(&product).is_none());
        assert!(graph.file_ref(&product).is_some());
        assert_cache_consistent(&graph);

        graph.add_to_products_group(&product).unwrap();
        assert_eq!(graph.full_path(&product), Some("Products/App.app"));
        assert_eq!(graph.target_by_name("App").map(|(id, _)| id), Some(&app));
        assert_cache_consistent(&graph);
    }

    #[test]
    fn prepare_rejects_group_cycles() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        let a = graph.add_group(&main, "A", None).unwrap();
        let b = graph.add_group(&a, "B", None).unwrap();
        graph
            .groups
            .get_mut(&b)
            .unwrap()
            .children
            .push(Child::Group(a.clone()));

        let err = graph.prepare().unwrap_err();
        assert_eq!(err.kind, ErrorKind::CodecError);
        assert_eq!(err.code, "malformed_project");
    }

    #[test]
    fn prepare_rejects_children_without_entities() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        graph
            .groups
            .get_mut(&main)
            .unwrap()
            .children
            .push(Child::File(ObjectId::from("DEADBEEFDEADBEEFDEADBEEF")));

        let err = graph.clone().prepare().unwrap_err();
        assert_eq!(err.code, "malformed_project");
        assert!(err.message.contains("DEADBEEFDEADBEEFDEADBEEF"));

        let children = &mut graph.groups.get_mut(&main).unwrap().children;
        children.pop();
        children.push(Child::Group(ObjectId::from("0123456789AB0123456789AB")));
        assert_eq!(graph.prepare().unwrap_err().code, "malformed_project");
    }

    #[test]
    fn graph_serialization() {
        let (mut graph, app) = app_graph();
        let main = graph.main_group().clone();
        let file = graph
            .add_file_reference(&main, FileReference::at_path("main.swift"))
            .unwrap();
        graph.add_build_file(&app, &PhaseSelector::Auto, &file).unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let restored: ProjectGraph = serde_json::from_str(&json).unwrap();
        let restored = restored.prepare().unwrap();

        assert_eq!(graph, restored);
        assert_eq!(graph.cache(), restored.cache());
    }
}
