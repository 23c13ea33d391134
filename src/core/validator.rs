//! Integrity checks over a [`ProjectGraph`].
//!
//! `validate` never mutates. Findings come out in a fixed order: Products
//! group, per-target product findings in declaration order, orphaned
//! products, invalid file references, then build-file findings per target.

use super::graph::ProjectGraph;
use super::model::{FileReference, ObjectId, ProductType, SourceTree, Target};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where validation looks for files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    pub project_root: PathBuf,
    pub check_filesystem: bool,
}

impl ValidationContext {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            check_filesystem: true,
        }
    }

    /// Skips `MissingOnDisk` checks.
    #[must_use]
    pub fn without_filesystem(mut self) -> Self {
        self.check_filesystem = false;
        self
    }
}

/// Why a file reference is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The resolved path does not exist under the project root.
    MissingOnDisk,
    /// No parent chain leads to the main group.
    Unreachable,
    /// Filesystem-backed reference without a path.
    EmptyPath,
}

/// A single integrity problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    MissingProductsGroup,
    MissingProductReference {
        target: ObjectId,
        target_name: String,
        product_type: Option<ProductType>,
    },
    OrphanedProductReference {
        product: ObjectId,
        name: String,
    },
    InvalidFileReference {
        reference: ObjectId,
        name: String,
        reason: InvalidReason,
    },
    DuplicateBuildFile {
        target: ObjectId,
        target_name: String,
        phase: ObjectId,
        reference: ObjectId,
        build_file: ObjectId,
    },
    DanglingBuildFile {
        target: ObjectId,
        target_name: String,
        phase: ObjectId,
        build_file: ObjectId,
    },
    /// The target has no product but an unowned one matches it.
    UnlinkedProduct {
        target: ObjectId,
        target_name: String,
        product: ObjectId,
        name: String,
    },
    /// The target's product lives outside the Products group.
    UngroupedProduct {
        target: ObjectId,
        target_name: String,
        product: ObjectId,
        name: String,
    },
    /// The target links to a product an earlier target already owns.
    SharedProduct {
        target: ObjectId,
        target_name: String,
        product: ObjectId,
        owner_name: String,
    },
}

impl Finding {
    /// Target the finding is about, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&ObjectId> {
        match self {
            Self::MissingProductsGroup
            | Self::OrphanedProductReference { .. }
            | Self::InvalidFileReference { .. } => None,
            Self::MissingProductReference { target, .. }
            | Self::DuplicateBuildFile { target, .. }
            | Self::DanglingBuildFile { target, .. }
            | Self::UnlinkedProduct { target, .. }
            | Self::UngroupedProduct { target, .. }
            | Self::SharedProduct { target, .. } => Some(target),
        }
    }

    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::MissingProductsGroup => "missing_products_group",
            Self::MissingProductReference { .. } => "missing_product_reference",
            Self::OrphanedProductReference { .. } => "orphaned_product_reference",
            Self::InvalidFileReference { .. } => "invalid_file_reference",
            Self::DuplicateBuildFile { .. } => "duplicate_build_file",
            Self::DanglingBuildFile { .. } => "dangling_build_file",
            Self::UnlinkedProduct { .. } => "unlinked_product",
            Self::UngroupedProduct { .. } => "ungrouped_product",
            Self::SharedProduct { .. } => "shared_product",
        }
    }

    /// One-line description for humans.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::MissingProductsGroup => "Project has no Products group".to_string(),
            Self::MissingProductReference {
                target_name,
                product_type: Some(ty),
                ..
            } => format!("Target '{target_name}' has no product ({ty})"),
            Self::MissingProductReference { target_name, .. } => {
                format!("Target '{target_name}' points at a product that no longer exists")
            }
            Self::OrphanedProductReference { name, .. } => {
                format!("Product '{name}' is not owned by any target")
            }
            Self::InvalidFileReference { name, reason, .. } => match reason {
                InvalidReason::MissingOnDisk => format!("'{name}' does not exist on disk"),
                InvalidReason::Unreachable => {
                    format!("'{name}' is not reachable from the main group")
                }
                InvalidReason::EmptyPath => format!("'{name}' has no path"),
            },
            Self::DuplicateBuildFile { target_name, .. } => {
                format!("Target '{target_name}' lists the same file twice in one phase")
            }
            Self::DanglingBuildFile { target_name, .. } => {
                format!("Target '{target_name}' has a phase entry pointing at nothing")
            }
            Self::UnlinkedProduct {
                target_name, name, ..
            } => format!("Product '{name}' matches target '{target_name}' but is not linked"),
            Self::UngroupedProduct {
                target_name, name, ..
            } => format!("Product '{name}' of target '{target_name}' is outside the Products group"),
            Self::SharedProduct {
                target_name,
                owner_name,
                ..
            } => format!("Target '{target_name}' shares its product with '{owner_name}'"),
        }
    }
}

/// Result of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings of the given kind.
    #[must_use]
    pub fn count(&self, kind_name: &str) -> usize {
        self.findings
            .iter()
            .filter(|f| f.kind_name() == kind_name)
            .count()
    }
}

/// Checks every integrity rule and reports what is broken.
#[must_use]
pub fn validate(graph: &ProjectGraph, ctx: &ValidationContext) -> ValidationReport {
    let mut findings = Vec::new();

    if graph.products_group().is_none() {
        findings.push(Finding::MissingProductsGroup);
    }

    for (id, target) in graph.targets() {
        if let Some(finding) = product_finding(graph, id, target) {
            findings.push(finding);
        }
    }

    for (id, product) in graph.products() {
        if graph.owner_of_product(id).is_none() && adopter_of(graph, id).is_none() {
            findings.push(Finding::OrphanedProductReference {
                product: id.clone(),
                name: product.display_name().to_string(),
            });
        }
    }

    for (id, file) in graph.file_refs() {
        if let Some(reason) = file_reference_problem(graph, ctx, id) {
            findings.push(Finding::InvalidFileReference {
                reference: id.clone(),
                name: describe_file(graph, id, file),
                reason,
            });
        }
    }

    for (id, target) in graph.targets() {
        build_file_findings(graph, id, target, &mut findings);
    }

    debug!(findings = findings.len(), "validated project");
    ValidationReport { findings }
}

fn product_finding(graph: &ProjectGraph, id: &ObjectId, target: &Target) -> Option<Finding> {
    match graph.live_product(target) {
        Some(product) if graph.owned_product(id).is_none() => Some(Finding::SharedProduct {
            target: id.clone(),
            target_name: target.name.clone(),
            product: product.clone(),
            owner_name: graph
                .owner_of_product(product)
                .and_then(|owner| graph.target(owner))
                .map(|t| t.name.clone())
                .unwrap_or_default(),
        }),
        Some(product) => {
            let grouped = graph.products_group().is_some()
                && graph.parent_of(product) == graph.products_group();
            if grouped {
                return None;
            }
            Some(Finding::UngroupedProduct {
                target: id.clone(),
                target_name: target.name.clone(),
                product: product.clone(),
                name: graph
                    .file_ref(product)
                    .map(|f| f.display_name().to_string())
                    .unwrap_or_default(),
            })
        }
        None if target.product_type.is_some() || target.product.is_some() => {
            if let Some((product, file)) = adoptable_product(graph, id) {
                return Some(Finding::UnlinkedProduct {
                    target: id.clone(),
                    target_name: target.name.clone(),
                    product: product.clone(),
                    name: file.display_name().to_string(),
                });
            }
            Some(Finding::MissingProductReference {
                target: id.clone(),
                target_name: target.name.clone(),
                product_type: target.product_type,
            })
        }
        None => None,
    }
}

fn build_file_findings(
    graph: &ProjectGraph,
    id: &ObjectId,
    target: &Target,
    findings: &mut Vec<Finding>,
) {
    for (phase_id, phase) in graph.phases_of(target) {
        let mut seen = HashSet::new();
        for bf_id in &phase.files {
            let file_ref = graph
                .build_file(bf_id)
                .map(|bf| &bf.file_ref)
                .filter(|f| graph.file_ref(f).is_some());
            match file_ref {
                None => findings.push(Finding::DanglingBuildFile {
                    target: id.clone(),
                    target_name: target.name.clone(),
                    phase: phase_id.clone(),
                    build_file: bf_id.clone(),
                }),
                Some(file_ref) if !seen.insert(file_ref) => {
                    findings.push(Finding::DuplicateBuildFile {
                        target: id.clone(),
                        target_name: target.name.clone(),
                        phase: phase_id.clone(),
                        reference: file_ref.clone(),
                        build_file: bf_id.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }
}

/// An unowned product whose type and name match a target that lacks one of
/// its own.
#[must_use]
pub fn adoptable_product<'a>(
    graph: &'a ProjectGraph,
    target_id: &ObjectId,
) -> Option<(&'a ObjectId, &'a FileReference)> {
    let target = graph.target(target_id)?;
    if graph.owned_product(target_id).is_some() {
        return None;
    }
    let ty = target.product_type?;
    let name = target.expected_product_name()?;
    graph.products().find(|(id, file)| {
        file.explicit_file_type == Some(ty)
            && file.display_name() == name
            && graph.owner_of_product(id).is_none()
    })
}

/// First target, in declaration order, that could adopt `product`.
#[must_use]
pub fn adopter_of<'a>(graph: &'a ProjectGraph, product: &ObjectId) -> Option<&'a ObjectId> {
    graph
        .targets()
        .map(|(id, _)| id)
        .find(|id| adoptable_product(graph, id).is_some_and(|(p, _)| p == product))
}

/// Why a non-product file reference is invalid right now, if it is.
#[must_use]
pub fn file_reference_problem(
    graph: &ProjectGraph,
    ctx: &ValidationContext,
    id: &ObjectId,
) -> Option<InvalidReason> {
    let file = graph.file_ref(id)?;
    if file.is_product() {
        return None;
    }
    let has_path = file.path.as_deref().is_some_and(|p| !p.trim().is_empty());
    if file.source_tree.is_filesystem_backed() && !has_path {
        return Some(InvalidReason::EmptyPath);
    }
    if graph.full_path(id).is_none() {
        return Some(InvalidReason::Unreachable);
    }
    if ctx.check_filesystem {
        if let Some(on_disk) = disk_path(graph, id, file, &ctx.project_root) {
            if !on_disk.exists() {
                return Some(InvalidReason::MissingOnDisk);
            }
        }
    }
    None
}

/// Filesystem location of a file reference, following enclosing group paths.
/// `None` for anchors that cannot be checked from the project root.
#[must_use]
pub fn disk_path(
    graph: &ProjectGraph,
    id: &ObjectId,
    file: &FileReference,
    root: &Path,
) -> Option<PathBuf> {
    let path = file.path.as_deref()?;
    match file.source_tree {
        SourceTree::Absolute => Some(PathBuf::from(path)),
        SourceTree::SourceRoot => Some(root.join(path)),
        SourceTree::Group => Some(group_dir(graph, graph.parent_of(id)?, root)?.join(path)),
        SourceTree::BuiltProductsDir | SourceTree::SdkRoot | SourceTree::DeveloperDir => None,
    }
}

fn group_dir(graph: &ProjectGraph, id: &ObjectId, root: &Path) -> Option<PathBuf> {
    let group = graph.group(id)?;
    let parent_dir = || match graph.parent_of(id) {
        Some(parent) => group_dir(graph, parent, root),
        None => Some(root.to_path_buf()),
    };
    let Some(path) = group.path.as_deref() else {
        return parent_dir();
    };
    match group.source_tree {
        SourceTree::Absolute => Some(PathBuf::from(path)),
        SourceTree::SourceRoot => Some(root.join(path)),
        SourceTree::Group => Some(parent_dir()?.join(path)),
        SourceTree::BuiltProductsDir | SourceTree::SdkRoot | SourceTree::DeveloperDir => None,
    }
}

fn describe_file(graph: &ProjectGraph, id: &ObjectId, file: &FileReference) -> String {
    graph.full_path(id).map_or_else(
        || {
            let name = file.display_name();
            if name.is_empty() {
                id.to_string()
            } else {
                name.to_string()
            }
        },
        str::to_string,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::PhaseSelector;

    fn offline() -> ValidationContext {
        ValidationContext::new(".").without_filesystem()
    }

    #[test]
    fn fresh_project_is_clean() {
        let mut graph = ProjectGraph::new("Demo");
        graph.add_target("App", Some(ProductType::Application)).unwrap();
        assert!(validate(&graph, &offline()).is_clean());
    }

    #[test]
    fn target_without_product_is_reported() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", None).unwrap();
        assert!(validate(&graph, &offline()).is_clean());

        let mut json = serde_json::to_value(&graph).unwrap();
        json["targets"][app.as_str()]["product_type"] = "application".into();
        let broken = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        let report = validate(&broken, &offline());
        assert_eq!(
            report.findings,
            vec![Finding::MissingProductReference {
                target: app,
                target_name: "App".to_string(),
                product_type: Some(ProductType::Application),
            }]
        );
    }

    #[test]
    fn unowned_product_is_orphaned() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", Some(ProductType::Application)).unwrap();
        let lib = graph.add_target("Lib", Some(ProductType::StaticLibrary)).unwrap();
        let lib_product = graph.target(&lib).unwrap().product.clone().unwrap();

        let mut json = serde_json::to_value(&graph).unwrap();
        json["targets"][lib.as_str()]["product"] = serde_json::Value::Null;
        json["targets"][lib.as_str()]["product_type"] = serde_json::Value::Null;
        let graph: ProjectGraph = serde_json::from_value(json).unwrap();
        let graph = graph.prepare().unwrap();

        let report = validate(&graph, &offline());
        assert_eq!(report.count("orphaned_product_reference"), 1);
        assert_eq!(
            report.findings,
            vec![Finding::OrphanedProductReference {
                product: lib_product,
                name: "Lib.a".to_string(),
            }]
        );
        assert!(graph.target(&app).unwrap().product.is_some());
    }

    #[test]
    fn matching_unowned_product_is_unlinked_not_orphaned() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", Some(ProductType::Application)).unwrap();
        let product = graph.target(&app).unwrap().product.clone().unwrap();

        let mut json = serde_json::to_value(&graph).unwrap();
        json["targets"][app.as_str()]["product"] = serde_json::Value::Null;
        let graph = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        let report = validate(&graph, &offline());
        assert_eq!(
            report.findings,
            vec![Finding::UnlinkedProduct {
                target: app,
                target_name: "App".to_string(),
                product,
                name: "App.app".to_string(),
            }]
        );
    }

    #[test]
    fn detached_product_is_ungrouped() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", Some(ProductType::Framework)).unwrap();
        let product = graph.target(&app).unwrap().product.clone().unwrap();
        graph.detach_from_products_group(&product).unwrap();

        let report = validate(&graph, &offline());
        assert_eq!(report.findings.len(), 1);
        assert!(matches!(
            &report.findings[0],
            Finding::UngroupedProduct { product: p, .. } if p == &product
        ));
    }

    #[test]
    fn later_target_sharing_a_product_is_reported() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", Some(ProductType::Application)).unwrap();
        let copy = graph.add_target("AppCopy", Some(ProductType::Application)).unwrap();
        let shared = graph.target(&app).unwrap().product.clone().unwrap();
        let own = graph.target(&copy).unwrap().product.clone().unwrap();

        let mut json = serde_json::to_value(&graph).unwrap();
        json["targets"][copy.as_str()]["product"] = shared.as_str().into();
        let graph = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        let report = validate(&graph, &offline());
        assert_eq!(
            report.findings,
            vec![Finding::SharedProduct {
                target: copy.clone(),
                target_name: "AppCopy".to_string(),
                product: shared,
                owner_name: "App".to_string(),
            }]
        );
        // Its own product stays adoptable, so it is not an orphan.
        assert_eq!(adoptable_product(&graph, &copy).map(|(p, _)| p), Some(&own));
    }

    #[test]
    fn duplicate_and_dangling_build_files() {
        let mut graph = ProjectGraph::new("Demo");
        let app = graph.add_target("App", Some(ProductType::Application)).unwrap();
        let main = graph.main_group().clone();
        let file = graph
            .add_file_reference(&main, FileReference::at_path("main.swift"))
            .unwrap();
        let bf = graph
            .add_build_file(&app, &PhaseSelector::Auto, &file)
            .unwrap()
            .id()
            .clone();
        let phase = graph.target(&app).unwrap().phases[0].clone();

        let mut json = serde_json::to_value(&graph).unwrap();
        let files = json["phases"][phase.as_str()]["files"].as_array_mut().unwrap();
        files.push(bf.as_str().into());
        files.push("DEADBEEFDEADBEEFDEADBEEF".into());
        let graph = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        let report = validate(&graph, &offline());
        assert_eq!(report.count("duplicate_build_file"), 1);
        assert_eq!(report.count("dangling_build_file"), 1);
        assert!(report.findings.iter().all(|f| f.target() == Some(&app)));
    }

    #[test]
    fn missing_files_on_disk_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Sources")).unwrap();
        std::fs::write(dir.path().join("Sources/present.swift"), "").unwrap();

        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        let sources = graph
            .add_group(&main, "Sources", Some("Sources".to_string()))
            .unwrap();
        graph
            .add_file_reference(&sources, FileReference::at_path("present.swift"))
            .unwrap();
        let missing = graph
            .add_file_reference(&sources, FileReference::at_path("missing.swift"))
            .unwrap();
        let virtual_group = graph.add_group(&main, "Virtual", None).unwrap();
        graph
            .add_file_reference(
                &virtual_group,
                FileReference {
                    source_tree: SourceTree::SourceRoot,
                    ..FileReference::at_path("Sources/present.swift")
                },
            )
            .unwrap();

        let ctx = ValidationContext::new(dir.path());
        let report = validate(&graph, &ctx);
        assert_eq!(
            report.findings,
            vec![Finding::InvalidFileReference {
                reference: missing.clone(),
                name: "Sources/missing.swift".to_string(),
                reason: InvalidReason::MissingOnDisk,
            }]
        );
        assert_eq!(
            file_reference_problem(&graph, &ctx.clone().without_filesystem(), &missing),
            None
        );
    }

    #[test]
    fn sdk_references_are_not_checked_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        graph
            .add_file_reference(
                &main,
                FileReference {
                    source_tree: SourceTree::SdkRoot,
                    ..FileReference::at_path("System/Library/Frameworks/UIKit.framework")
                },
            )
            .unwrap();
        assert!(validate(&graph, &ValidationContext::new(dir.path())).is_clean());
    }

    #[test]
    fn empty_and_unreachable_references() {
        let mut graph = ProjectGraph::new("Demo");
        let main = graph.main_group().clone();
        let named_only = graph
            .add_file_reference(
                &main,
                FileReference {
                    name: Some("Notes".to_string()),
                    path: None,
                    ..FileReference::at_path("")
                },
            )
            .unwrap();
        let stray = graph.add_group(&main, "Stray", None).unwrap();
        let lost = graph
            .add_file_reference(&stray, FileReference::at_path("lost.swift"))
            .unwrap();

        let mut json = serde_json::to_value(&graph).unwrap();
        let children = json["groups"][main.as_str()]["children"].as_array_mut().unwrap();
        children.retain(|c| c["group"] != stray.as_str());
        let graph = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        let report = validate(&graph, &offline());
        let reasons: Vec<_> = report
            .findings
            .iter()
            .filter_map(|f| match f {
                Finding::InvalidFileReference {
                    reference, reason, ..
                } => Some((reference.clone(), *reason)),
                _ => None,
            })
            .collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons.contains(&(named_only, InvalidReason::EmptyPath)));
        assert!(reasons.contains(&(lost, InvalidReason::Unreachable)));
    }

    #[test]
    fn unknown_products_group_loads_as_missing() {
        let graph = ProjectGraph::new("Demo");
        let mut json = serde_json::to_value(&graph).unwrap();
        json["products_group"] = "DEADBEEFDEADBEEFDEADBEEF".into();
        let graph = serde_json::from_value::<ProjectGraph>(json)
            .unwrap()
            .prepare()
            .unwrap();

        assert_eq!(graph.products_group(), None);
        assert_eq!(
            validate(&graph, &offline()).findings,
            vec![Finding::MissingProductsGroup]
        );
    }

    #[test]
    fn findings_serialize_with_kind_tag() {
        let json = serde_json::to_value(Finding::MissingProductsGroup).unwrap();
        assert_eq!(json["kind"], "missing_products_group");
    }
}
