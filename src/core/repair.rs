//! Reference repair engine.
//!
//! Repair runs a validation pass and then works through the findings in a
//! fixed order. Each step re-queries the live graph right before mutating,
//! so a finding made stale by an earlier step is skipped instead of being
//! applied twice. Failures are collected per finding and never abort the
//! pass. Running `repair` on an already repaired graph applies nothing.

use super::error::PbxError;
use super::graph::ProjectGraph;
use super::model::{ObjectId, ProductType};
use super::validator::{
    adoptable_product, adopter_of, file_reference_problem, validate, Finding, ValidationContext,
};
use serde::Serialize;
use tracing::{info, warn};

/// Replaces the synthesized product name and/or type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductOverride {
    pub name: Option<String>,
    pub product_type: Option<ProductType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Restrict repair to findings about these targets. Empty means all.
    pub targets: Vec<ObjectId>,
    pub product_override: Option<ProductOverride>,
}

impl RepairOptions {
    fn in_scope(&self, finding: &Finding) -> bool {
        if self.targets.is_empty() {
            return true;
        }
        finding.target().is_some_and(|t| self.targets.contains(t))
    }
}

/// A mutation the repair pass performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    CreatedProductsGroup {
        group: ObjectId,
    },
    CreatedProduct {
        target: ObjectId,
        product: ObjectId,
        name: String,
    },
    RemovedOrphan {
        product: ObjectId,
        name: String,
    },
    RemovedFileReference {
        reference: ObjectId,
        name: String,
        build_files_removed: usize,
    },
    RemovedBuildFile {
        target: ObjectId,
        phase: ObjectId,
        build_file: ObjectId,
    },
    LinkedProduct {
        target: ObjectId,
        product: ObjectId,
    },
    UnlinkedSharedProduct {
        target: ObjectId,
        product: ObjectId,
    },
    GroupedProduct {
        product: ObjectId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFinding {
    pub finding: Finding,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFinding {
    pub finding: Finding,
    pub error: PbxError,
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Findings the pass started from.
    pub findings: Vec<Finding>,
    pub applied: Vec<RepairAction>,
    pub skipped: Vec<SkippedFinding>,
    pub failed: Vec<FailedFinding>,
    pub orphans_removed: usize,
}

impl RepairReport {
    /// Whether the pass changed the graph.
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    fn apply(&mut self, action: RepairAction) {
        info!(?action, "repair applied");
        self.applied.push(action);
    }

    fn skip(&mut self, finding: &Finding, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(kind = finding.kind_name(), %reason, "stale finding skipped");
        self.skipped.push(SkippedFinding {
            finding: finding.clone(),
            reason,
        });
    }

    fn fail(&mut self, finding: &Finding, error: PbxError) {
        warn!(kind = finding.kind_name(), error = %error, "repair failed");
        self.failed.push(FailedFinding {
            finding: finding.clone(),
            error,
        });
    }
}

/// Validates `graph` and repairs what it can, in place.
pub fn repair(
    graph: &mut ProjectGraph,
    ctx: &ValidationContext,
    options: &RepairOptions,
) -> RepairReport {
    let findings: Vec<Finding> = validate(graph, ctx)
        .findings
        .into_iter()
        .filter(|f| options.in_scope(f) || matches!(f, Finding::MissingProductsGroup))
        .collect();
    let mut report = RepairReport {
        findings: findings.clone(),
        ..RepairReport::default()
    };
    if findings.is_empty() {
        return report;
    }

    let needs_products_group = findings.iter().any(|f| {
        matches!(
            f,
            Finding::MissingProductReference { .. }
                | Finding::UnlinkedProduct { .. }
                | Finding::UngroupedProduct { .. }
                | Finding::SharedProduct { .. }
        )
    });
    for finding in &findings {
        if matches!(finding, Finding::MissingProductsGroup)
            && (options.targets.is_empty() || needs_products_group)
        {
            repair_products_group(graph, finding, &mut report);
        }
    }

    // Shared links are cut before orphans are judged, so a product the
    // later target can adopt is not removed as unowned.
    let mut deferred = Vec::new();
    for finding in &findings {
        let err = match finding {
            Finding::MissingProductReference { target, .. } => {
                repair_missing_product(graph, target, finding, options, &mut report)
            }
            Finding::SharedProduct {
                target, product, ..
            } => repair_shared_product(graph, target, product, finding, options, &mut report),
            _ => None,
        };
        if let (Some(err), Some(target)) = (err, finding.target()) {
            if err.code == "product_exists" {
                deferred.push((finding, target, err));
            } else {
                report.fail(finding, err);
            }
        }
    }

    for finding in &findings {
        if let Finding::OrphanedProductReference { product, .. } = finding {
            repair_orphan(graph, product, finding, &mut report);
        }
    }

    // A synthesized product name may have been held by an orphan removed above.
    for (finding, target, err) in deferred {
        let err = if report.orphans_removed > 0 {
            repair_missing_product(graph, target, finding, options, &mut report)
        } else {
            Some(err)
        };
        if let Some(err) = err {
            report.fail(finding, err);
        }
    }

    for finding in &findings {
        if let Finding::InvalidFileReference { reference, .. } = finding {
            repair_file_reference(graph, ctx, reference, finding, &mut report);
        }
    }

    for finding in &findings {
        match finding {
            Finding::DuplicateBuildFile {
                target,
                phase,
                reference,
                build_file,
                ..
            } => {
                let still_duplicate = graph.phase(phase).is_some_and(|p| {
                    p.files.contains(build_file)
                        && p.files
                            .iter()
                            .filter(|bf| {
                                graph.build_file(bf).is_some_and(|b| &b.file_ref == reference)
                            })
                            .count()
                            > 1
                });
                remove_entry(graph, target, phase, build_file, still_duplicate, finding, &mut report);
            }
            Finding::DanglingBuildFile {
                target,
                phase,
                build_file,
                ..
            } => {
                let still_dangling = graph.phase(phase).is_some_and(|p| p.files.contains(build_file))
                    && graph
                        .build_file(build_file)
                        .map_or(true, |b| graph.file_ref(&b.file_ref).is_none());
                remove_entry(graph, target, phase, build_file, still_dangling, finding, &mut report);
            }
            _ => {}
        }
    }

    for finding in &findings {
        match finding {
            Finding::UnlinkedProduct {
                target, product, ..
            } => repair_link(graph, target, product, finding, &mut report),
            Finding::UngroupedProduct {
                target, product, ..
            } => {
                let still_ungrouped = graph
                    .target(target)
                    .and_then(|t| graph.live_product(t))
                    .is_some_and(|p| p == product && graph.parent_of(p) != graph.products_group());
                if !still_ungrouped {
                    report.skip(finding, "product is already grouped");
                    continue;
                }
                group_product(graph, product, finding, &mut report);
            }
            _ => {}
        }
    }

    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        orphans_removed = report.orphans_removed,
        "repair finished"
    );
    report
}

fn repair_products_group(graph: &mut ProjectGraph, finding: &Finding, report: &mut RepairReport) {
    if graph.products_group().is_some() {
        report.skip(finding, "Products group already exists");
        return;
    }
    let (group, _) = graph.ensure_products_group();
    report.apply(RepairAction::CreatedProductsGroup { group });
}

/// Returns the error on failure so the caller can decide whether to retry.
fn repair_missing_product(
    graph: &mut ProjectGraph,
    target: &ObjectId,
    finding: &Finding,
    options: &RepairOptions,
    report: &mut RepairReport,
) -> Option<PbxError> {
    let Some(t) = graph.target(target) else {
        report.skip(finding, "target no longer exists");
        return None;
    };
    if graph.live_product(t).is_some() {
        report.skip(finding, "target already has a product");
        return None;
    }
    if adoptable_product(graph, target).is_some() {
        report.skip(finding, "a matching unowned product exists");
        return None;
    }

    let (name, product_type) = options
        .product_override
        .clone()
        .map_or((None, None), |o| (o.name, o.product_type));
    match graph.create_product(target, name, product_type) {
        Ok(product) => {
            let name = graph
                .file_ref(&product)
                .map(|f| f.display_name().to_string())
                .unwrap_or_default();
            report.apply(RepairAction::CreatedProduct {
                target: target.clone(),
                product,
                name,
            });
            None
        }
        Err(err) => Some(err),
    }
}

fn repair_shared_product(
    graph: &mut ProjectGraph,
    target: &ObjectId,
    product: &ObjectId,
    finding: &Finding,
    options: &RepairOptions,
    report: &mut RepairReport,
) -> Option<PbxError> {
    let still_shared = graph
        .target(target)
        .and_then(|t| graph.live_product(t))
        .is_some_and(|p| p == product)
        && graph.owned_product(target).is_none();
    if !still_shared {
        report.skip(finding, "product is no longer shared");
        return None;
    }
    if let Err(err) = graph.unlink_product(target) {
        return Some(err);
    }
    report.apply(RepairAction::UnlinkedSharedProduct {
        target: target.clone(),
        product: product.clone(),
    });

    if let Some(own) = adoptable_product(graph, target).map(|(p, _)| p.clone()) {
        repair_link(graph, target, &own, finding, report);
        return None;
    }
    repair_missing_product(graph, target, finding, options, report)
}

fn repair_orphan(
    graph: &mut ProjectGraph,
    product: &ObjectId,
    finding: &Finding,
    report: &mut RepairReport,
) {
    let Some(name) = graph
        .file_ref(product)
        .filter(|f| f.is_product())
        .map(|f| f.display_name().to_string())
    else {
        report.skip(finding, "product no longer exists");
        return;
    };
    if graph.owner_of_product(product).is_some() {
        report.skip(finding, "product is owned again");
        return;
    }
    if adopter_of(graph, product).is_some() {
        report.skip(finding, "product can be linked to a target");
        return;
    }
    match graph.remove_product(product) {
        Ok(()) => {
            report.orphans_removed += 1;
            report.apply(RepairAction::RemovedOrphan {
                product: product.clone(),
                name,
            });
        }
        Err(err) => report.fail(finding, err),
    }
}

fn repair_file_reference(
    graph: &mut ProjectGraph,
    ctx: &ValidationContext,
    reference: &ObjectId,
    finding: &Finding,
    report: &mut RepairReport,
) {
    if file_reference_problem(graph, ctx, reference).is_none() {
        report.skip(finding, "reference is valid now");
        return;
    }
    let name = graph
        .full_path(reference)
        .map(str::to_string)
        .or_else(|| graph.file_ref(reference).map(|f| f.display_name().to_string()))
        .unwrap_or_default();
    match graph.remove_file_reference(reference) {
        Ok(build_files_removed) => report.apply(RepairAction::RemovedFileReference {
            reference: reference.clone(),
            name,
            build_files_removed,
        }),
        Err(err) => report.fail(finding, err),
    }
}

fn remove_entry(
    graph: &mut ProjectGraph,
    target: &ObjectId,
    phase: &ObjectId,
    build_file: &ObjectId,
    still_broken: bool,
    finding: &Finding,
    report: &mut RepairReport,
) {
    if !still_broken {
        report.skip(finding, "phase entry is no longer broken");
        return;
    }
    match graph.remove_build_file(phase, build_file) {
        Ok(()) => report.apply(RepairAction::RemovedBuildFile {
            target: target.clone(),
            phase: phase.clone(),
            build_file: build_file.clone(),
        }),
        Err(err) => report.fail(finding, err),
    }
}

fn repair_link(
    graph: &mut ProjectGraph,
    target: &ObjectId,
    product: &ObjectId,
    finding: &Finding,
    report: &mut RepairReport,
) {
    let still_adoptable = adoptable_product(graph, target).is_some_and(|(p, _)| p == product);
    if !still_adoptable {
        report.skip(finding, "product is no longer adoptable");
        return;
    }
    if let Err(err) = graph.link_product(target, product) {
        report.fail(finding, err);
        return;
    }
    report.apply(RepairAction::LinkedProduct {
        target: target.clone(),
        product: product.clone(),
    });
    if graph.parent_of(product) != graph.products_group() {
        group_product(graph, product, finding, report);
    }
}

fn group_product(
    graph: &mut ProjectGraph,
    product: &ObjectId,
    finding: &Finding,
    report: &mut RepairReport,
) {
    match graph.add_to_products_group(product) {
        Ok(()) => report.apply(RepairAction::GroupedProduct {
            product: product.clone(),
        }),
        Err(err) => report.fail(finding, err),
    }
}
