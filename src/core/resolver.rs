//! Path resolution: user-supplied identifiers to groups and file references.
//!
//! Rules are tried in order and the first match wins:
//!
//! 1. exact match on the full hierarchical path;
//! 2. for identifiers containing `/`, a segment-by-segment walk from the main
//!    group;
//! 3. a match on the final component, disambiguated by how many trailing
//!    segments of the candidate's parent path agree with the supplied prefix.
//!
//! Anything still ambiguous after rule 3 is an `AmbiguousReference`; the
//! resolver never picks an arbitrary candidate.

use super::cache::NodeKind;
use super::error::{PbxError, Result};
use super::graph::ProjectGraph;
use super::model::{Child, ObjectId};
use tracing::debug;

/// Resolves a group identifier. An empty identifier names the main group.
///
/// # Errors
/// Returns `group_not_found` or `ambiguous_reference`.
pub fn resolve_group(graph: &ProjectGraph, ident: &str) -> Result<ObjectId> {
    let ident = normalize(ident);
    if ident.is_empty() {
        return Ok(graph.main_group().clone());
    }
    resolve(graph, NodeKind::Group, ident)
}

/// Resolves a file reference identifier.
///
/// # Errors
/// Returns `file_not_found` or `ambiguous_reference`.
pub fn resolve_file(graph: &ProjectGraph, ident: &str) -> Result<ObjectId> {
    let ident = normalize(ident);
    if ident.is_empty() {
        return Err(PbxError::not_found("file_not_found", ident, "resolver:file"));
    }
    resolve(graph, NodeKind::File, ident)
}

/// Resolves a target by exact name.
///
/// # Errors
/// Returns `target_not_found`.
pub fn resolve_target(graph: &ProjectGraph, name: &str) -> Result<ObjectId> {
    graph.target_id(name.trim())
}

fn normalize(ident: &str) -> &str {
    let trimmed = ident.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.trim_matches('/')
}

fn resolve(graph: &ProjectGraph, kind: NodeKind, ident: &str) -> Result<ObjectId> {
    let (code, origin) = match kind {
        NodeKind::Group => ("group_not_found", "resolver:group"),
        NodeKind::File => ("file_not_found", "resolver:file"),
    };
    let cache = graph.cache();

    match cache.at_path(kind, ident) {
        [] => {}
        [only] => {
            debug!(ident, rule = "exact", "resolved");
            return Ok(only.clone());
        }
        many => return Err(PbxError::ambiguous(ident, describe(graph, many), origin)),
    }

    let (prefix, last) = match ident.rsplit_once('/') {
        Some((prefix, last)) => (Some(prefix), last),
        None => (None, ident),
    };

    if prefix.is_some() {
        if let Some(id) = walk_segments(graph, kind, ident) {
            debug!(ident, rule = "segments", "resolved");
            return Ok(id);
        }
    }

    let candidates = cache.named(kind, last);
    match candidates {
        [] => Err(PbxError::not_found(code, ident, origin)),
        [only] => {
            debug!(ident, rule = "name", "resolved");
            Ok(only.clone())
        }
        many => {
            if let Some(prefix) = prefix {
                if let Some(id) = best_prefix_match(graph, many, prefix) {
                    debug!(ident, rule = "prefix", "resolved");
                    return Ok(id);
                }
            }
            Err(PbxError::ambiguous(ident, describe(graph, many), origin))
        }
    }
}

/// Walks path segments through child groups from the main group.
fn walk_segments(graph: &ProjectGraph, kind: NodeKind, ident: &str) -> Option<ObjectId> {
    let segments: Vec<&str> = ident.split('/').collect();
    let (last, parents) = segments.split_last()?;

    let mut current = graph.main_group().clone();
    for segment in parents {
        current = unique_child(graph, &current, NodeKind::Group, segment)?;
    }
    unique_child(graph, &current, kind, last)
}

fn unique_child(
    graph: &ProjectGraph,
    parent: &ObjectId,
    kind: NodeKind,
    segment: &str,
) -> Option<ObjectId> {
    let group = graph.group(parent)?;
    let mut matches = group.children.iter().filter_map(|child| match (child, kind) {
        (Child::Group(id), NodeKind::Group) => graph
            .group(id)
            .filter(|g| g.display_name() == segment)
            .map(|_| id),
        (Child::File(id), NodeKind::File) => graph
            .file_ref(id)
            .filter(|f| {
                f.display_name() == segment
                    || f.path.as_deref().and_then(|p| p.rsplit('/').next()) == Some(segment)
            })
            .map(|_| id),
        _ => None,
    });
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.clone())
}

/// Picks the candidate whose parent path shares the most trailing segments
/// with `prefix`. Returns `None` when no candidate matches or the best score
/// is shared.
fn best_prefix_match(graph: &ProjectGraph, candidates: &[ObjectId], prefix: &str) -> Option<ObjectId> {
    let wanted: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();

    let mut best: Option<(usize, &ObjectId)> = None;
    let mut tied = false;
    for id in candidates {
        let parent_path = graph
            .parent_of(id)
            .and_then(|p| graph.full_path(p))
            .unwrap_or_default();
        let have: Vec<&str> = parent_path.split('/').filter(|s| !s.is_empty()).collect();
        let score = wanted
            .iter()
            .rev()
            .zip(have.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        match best {
            Some((top, _)) if score < top => {}
            Some((top, _)) if score == top => tied = true,
            _ => {
                best = Some((score, id));
                tied = false;
            }
        }
    }

    match best {
        Some((score, id)) if score > 0 && !tied => Some(id.clone()),
        _ => None,
    }
}

/// Candidate paths in sorted order.
fn describe(graph: &ProjectGraph, ids: &[ObjectId]) -> Vec<String> {
    let mut paths: Vec<String> = ids
        .iter()
        .map(|id| {
            graph
                .full_path(id)
                .map_or_else(|| id.to_string(), str::to_string)
        })
        .collect();
    paths.sort();
    paths
}
