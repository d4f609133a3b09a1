//! Bounded BFS traversal over the relationship graph.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::LimitsConfig;
use crate::error::Result;
use crate::model::{AdjacencyFilter, Direction, Edge};
use crate::relations::RelationshipManager;

/// Parameters for one traversal. Depth and node budgets are clamped to the
/// configured ceilings.
#[derive(Debug, Clone)]
pub struct TraversalRequest {
    pub tenant_id: String,
    pub root_shard_id: String,
    pub max_depth: usize,
    pub direction: Direction,
    /// Only follow edges of these types when set.
    pub relationship_types: Option<Vec<String>>,
    /// Neighbor shard-type-id filters; exclude wins over include.
    pub include_shard_types: Option<Vec<String>>,
    pub exclude_shard_types: Option<Vec<String>>,
    pub max_nodes: usize,
}

/// A shard discovered by traversal. Type info is denormalized off the edge
/// that discovered the node; an isolated root has none.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub shard_id: String,
    pub shard_type_id: Option<String>,
    pub shard_type_name: Option<String>,
    /// Hop distance from the root.
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraversalResult {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    /// True iff the reachable set within `max_depth` exceeds `max_nodes`.
    pub truncated: bool,
}

/// Traverse the graph breadth-first from a root shard.
///
/// Frontier nodes are expanded in insertion order and incident edges arrive
/// in creation order from the store, so results are deterministic for a
/// given dataset. An edge appears in the result iff both its endpoints are
/// in the final node set. Reaching the node budget stops expansion and
/// flags the result `truncated`; that is a successful partial result, not
/// an error.
pub async fn traverse_graph(
    manager: &RelationshipManager,
    limits: &LimitsConfig,
    req: &TraversalRequest,
) -> Result<TraversalResult> {
    let max_depth = req.max_depth.min(limits.max_traversal_depth);
    let max_nodes = req.max_nodes.min(limits.max_traversal_nodes).max(1);

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(req.root_shard_id.clone());

    let mut nodes = vec![GraphNode {
        shard_id: req.root_shard_id.clone(),
        shard_type_id: None,
        shard_type_name: None,
        depth: 0,
    }];
    let mut frontier = vec![req.root_shard_id.clone()];
    let mut candidate_edges: Vec<Edge> = Vec::new();
    let mut seen_edge_ids: HashSet<String> = HashSet::new();
    let mut truncated = false;
    let mut depth = 0;

    let type_set: Option<HashSet<&str>> = req
        .relationship_types
        .as_ref()
        .map(|ts| ts.iter().map(String::as_str).collect());

    while depth < max_depth && !frontier.is_empty() && visited.len() < max_nodes {
        let mut next_frontier = Vec::new();

        for shard_id in &frontier {
            let incident = manager
                .get_relationships(
                    &req.tenant_id,
                    shard_id,
                    req.direction,
                    &AdjacencyFilter::default(),
                )
                .await?;

            for edge in incident {
                if let Some(ref types) = type_set {
                    if !types.contains(edge.relationship_type.as_str()) {
                        continue;
                    }
                }

                let (neighbor_id, neighbor_type_id, neighbor_type_name) =
                    neighbor_of(&edge, shard_id);

                if seen_edge_ids.insert(edge.id.clone()) {
                    candidate_edges.push(edge.clone());
                }

                if visited.contains(&neighbor_id) {
                    continue;
                }
                if !passes_type_filters(req, &neighbor_type_id) {
                    continue;
                }
                if visited.len() >= max_nodes {
                    // A passing neighbor exists beyond the budget
                    truncated = true;
                    continue;
                }

                visited.insert(neighbor_id.clone());
                nodes.push(GraphNode {
                    shard_id: neighbor_id.clone(),
                    shard_type_id: Some(neighbor_type_id),
                    shard_type_name: Some(neighbor_type_name),
                    depth: depth + 1,
                });
                next_frontier.push(neighbor_id);
            }
        }

        frontier = next_frontier;
        depth += 1;
    }

    // The budget can fill exactly at a level boundary, leaving a frontier we
    // never scanned. One more scan decides whether the reachable set truly
    // exceeds the budget (and picks up closing edges between admitted nodes).
    if !truncated && depth < max_depth && !frontier.is_empty() && visited.len() >= max_nodes {
        for shard_id in &frontier {
            let incident = manager
                .get_relationships(
                    &req.tenant_id,
                    shard_id,
                    req.direction,
                    &AdjacencyFilter::default(),
                )
                .await?;
            for edge in incident {
                if let Some(ref types) = type_set {
                    if !types.contains(edge.relationship_type.as_str()) {
                        continue;
                    }
                }
                let (neighbor_id, neighbor_type_id, _) = neighbor_of(&edge, shard_id);
                if seen_edge_ids.insert(edge.id.clone()) {
                    candidate_edges.push(edge.clone());
                }
                if !visited.contains(&neighbor_id) && passes_type_filters(req, &neighbor_type_id) {
                    truncated = true;
                }
            }
        }
    }

    let node_set: HashSet<&str> = nodes.iter().map(|n| n.shard_id.as_str()).collect();
    let edges: Vec<Edge> = candidate_edges
        .into_iter()
        .filter(|e| {
            node_set.contains(e.source_shard_id.as_str())
                && node_set.contains(e.target_shard_id.as_str())
        })
        .collect();

    log::debug!(
        "traversal from {} visited {} nodes, {} edges, truncated={}",
        req.root_shard_id,
        nodes.len(),
        edges.len(),
        truncated
    );

    Ok(TraversalResult {
        nodes,
        edges,
        truncated,
    })
}

/// The endpoint of `edge` that is not `shard_id`, with its denormalized
/// type info.
fn neighbor_of(edge: &Edge, shard_id: &str) -> (String, String, String) {
    if edge.source_shard_id == shard_id {
        (
            edge.target_shard_id.clone(),
            edge.target_shard_type_id.clone(),
            edge.target_shard_type_name.clone(),
        )
    } else {
        (
            edge.source_shard_id.clone(),
            edge.source_shard_type_id.clone(),
            edge.source_shard_type_name.clone(),
        )
    }
}

/// Include/exclude shard-type filters; exclude wins when a type appears in
/// both lists.
fn passes_type_filters(req: &TraversalRequest, shard_type_id: &str) -> bool {
    if let Some(ref exclude) = req.exclude_shard_types {
        if exclude.iter().any(|t| t == shard_type_id) {
            return false;
        }
    }
    if let Some(ref include) = req.include_shard_types {
        return include.iter().any(|t| t == shard_type_id);
    }
    true
}
