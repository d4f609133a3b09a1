//! Shortest-path search between two shards.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::config::LimitsConfig;
use crate::error::Result;
use crate::model::{AdjacencyFilter, Direction, Edge};
use crate::relations::RelationshipManager;

/// Outcome of a path search. Not finding a path within the budget is a
/// value, never an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PathResult {
    Found {
        /// Shard ids from source to target inclusive.
        nodes: Vec<String>,
        /// The edges walked, in order; empty when source == target.
        edges: Vec<Edge>,
    },
    NotFound {
        /// Nodes explored before giving up.
        explored: usize,
    },
}

impl PathResult {
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found { .. })
    }
}

/// BFS from source to target, shortest by hop count.
///
/// An edge is traversable in its declared direction, and additionally in
/// reverse when its bidirectional flag is set. The search keeps a
/// predecessor map for path reconstruction and caps explored nodes with the
/// same budget style as the traversal engine.
pub async fn find_path(
    manager: &RelationshipManager,
    limits: &LimitsConfig,
    tenant_id: &str,
    source_shard_id: &str,
    target_shard_id: &str,
    max_depth: usize,
) -> Result<PathResult> {
    if source_shard_id == target_shard_id {
        return Ok(PathResult::Found {
            nodes: vec![source_shard_id.to_string()],
            edges: Vec::new(),
        });
    }

    let max_depth = max_depth.min(limits.max_traversal_depth);
    let max_nodes = limits.max_traversal_nodes;

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(source_shard_id.to_string());
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((source_shard_id.to_string(), 0));
    // neighbor -> (predecessor, connecting edge)
    let mut predecessor: HashMap<String, (String, Edge)> = HashMap::new();

    while let Some((shard_id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        let incident = manager
            .get_relationships(
                tenant_id,
                &shard_id,
                Direction::Both,
                &AdjacencyFilter::default(),
            )
            .await?;

        for edge in incident {
            // Declared direction always; reverse only for bidirectional edges
            let neighbor = if edge.source_shard_id == shard_id {
                edge.target_shard_id.clone()
            } else if edge.bidirectional {
                edge.source_shard_id.clone()
            } else {
                continue;
            };

            if visited.contains(&neighbor) {
                continue;
            }
            // Discovering the target ends the search; a hop sequence found
            // within the budget must never be lost to later budget checks
            if neighbor == target_shard_id {
                predecessor.insert(neighbor, (shard_id.clone(), edge));
                return Ok(reconstruct(
                    source_shard_id,
                    target_shard_id,
                    &predecessor,
                    visited.len() + 1,
                ));
            }
            // A full budget stops admission of new nodes but not the scan:
            // already-queued nodes may still have a direct edge to the target
            if visited.len() >= max_nodes {
                continue;
            }
            visited.insert(neighbor.clone());
            predecessor.insert(neighbor.clone(), (shard_id.clone(), edge.clone()));
            queue.push_back((neighbor, depth + 1));
        }
    }

    if visited.len() >= max_nodes {
        log::debug!(
            "path search {} -> {} hit node budget at {}",
            source_shard_id,
            target_shard_id,
            max_nodes
        );
    }
    Ok(PathResult::NotFound {
        explored: visited.len(),
    })
}

fn reconstruct(
    source: &str,
    target: &str,
    predecessor: &HashMap<String, (String, Edge)>,
    explored: usize,
) -> PathResult {
    let mut nodes = vec![target.to_string()];
    let mut edges = Vec::new();
    let mut current = target.to_string();
    while current != source {
        match predecessor.get(&current) {
            Some((prev, edge)) => {
                edges.push(edge.clone());
                nodes.push(prev.clone());
                current = prev.clone();
            }
            None => {
                // Unreachable with a consistent predecessor map
                return PathResult::NotFound { explored };
            }
        }
    }
    nodes.reverse();
    edges.reverse();
    PathResult::Found { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::test_support::{new_edge, setup_manager};

    #[tokio::test]
    async fn test_zero_length_path() {
        let (manager, _db, _temp) = setup_manager(&["a"]).await;
        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "a", 5)
            .await
            .unwrap();
        match result {
            PathResult::Found { nodes, edges } => {
                assert_eq!(nodes, vec!["a"]);
                assert!(edges.is_empty());
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shortest_by_hops() {
        let (manager, _db, _temp) = setup_manager(&["a", "b", "c", "d"]).await;
        // Long route a->b->c->d and shortcut a->d
        manager
            .create_relationship(new_edge("a", "b", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("b", "c", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("c", "d", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("a", "d", "shortcut"))
            .await
            .unwrap();

        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "d", 5)
            .await
            .unwrap();
        match result {
            PathResult::Found { nodes, edges } => {
                assert_eq!(nodes, vec!["a", "d"]);
                assert_eq!(edges.len(), 1);
                assert_eq!(edges[0].relationship_type, "shortcut");
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multi_hop_ordered_edges() {
        let (manager, _db, _temp) = setup_manager(&["a", "b", "c"]).await;
        manager
            .create_relationship(new_edge("a", "b", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("b", "c", "routes_to"))
            .await
            .unwrap();

        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "c", 5)
            .await
            .unwrap();
        match result {
            PathResult::Found { nodes, edges } => {
                assert_eq!(nodes, vec!["a", "b", "c"]);
                assert_eq!(edges[0].source_shard_id, "a");
                assert_eq!(edges[1].source_shard_id, "b");
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_path_is_a_value() {
        let (manager, _db, _temp) = setup_manager(&["a", "b", "c"]).await;
        manager
            .create_relationship(new_edge("a", "b", "routes_to"))
            .await
            .unwrap();

        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "c", 3)
            .await
            .unwrap();
        assert!(!result.is_found());
    }

    #[tokio::test]
    async fn test_depth_limit_blocks_long_path() {
        let (manager, _db, _temp) = setup_manager(&["a", "b", "c", "d"]).await;
        manager
            .create_relationship(new_edge("a", "b", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("b", "c", "routes_to"))
            .await
            .unwrap();
        manager
            .create_relationship(new_edge("c", "d", "routes_to"))
            .await
            .unwrap();

        let short = find_path(&manager, &LimitsConfig::default(), "t1", "a", "d", 2)
            .await
            .unwrap();
        assert!(!short.is_found());

        let long = find_path(&manager, &LimitsConfig::default(), "t1", "a", "d", 3)
            .await
            .unwrap();
        assert!(long.is_found());
    }

    #[tokio::test]
    async fn test_directed_edge_not_walked_backwards() {
        let (manager, _db, _temp) = setup_manager(&["a", "b"]).await;
        manager
            .create_relationship(new_edge("b", "a", "routes_to"))
            .await
            .unwrap();

        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "b", 3)
            .await
            .unwrap();
        assert!(!result.is_found());
    }

    #[tokio::test]
    async fn test_bidirectional_edge_walked_both_ways() {
        let (manager, _db, _temp) = setup_manager(&["a", "b"]).await;
        let mut input = new_edge("b", "a", "references");
        input.bidirectional = true;
        let primary = manager.create_relationship(input).await.unwrap();
        // Remove the physical inverse row so only the flag allows reverse walking
        let incident = manager
            .get_relationships("t1", "a", Direction::Outgoing, &AdjacencyFilter::default())
            .await
            .unwrap();
        assert_eq!(incident.len(), 1);
        manager
            .delete_relationship("t1", &incident[0].id, false)
            .await
            .unwrap();
        assert!(manager.get_edge("t1", &primary.id).await.unwrap().is_some());

        let result = find_path(&manager, &LimitsConfig::default(), "t1", "a", "b", 3)
            .await
            .unwrap();
        assert!(result.is_found());
    }

    #[tokio::test]
    async fn test_node_budget_caps_search() {
        let (manager, _db, _temp) = setup_manager(&["hub", "s0", "s1", "s2", "s3", "far"]).await;
        for i in 0..4 {
            manager
                .create_relationship(new_edge("hub", &format!("s{}", i), "references"))
                .await
                .unwrap();
        }
        manager
            .create_relationship(new_edge("s3", "far", "references"))
            .await
            .unwrap();

        let limits = LimitsConfig {
            max_traversal_nodes: 3,
            ..Default::default()
        };
        let result = find_path(&manager, &limits, "t1", "hub", "far", 5)
            .await
            .unwrap();
        match result {
            PathResult::NotFound { explored } => assert!(explored <= 3),
            other => panic!("expected NotFound under budget, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_direct_edge_found_despite_exhausted_budget() {
        let (manager, _db, _temp) = setup_manager(&["hub", "s0", "s1", "s2", "far"]).await;
        for i in 0..3 {
            manager
                .create_relationship(new_edge("hub", &format!("s{}", i), "references"))
                .await
                .unwrap();
        }
        manager
            .create_relationship(new_edge("hub", "far", "references"))
            .await
            .unwrap();

        // The spokes fill the node budget before the direct edge is scanned;
        // a reachable target one hop away must still be reported
        let limits = LimitsConfig {
            max_traversal_nodes: 2,
            ..Default::default()
        };
        let result = find_path(&manager, &limits, "t1", "hub", "far", 5)
            .await
            .unwrap();
        match result {
            PathResult::Found { nodes, edges } => {
                assert_eq!(nodes, vec!["hub", "far"]);
                assert_eq!(edges.len(), 1);
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }
}
