//! Graph walks over the relationship edges: bounded BFS traversal and
//! shortest-path search. Both are read-only and capped by a traversal
//! budget (`max_depth` plus `max_nodes`) so cost stays bounded regardless
//! of tenant graph size or fan-out.

mod path;
mod traversal;

pub use path::{find_path, PathResult};
pub use traversal::{traverse_graph, GraphNode, TraversalRequest, TraversalResult};
