pub mod bulk;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod model;
pub mod monitor;
pub mod query;
pub mod relations;
pub mod shards;
pub mod store;

pub use config::Config;
pub use error::{Result, ShardgraphError};
pub use graph::{find_path, traverse_graph, PathResult, TraversalRequest, TraversalResult};
pub use model::{Direction, Edge, EdgePatch, NewEdge};
pub use relations::RelationshipManager;
