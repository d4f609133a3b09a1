//! Core data types: edges, directions, creation inputs, patches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed, weighted, optionally bidirectional relationship between two
/// shards. A bidirectional relationship is stored as two physical edge rows
/// with swapped endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier within a tenant (UUID v4 unless supplied).
    pub id: String,
    pub tenant_id: String,
    pub source_shard_id: String,
    pub source_shard_type_id: String,
    /// Type name denormalized at creation time.
    pub source_shard_type_name: String,
    pub target_shard_id: String,
    pub target_shard_type_id: String,
    pub target_shard_type_name: String,
    /// Open string, e.g. `references`, `blocks`. Tenants may introduce new
    /// types without a schema change.
    pub relationship_type: String,
    pub label: Option<String>,
    pub weight: f64,
    pub bidirectional: bool,
    /// Position within an ordered relationship list.
    pub order: Option<i64>,
    pub metadata: Map<String, Value>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented by external access-tracking calls.
    pub access_count: i64,
    pub rating: Option<f64>,
}

/// Which incident edges of a shard to consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Input for creating a single relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEdge {
    pub tenant_id: String,
    pub user_id: String,
    pub source_shard_id: String,
    pub target_shard_id: String,
    pub relationship_type: String,
    /// Explicit id; generated (UUID v4) when omitted.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    /// Defaults to 1.0 when omitted.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// One-sided update: never propagated to a paired inverse edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgePatch {
    pub label: Option<String>,
    pub weight: Option<f64>,
    pub metadata: Option<Map<String, Value>>,
    pub order: Option<i64>,
    pub updated_by: String,
}

/// Filters for adjacency listing.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyFilter {
    pub relationship_type: Option<String>,
    pub limit: Option<usize>,
}

/// An adjacency result joined against the Shard Repository.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedShard {
    pub edge: Edge,
    /// The shard on the far end of the edge.
    pub shard_id: String,
    pub shard_type_id: String,
    pub shard_type_name: String,
    pub payload: Option<Value>,
    /// Direction of the edge relative to the queried shard.
    pub direction: Direction,
}

/// Aggregate counts for a shard's incident edges.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationshipSummary {
    pub total: usize,
    pub outgoing: usize,
    pub incoming: usize,
    /// Counts per relationship type.
    pub by_type: std::collections::BTreeMap<String, usize>,
}
