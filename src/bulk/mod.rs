//! Bulk Operation Coordinator: sequential batch edge creation.
//!
//! Items are processed strictly in input order. Per-item failures are
//! recorded as structured results, never raised as request-level errors;
//! the only wholesale rejection is a batch over the configured cap, which
//! fails before any item is attempted.

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::config::LimitsConfig;
use crate::error::{Result, ShardgraphError};
use crate::model::NewEdge;
use crate::relations::RelationshipManager;

/// Policy when an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Record the failure and keep going (default).
    #[default]
    Continue,
    /// Stop at the first failure; the rest become `skipped`.
    Abort,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkOptions {
    /// Persist bidirectional edges without writing their inverse rows.
    #[serde(default)]
    pub skip_inverse_creation: bool,
    #[serde(default)]
    pub on_error: OnError,
}

/// One edge to create, without the request-level tenant/user fields.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEdgeInput {
    pub source_shard_id: String,
    pub target_shard_id: String,
    pub relationship_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub metadata: Map<String, serde_json::Value>,
}

impl BulkEdgeInput {
    fn into_new_edge(self, tenant_id: &str, user_id: &str) -> NewEdge {
        NewEdge {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            source_shard_id: self.source_shard_id,
            target_shard_id: self.target_shard_id,
            relationship_type: self.relationship_type,
            id: self.id,
            label: self.label,
            weight: self.weight,
            bidirectional: self.bidirectional,
            order: self.order,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Success,
    Failure,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkItemResult {
    /// Position in the request's edge list.
    pub index: usize,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ItemError>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkSummary {
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkResult {
    /// True iff every item succeeded.
    pub success: bool,
    pub summary: BulkSummary,
    pub items: Vec<BulkItemResult>,
}

/// Create a batch of relationships for one tenant.
///
/// Fails `Validation` before any processing when the batch exceeds the
/// configured cap. Otherwise always returns a structured result, even when
/// every item fails.
pub async fn bulk_create(
    manager: &RelationshipManager,
    limits: &LimitsConfig,
    tenant_id: &str,
    user_id: &str,
    edges: Vec<BulkEdgeInput>,
    options: &BulkOptions,
) -> Result<BulkResult> {
    if edges.len() > limits.max_bulk_items {
        return Err(ShardgraphError::Validation(format!(
            "batch of {} edges exceeds the maximum of {}",
            edges.len(),
            limits.max_bulk_items
        )));
    }

    let indexed: Vec<(usize, BulkEdgeInput)> = edges.into_iter().enumerate().collect();
    let mut result = process_group(manager, tenant_id, user_id, indexed, options).await;
    result.items.sort_by_key(|item| item.index);
    log::info!(
        "bulk create for tenant {}: created={} failed={} skipped={}",
        tenant_id,
        result.summary.created,
        result.summary.failed,
        result.summary.skipped
    );
    Ok(result)
}

/// One edge of a multi-partition batch, tagged with its owning partition
/// (project).
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionedEdgeInput {
    pub partition_id: String,
    #[serde(flatten)]
    pub edge: BulkEdgeInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionResult {
    pub partition_id: String,
    pub result: BulkResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionedBulkResult {
    /// True iff every partition fully succeeded.
    pub success: bool,
    pub partitions: Vec<PartitionResult>,
}

/// Multi-partition variant: edges are grouped by partition in first-seen
/// order and processed with the same per-item semantics within each group.
/// `Abort` halts only the failing partition's remaining items; other
/// partitions still run. Item indices refer to the original input order.
pub async fn bulk_create_partitioned(
    manager: &RelationshipManager,
    limits: &LimitsConfig,
    tenant_id: &str,
    user_id: &str,
    items: Vec<PartitionedEdgeInput>,
    options: &BulkOptions,
) -> Result<PartitionedBulkResult> {
    if items.len() > limits.max_bulk_items {
        return Err(ShardgraphError::Validation(format!(
            "batch of {} edges exceeds the maximum of {}",
            items.len(),
            limits.max_bulk_items
        )));
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, Vec<(usize, BulkEdgeInput)>> =
        std::collections::HashMap::new();
    for (index, item) in items.into_iter().enumerate() {
        if !groups.contains_key(&item.partition_id) {
            order.push(item.partition_id.clone());
        }
        groups
            .entry(item.partition_id)
            .or_default()
            .push((index, item.edge));
    }

    let mut partitions = Vec::with_capacity(order.len());
    let mut success = true;
    for partition_id in order {
        let group = groups.remove(&partition_id).unwrap_or_default();
        let mut result = process_group(manager, tenant_id, user_id, group, options).await;
        result.items.sort_by_key(|item| item.index);
        success = success && result.success;
        partitions.push(PartitionResult {
            partition_id,
            result,
        });
    }

    Ok(PartitionedBulkResult {
        success,
        partitions,
    })
}

/// Sequential per-item processing with continue/abort semantics. Items
/// arrive with their original request indices.
async fn process_group(
    manager: &RelationshipManager,
    tenant_id: &str,
    user_id: &str,
    items: Vec<(usize, BulkEdgeInput)>,
    options: &BulkOptions,
) -> BulkResult {
    let mut summary = BulkSummary::default();
    let mut results = Vec::with_capacity(items.len());
    let mut aborted = false;

    for (index, input) in items {
        if aborted {
            summary.skipped += 1;
            results.push(BulkItemResult {
                index,
                status: ItemStatus::Skipped,
                edge_id: None,
                error: None,
            });
            continue;
        }

        let input = input.into_new_edge(tenant_id, user_id);
        match manager
            .create_relationship_opts(input, options.skip_inverse_creation)
            .await
        {
            Ok(edge) => {
                summary.created += 1;
                results.push(BulkItemResult {
                    index,
                    status: ItemStatus::Success,
                    edge_id: Some(edge.id),
                    error: None,
                });
            }
            Err(e) => {
                summary.failed += 1;
                results.push(BulkItemResult {
                    index,
                    status: ItemStatus::Failure,
                    edge_id: None,
                    error: Some(ItemError {
                        kind: e.kind(),
                        message: e.to_string(),
                    }),
                });
                if options.on_error == OnError::Abort {
                    aborted = true;
                }
            }
        }
    }

    BulkResult {
        success: summary.failed == 0 && summary.skipped == 0,
        summary,
        items: results,
    }
}
