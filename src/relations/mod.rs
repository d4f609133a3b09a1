//! Relationship Manager: edge lifecycle and adjacency queries.
//!
//! Creation enforces endpoint existence, the per-tenant duplicate-triple
//! rule, and the bidirectional-pair invariant. The pair is written as two
//! separate store operations; a half-written pair surfaces as
//! `PartialFailure` carrying the primary edge id, never as silent success.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, ShardgraphError};
use crate::model::{
    AdjacencyFilter, Direction, Edge, EdgePatch, NewEdge, RelatedShard, RelationshipSummary,
};
use crate::monitor::MonitorSink;
use crate::shards::{ShardRecord, ShardRepository, ShardTypeRepository};
use crate::store::EdgeStore;

pub struct RelationshipManager {
    store: Arc<EdgeStore>,
    shards: Arc<dyn ShardRepository>,
    shard_types: Arc<dyn ShardTypeRepository>,
    monitor: Arc<dyn MonitorSink>,
}

impl RelationshipManager {
    pub fn new(
        store: Arc<EdgeStore>,
        shards: Arc<dyn ShardRepository>,
        shard_types: Arc<dyn ShardTypeRepository>,
        monitor: Arc<dyn MonitorSink>,
    ) -> Self {
        Self {
            store,
            shards,
            shard_types,
            monitor,
        }
    }

    /// Report duration always, exception on failure. The sink is
    /// fire-and-forget and never alters the result.
    fn finish<T>(&self, op: &str, start: Instant, result: Result<T>) -> Result<T> {
        self.monitor.record_duration(op, start.elapsed().as_millis());
        if let Err(ref e) = result {
            self.monitor.record_exception(e, op);
        }
        result
    }

    /// Create a relationship, optionally with its inverse pair.
    ///
    /// Returns the created primary edge. If the primary write succeeds but
    /// the inverse write fails, the error is `PartialFailure` and the
    /// primary edge remains persisted.
    pub async fn create_relationship(&self, input: NewEdge) -> Result<Edge> {
        self.create_relationship_opts(input, false).await
    }

    /// Like `create_relationship`, but with the inverse write suppressed
    /// when `skip_inverse` is set (bulk imports that supply both directions
    /// themselves). The bidirectional flag is persisted as declared.
    pub async fn create_relationship_opts(
        &self,
        input: NewEdge,
        skip_inverse: bool,
    ) -> Result<Edge> {
        let start = Instant::now();
        let result = self.create_relationship_inner(input, skip_inverse).await;
        self.finish("create_relationship", start, result)
    }

    async fn create_relationship_inner(&self, input: NewEdge, skip_inverse: bool) -> Result<Edge> {
        validate_input(&input)?;

        let source = self
            .resolve_shard(&input.tenant_id, &input.source_shard_id)
            .await?;
        let target = self
            .resolve_shard(&input.tenant_id, &input.target_shard_id)
            .await?;

        if self
            .store
            .find_by_triple(
                &input.tenant_id,
                &input.source_shard_id,
                &input.target_shard_id,
                &input.relationship_type,
            )
            .await?
            .is_some()
        {
            return Err(ShardgraphError::Conflict(format!(
                "relationship {} -> {} ({}) already exists",
                input.source_shard_id, input.target_shard_id, input.relationship_type
            )));
        }

        let source_type_name = self.denormalized_type_name(&source).await?;
        let target_type_name = self.denormalized_type_name(&target).await?;

        let now = Utc::now();
        let primary = Edge {
            id: input
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            tenant_id: input.tenant_id.clone(),
            source_shard_id: input.source_shard_id.clone(),
            source_shard_type_id: source.shard_type_id.clone(),
            source_shard_type_name: source_type_name,
            target_shard_id: input.target_shard_id.clone(),
            target_shard_type_id: target.shard_type_id.clone(),
            target_shard_type_name: target_type_name,
            relationship_type: input.relationship_type.clone(),
            label: input.label.clone(),
            weight: input.weight.unwrap_or(1.0),
            bidirectional: input.bidirectional,
            order: input.order,
            metadata: input.metadata.clone(),
            created_by: input.user_id.clone(),
            updated_by: input.user_id.clone(),
            created_at: now,
            updated_at: now,
            access_count: 0,
            rating: None,
        };

        self.store.insert(&primary).await?;

        if input.bidirectional && !skip_inverse {
            let inverse = Edge {
                id: Uuid::new_v4().to_string(),
                source_shard_id: primary.target_shard_id.clone(),
                source_shard_type_id: primary.target_shard_type_id.clone(),
                source_shard_type_name: primary.target_shard_type_name.clone(),
                target_shard_id: primary.source_shard_id.clone(),
                target_shard_type_id: primary.source_shard_type_id.clone(),
                target_shard_type_name: primary.source_shard_type_name.clone(),
                ..primary.clone()
            };
            if let Err(e) = self.store.insert(&inverse).await {
                // The store offers no cross-row transaction; the primary is
                // already visible. Surface the gap instead of hiding it.
                return Err(ShardgraphError::PartialFailure {
                    message: format!("inverse edge write failed: {}", e),
                    primary_edge_id: primary.id.clone(),
                });
            }
        }

        log::debug!(
            "created relationship {} ({} -> {}, type={}, bidirectional={})",
            primary.id,
            primary.source_shard_id,
            primary.target_shard_id,
            primary.relationship_type,
            primary.bidirectional
        );

        Ok(primary)
    }

    async fn resolve_shard(&self, tenant_id: &str, shard_id: &str) -> Result<ShardRecord> {
        self.shards
            .lookup(tenant_id, shard_id)
            .await?
            .ok_or_else(|| {
                ShardgraphError::NotFound(format!(
                    "shard {} not found for tenant {}",
                    shard_id, tenant_id
                ))
            })
    }

    /// Type name for denormalization onto the edge. The type registry wins;
    /// the shard record's own name is the fallback when the registry lags.
    async fn denormalized_type_name(&self, shard: &ShardRecord) -> Result<String> {
        Ok(self
            .shard_types
            .lookup(&shard.shard_type_id)
            .await?
            .map(|t| t.name)
            .unwrap_or_else(|| shard.shard_type_name.clone()))
    }

    /// Point lookup; `None` when absent or tenant mismatch.
    pub async fn get_edge(&self, tenant_id: &str, edge_id: &str) -> Result<Option<Edge>> {
        let start = Instant::now();
        let result = self.store.get(tenant_id, edge_id).await;
        self.finish("get_edge", start, result)
    }

    /// Apply a one-sided patch. Never touches the paired inverse edge.
    pub async fn update_relationship(
        &self,
        tenant_id: &str,
        edge_id: &str,
        patch: EdgePatch,
    ) -> Result<Edge> {
        let start = Instant::now();
        let result = self.update_relationship_inner(tenant_id, edge_id, patch).await;
        self.finish("update_relationship", start, result)
    }

    async fn update_relationship_inner(
        &self,
        tenant_id: &str,
        edge_id: &str,
        patch: EdgePatch,
    ) -> Result<Edge> {
        if let Some(w) = patch.weight {
            if w < 0.0 {
                return Err(ShardgraphError::Validation(
                    "weight must be >= 0".to_string(),
                ));
            }
        }
        let mut edge = self.store.get(tenant_id, edge_id).await?.ok_or_else(|| {
            ShardgraphError::NotFound(format!(
                "edge {} not found for tenant {}",
                edge_id, tenant_id
            ))
        })?;

        if let Some(label) = patch.label {
            edge.label = Some(label);
        }
        if let Some(weight) = patch.weight {
            edge.weight = weight;
        }
        if let Some(metadata) = patch.metadata {
            edge.metadata = metadata;
        }
        if let Some(order) = patch.order {
            edge.order = Some(order);
        }
        edge.updated_by = patch.updated_by;
        edge.updated_at = Utc::now();

        self.store.update(&edge).await?;
        Ok(edge)
    }

    /// Delete an edge; when it is bidirectional and `delete_inverse` is set,
    /// the paired inverse edge goes with it. A missing inverse is tolerated.
    pub async fn delete_relationship(
        &self,
        tenant_id: &str,
        edge_id: &str,
        delete_inverse: bool,
    ) -> Result<()> {
        let start = Instant::now();
        let result = self
            .delete_relationship_inner(tenant_id, edge_id, delete_inverse)
            .await;
        self.finish("delete_relationship", start, result)
    }

    async fn delete_relationship_inner(
        &self,
        tenant_id: &str,
        edge_id: &str,
        delete_inverse: bool,
    ) -> Result<()> {
        let edge = self.store.get(tenant_id, edge_id).await?.ok_or_else(|| {
            ShardgraphError::NotFound(format!(
                "edge {} not found for tenant {}",
                edge_id, tenant_id
            ))
        })?;

        self.store.delete(tenant_id, edge_id).await?;

        if edge.bidirectional && delete_inverse {
            let inverse = self
                .store
                .find_by_triple(
                    tenant_id,
                    &edge.target_shard_id,
                    &edge.source_shard_id,
                    &edge.relationship_type,
                )
                .await?;
            if let Some(inv) = inverse {
                self.store.delete(tenant_id, &inv.id).await?;
            } else {
                log::debug!(
                    "inverse of bidirectional edge {} already absent, nothing to delete",
                    edge_id
                );
            }
        }
        Ok(())
    }

    /// Edges incident to a shard, filtered by direction and type.
    pub async fn get_relationships(
        &self,
        tenant_id: &str,
        shard_id: &str,
        direction: Direction,
        filter: &AdjacencyFilter,
    ) -> Result<Vec<Edge>> {
        let start = Instant::now();
        let result = self.store.adjacent(tenant_id, shard_id, direction, filter).await;
        self.finish("get_relationships", start, result)
    }

    /// Adjacency joined against the Shard Repository; each result's
    /// direction is derived by comparing the edge's source to the queried
    /// shard. Shards the repository no longer knows still appear, with the
    /// edge's denormalized type info and no payload.
    pub async fn get_related_shards(
        &self,
        tenant_id: &str,
        shard_id: &str,
        direction: Direction,
        filter: &AdjacencyFilter,
    ) -> Result<Vec<RelatedShard>> {
        let start = Instant::now();
        let result = self
            .get_related_shards_inner(tenant_id, shard_id, direction, filter)
            .await;
        self.finish("get_related_shards", start, result)
    }

    async fn get_related_shards_inner(
        &self,
        tenant_id: &str,
        shard_id: &str,
        direction: Direction,
        filter: &AdjacencyFilter,
    ) -> Result<Vec<RelatedShard>> {
        let edges = self
            .store
            .adjacent(tenant_id, shard_id, direction, filter)
            .await?;
        let mut out = Vec::with_capacity(edges.len());
        for edge in edges {
            let (other_id, other_type_id, other_type_name, dir) =
                if edge.source_shard_id == shard_id {
                    (
                        edge.target_shard_id.clone(),
                        edge.target_shard_type_id.clone(),
                        edge.target_shard_type_name.clone(),
                        Direction::Outgoing,
                    )
                } else {
                    (
                        edge.source_shard_id.clone(),
                        edge.source_shard_type_id.clone(),
                        edge.source_shard_type_name.clone(),
                        Direction::Incoming,
                    )
                };
            let payload = self
                .shards
                .lookup(tenant_id, &other_id)
                .await?
                .and_then(|s| s.payload);
            out.push(RelatedShard {
                edge,
                shard_id: other_id,
                shard_type_id: other_type_id,
                shard_type_name: other_type_name,
                payload,
                direction: dir,
            });
        }
        Ok(out)
    }

    /// Counts of a shard's incident edges grouped by relationship type and
    /// direction.
    pub async fn get_relationship_summary(
        &self,
        tenant_id: &str,
        shard_id: &str,
    ) -> Result<RelationshipSummary> {
        let start = Instant::now();
        let result = self.get_relationship_summary_inner(tenant_id, shard_id).await;
        self.finish("get_relationship_summary", start, result)
    }

    async fn get_relationship_summary_inner(
        &self,
        tenant_id: &str,
        shard_id: &str,
    ) -> Result<RelationshipSummary> {
        let edges = self
            .store
            .adjacent(
                tenant_id,
                shard_id,
                Direction::Both,
                &AdjacencyFilter::default(),
            )
            .await?;
        let mut summary = RelationshipSummary {
            total: edges.len(),
            outgoing: 0,
            incoming: 0,
            by_type: BTreeMap::new(),
        };
        for edge in &edges {
            if edge.source_shard_id == shard_id {
                summary.outgoing += 1;
            } else {
                summary.incoming += 1;
            }
            *summary
                .by_type
                .entry(edge.relationship_type.clone())
                .or_insert(0) += 1;
        }
        Ok(summary)
    }

    /// External access-tracking hook.
    pub async fn record_access(&self, tenant_id: &str, edge_id: &str) -> Result<()> {
        let start = Instant::now();
        let result = self.store.increment_access(tenant_id, edge_id).await;
        self.finish("record_access", start, result)
    }

    /// Store numeric feedback on an edge.
    pub async fn set_rating(&self, tenant_id: &str, edge_id: &str, rating: f64) -> Result<()> {
        let start = Instant::now();
        let result = self.store.set_rating(tenant_id, edge_id, rating).await;
        self.finish("set_rating", start, result)
    }
}

fn validate_input(input: &NewEdge) -> Result<()> {
    for (field, value) in [
        ("tenant_id", &input.tenant_id),
        ("user_id", &input.user_id),
        ("source_shard_id", &input.source_shard_id),
        ("target_shard_id", &input.target_shard_id),
        ("relationship_type", &input.relationship_type),
    ] {
        if value.trim().is_empty() {
            return Err(ShardgraphError::Validation(format!(
                "{} is required",
                field
            )));
        }
    }
    if input.source_shard_id == input.target_shard_id {
        return Err(ShardgraphError::Validation(
            "self-loops are not allowed: source and target shard must differ".to_string(),
        ));
    }
    if let Some(w) = input.weight {
        if w < 0.0 {
            return Err(ShardgraphError::Validation(
                "weight must be >= 0".to_string(),
            ));
        }
    }
    Ok(())
}
