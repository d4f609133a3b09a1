//! Edge Store: persistence abstraction over the edges table.
//!
//! Point read/write by edge id, adjacency lookup by shard id + direction,
//! and filtered keyset scans for pagination. All reads and writes are
//! tenant-scoped; constraint violations surface as `Conflict` here, at the
//! point of failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Row};
use serde_json::Map;

use crate::db::Db;
use crate::error::{Result, ShardgraphError};
use crate::model::{AdjacencyFilter, Direction, Edge};

const EDGE_COLUMNS: &str = "edge_id, tenant_id, source_shard_id, source_shard_type_id, \
     source_shard_type_name, target_shard_id, target_shard_type_id, \
     target_shard_type_name, relationship_type, label, weight, bidirectional, \
     sort_order, metadata_json, created_by, updated_by, created_at, updated_at, \
     access_count, rating";

/// Optional equality filters for `scan`, ANDed together. `tenant_id` is
/// always required.
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub tenant_id: String,
    pub source_shard_id: Option<String>,
    pub target_shard_id: Option<String>,
    pub source_shard_type_id: Option<String>,
    pub target_shard_type_id: Option<String>,
    pub relationship_type: Option<String>,
}

pub struct EdgeStore {
    db: Arc<Db>,
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_edge(row: &Row) -> rusqlite::Result<Edge> {
    let metadata_json: Option<String> = row.get(13)?;
    let metadata: Map<String, serde_json::Value> = match metadata_json {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, Type::Text, Box::new(e))
        })?,
        None => Map::new(),
    };
    Ok(Edge {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        source_shard_id: row.get(2)?,
        source_shard_type_id: row.get(3)?,
        source_shard_type_name: row.get(4)?,
        target_shard_id: row.get(5)?,
        target_shard_type_id: row.get(6)?,
        target_shard_type_name: row.get(7)?,
        relationship_type: row.get(8)?,
        label: row.get(9)?,
        weight: row.get(10)?,
        bidirectional: row.get::<_, i64>(11)? != 0,
        order: row.get(12)?,
        metadata,
        created_by: row.get(14)?,
        updated_by: row.get(15)?,
        created_at: parse_ts(row, 16)?,
        updated_at: parse_ts(row, 17)?,
        access_count: row.get(18)?,
        rating: row.get(19)?,
    })
}

/// Map UNIQUE/CHECK violations to Conflict; everything else stays Database.
fn map_insert_error(e: rusqlite::Error, edge: &Edge) -> ShardgraphError {
    match &e {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ShardgraphError::Conflict(format!(
                "relationship {} -> {} ({}) already exists for tenant {}",
                edge.source_shard_id,
                edge.target_shard_id,
                edge.relationship_type,
                edge.tenant_id
            ))
        }
        _ => ShardgraphError::Database(e),
    }
}

impl EdgeStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Insert a single edge row. Fails `Conflict` on a duplicate edge id or
    /// duplicate (source, target, type) triple within the tenant.
    pub async fn insert(&self, edge: &Edge) -> Result<()> {
        let e = edge.clone();
        let metadata_json = if e.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&e.metadata).map_err(|err| {
                ShardgraphError::Validation(format!("metadata not serializable: {}", err))
            })?)
        };
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO edges (
                        edge_id, tenant_id, source_shard_id, source_shard_type_id,
                        source_shard_type_name, target_shard_id, target_shard_type_id,
                        target_shard_type_name, relationship_type, label, weight,
                        bidirectional, sort_order, metadata_json, created_by,
                        updated_by, created_at, updated_at, access_count, rating
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                              ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                    "#,
                    params![
                        e.id,
                        e.tenant_id,
                        e.source_shard_id,
                        e.source_shard_type_id,
                        e.source_shard_type_name,
                        e.target_shard_id,
                        e.target_shard_type_id,
                        e.target_shard_type_name,
                        e.relationship_type,
                        e.label,
                        e.weight,
                        e.bidirectional as i64,
                        e.order,
                        metadata_json,
                        e.created_by,
                        e.updated_by,
                        e.created_at.to_rfc3339(),
                        e.updated_at.to_rfc3339(),
                        e.access_count,
                        e.rating,
                    ],
                )
                .map_err(|err| map_insert_error(err, &e))?;
                Ok(())
            })
            .await
    }

    /// Point read by edge id, tenant-scoped. Absence is not an error.
    pub async fn get(&self, tenant_id: &str, edge_id: &str) -> Result<Option<Edge>> {
        let tenant = tenant_id.to_string();
        let id = edge_id.to_string();
        self.db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT {} FROM edges WHERE tenant_id = ?1 AND edge_id = ?2",
                    EDGE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows = stmt.query_map(params![tenant, id], row_to_edge)?;
                match rows.next() {
                    Some(row) => Ok(Some(row.map_err(ShardgraphError::Database)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Lookup by the unique (source, target, type) triple.
    pub async fn find_by_triple(
        &self,
        tenant_id: &str,
        source_shard_id: &str,
        target_shard_id: &str,
        relationship_type: &str,
    ) -> Result<Option<Edge>> {
        let tenant = tenant_id.to_string();
        let source = source_shard_id.to_string();
        let target = target_shard_id.to_string();
        let rel_type = relationship_type.to_string();
        self.db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT {} FROM edges WHERE tenant_id = ?1 AND source_shard_id = ?2 \
                     AND target_shard_id = ?3 AND relationship_type = ?4",
                    EDGE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut rows =
                    stmt.query_map(params![tenant, source, target, rel_type], row_to_edge)?;
                match rows.next() {
                    Some(row) => Ok(Some(row.map_err(ShardgraphError::Database)?)),
                    None => Ok(None),
                }
            })
            .await
    }

    /// Rewrite the patchable columns of an edge. `NotFound` if the row is
    /// absent for this tenant.
    pub async fn update(&self, edge: &Edge) -> Result<()> {
        let e = edge.clone();
        let metadata_json = if e.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&e.metadata).map_err(|err| {
                ShardgraphError::Validation(format!("metadata not serializable: {}", err))
            })?)
        };
        self.db
            .with_connection(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE edges SET
                        label = ?1, weight = ?2, metadata_json = ?3, sort_order = ?4,
                        updated_by = ?5, updated_at = ?6
                    WHERE tenant_id = ?7 AND edge_id = ?8
                    "#,
                    params![
                        e.label,
                        e.weight,
                        metadata_json,
                        e.order,
                        e.updated_by,
                        e.updated_at.to_rfc3339(),
                        e.tenant_id,
                        e.id,
                    ],
                )?;
                if changed == 0 {
                    return Err(ShardgraphError::NotFound(format!(
                        "edge {} not found for tenant {}",
                        e.id, e.tenant_id
                    )));
                }
                Ok(())
            })
            .await
    }

    /// Delete an edge by id. Idempotent: returns whether a row was removed.
    pub async fn delete(&self, tenant_id: &str, edge_id: &str) -> Result<bool> {
        let tenant = tenant_id.to_string();
        let id = edge_id.to_string();
        self.db
            .with_connection(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM edges WHERE tenant_id = ?1 AND edge_id = ?2",
                    params![tenant, id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Edges incident to a shard, ordered by creation (seq).
    pub async fn adjacent(
        &self,
        tenant_id: &str,
        shard_id: &str,
        direction: Direction,
        filter: &AdjacencyFilter,
    ) -> Result<Vec<Edge>> {
        let tenant = tenant_id.to_string();
        let shard = shard_id.to_string();
        let rel_type = filter.relationship_type.clone();
        let limit = filter.limit;
        self.db
            .with_connection(move |conn| {
                let mut sql = format!("SELECT {} FROM edges WHERE tenant_id = ?", EDGE_COLUMNS);
                let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> =
                    vec![Box::new(tenant)];
                match direction {
                    Direction::Outgoing => {
                        sql.push_str(" AND source_shard_id = ?");
                        sql_params.push(Box::new(shard));
                    }
                    Direction::Incoming => {
                        sql.push_str(" AND target_shard_id = ?");
                        sql_params.push(Box::new(shard));
                    }
                    Direction::Both => {
                        sql.push_str(" AND (source_shard_id = ? OR target_shard_id = ?)");
                        sql_params.push(Box::new(shard.clone()));
                        sql_params.push(Box::new(shard));
                    }
                }
                if let Some(rt) = rel_type {
                    sql.push_str(" AND relationship_type = ?");
                    sql_params.push(Box::new(rt));
                }
                sql.push_str(" ORDER BY seq");
                if let Some(n) = limit {
                    sql.push_str(" LIMIT ?");
                    sql_params.push(Box::new(n as i64));
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows =
                    stmt.query_map(rusqlite::params_from_iter(sql_params), row_to_edge)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(ShardgraphError::Database)?);
                }
                Ok(out)
            })
            .await
    }

    /// Keyset scan for the Query Engine: edges matching the filter with
    /// seq > after_seq, in seq order, at most `limit` rows. Returns each
    /// edge with its seq so the caller can build a cursor.
    pub async fn scan(
        &self,
        filter: &EdgeFilter,
        limit: usize,
        after_seq: i64,
    ) -> Result<Vec<(i64, Edge)>> {
        let f = filter.clone();
        self.db
            .with_connection(move |conn| {
                let mut sql = format!(
                    "SELECT seq, {} FROM edges WHERE tenant_id = ? AND seq > ?",
                    EDGE_COLUMNS
                );
                let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> =
                    vec![Box::new(f.tenant_id), Box::new(after_seq)];
                let optional = [
                    ("source_shard_id", f.source_shard_id),
                    ("target_shard_id", f.target_shard_id),
                    ("source_shard_type_id", f.source_shard_type_id),
                    ("target_shard_type_id", f.target_shard_type_id),
                    ("relationship_type", f.relationship_type),
                ];
                for (col, value) in optional {
                    if let Some(v) = value {
                        sql.push_str(&format!(" AND {} = ?", col));
                        sql_params.push(Box::new(v));
                    }
                }
                sql.push_str(" ORDER BY seq LIMIT ?");
                sql_params.push(Box::new(limit as i64));
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(sql_params), |row| {
                    let seq: i64 = row.get(0)?;
                    // row_to_edge indexes from the first edge column
                    let edge = row_to_edge_offset(row)?;
                    Ok((seq, edge))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(ShardgraphError::Database)?);
                }
                Ok(out)
            })
            .await
    }

    /// External access-tracking hook: bump the counter, nothing else.
    pub async fn increment_access(&self, tenant_id: &str, edge_id: &str) -> Result<()> {
        let tenant = tenant_id.to_string();
        let id = edge_id.to_string();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE edges SET access_count = access_count + 1 \
                     WHERE tenant_id = ?1 AND edge_id = ?2",
                    params![tenant, id],
                )?;
                Ok(())
            })
            .await
    }

    /// Store numeric feedback on an edge. `NotFound` if absent.
    pub async fn set_rating(&self, tenant_id: &str, edge_id: &str, rating: f64) -> Result<()> {
        let tenant = tenant_id.to_string();
        let id = edge_id.to_string();
        self.db
            .with_connection(move |conn| {
                let changed = conn.execute(
                    "UPDATE edges SET rating = ?1 WHERE tenant_id = ?2 AND edge_id = ?3",
                    params![rating, tenant, id],
                )?;
                if changed == 0 {
                    return Err(ShardgraphError::NotFound(format!(
                        "edge {} not found for tenant {}",
                        id, tenant
                    )));
                }
                Ok(())
            })
            .await
    }
}

/// Like `row_to_edge` but for rows whose column 0 is seq.
fn row_to_edge_offset(row: &Row) -> rusqlite::Result<Edge> {
    let metadata_json: Option<String> = row.get(14)?;
    let metadata: Map<String, serde_json::Value> = match metadata_json {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e))
        })?,
        None => Map::new(),
    };
    Ok(Edge {
        id: row.get(1)?,
        tenant_id: row.get(2)?,
        source_shard_id: row.get(3)?,
        source_shard_type_id: row.get(4)?,
        source_shard_type_name: row.get(5)?,
        target_shard_id: row.get(6)?,
        target_shard_type_id: row.get(7)?,
        target_shard_type_name: row.get(8)?,
        relationship_type: row.get(9)?,
        label: row.get(10)?,
        weight: row.get(11)?,
        bidirectional: row.get::<_, i64>(12)? != 0,
        order: row.get(13)?,
        metadata,
        created_by: row.get(15)?,
        updated_by: row.get(16)?,
        created_at: parse_ts(row, 17)?,
        updated_at: parse_ts(row, 18)?,
        access_count: row.get(19)?,
        rating: row.get(20)?,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{sample_edge, setup_db};
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        let mut edge = sample_edge("t1", "e1", "a", "b", "references");
        edge.label = Some("refs".to_string());
        edge.metadata
            .insert("origin".to_string(), serde_json::json!("import"));
        store.insert(&edge).await.unwrap();

        let found = store.get("t1", "e1").await.unwrap().unwrap();
        assert_eq!(found.source_shard_id, "a");
        assert_eq!(found.label.as_deref(), Some("refs"));
        assert_eq!(found.metadata["origin"], serde_json::json!("import"));

        // Tenant scoping: same id under another tenant is invisible
        assert!(store.get("t2", "e1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_triple_is_conflict() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        store
            .insert(&sample_edge("t1", "e1", "a", "b", "blocks"))
            .await
            .unwrap();
        let err = store
            .insert(&sample_edge("t1", "e2", "a", "b", "blocks"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShardgraphError::Conflict(_)));

        // Same triple under a different tenant is fine
        store
            .insert(&sample_edge("t2", "e1", "a", "b", "blocks"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        store
            .insert(&sample_edge("t1", "e1", "a", "b", "references"))
            .await
            .unwrap();
        assert!(store.delete("t1", "e1").await.unwrap());
        assert!(!store.delete("t1", "e1").await.unwrap());
    }

    #[tokio::test]
    async fn test_adjacent_directions() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        store
            .insert(&sample_edge("t1", "e1", "a", "b", "references"))
            .await
            .unwrap();
        store
            .insert(&sample_edge("t1", "e2", "c", "a", "references"))
            .await
            .unwrap();

        let out = store
            .adjacent("t1", "a", Direction::Outgoing, &AdjacencyFilter::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "e1");

        let inc = store
            .adjacent("t1", "a", Direction::Incoming, &AdjacencyFilter::default())
            .await
            .unwrap();
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].id, "e2");

        let both = store
            .adjacent("t1", "a", Direction::Both, &AdjacencyFilter::default())
            .await
            .unwrap();
        assert_eq!(both.len(), 2);
    }

    #[tokio::test]
    async fn test_adjacent_type_filter_and_limit() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        store
            .insert(&sample_edge("t1", "e1", "a", "b", "references"))
            .await
            .unwrap();
        store
            .insert(&sample_edge("t1", "e2", "a", "c", "blocks"))
            .await
            .unwrap();
        store
            .insert(&sample_edge("t1", "e3", "a", "d", "references"))
            .await
            .unwrap();

        let filter = AdjacencyFilter {
            relationship_type: Some("references".to_string()),
            limit: Some(1),
        };
        let out = store
            .adjacent("t1", "a", Direction::Outgoing, &filter)
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relationship_type, "references");
    }

    #[tokio::test]
    async fn test_scan_keyset_ordering() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        for i in 0..5 {
            store
                .insert(&sample_edge(
                    "t1",
                    &format!("e{}", i),
                    &format!("s{}", i),
                    "hub",
                    "references",
                ))
                .await
                .unwrap();
        }
        let filter = EdgeFilter {
            tenant_id: "t1".to_string(),
            target_shard_id: Some("hub".to_string()),
            ..Default::default()
        };
        let first = store.scan(&filter, 2, 0).await.unwrap();
        assert_eq!(first.len(), 2);
        let last_seq = first.last().unwrap().0;
        let rest = store.scan(&filter, 10, last_seq).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert!(rest.iter().all(|(seq, _)| *seq > last_seq));
    }

    #[tokio::test]
    async fn test_access_and_rating() {
        let (db, _temp) = setup_db().await;
        let store = EdgeStore::new(db);
        store
            .insert(&sample_edge("t1", "e1", "a", "b", "references"))
            .await
            .unwrap();
        store.increment_access("t1", "e1").await.unwrap();
        store.increment_access("t1", "e1").await.unwrap();
        store.set_rating("t1", "e1", 4.5).await.unwrap();

        let edge = store.get("t1", "e1").await.unwrap().unwrap();
        assert_eq!(edge.access_count, 2);
        assert_eq!(edge.rating, Some(4.5));

        let err = store.set_rating("t1", "missing", 1.0).await.unwrap_err();
        assert!(matches!(err, ShardgraphError::NotFound(_)));
    }
}
