//! Shard and shard-type collaborators.
//!
//! The engine never owns shard content; it validates edge endpoints and
//! enriches related-shard results through these traits. The sqlite-backed
//! implementations read the platform-synced `shards` / `shard_types` tables.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use serde_json::Value;

use crate::db::Db;
use crate::error::{Result, ShardgraphError};

/// A content node as seen by the graph engine.
#[derive(Debug, Clone)]
pub struct ShardRecord {
    pub id: String,
    pub shard_type_id: String,
    pub shard_type_name: String,
    pub payload: Option<Value>,
}

/// Shard-type metadata, denormalized onto edges at creation time.
#[derive(Debug, Clone)]
pub struct ShardTypeRecord {
    pub id: String,
    pub name: String,
    pub display_name: String,
}

/// Read-only view of shard storage.
#[async_trait]
pub trait ShardRepository: Send + Sync {
    /// Point lookup, tenant-scoped. Absence is not an error.
    async fn lookup(&self, tenant_id: &str, shard_id: &str) -> Result<Option<ShardRecord>>;
}

/// Read-only view of the shard-type schema registry.
#[async_trait]
pub trait ShardTypeRepository: Send + Sync {
    async fn lookup(&self, shard_type_id: &str) -> Result<Option<ShardTypeRecord>>;
}

pub struct SqliteShardRepository {
    db: Arc<Db>,
}

impl SqliteShardRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ShardRepository for SqliteShardRepository {
    async fn lookup(&self, tenant_id: &str, shard_id: &str) -> Result<Option<ShardRecord>> {
        let tenant = tenant_id.to_string();
        let id = shard_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT s.shard_id, s.shard_type_id, t.name, s.payload_json \
                     FROM shards s JOIN shard_types t ON t.shard_type_id = s.shard_type_id \
                     WHERE s.tenant_id = ?1 AND s.shard_id = ?2",
                )?;
                let mut rows = stmt.query_map(params![tenant, id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                })?;
                match rows.next() {
                    Some(row) => {
                        let (id, type_id, type_name, payload_json) =
                            row.map_err(ShardgraphError::Database)?;
                        let payload = match payload_json {
                            Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                                ShardgraphError::Config(format!(
                                    "corrupt shard payload for {}: {}",
                                    id, e
                                ))
                            })?),
                            None => None,
                        };
                        Ok(Some(ShardRecord {
                            id,
                            shard_type_id: type_id,
                            shard_type_name: type_name,
                            payload,
                        }))
                    }
                    None => Ok(None),
                }
            })
            .await
    }
}

pub struct SqliteShardTypeRepository {
    db: Arc<Db>,
}

impl SqliteShardTypeRepository {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ShardTypeRepository for SqliteShardTypeRepository {
    async fn lookup(&self, shard_type_id: &str) -> Result<Option<ShardTypeRecord>> {
        let id = shard_type_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT shard_type_id, name, display_name FROM shard_types \
                     WHERE shard_type_id = ?1",
                )?;
                let mut rows = stmt.query_map(params![id], |row| {
                    Ok(ShardTypeRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        display_name: row.get(2)?,
                    })
                })?;
                match rows.next() {
                    Some(row) => Ok(Some(row.map_err(ShardgraphError::Database)?)),
                    None => Ok(None),
                }
            })
            .await
    }
}
