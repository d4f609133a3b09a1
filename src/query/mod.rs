//! Query Engine: filtered, paginated edge listing.
//!
//! Pages are ordered by the store's creation-order key and resumed with an
//! opaque keyset cursor, so no page rescans from the start. The cursor is
//! tenant-bound: it carries a fingerprint of the issuing tenant and is
//! rejected when presented by any other tenant.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::LimitsConfig;
use crate::error::{Result, ShardgraphError};
use crate::model::Edge;
use crate::store::{EdgeFilter, EdgeStore};

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub filter: EdgeFilter,
    pub limit: usize,
    pub continuation_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub edges: Vec<Edge>,
    /// Cursor for the next page; `None` when this page is the last.
    pub continuation_token: Option<String>,
}

/// Keyset cursor payload. `tenant_fp` binds the token to the tenant it was
/// issued for.
#[derive(Debug, Serialize, Deserialize)]
struct Cursor {
    after_seq: i64,
    tenant_fp: String,
}

fn tenant_fingerprint(tenant_id: &str) -> String {
    let digest = Sha256::digest(tenant_id.as_bytes());
    // First 8 bytes are plenty to bind a cursor to its tenant
    hex_prefix(digest.as_slice(), 8)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{:02x}", b)).collect()
}

fn encode_token(after_seq: i64, tenant_id: &str) -> String {
    let cursor = Cursor {
        after_seq,
        tenant_fp: tenant_fingerprint(tenant_id),
    };
    // Serializing a two-field struct cannot fail
    let raw = serde_json::to_vec(&cursor).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(raw)
}

/// Decode and verify a continuation token against the calling tenant. A
/// forged, corrupt, or foreign-tenant token is a `Validation` failure, never
/// a silent scan of someone else's data.
fn decode_token(token: &str, tenant_id: &str) -> Result<i64> {
    let raw = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| ShardgraphError::Validation("malformed continuation token".to_string()))?;
    let cursor: Cursor = serde_json::from_slice(&raw)
        .map_err(|_| ShardgraphError::Validation("malformed continuation token".to_string()))?;
    if cursor.tenant_fp != tenant_fingerprint(tenant_id) {
        return Err(ShardgraphError::Validation(
            "continuation token does not belong to this tenant".to_string(),
        ));
    }
    Ok(cursor.after_seq)
}

/// Return one page of edges matching the AND of all supplied filters.
pub async fn query_edges(
    store: &EdgeStore,
    limits: &LimitsConfig,
    req: &QueryRequest,
) -> Result<QueryPage> {
    if req.filter.tenant_id.trim().is_empty() {
        return Err(ShardgraphError::Validation(
            "tenant_id is required".to_string(),
        ));
    }
    let limit = req.limit.clamp(1, limits.max_page_size);
    let after_seq = match &req.continuation_token {
        Some(token) => decode_token(token, &req.filter.tenant_id)?,
        None => 0,
    };

    // Fetch one extra row to learn whether another page exists
    let mut rows = store.scan(&req.filter, limit + 1, after_seq).await?;
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    let continuation_token = if has_more {
        rows.last()
            .map(|(seq, _)| encode_token(*seq, &req.filter.tenant_id))
    } else {
        None
    };

    Ok(QueryPage {
        edges: rows.into_iter().map(|(_, edge)| edge).collect(),
        continuation_token,
    })
}
