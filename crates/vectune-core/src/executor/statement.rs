//! Index statement generation.
//!
//! Statements are a pure function of the action, the scope and the index
//! settings: the same inputs always render the same DDL.

use serde::{Deserialize, Serialize};

use crate::config::IndexConfig;
use crate::decision::IndexType;
use crate::error::{Result, TuneError};

/// Longest accepted scope id. Keeps generated names under PostgreSQL's
/// 63-byte identifier limit.
pub const MAX_SCOPE_LEN: usize = 40;

/// Access-method parameters of a vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum IndexParams {
    Hnsw { m: u32, ef_construction: u32 },
    Ivfflat { lists: u32 },
}

impl IndexParams {
    pub fn index_type(&self) -> IndexType {
        match self {
            IndexParams::Hnsw { .. } => IndexType::Hnsw,
            IndexParams::Ivfflat { .. } => IndexType::Ivfflat,
        }
    }

    fn with_clause(&self) -> String {
        match self {
            IndexParams::Hnsw { m, ef_construction } => {
                format!("m = {}, ef_construction = {}", m, ef_construction)
            }
            IndexParams::Ivfflat { lists } => format!("lists = {}", lists),
        }
    }
}

/// Everything needed to create one vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub table: String,
    pub column: String,
    pub operator_class: String,
    pub params: IndexParams,
}

impl IndexSpec {
    /// Build the spec for `index_type` on `scope`.
    pub fn for_scope(index_type: IndexType, scope: &str, config: &IndexConfig) -> Result<Self> {
        let params = match index_type {
            IndexType::Hnsw => IndexParams::Hnsw {
                m: config.hnsw_m,
                ef_construction: config.hnsw_ef_construction,
            },
            IndexType::Ivfflat => IndexParams::Ivfflat {
                lists: config.ivfflat_lists,
            },
        };

        Ok(Self {
            name: index_name(index_type, scope)?,
            table: config.table.clone(),
            column: config.column.clone(),
            operator_class: config.operator_class.clone(),
            params,
        })
    }

    pub fn index_type(&self) -> IndexType {
        self.params.index_type()
    }

    /// Render the `CREATE INDEX` statement.
    pub fn to_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING {} ({} {}) WITH ({})",
            self.name,
            self.table,
            self.index_type(),
            self.column,
            self.operator_class,
            self.params.with_clause()
        )
    }
}

/// Reject scope ids that cannot be embedded in an identifier verbatim.
pub fn validate_scope(scope: &str) -> Result<()> {
    let valid = !scope.is_empty()
        && scope.len() <= MAX_SCOPE_LEN
        && scope.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TuneError::InvalidScope(scope.to_string()))
    }
}

/// `idx_embedding_<type>_<scope>`
pub fn index_name(index_type: IndexType, scope: &str) -> Result<String> {
    validate_scope(scope)?;
    Ok(format!("idx_embedding_{}_{}", index_type, scope))
}
