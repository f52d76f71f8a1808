//! Optimization actions the controller can take.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vector index access method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    /// Hierarchical Navigable Small World graph
    Hnsw,
    /// Inverted file with flat lists
    Ivfflat,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::Hnsw => "hnsw",
            IndexType::Ivfflat => "ivfflat",
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One optimization action. Closed set, matched exhaustively where executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Leave the store as it is
    #[default]
    NoAction,
    /// Build an HNSW index on the vector column
    CreateHnswIndex,
    /// Build an IVFFlat index on the vector column
    CreateIvfflatIndex,
    /// Rewrite the query (advisory only)
    OptimizeQuery,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::NoAction => "no_action",
            Action::CreateHnswIndex => "create_hnsw_index",
            Action::CreateIvfflatIndex => "create_ivfflat_index",
            Action::OptimizeQuery => "optimize_query",
        }
    }

    /// Index built by this action, if it builds one.
    pub fn index_type(&self) -> Option<IndexType> {
        match self {
            Action::CreateHnswIndex => Some(IndexType::Hnsw),
            Action::CreateIvfflatIndex => Some(IndexType::Ivfflat),
            Action::NoAction | Action::OptimizeQuery => None,
        }
    }

    pub fn creates_index(&self) -> bool {
        self.index_type().is_some()
    }

    pub fn for_index(index_type: IndexType) -> Self {
        match index_type {
            IndexType::Hnsw => Action::CreateHnswIndex,
            IndexType::Ivfflat => Action::CreateIvfflatIndex,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_type_iff_create() {
        for action in [
            Action::NoAction,
            Action::CreateHnswIndex,
            Action::CreateIvfflatIndex,
            Action::OptimizeQuery,
        ] {
            let creates = matches!(
                action,
                Action::CreateHnswIndex | Action::CreateIvfflatIndex
            );
            assert_eq!(action.index_type().is_some(), creates, "{}", action);
        }
    }

    #[test]
    fn test_for_index_round_trip() {
        assert_eq!(
            Action::for_index(IndexType::Ivfflat).index_type(),
            Some(IndexType::Ivfflat)
        );
        assert_eq!(Action::for_index(IndexType::Hnsw), Action::CreateHnswIndex);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Action::CreateIvfflatIndex).unwrap(),
            "\"create_ivfflat_index\""
        );
        let parsed: Action = serde_json::from_str("\"optimize_query\"").unwrap();
        assert_eq!(parsed, Action::OptimizeQuery);
    }
}
