use super::Proposal;
use crate::decision::Action;
use crate::error::{Result, TuneError};

const REASONING: &str = "REASONING:";
const EXPECTED_IMPROVEMENT: &str = "EXPECTED_IMPROVEMENT:";

/// Turn a free-text oracle reply into a [`Proposal`].
///
/// Tokens are matched case-insensitively with a fixed precedence: HNSW, then
/// IVFFlat, then `optimize_query`. A reply naming none of them proposes
/// `no_action`. Reasoning defaults to the whole reply.
pub fn parse_reply(reply: &str) -> Result<Proposal> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(TuneError::Oracle("empty reply".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let action = if lower.contains("create_hnsw_index") || lower.contains("hnsw") {
        Action::CreateHnswIndex
    } else if lower.contains("create_ivfflat_index") || lower.contains("ivfflat") {
        Action::CreateIvfflatIndex
    } else if lower.contains("optimize_query") {
        Action::OptimizeQuery
    } else {
        Action::NoAction
    };

    let mut reasoning = trimmed.to_string();
    let mut expected_improvement = "Unknown".to_string();
    for line in trimmed.lines() {
        if let Some(value) = field(line, REASONING) {
            reasoning = value.to_string();
        } else if let Some(value) = field(line, EXPECTED_IMPROVEMENT) {
            expected_improvement = value.to_string();
        }
    }

    Ok(Proposal {
        action,
        reasoning,
        expected_improvement,
    })
}

/// Value of a `PREFIX: value` line, ignoring case and surrounding whitespace.
fn field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let line = line.trim();
    let head = line.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let value = line[prefix.len()..].trim();
    (!value.is_empty()).then_some(value)
}
