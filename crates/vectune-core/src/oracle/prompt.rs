use std::fmt::Write;

use super::AdvisoryRequest;

/// System role for the advisory conversation.
pub const SYSTEM_PROMPT: &str = "You are a PostgreSQL database optimization expert. \
Analyze query performance and recommend specific index strategies.";

/// Render the user prompt for one observation.
pub fn render_prompt(request: &AdvisoryRequest) -> String {
    let mut issues = String::new();
    for issue in &request.issues {
        let _ = writeln!(issues, "- {}", issue);
    }
    if issues.is_empty() {
        issues.push_str("- none\n");
    }

    format!(
        "Analyze this PostgreSQL query performance issue:

PERFORMANCE METRICS:
- Execution Time: {exec:.2} ms
- Scan Type: {scan}
- Index Used: {index_used}
- Rows Scanned: {scanned}
- Rows Returned: {returned}

DETECTED ISSUES:
{issues}
CONTEXT:
This is a vector similarity search query on a PostgreSQL table with pgvector extension.
The table uses vector({dim}) embeddings for semantic search.

AVAILABLE INDEX TYPES:
1. HNSW (Hierarchical Navigable Small World)
   - Best for: High recall, low latency
   - Trade-off: Higher memory usage, slower build time
   - Good for: <1M vectors, real-time search

2. IVFFlat (Inverted File with Flat compression)
   - Best for: Large datasets, memory efficiency
   - Trade-off: Lower recall (90-95%)
   - Good for: >1M vectors, batch processing

QUESTION:
Should I create an index? If yes, which type (HNSW or IVFFlat)?

Respond in this EXACT format:
ACTION: [create_hnsw_index | create_ivfflat_index | no_action | optimize_query]
REASONING: [Your technical explanation in 1-2 sentences]
EXPECTED_IMPROVEMENT: [Quantitative estimate, e.g., \"10-50x faster\"]
",
        exec = request.execution_time_ms,
        scan = request.scan_kind,
        index_used = request.index_used,
        scanned = request.rows_scanned,
        returned = request.rows_returned,
        issues = issues,
        dim = request.vector_dimension,
    )
}
