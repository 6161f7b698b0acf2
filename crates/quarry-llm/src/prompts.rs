//! Prompt builders for the three model-facing stages.

use std::collections::BTreeMap;

use quarry_core::RepairContext;

/// Prompt for the index-selection stage.
pub fn index_selection_prompt(user_query: &str, available: &[String]) -> String {
    format!(
        r#"You are an expert index-selection agent for a tabular search backend.

From the provided list ONLY, select the most relevant index names or wildcard
patterns needed to answer the user query. Choose the smallest accurate set.

User query:
{user_query}

Available indices and data streams:
{}

Rules:
- Match concepts to index names by semantic meaning, not keyword rules.
- Prefer fewer, higher-confidence indices; do not invent names.
- Use wildcard patterns for versioned or date-suffixed families.

Return ONLY valid JSON:

{{"indices": ["index1", "index2"], "reasoning": "one sentence"}}

No extra text."#,
        available.join("\n")
    )
}

/// Prompt for the query-generation stage. When `repair` is present the
/// prompt additionally carries the failing query and its error, so one
/// contract serves both the first attempt and repair cycles.
pub fn query_generation_prompt(
    user_query: &str,
    indices: &[String],
    fields: &BTreeMap<String, String>,
    repair: Option<&RepairContext>,
) -> String {
    let field_list = fields
        .iter()
        .map(|(name, ty)| format!("{name}: {ty}"))
        .collect::<Vec<_>>()
        .join("\n");

    let repair_section = match repair {
        Some(ctx) => format!(
            "\nYour previous query failed and must be corrected.\nFailing query:\n{}\nError:\n{}\n\nCommon fixes: field name typos, syntax errors, type mismatches, aggregation syntax.\n",
            ctx.failed_query, ctx.error
        ),
        None => String::new(),
    };

    format!(
        r#"Generate an ES|QL query answering: {user_query}

Indices: {}

Available fields (name: type):
{field_list}
{repair_section}
Query structure:
FROM index-pattern | WHERE filters | KEEP columns | EVAL computations | STATS aggregations | SORT | LIMIT

Rules:
- Use index patterns exactly as provided, wildcards included.
- Field names must match the mappings exactly (case-sensitive).
- Filter early with WHERE; aggregate with STATS ... BY ...; SORT before LIMIT.
- Handle nulls with COALESCE or WHERE field IS NOT NULL.
- Escape field names containing dots with backticks.

Return ONLY valid JSON:

{{"query": "<es|ql>", "explanation": "what the query does", "expected_fields": ["f1", "f2"]}}

No extra text."#,
        indices.join(", ")
    )
}

/// Prompt for the final-answer stage. Only column headers and the row
/// count go to the model; the actual rows are rendered locally.
pub fn answer_prompt(
    user_query: &str,
    executed_query: &str,
    column_names: &[String],
    row_count: usize,
) -> String {
    format!(
        r#"User asked: {user_query}
Query executed: {executed_query}

Result columns: {}
Sample rows returned: {row_count}

Provide a direct, concise answer to the user's question based on the
executed query. Plain text, no tables (a table is appended separately)."#,
        column_names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_prompt_lists_names() {
        let prompt = index_selection_prompt("top IPs", &["logs-1".into(), "logs-2".into()]);
        assert!(prompt.contains("logs-1"));
        assert!(prompt.contains("logs-2"));
        assert!(prompt.contains("\"indices\""));
    }

    #[test]
    fn generation_prompt_includes_repair_context_when_present() {
        let mut fields = BTreeMap::new();
        fields.insert("client_ip".to_string(), "keyword".to_string());
        let ctx = RepairContext {
            failed_query: "FROM logs-1 | LMIT 10".to_string(),
            error: "unknown command LMIT".to_string(),
        };
        let plain = query_generation_prompt("top IPs", &["logs-1".into()], &fields, None);
        let repair = query_generation_prompt("top IPs", &["logs-1".into()], &fields, Some(&ctx));
        assert!(!plain.contains("unknown command"));
        assert!(repair.contains("unknown command LMIT"));
        assert!(repair.contains("FROM logs-1 | LMIT 10"));
    }
}
