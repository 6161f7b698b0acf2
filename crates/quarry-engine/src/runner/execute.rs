use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;

use quarry_core::{RunState, TabularRows, Turn, WorkflowError};
use quarry_llm::ChatBackend;
use quarry_mcp::{EXECUTE_ESQL_TOOL, ToolBackend, normalize};

use super::WorkflowRunner;

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").expect("static pattern"));

/// Rewrite the query's row limit: replace an existing `LIMIT n` clause,
/// or append one when the query has none.
pub(crate) fn with_row_limit(query: &str, limit: usize) -> String {
    let replacement = format!("LIMIT {limit}");
    if LIMIT_RE.is_match(query) {
        LIMIT_RE.replace_all(query, replacement.as_str()).into_owned()
    } else {
        format!("{} | {}", query.trim_end(), replacement)
    }
}

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Execute the plan twice: a row-capped preview for the model, then
    /// a best-effort full run for export.
    ///
    /// Only the preview outcome decides the retry branch. A failed
    /// preview skips the full run entirely; a failed full run is logged
    /// and the traversal proceeds on the preview alone.
    pub(crate) async fn execute(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let Some(query) = state.current_query().map(str::to_string) else {
            // generation failed; its error stays in place for the retry branch
            if state.execution_error.is_none() {
                state.execution_error = Some("no query available to execute".to_string());
            }
            return Ok(());
        };

        let preview_query = with_row_limit(&query, self.config.preview_row_cap);
        self.log(format!("Executing preview: {preview_query}"));

        let mut preview = match self.run_query_tool(&preview_query).await {
            Ok(rows) => rows,
            Err(e) => {
                let msg = e.to_string();
                self.warn(format!("Preview execution failed: {msg}"));
                state.push_turn(Turn::tool(format!("Query execution failed: {msg}")));
                state.execution_error = Some(msg);
                return Ok(());
            }
        };

        if preview.is_empty() {
            let msg = "query returned no columns".to_string();
            self.warn(format!("Preview execution failed: {msg}"));
            state.push_turn(Turn::tool(format!("Query execution failed: {msg}")));
            state.execution_error = Some(msg);
            return Ok(());
        }

        preview.rows.truncate(self.config.preview_row_cap);
        state.execution_error = None;
        state.push_turn(Turn::tool(format!(
            "Query executed, {} rows returned for analysis",
            preview.row_count()
        )));
        state.preview_rows = Some(preview);

        // Full path, best effort — its failure never triggers a retry.
        let full_query = with_row_limit(&query, self.config.full_row_ceiling);
        self.log(format!("Executing full query: {full_query}"));
        state.full_rows = match self.run_query_tool(&full_query).await {
            Ok(rows) if !rows.is_empty() => {
                self.log(format!("Full execution returned {} rows", rows.row_count()));
                Some(rows)
            }
            Ok(_) => None,
            Err(e) => {
                self.warn(format!(
                    "Full execution failed ({e}) — proceeding with the preview result"
                ));
                None
            }
        };

        Ok(())
    }

    async fn run_query_tool(&self, query: &str) -> Result<TabularRows, WorkflowError> {
        let raw = self
            .tools
            .call_tool(EXECUTE_ESQL_TOOL, Some(json!({ "query": query })))
            .await
            .map_err(|e| WorkflowError::Tool(e.to_string()))?;
        normalize::extract_rows(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::with_row_limit;

    #[test]
    fn appends_limit_when_absent() {
        assert_eq!(
            with_row_limit("FROM logs-1 | STATS c = COUNT(*)", 10),
            "FROM logs-1 | STATS c = COUNT(*) | LIMIT 10"
        );
    }

    #[test]
    fn replaces_existing_limit() {
        assert_eq!(
            with_row_limit("FROM logs-1 | LIMIT 500", 10),
            "FROM logs-1 | LIMIT 10"
        );
    }

    #[test]
    fn replaces_limit_case_insensitively() {
        assert_eq!(
            with_row_limit("FROM logs-1 | limit 500", 10_000),
            "FROM logs-1 | LIMIT 10000"
        );
    }

    #[test]
    fn does_not_rewrite_field_names_containing_limit() {
        assert_eq!(
            with_row_limit("FROM logs-1 | WHERE rate_limit_hits > 5", 10),
            "FROM logs-1 | WHERE rate_limit_hits > 5 | LIMIT 10"
        );
    }
}
