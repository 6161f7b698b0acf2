use quarry_core::{RunState, TabularRows, Turn, WorkflowError};
use quarry_llm::{ChatBackend, Message, prompts};
use quarry_mcp::ToolBackend;

use super::{WorkflowRunner, export};

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Produce the final answer; the terminal stage.
    ///
    /// Exports the larger result set to CSV when it crosses the row
    /// threshold, then writes `final_answer` — always. A model failure
    /// degrades to the rendered table; exhausted retries degrade to an
    /// explanation carrying the last error.
    pub(crate) async fn finalize(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let export_source = state.full_rows.as_ref().or(state.preview_rows.as_ref());
        if let Some(rows) = export_source
            && rows.row_count() > self.config.csv_row_threshold
        {
            match export::write_csv(rows, &self.config.export_dir) {
                Ok(record) => {
                    self.log(format!(
                        "Exported {} rows to {}",
                        record.rows,
                        record.path.display()
                    ));
                    state.csv_export = Some(record);
                }
                Err(e) => self.warn(format!("CSV export failed: {e}")),
            }
        }

        let answer = match (&state.preview_rows, &state.execution_error) {
            (Some(rows), None) => {
                let rows = rows.clone();
                self.summarize_result(state, &rows).await
            }
            _ => degraded_answer(state),
        };

        state.push_turn(Turn::assistant(answer.clone()));
        state.final_answer = Some(answer);
        Ok(())
    }

    async fn summarize_result(&self, state: &RunState, rows: &TabularRows) -> String {
        let query = state.current_query().unwrap_or_default();
        let prompt = prompts::answer_prompt(
            &state.user_query,
            query,
            &rows.column_names(),
            rows.row_count(),
        );

        let summary = match self.chat.chat(vec![Message::user(prompt)]).await {
            Ok(response) => response.text().unwrap_or_default().trim().to_string(),
            Err(e) => {
                self.warn(format!("Answer summarization failed ({e}) — returning the table alone"));
                String::new()
            }
        };

        let mut parts = Vec::new();
        if summary.is_empty() {
            parts.push(format!("Results for: {}", state.user_query));
        } else {
            parts.push(summary);
        }
        parts.push(rows.to_markdown(self.config.preview_row_cap));

        if let Some(record) = &state.csv_export {
            parts.push(format!(
                "Complete dataset exported: {} ({} rows, {:.2} MB)",
                record.file_name(),
                record.rows,
                record.size_bytes as f64 / (1024.0 * 1024.0)
            ));
        }

        parts.join("\n\n")
    }
}

/// Non-empty answer for runs that never produced a usable result.
fn degraded_answer(state: &RunState) -> String {
    let error = state
        .execution_error
        .as_deref()
        .unwrap_or("no result was produced");

    let mut answer = format!(
        "The query could not be satisfied after {} attempt(s). Last error: {}",
        state.retry_count + 1,
        error
    );
    if let Some(query) = state.current_query() {
        answer.push_str(&format!("\n\nLast query tried:\n{query}"));
    }
    answer
}
