use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fields::FieldTree;
use crate::tabular::TabularRows;

/// One conversation turn in the run's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// Structured output of the query-generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub expected_fields: Vec<String>,
}

/// Context carried from a failed execution into the next generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairContext {
    pub failed_query: String,
    pub error: String,
}

/// Record of a CSV export produced by the finalize stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvExport {
    pub path: PathBuf,
    pub rows: usize,
    pub size_bytes: u64,
}

impl CsvExport {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The single mutable record threaded through one workflow traversal.
///
/// Each stage owns a slice of these fields and writes nothing else:
/// discovery owns the catalogs, selection owns `selected_indices`,
/// mapping retrieval owns `mappings`, generation owns `plan`, execution
/// owns the row sets, repair owns `retry_count` and `repair_context`,
/// finalize owns `csv_export` and `final_answer`. `execution_error` is
/// set by the failure paths of generation and execution, cleared by a
/// successful preview or a repair trip. `messages` is append-only and
/// shared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub user_query: String,
    pub messages: Vec<Turn>,

    pub available_indices: BTreeSet<String>,
    pub available_data_streams: BTreeSet<String>,
    pub selected_indices: Vec<String>,

    /// Present ⇔ mappings were fetched. `Some` with an empty map is a
    /// degraded fetch and still counts as present, so the mapping stage
    /// never runs twice.
    pub mappings: Option<BTreeMap<String, FieldTree>>,

    pub plan: Option<QueryPlan>,

    /// Outcome of the preview execution only. Cleared on success and by
    /// the repair stage; the full execution never writes it.
    pub execution_error: Option<String>,
    pub retry_count: u32,
    pub repair_context: Option<RepairContext>,

    pub preview_rows: Option<TabularRows>,
    pub full_rows: Option<TabularRows>,

    pub csv_export: Option<CsvExport>,
    pub final_answer: Option<String>,
}

impl RunState {
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Default::default()
        }
    }

    pub fn push_turn(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    /// The query text of the current plan, if any.
    pub fn current_query(&self) -> Option<&str> {
        self.plan.as_ref().map(|p| p.query.as_str())
    }

    /// All discovered names, indices and data streams combined.
    pub fn known_names(&self) -> BTreeSet<String> {
        self.available_indices
            .union(&self.available_data_streams)
            .cloned()
            .collect()
    }
}
