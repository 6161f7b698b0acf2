use std::path::PathBuf;

/// Tuning knobs for one workflow traversal.
///
/// Passed to the runner at construction and never mutated afterwards —
/// the run loop reads it, stages read it, nothing writes it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of repair cycles before the run gives up and
    /// finalizes with the last error.
    pub max_retries: u32,
    /// Row limit applied to the preview execution.
    pub preview_row_cap: usize,
    /// Row ceiling applied to the full execution.
    pub full_row_ceiling: usize,
    /// Result sets larger than this are exported to CSV.
    pub csv_row_threshold: usize,
    /// How many discovered names to fall back to when the model selects
    /// nothing usable.
    pub selection_fallback_limit: usize,
    /// Directory CSV exports are written into.
    pub export_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            preview_row_cap: 10,
            full_row_ceiling: 10_000,
            csv_row_threshold: 10,
            selection_fallback_limit: 5,
            export_dir: std::env::temp_dir().join("quarry-exports"),
        }
    }
}
