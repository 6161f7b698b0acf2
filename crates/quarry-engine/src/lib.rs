mod driver;
mod runner;

pub use driver::RunDriver;
pub use runner::{RunEvent, Stage, WorkflowRunner, needs_mappings, should_retry};
