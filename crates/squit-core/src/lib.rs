pub mod compare;
pub mod config;
pub mod db;
pub mod index;
pub mod layout;
pub mod media;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod result;
pub mod runner;
pub mod script;

#[cfg(test)]
mod test_support;

pub use compare::DiffStage;
pub use config::{ConfigError, MergedConfig, SquitConfig};
pub use index::{IndexError, SquitTest, TagFilter, TestFilter, TestIndexer};
pub use layout::BuildLayout;
pub use media::{MediaType, MediaTypeRegistry};
pub use pipeline::{RunOutcome, Squit, SquitError};
pub use process::{Processor, ProcessorRegistry};
pub use result::{RunSummary, SquitResult, SquitResultTree};
pub use runner::{Runner, RunnerRegistry};
