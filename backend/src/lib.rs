pub mod advisory;
pub mod config;
pub mod inference;
pub mod pipeline;
pub mod report;

pub use advisory::{Advisory, advisory_for, advisory_for_name};
pub use config::AnalyzerConfig;
pub use pipeline::{Analyzer, ApiError};
