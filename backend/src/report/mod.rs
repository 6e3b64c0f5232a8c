pub mod builder;
pub mod fallback;

pub use builder::{Provenance, ReportBuilder};
pub use fallback::FallbackSimulator;
