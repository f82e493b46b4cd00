pub mod config;
pub mod isa;
pub mod loader;

pub use config::{FailurePolicy, PipelineConfig};
pub use isa::{InstError, TableGenerator, TableHandle, TableList};
