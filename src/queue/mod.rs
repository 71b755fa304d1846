pub mod processor;
pub mod store;

pub use processor::{ProcessorConfig, QueueProcessor};
