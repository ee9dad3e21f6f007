//! Structured generation requests ("flows"): a named instruction and an output
//! schema, executed against an LLM provider and validated before anything is
//! returned.

mod catalog;
mod error;
mod executor;
pub mod models;
mod request;

pub use catalog::FlowCatalog;
pub use error::GenerationError;
pub use executor::{GeneratedData, StructuredGenerator};
pub use models::{Faq, FaqOutput, TrendingTopic, TrendingTopicsOutput};
pub use request::{GenerationRequest, RuntimeInputs};

#[cfg(test)]
mod tests;
