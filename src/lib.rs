//! BusinessStudio AI service: schema-validated generation flows over an LLM
//! provider, dashboard preference stores, and the HTTP API and CLI around them.

pub mod cli;
pub mod config;
pub mod core;
pub mod interfaces;
pub mod logging;

pub use crate::core::flows::{
    FlowCatalog, GeneratedData, GenerationError, GenerationRequest, RuntimeInputs,
    StructuredGenerator,
};
pub use crate::core::schema::{FieldKind, FieldSpec, OutputSchema, SchemaViolation};
