use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::GenerationError;
use crate::core::schema::OutputSchema;

/// A named instruction plus the shape its answer must have. Immutable after
/// construction; both `new` and deserialization reject empty identifiers and
/// empty instruction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGenerationRequest")]
pub struct GenerationRequest {
    identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_text: Option<String>,
    instruction_text: String,
    output_schema: OutputSchema,
}

#[derive(Deserialize)]
struct RawGenerationRequest {
    identifier: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    system_text: Option<String>,
    instruction_text: String,
    output_schema: OutputSchema,
}

impl TryFrom<RawGenerationRequest> for GenerationRequest {
    type Error = GenerationError;

    fn try_from(raw: RawGenerationRequest) -> Result<Self, Self::Error> {
        let mut request = GenerationRequest::new(
            raw.identifier,
            raw.instruction_text,
            raw.output_schema,
        )?;
        request.description = raw.description;
        request.system_text = raw.system_text;
        Ok(request)
    }
}

impl GenerationRequest {
    pub fn new(
        identifier: impl Into<String>,
        instruction_text: impl Into<String>,
        output_schema: OutputSchema,
    ) -> Result<Self, GenerationError> {
        let identifier = identifier.into();
        let instruction_text = instruction_text.into();
        if identifier.trim().is_empty() {
            return Err(GenerationError::InvalidRequest {
                identifier,
                reason: "identifier must not be empty".to_string(),
            });
        }
        if instruction_text.trim().is_empty() {
            return Err(GenerationError::InvalidRequest {
                identifier,
                reason: "instruction text must not be empty".to_string(),
            });
        }
        Ok(Self {
            identifier,
            description: None,
            system_text: None,
            instruction_text,
            output_schema,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_text(mut self, system_text: impl Into<String>) -> Self {
        self.system_text = Some(system_text.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn system_text(&self) -> Option<&str> {
        self.system_text.as_deref()
    }

    pub fn instruction_text(&self) -> &str {
        &self.instruction_text
    }

    pub fn output_schema(&self) -> &OutputSchema {
        &self.output_schema
    }

    /// Instruction text with `{{0}}`-style and `{{name}}`-style placeholders
    /// filled from `inputs`.
    pub fn resolve_instruction(
        &self,
        inputs: Option<&RuntimeInputs>,
    ) -> Result<String, GenerationError> {
        let empty = RuntimeInputs::default();
        interpolate(&self.instruction_text, inputs.unwrap_or(&empty)).map_err(|placeholder| {
            GenerationError::InvalidRequest {
                identifier: self.identifier.clone(),
                reason: format!("no runtime input for placeholder '{{{{{}}}}}'", placeholder),
            }
        })
    }
}

/// Values substituted into an instruction at execution time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInputs {
    #[serde(default)]
    pub positional: Vec<String>,
    #[serde(default)]
    pub named: HashMap<String, String>,
}

impl RuntimeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key.parse::<usize>() {
            Ok(index) => self.positional.get(index).map(String::as_str),
            Err(_) => self.named.get(key).map(String::as_str),
        }
    }
}

/// Replace every `{{key}}` in `template`. Returns the first key with no
/// value. An unterminated `{{` is kept literally.
pub(crate) fn interpolate(template: &str, inputs: &RuntimeInputs) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let Some(close) = after_open.find("}}") else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let key = after_open[..close].trim();
        match inputs.lookup(key) {
            Some(value) => out.push_str(value),
            None => return Err(key.to_string()),
        }
        rest = &after_open[close + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
