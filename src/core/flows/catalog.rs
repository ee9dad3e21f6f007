use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use super::request::GenerationRequest;

const FLOWS_YAML: &str = include_str!("flows.yaml");

#[derive(Deserialize)]
struct FlowFile {
    flows: Vec<GenerationRequest>,
}

/// Every generation request the process knows about, fixed at startup.
#[derive(Debug, Clone)]
pub struct FlowCatalog {
    flows: Vec<GenerationRequest>,
}

impl FlowCatalog {
    pub fn builtin() -> Result<Self> {
        let file: FlowFile =
            serde_yaml::from_str(FLOWS_YAML).context("built-in flows.yaml is invalid")?;
        Self::from_flows(file.flows)
    }

    /// Built-in flows followed by those in `custom_path`, if that file exists.
    pub fn load_with_custom(custom_path: &Path) -> Result<Self> {
        let mut catalog = Self::builtin()?;
        if !custom_path.exists() {
            return Ok(catalog);
        }

        let content = std::fs::read_to_string(custom_path)
            .with_context(|| format!("reading {}", custom_path.display()))?;
        let file: FlowFile = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", custom_path.display()))?;
        info!(
            "Loaded {} custom flow(s) from {}",
            file.flows.len(),
            custom_path.display()
        );

        catalog.flows.extend(file.flows);
        Self::from_flows(catalog.flows)
    }

    pub fn from_flows(flows: Vec<GenerationRequest>) -> Result<Self> {
        let mut seen = HashSet::new();
        for flow in &flows {
            if !seen.insert(flow.identifier()) {
                bail!("duplicate flow identifier '{}'", flow.identifier());
            }
        }
        Ok(Self { flows })
    }

    pub fn get(&self, identifier: &str) -> Option<&GenerationRequest> {
        self.flows.iter().find(|f| f.identifier() == identifier)
    }

    pub fn list(&self) -> &[GenerationRequest] {
        &self.flows
    }
}
