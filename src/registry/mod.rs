//! Catalog of commands available per platform.
//!
//! The registry is built once and injected into the pipeline; nothing mutates
//! it afterwards. Each command may carry a JSON Schema for its parameters,
//! which is checked when an action is validated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{JobflowError, Result, model::LoginMethod};

pub type PlatformId = String;
pub type CommandId = String;

/// One command of the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub id: CommandId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// default template offered by the builder
    #[serde(default)]
    pub template: String,
    /// JSON Schema for `login_method.parameters`
    #[serde(default = "empty_schema")]
    pub parameters: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

#[derive(Deserialize)]
struct CatalogDocument {
    platforms: HashMap<PlatformId, Vec<CommandSpec>>,
}

#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    platforms: HashMap<PlatformId, HashMap<CommandId, CommandSpec>>,
}

#[derive(Default)]
pub struct CommandRegistryBuilder {
    platforms: HashMap<PlatformId, HashMap<CommandId, CommandSpec>>,
}

impl CommandRegistryBuilder {
    pub fn command(
        mut self,
        platform: &str,
        spec: CommandSpec,
    ) -> Self {
        self.platforms.entry(platform.to_string()).or_default().insert(spec.id.clone(), spec);
        self
    }

    /// Builds the registry, rejecting commands whose parameter schema is not a valid JSON Schema.
    pub fn build(self) -> Result<CommandRegistry> {
        for (platform, commands) in &self.platforms {
            for spec in commands.values() {
                jsonschema::validator_for(&spec.parameters)
                    .map_err(|e| JobflowError::Config(format!("invalid parameter schema for {}/{}: {}", platform, spec.id, e)))?;
            }
        }
        Ok(CommandRegistry {
            platforms: self.platforms,
        })
    }
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// Loads a catalog of the form `{"platforms": {"<platform>": [CommandSpec, ...]}}`.
    pub fn from_json(s: &str) -> Result<Self> {
        let doc = serde_json::from_str::<CatalogDocument>(s).map_err(|e| JobflowError::Config(format!("invalid command catalog: {}", e)))?;
        let mut builder = Self::builder();
        for (platform, commands) in doc.platforms {
            for spec in commands {
                builder = builder.command(&platform, spec);
            }
        }
        builder.build()
    }

    pub fn get(
        &self,
        platform: &str,
        command_id: &str,
    ) -> Option<&CommandSpec> {
        self.platforms.get(platform).and_then(|commands| commands.get(command_id))
    }

    /// Command ids of a platform, sorted.
    pub fn commands(
        &self,
        platform: &str,
    ) -> Vec<&str> {
        let mut ids: Vec<&str> = self.platforms.get(platform).map(|c| c.keys().map(String::as_str).collect()).unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Checks that the bound command exists and its parameters satisfy the command schema.
    pub fn validate_login(
        &self,
        login: &LoginMethod,
    ) -> Result<()> {
        let spec = self
            .get(&login.platform, &login.command_id)
            .ok_or_else(|| JobflowError::Validation(format!("unknown command '{}' for platform '{}'", login.command_id, login.platform)))?;

        let instance = serde_json::to_value(&login.parameters)?;
        let validator = jsonschema::validator_for(&spec.parameters).map_err(|e| JobflowError::Config(e.to_string()))?;
        validator
            .validate(&instance)
            .map_err(|e| JobflowError::Validation(format!("parameters of '{}': {}", login.command_id, e)))?;
        Ok(())
    }
}
