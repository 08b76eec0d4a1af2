use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    JobflowError, Result,
    model::{DatabaseSpec, ParserType, ResultParsing, Scalar, Targeting},
    registry::CommandRegistry,
    template,
};

/// Conditions every attempt's output must satisfy to count as a success.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuccessCriteria {
    #[serde(default)]
    pub return_code: i32,
    /// every listed substring must appear in stdout
    #[serde(default)]
    pub output_contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_regex: Option<String>,
}

/// Binding of an action to a platform command.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LoginMethod {
    pub platform: String,
    pub command_id: String,
    /// the authoritative command, `{name}` placeholders plus the reserved `{target}`
    pub command_template: String,
    #[serde(default)]
    pub parameters: HashMap<String, Scalar>,
    #[serde(default)]
    pub success_criteria: SuccessCriteria,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Execution {
    /// seconds per attempt, 0 disables the limit
    #[serde(default)]
    pub timeout: u64,
    #[serde(default = "default_kill_signal")]
    pub kill_signal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_command: Option<String>,
}

fn default_kill_signal() -> String {
    "SIGTERM".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Default for Execution {
    fn default() -> Self {
        Self {
            timeout: 0,
            kill_signal: default_kill_signal(),
            working_directory: None,
            environment: HashMap::new(),
            pre_command: None,
            post_command: None,
        }
    }
}

/// One command-execution unit of a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionModel {
    /// display slug derived from the command id, never used for dispatch
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub login_method: LoginMethod,
    pub targeting: Targeting,
    #[serde(default)]
    pub execution: Execution,
    #[serde(default)]
    pub result_parsing: ResultParsing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSpec>,
}

impl ActionModel {
    pub fn new(
        login_method: LoginMethod,
        targeting: Targeting,
    ) -> Self {
        Self {
            action_type: Self::type_slug(&login_method.command_id),
            enabled: true,
            login_method,
            targeting,
            execution: Execution::default(),
            result_parsing: ResultParsing::default(),
            database: None,
        }
    }

    /// Cosmetic slug for a command id, e.g. `"Cisco Show-Version"` -> `"cisco_show_version"`.
    pub fn type_slug(command_id: &str) -> String {
        let mut slug = String::with_capacity(command_id.len());
        for c in command_id.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('_') {
                slug.push('_');
            }
        }
        while slug.ends_with('_') {
            slug.pop();
        }
        slug
    }

    /// Checks everything that can be known before the action runs.
    ///
    /// Placeholder errors surface as [`JobflowError::Template`], the rest as
    /// [`JobflowError::Validation`].
    pub fn validate(
        &self,
        registry: Option<&CommandRegistry>,
    ) -> Result<()> {
        let login = &self.login_method;
        if login.command_template.trim().is_empty() {
            return Err(JobflowError::Validation(format!("command '{}' has an empty command_template", login.command_id)));
        }

        template::validate(&login.command_template, &login.parameters)?;
        if let Some(pre) = &self.execution.pre_command {
            template::validate(pre, &login.parameters)?;
        }
        if let Some(post) = &self.execution.post_command {
            template::validate(post, &login.parameters)?;
        }

        if let Some(registry) = registry {
            registry.validate_login(login)?;
        }

        if let Some(pattern) = &login.success_criteria.output_regex {
            regex::Regex::new(pattern).map_err(|e| JobflowError::Validation(format!("success_criteria.output_regex '{}' is invalid: {}", pattern, e)))?;
        }

        if self.targeting.max_concurrent < 1 {
            return Err(JobflowError::Validation("targeting.max_concurrent must be at least 1".to_string()));
        }

        let parsing = &self.result_parsing;
        if parsing.parser_type != ParserType::Regex && !parsing.patterns.is_empty() {
            return Err(JobflowError::Validation(format!("parser_type '{}' is not supported, only 'regex' has an extractor", parsing.parser_type.as_ref())));
        }
        if let Some(pattern) = parsing.patterns.iter().find(|p| p.name.is_empty()) {
            return Err(JobflowError::Validation(format!("pattern with regex '{}' has no name", pattern.regex)));
        }

        if let Some(db) = &self.database {
            if db.table.trim().is_empty() {
                return Err(JobflowError::Validation("database.table must not be empty".to_string()));
            }
            if db.operation.is_keyed() && db.key_fields.is_empty() {
                return Err(JobflowError::Validation(format!("database.key_fields must not be empty for '{}'", db.operation.as_ref())));
            }
        }

        Ok(())
    }
}
