use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use regex::{Captures, Regex};

use crate::{JobflowError, Result, model::Scalar};

/// Regex pattern for command placeholders
/// Format: `{name}`, name made of letters, digits, `_` and `-`
const PLACEHOLDER_PATTERN: &str = r"\{([A-Za-z0-9_-]+)\}";

/// Placeholder always bound to the current target.
pub const TARGET_TOKEN: &str = "target";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).unwrap());

/// Lists the placeholder names of a template in first-appearance order.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    PLACEHOLDER_RE
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Checks that every placeholder except `{target}` has a parameter.
pub fn validate(
    template: &str,
    parameters: &HashMap<String, Scalar>,
) -> Result<()> {
    let missing: Vec<String> = placeholders(template).into_iter().filter(|name| name != TARGET_TOKEN && !parameters.contains_key(name)).collect();

    if !missing.is_empty() {
        return Err(missing_error(template, &missing));
    }
    Ok(())
}

/// Resolve `{name}` placeholders from `parameters` and `{target}` from `target`.
/// Substituted text is not scanned again. Returns error if any placeholder cannot be resolved.
pub fn resolve(
    template: &str,
    parameters: &HashMap<String, Scalar>,
    target: &str,
) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();

    let resolved = PLACEHOLDER_RE.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        if name == TARGET_TOKEN {
            return target.to_string();
        }
        match parameters.get(name) {
            Some(value) => value.to_string(),
            None => {
                if !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
                caps[0].to_string()
            }
        }
    });

    if !missing.is_empty() {
        return Err(missing_error(template, &missing));
    }

    Ok(resolved.into_owned())
}

fn missing_error(
    template: &str,
    missing: &[String],
) -> JobflowError {
    let names: Vec<String> = missing.iter().map(|m| format!("'{}'", m)).collect();
    JobflowError::Template(format!("parameter {} not found for template '{}'", names.join(", "), template))
}
