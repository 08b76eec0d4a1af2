use regex::Regex;

use crate::model::SuccessCriteria;

use super::RunResult;

/// Checks a run against the action's success criteria.
///
/// Returns the first unmet condition. A timed out run never succeeds, and an
/// `output_regex` that does not compile counts as unmet.
pub fn check_success(
    criteria: &SuccessCriteria,
    run: &RunResult,
) -> std::result::Result<(), String> {
    if run.timed_out {
        return Err(format!("timed out after {}ms", run.duration.as_millis()));
    }

    if run.exit_code != criteria.return_code {
        return Err(format!("exit code {}, expected {}", run.exit_code, criteria.return_code));
    }

    if let Some(missing) = criteria.output_contains.iter().find(|s| !run.stdout.contains(s.as_str())) {
        return Err(format!("output does not contain '{}'", missing));
    }

    if let Some(pattern) = criteria.output_regex.as_deref() {
        let re = Regex::new(pattern).map_err(|e| format!("invalid output_regex '{}': {}", pattern, e))?;
        if !re.is_match(&run.stdout) {
            return Err(format!("output does not match '{}'", pattern));
        }
    }

    Ok(())
}
