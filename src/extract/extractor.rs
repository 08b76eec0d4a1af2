use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::{
    JobflowError,
    common::MemCache,
    model::{DefaultValue, Pattern, ResultParsing},
    utils,
};

use super::{Extraction, Fields, PatternCondition, PatternResult};

/// Runs ordered result patterns against command output.
///
/// Compiled regexes are cached by source text, so one extractor can be
/// shared by all target workers of a job.
#[derive(Clone)]
pub struct ResultExtractor {
    compiled: MemCache<String, Regex>,
}

impl ResultExtractor {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            compiled: MemCache::new(cache_capacity),
        }
    }

    /// Extracts fields using the current time for `NOW()` defaults.
    pub fn extract(
        &self,
        output: &str,
        parsing: &ResultParsing,
    ) -> Extraction {
        self.extract_at(output, &parsing.patterns, &parsing.default_values, &Utc::now())
    }

    /// Extracts fields from `output`.
    ///
    /// Patterns run in declared order and every non-overlapping match is
    /// collected. Successful patterns are then merged in that same order,
    /// matches in match order, later values overwriting earlier ones, so the
    /// pattern list is a priority list. Defaults only fill keys that no
    /// pattern produced; `NOW()` renders `now`.
    pub fn extract_at(
        &self,
        output: &str,
        patterns: &[Pattern],
        defaults: &HashMap<String, DefaultValue>,
        now: &DateTime<Utc>,
    ) -> Extraction {
        let results: Vec<PatternResult> = patterns.iter().map(|pattern| self.run_pattern(output, pattern)).collect();

        let mut fields = Fields::new();
        for result in results.iter().filter(|r| r.success) {
            for matched in &result.matches {
                fields.extend(matched.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }

        for (key, default) in defaults {
            if !fields.contains_key(key) {
                let value = match default {
                    DefaultValue::Now => utils::time::rfc3339(now),
                    DefaultValue::Value(v) => v.to_string(),
                };
                fields.insert(key.clone(), value);
            }
        }

        Extraction {
            fields,
            patterns: results,
        }
    }

    fn run_pattern(
        &self,
        output: &str,
        pattern: &Pattern,
    ) -> PatternResult {
        let regex = match self.compile(pattern) {
            Ok(re) => re,
            Err(err) => {
                warn!("{}", err);
                return PatternResult {
                    name: pattern.name.clone(),
                    regex: pattern.regex.clone(),
                    matches: Vec::new(),
                    success: false,
                    condition: Some(PatternCondition::CompileError(err.to_string())),
                };
            }
        };

        let matches: Vec<Fields> = regex.captures_iter(output).map(|caps| map_fields(&caps, pattern)).collect();
        let success = !matches.is_empty();
        if !success {
            debug!("{}", JobflowError::PatternNoMatch(pattern.name.clone()));
        }

        PatternResult {
            name: pattern.name.clone(),
            regex: pattern.regex.clone(),
            matches,
            success,
            condition: if success { None } else { Some(PatternCondition::NoMatch) },
        }
    }

    fn compile(
        &self,
        pattern: &Pattern,
    ) -> Result<Regex, JobflowError> {
        self.compiled.get_or_try_insert(pattern.regex.clone(), || {
            Regex::new(&pattern.regex).map_err(|e| JobflowError::PatternCompile {
                name: pattern.name.clone(),
                message: e.to_string(),
            })
        })
    }
}

/// Builds the field map of one match. `$N` takes group N and is omitted when
/// that group does not exist or did not participate.
fn map_fields(
    caps: &Captures,
    pattern: &Pattern,
) -> Fields {
    let mut fields = Fields::new();
    for (field, mapping) in &pattern.field_mapping {
        match group_ref(mapping) {
            Some(index) => {
                if let Some(group) = caps.get(index) {
                    fields.insert(field.clone(), group.as_str().to_string());
                }
            }
            None => {
                fields.insert(field.clone(), mapping.clone());
            }
        }
    }
    fields
}

/// Parses `$N` with N >= 1.
fn group_ref(mapping: &str) -> Option<usize> {
    let digits = mapping.strip_prefix('$')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok().filter(|n| *n >= 1)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::Scalar;

    const PING_OUTPUT: &str = "PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.
64 bytes from 10.0.0.1: icmp_seq=1 ttl=64 time=0.045 ms
64 bytes from 10.0.0.1: icmp_seq=2 ttl=64 time=0.051 ms

--- 10.0.0.1 ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 0.045/0.048/0.051/0.003 ms
";

    fn extractor() -> ResultExtractor {
        ResultExtractor::new(16)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn defaults(pairs: &[(&str, DefaultValue)]) -> HashMap<String, DefaultValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn run(
        output: &str,
        patterns: &[Pattern],
        defaults: &HashMap<String, DefaultValue>,
    ) -> Extraction {
        extractor().extract_at(output, patterns, defaults, &fixed_now())
    }

    #[test]
    fn test_ping_extraction() {
        let patterns = vec![
            Pattern::new("stats", r"(\d+) packets transmitted, (\d+) received", &[("sent", "$1"), ("received", "$2"), ("ping_status", "online")]),
            Pattern::new("rtt", r"rtt min/avg/max/mdev = [\d.]+/([\d.]+)/", &[("avg_rtt", "$1")]),
        ];
        let result = run(PING_OUTPUT, &patterns, &defaults(&[("last_seen", DefaultValue::Now)]));

        assert_eq!(result.fields.get("sent").unwrap(), "2");
        assert_eq!(result.fields.get("received").unwrap(), "2");
        assert_eq!(result.fields.get("ping_status").unwrap(), "online");
        assert_eq!(result.fields.get("avg_rtt").unwrap(), "0.048");
        assert_eq!(result.fields.get("last_seen").unwrap(), "2024-01-02T03:04:05Z");
        assert!(result.patterns.iter().all(|p| p.success && p.condition.is_none()));
    }

    #[test]
    fn test_find_all_matches_in_order() {
        let patterns = vec![Pattern::new("seq", r"icmp_seq=(\d+) ttl=\d+ time=([\d.]+)", &[("seq", "$1"), ("time", "$2")])];
        let result = run(PING_OUTPUT, &patterns, &HashMap::new());

        let pattern = &result.patterns[0];
        assert_eq!(pattern.matches.len(), 2);
        assert_eq!(pattern.matches[0].get("seq").unwrap(), "1");
        assert_eq!(pattern.matches[1].get("seq").unwrap(), "2");
        // last match wins in the merged view
        assert_eq!(result.fields.get("time").unwrap(), "0.051");
    }

    #[test]
    fn test_non_overlapping_matches() {
        let patterns = vec![Pattern::new("pairs", r"(aa)", &[("pair", "$1")])];
        let result = run("aaaaa", &patterns, &HashMap::new());
        assert_eq!(result.patterns[0].matches.len(), 2);
    }

    #[test]
    fn test_pattern_order_is_priority() {
        let down = Pattern::new("down", r"link", &[("status", "down")]);
        let up = Pattern::new("up", r"link", &[("status", "up")]);

        let result = run("link state changed", &[down.clone(), up.clone()], &HashMap::new());
        assert_eq!(result.fields.get("status").unwrap(), "up");

        let result = run("link state changed", &[up, down], &HashMap::new());
        assert_eq!(result.fields.get("status").unwrap(), "down");
    }

    #[test]
    fn test_failed_pattern_does_not_reorder() {
        let patterns = vec![
            Pattern::new("first", r"state: (\w+)", &[("state", "$1")]),
            Pattern::new("missing", r"never here", &[("state", "bogus")]),
            Pattern::new("last", r"state: \w+ \((\w+)\)", &[("state", "$1")]),
        ];
        let result = run("state: up (admin)", &patterns, &HashMap::new());
        assert_eq!(result.fields.get("state").unwrap(), "admin");
        assert_eq!(result.patterns.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), vec!["first", "missing", "last"]);
    }

    #[test]
    fn test_defaults_never_override() {
        let patterns = vec![Pattern::new("up", r"UP", &[("status", "up")])];
        let d = defaults(&[("status", "down".into()), ("vendor", "unknown".into()), ("ports", Scalar::from(0).into())]);
        let result = run("eth0: UP", &patterns, &d);
        assert_eq!(result.fields.get("status").unwrap(), "up");
        assert_eq!(result.fields.get("vendor").unwrap(), "unknown");
        assert_eq!(result.fields.get("ports").unwrap(), "0");

        let result = run("eth0: DOWN", &patterns, &d);
        assert_eq!(result.fields.get("status").unwrap(), "down");
    }

    #[test]
    fn test_out_of_range_group_is_omitted() {
        let patterns = vec![Pattern::new("one", r"ttl=(\d+)", &[("ttl", "$1"), ("extra", "$2")])];
        let result = run("ttl=64", &patterns, &HashMap::new());
        let matched = &result.patterns[0].matches[0];
        assert_eq!(matched.get("ttl").unwrap(), "64");
        assert!(!matched.contains_key("extra"));
        assert!(!result.fields.contains_key("extra"));
    }

    #[test]
    fn test_no_groups_does_not_use_full_match() {
        let patterns = vec![Pattern::new("plain", r"OK", &[("value", "$1"), ("flag", "seen")])];
        let result = run("all OK", &patterns, &HashMap::new());
        assert!(!result.fields.contains_key("value"));
        assert_eq!(result.fields.get("flag").unwrap(), "seen");
    }

    #[test]
    fn test_non_participating_group_is_omitted() {
        let patterns = vec![Pattern::new("opt", r"speed (\d+)(?: duplex (\w+))?", &[("speed", "$1"), ("duplex", "$2")])];
        let result = run("speed 1000", &patterns, &HashMap::new());
        assert_eq!(result.fields.get("speed").unwrap(), "1000");
        assert!(!result.fields.contains_key("duplex"));
    }

    #[test]
    fn test_mapping_literals_that_look_like_refs() {
        let patterns = vec![Pattern::new("p", r"(x)", &[("a", "$0"), ("b", "$"), ("c", "$1x"), ("d", "cost $1")])];
        let result = run("x", &patterns, &HashMap::new());
        assert_eq!(result.fields.get("a").unwrap(), "$0");
        assert_eq!(result.fields.get("b").unwrap(), "$");
        assert_eq!(result.fields.get("c").unwrap(), "$1x");
        assert_eq!(result.fields.get("d").unwrap(), "cost $1");
    }

    #[test]
    fn test_no_match_and_compile_error_are_reported() {
        let patterns = vec![
            Pattern::new("broken", r"(unclosed", &[("x", "$1")]),
            Pattern::new("absent", r"nothing", &[("y", "1")]),
            Pattern::new("present", r"(here)", &[("z", "$1")]),
        ];
        let result = run("here", &patterns, &HashMap::new());

        assert!(matches!(result.patterns[0].condition, Some(PatternCondition::CompileError(_))));
        assert!(!result.patterns[0].success);
        assert_eq!(result.patterns[1].condition, Some(PatternCondition::NoMatch));
        assert!(result.patterns[2].success);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields.get("z").unwrap(), "here");
    }

    #[test]
    fn test_empty_output() {
        let patterns = vec![Pattern::new("any", r"(\S+)", &[("word", "$1")])];
        let result = run("", &patterns, &defaults(&[("status", "offline".into())]));
        assert!(!result.patterns[0].success);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields.get("status").unwrap(), "offline");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let ex = extractor();
        let patterns = vec![
            Pattern::new("stats", r"(\d+) packets transmitted", &[("sent", "$1")]),
            Pattern::new("seq", r"icmp_seq=(\d+)", &[("seq", "$1")]),
        ];
        let d = defaults(&[("checked", DefaultValue::Now)]);
        let first = ex.extract_at(PING_OUTPUT, &patterns, &d, &fixed_now());
        let second = ex.extract_at(PING_OUTPUT, &patterns, &d, &fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_multiline_anchors_need_flag() {
        let patterns = vec![Pattern::new("lines", r"(?m)^iface (\w+)$", &[("iface", "$1")])];
        let result = run("iface eth0\niface eth1\n", &patterns, &HashMap::new());
        assert_eq!(result.patterns[0].matches.len(), 2);
        assert_eq!(result.fields.get("iface").unwrap(), "eth1");
    }

    #[test]
    fn test_group_ref() {
        assert_eq!(group_ref("$1"), Some(1));
        assert_eq!(group_ref("$12"), Some(12));
        assert_eq!(group_ref("$0"), None);
        assert_eq!(group_ref("$+1"), None);
        assert_eq!(group_ref("1"), None);
    }
}
