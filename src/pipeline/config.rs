// src/pipeline/config.rs
use crate::error::CompilationError;
use indexmap::IndexMap;
use serde::Deserialize;

/// What the host hands over: a flat key/value bundle
pub type ConfigBundle = serde_json::Map<String, serde_json::Value>;

pub const CONFIG_SPLIT: &str = "split_on";
pub const CONFIG_PARSE: &str = "regexps";
pub const CONFIG_SHOULD_EMIT: &str = "should_emit";
pub const CONFIG_TAGS: &str = "tags";

/// When to emit a processed record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShouldEmit {
    /// No matter what
    #[default]
    Always,
    /// Only if every parse pattern matched
    AllSuccess,
    /// Only if at least one parse pattern matched
    AnySuccess,
    /// Only if none matched (grep -v mode)
    NoSuccess,
}

impl std::str::FromStr for ShouldEmit {
    type Err = CompilationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(ShouldEmit::Always),
            "all_success" => Ok(ShouldEmit::AllSuccess),
            "any_success" => Ok(ShouldEmit::AnySuccess),
            "no_success" => Ok(ShouldEmit::NoSuccess),
            other => Err(CompilationError::InvalidConfig(format!(
                "{} should be one of 'always', 'all_success', 'any_success' or 'no_success', got '{}'",
                CONFIG_SHOULD_EMIT, other
            ))),
        }
    }
}

/// Raw rule as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    #[serde(default, alias = "split_on")]
    pub split: Vec<String>,
    #[serde(default, alias = "regexps")]
    pub parse: Vec<String>,
    #[serde(default)]
    pub should_emit: Option<ShouldEmit>,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
}

/// Parsed configuration, one of the two supported shapes
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineConfig {
    /// Flat keys, one rule applied to every record
    SingleRule(RuleSpec),
    /// Ordered (gate pattern, rule) pairs
    MultiRule(Vec<(String, RuleSpec)>),
}

impl PipelineConfig {
    /// Validate a host bundle into a typed configuration.
    ///
    /// A bundle carrying `regexps` (or `parse`) is single-rule. A bundle that
    /// only has the other flat keys, or any value that cannot be a rule
    /// document, is a single-rule bundle missing its parse patterns.
    /// Anything else is treated as gate pattern -> rule document, with an
    /// optional top-level `should_emit` as the default for rules that omit it.
    pub fn from_bundle(bundle: &ConfigBundle) -> Result<Self, CompilationError> {
        if bundle.contains_key(CONFIG_PARSE) || bundle.contains_key("parse") {
            let spec: RuleSpec = serde_json::from_value(serde_json::Value::Object(bundle.clone()))?;
            if spec.parse.is_empty() {
                return Err(CompilationError::MissingParsePatterns);
            }
            return Ok(PipelineConfig::SingleRule(spec));
        }

        if is_flat_rule(bundle) {
            return Err(CompilationError::MissingParsePatterns);
        }

        let default_emit = match bundle.get(CONFIG_SHOULD_EMIT) {
            None => None,
            Some(serde_json::Value::String(s)) => Some(s.parse::<ShouldEmit>()?),
            Some(other) => {
                return Err(CompilationError::InvalidConfig(format!(
                    "{} must be a string, got {}",
                    CONFIG_SHOULD_EMIT, other
                )))
            }
        };

        let mut rules = Vec::new();
        for (gate, value) in bundle {
            if gate == CONFIG_SHOULD_EMIT {
                continue;
            }
            let mut spec = parse_rule_document(gate, value)?;
            if spec.should_emit.is_none() {
                spec.should_emit = default_emit;
            }
            rules.push((gate.clone(), spec));
        }

        if rules.is_empty() {
            return Err(CompilationError::MissingParsePatterns);
        }
        Ok(PipelineConfig::MultiRule(rules))
    }

    /// Parse a YAML document holding the bundle
    pub fn from_yaml(text: &str) -> Result<Self, CompilationError> {
        let bundle: ConfigBundle = serde_yaml::from_str(text)?;
        Self::from_bundle(&bundle)
    }
}

/// Flat single-rule keys, or values no rule document can take
fn is_flat_rule(bundle: &ConfigBundle) -> bool {
    [CONFIG_SPLIT, "split", CONFIG_TAGS]
        .iter()
        .any(|key| bundle.contains_key(*key))
        || bundle
            .iter()
            .any(|(key, value)| key != CONFIG_SHOULD_EMIT && !(value.is_string() || value.is_object()))
}

/// A gate's rule arrives either as serialized text (YAML or JSON) or as an
/// already structured mapping.
fn parse_rule_document(gate: &str, value: &serde_json::Value) -> Result<RuleSpec, CompilationError> {
    let invalid = |message: String| CompilationError::InvalidRule {
        gate: gate.to_string(),
        message,
    };

    match value {
        serde_json::Value::String(doc) => {
            serde_yaml::from_str::<RuleSpec>(doc).map_err(|e| invalid(e.to_string()))
        }
        serde_json::Value::Object(_) => {
            serde_json::from_value::<RuleSpec>(value.clone()).map_err(|e| invalid(e.to_string()))
        }
        other => Err(invalid(format!(
            "expected a rule document, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(value: serde_json::Value) -> ConfigBundle {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_rule_flat_keys() {
        let config = PipelineConfig::from_bundle(&bundle(json!({
            "split_on": ["\\|"],
            "regexps": ["^feature (?P<feature_name>\\w+)$"],
            "should_emit": "any_success",
            "tags": {"replaceme": "yay: {{ .Tags.feature_name }}"}
        })))
        .unwrap();

        let PipelineConfig::SingleRule(spec) = config else {
            panic!("expected single rule");
        };
        assert_eq!(spec.split, vec!["\\|"]);
        assert_eq!(spec.parse.len(), 1);
        assert_eq!(spec.should_emit, Some(ShouldEmit::AnySuccess));
        assert_eq!(spec.tags["replaceme"], "yay: {{ .Tags.feature_name }}");
    }

    #[test]
    fn test_unknown_should_emit_is_rejected() {
        let err = PipelineConfig::from_bundle(&bundle(json!({
            "regexps": [".*"],
            "should_emit": "sometimes"
        })))
        .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_string_template_body_is_rejected() {
        let err = PipelineConfig::from_bundle(&bundle(json!({
            "regexps": [".*"],
            "tags": {"x": 5}
        })))
        .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidConfig(_)));
    }

    #[test]
    fn test_multi_rule_yaml_documents_keep_order() {
        let doc = "split_on:\n  - \\|\nregexps:\n  - ^feature (?P<feature_name>\\w+)$\n";
        let config = PipelineConfig::from_bundle(&bundle(json!({
            "^feature": doc,
            "^.eature": doc,
            "should_emit": "all_success"
        })))
        .unwrap();

        let PipelineConfig::MultiRule(rules) = config else {
            panic!("expected multi rule");
        };
        let gates: Vec<_> = rules.iter().map(|(gate, _)| gate.as_str()).collect();
        assert_eq!(gates, vec!["^feature", "^.eature"]);
        assert_eq!(rules[0].1.split, vec!["\\|"]);
        assert_eq!(rules[1].1.should_emit, Some(ShouldEmit::AllSuccess));
    }

    #[test]
    fn test_multi_rule_accepts_short_keys_and_mappings() {
        let config = PipelineConfig::from_bundle(&bundle(json!({
            "error": {"parse": ["(?P<code>E\\d+)"], "should_emit": "no_success"}
        })))
        .unwrap();

        let PipelineConfig::MultiRule(rules) = config else {
            panic!("expected multi rule");
        };
        assert_eq!(rules[0].1.parse, vec!["(?P<code>E\\d+)"]);
        assert_eq!(rules[0].1.should_emit, Some(ShouldEmit::NoSuccess));
    }

    #[test]
    fn test_malformed_sub_document() {
        let err = PipelineConfig::from_bundle(&bundle(json!({
            "^gate": "parse: [unterminated"
        })))
        .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidRule { ref gate, .. } if gate == "^gate"));

        let err = PipelineConfig::from_bundle(&bundle(json!({ "^gate": "- just\n- a list\n" })))
            .unwrap_err();
        assert!(matches!(err, CompilationError::InvalidRule { .. }));
    }

    #[test]
    fn test_flat_keys_without_regexps_have_no_parse_patterns() {
        for value in [
            json!({ "split_on": ["\\|"], "should_emit": "always" }),
            json!({ "tags": { "x": "y" } }),
            json!({ "regexps": [] }),
            json!({ "^gate": 42 }),
        ] {
            let err = PipelineConfig::from_bundle(&bundle(value)).unwrap_err();
            assert!(matches!(err, CompilationError::MissingParsePatterns));
        }
    }

    #[test]
    fn test_empty_bundle_has_no_parse_patterns() {
        let err = PipelineConfig::from_bundle(&ConfigBundle::new()).unwrap_err();
        assert!(matches!(err, CompilationError::MissingParsePatterns));
    }

    #[test]
    fn test_from_yaml() {
        let config = PipelineConfig::from_yaml("regexps:\n  - 'x'\n").unwrap();
        assert!(matches!(config, PipelineConfig::SingleRule(_)));
    }
}
