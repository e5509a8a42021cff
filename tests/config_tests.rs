// tests/config_tests.rs - configuration validation from YAML
use regexomatic::{CompilationError, PipelineConfig, Processor, ShouldEmit};

#[test]
fn test_single_rule_yaml() {
    let yaml = r#"
split_on:
  - '\|'
regexps:
  - '^feature (?P<feature_name>\w+)$'
should_emit: all_success
tags:
  greeting: 'hi {{ .Tags.feature_name }}'
"#;
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let PipelineConfig::SingleRule(spec) = &config else {
        panic!("expected single rule");
    };
    assert_eq!(spec.should_emit, Some(ShouldEmit::AllSuccess));
    assert!(Processor::compile(&config).is_ok());
}

#[test]
fn test_multi_rule_yaml_with_embedded_documents() {
    let yaml = r#"
should_emit: any_success
'^GET ': |
  parse:
    - 'GET (?P<path>\S+)'
'^POST ': |
  parse:
    - 'POST (?P<path>\S+)'
  should_emit: always
"#;
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let PipelineConfig::MultiRule(rules) = &config else {
        panic!("expected multi rule");
    };
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].0, "^GET ");
    assert_eq!(rules[0].1.should_emit, Some(ShouldEmit::AnySuccess));
    assert_eq!(rules[1].1.should_emit, Some(ShouldEmit::Always));

    let processor = Processor::compile(&config).unwrap();
    assert!(processor.is_gated());
}

#[test]
fn test_unknown_rule_key_is_rejected() {
    let yaml = "'^x': |\n  parse: ['x']\n  colour: blue\n";
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, CompilationError::InvalidRule { .. }));
}

#[test]
fn test_rule_without_parse_patterns_fails_compile() {
    let yaml = "'^x': |\n  split: ['\\|']\n";
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    assert!(matches!(
        Processor::compile(&config),
        Err(CompilationError::MissingParsePatterns)
    ));
}

#[test]
fn test_invalid_template_fails_compile() {
    let yaml = "regexps: ['x']\ntags:\n  broken: '{{ .Data'\n";
    let config = PipelineConfig::from_yaml(yaml).unwrap();
    assert!(matches!(
        Processor::compile(&config),
        Err(CompilationError::InvalidTemplate { .. })
    ));
}

#[test]
fn test_invalid_should_emit_in_multi_rule() {
    let yaml = "should_emit: never\n'^x': \"parse: ['x']\"\n";
    let err = PipelineConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("should_emit"));
}

#[test]
fn test_flat_bundle_without_regexps_is_missing_parse_patterns() {
    let bundle = serde_json::json!({ "split_on": ["\\|"], "should_emit": "always" })
        .as_object()
        .cloned()
        .unwrap();

    let err = regexomatic::process(&[], &bundle).unwrap_err();
    assert!(matches!(err, CompilationError::MissingParsePatterns));

    let err = PipelineConfig::from_yaml("split_on: ['\\|']\ntags:\n  x: y\n").unwrap_err();
    assert!(matches!(err, CompilationError::MissingParsePatterns));
}
