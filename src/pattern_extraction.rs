use crate::error::CompilationError;
use crate::record::TagMap;
use regex::Regex;

/// Compile raw expressions in order. The first bad one fails the whole set.
pub fn compile_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Regex>, CompilationError> {
    raw.iter()
        .map(|expr| {
            let expr = expr.as_ref();
            Regex::new(expr).map_err(|source| CompilationError::InvalidPattern {
                pattern: expr.to_string(),
                source,
            })
        })
        .collect()
}

/// Outcome of running a parse pattern set over one payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub fields: TagMap,
    pub match_count: usize,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Field extractor over an ordered set of capture-group patterns
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    patterns: Vec<Regex>,
}

impl FieldExtractor {
    pub fn new(patterns: Vec<Regex>) -> Self {
        FieldExtractor { patterns }
    }

    /// Compile parse expressions; an empty list is rejected
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Result<Self, CompilationError> {
        if raw.is_empty() {
            return Err(CompilationError::MissingParsePatterns);
        }
        Ok(Self::new(compile_patterns(raw)?))
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Run every pattern once against `text`.
    ///
    /// Each matching pattern bumps `match_count` and writes all of its named
    /// groups into `fields`. Later patterns overwrite earlier ones for the
    /// same name. A named group that did not take part in the match is
    /// recorded as an empty string.
    pub fn extract(&self, text: &str) -> Extraction {
        let mut extraction = Extraction::default();

        for regex in &self.patterns {
            let Some(captures) = regex.captures(text) else {
                continue;
            };
            extraction.match_count += 1;

            for name in regex.capture_names().flatten() {
                let value = captures.name(name).map(|m| m.as_str()).unwrap_or_default();
                extraction.fields.insert(name.to_string(), value.to_string());
            }
        }

        extraction
    }

    /// Pattern sources, for log context
    pub fn sources(&self) -> Vec<&str> {
        self.patterns.iter().map(Regex::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_patterns_fails_on_first_bad_expression() {
        let err = compile_patterns(&["ok", "(unclosed", "also("]).unwrap_err();
        match err {
            CompilationError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compile_requires_parse_patterns() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            FieldExtractor::compile(&empty),
            Err(CompilationError::MissingParsePatterns)
        ));
    }

    #[test]
    fn test_basic_extraction() {
        let extractor =
            FieldExtractor::compile(&[r"^feature (?P<feature_name>[A-Za-z0-9]*)$"]).unwrap();

        let result = extractor.extract("feature 2");
        assert_eq!(result.match_count, 1);
        assert_eq!(result.fields.get("feature_name").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_no_match() {
        let extractor = FieldExtractor::compile(&[r"^feature (?P<feature_name>\w+)$"]).unwrap();

        let result = extractor.extract("this must not match");
        assert_eq!(result.match_count, 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_last_pattern_wins_for_shared_name() {
        let extractor =
            FieldExtractor::compile(&[r"(?P<x>\d+)", r"(?P<x>[a-z]+)"]).unwrap();

        let result = extractor.extract("abc 123");
        assert_eq!(result.match_count, 2);
        assert_eq!(result.fields["x"], "abc");
    }

    #[test]
    fn test_unnamed_pattern_counts_without_fields() {
        let extractor = FieldExtractor::compile(&[r"GET (\S+)", r"(?P<status>\d{3})"]).unwrap();

        let result = extractor.extract("GET /index.html 200");
        assert_eq!(result.match_count, 2);
        assert_eq!(result.fields.len(), 1);
        assert_eq!(result.fields["status"], "200");
    }

    #[test]
    fn test_optional_group_records_empty_value() {
        let extractor = FieldExtractor::compile(&[r"^(?P<a>x)?(?P<b>y)$"]).unwrap();

        let result = extractor.extract("y");
        assert_eq!(result.match_count, 1);
        assert_eq!(result.fields["a"], "");
        assert_eq!(result.fields["b"], "y");
    }
}
