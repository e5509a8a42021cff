// src/pipeline/rule.rs - one compiled split/parse/emit/template chain
use crate::error::{CompilationError, ProcessingError};
use crate::pattern_extraction::{compile_patterns, FieldExtractor};
use crate::pipeline::config::{RuleSpec, ShouldEmit};
use crate::pipeline::template::TagTemplater;
use crate::record::Record;
use crate::split::split_record;
use regex::Regex;
use tracing::warn;

/// Compiled form of a [`RuleSpec`]
pub struct Rule {
    split: Vec<Regex>,
    extractor: FieldExtractor,
    should_emit: ShouldEmit,
    templater: TagTemplater,
}

impl Rule {
    pub fn compile(spec: &RuleSpec) -> Result<Self, CompilationError> {
        Ok(Rule {
            split: compile_patterns(&spec.split)?,
            extractor: FieldExtractor::compile(&spec.parse)?,
            should_emit: spec.should_emit.unwrap_or_default(),
            templater: TagTemplater::compile(&spec.tags)?,
        })
    }

    pub fn should_emit(&self) -> ShouldEmit {
        self.should_emit
    }

    /// Run one record through the chain and append the survivors to `out`.
    ///
    /// Fragments that fail are logged and left out; they never stop the
    /// remaining fragments. Returns the number of fragments dropped because
    /// of an error.
    pub fn apply(&self, record: &Record, out: &mut Vec<Record>) -> usize {
        let fragments = if self.split.is_empty() {
            vec![record.clone()]
        } else {
            match split_record(record, &self.split) {
                Ok(fragments) => fragments,
                Err(err) => {
                    self.warn_skipped(record, &err);
                    return 1;
                }
            }
        };

        let mut errors = 0;
        for fragment in fragments {
            match self.process_fragment(fragment) {
                Ok(Some(processed)) => out.push(processed),
                Ok(None) => {}
                Err((fragment, err)) => {
                    self.warn_skipped(&fragment, &err);
                    errors += 1;
                }
            }
        }
        errors
    }

    /// Extract, gate on the emission policy, then template.
    ///
    /// `Ok(None)` means the emission policy dropped the fragment.
    fn process_fragment(&self, mut record: Record) -> Result<Option<Record>, (Record, ProcessingError)> {
        let extraction = match record.data.as_text().map(|text| self.extractor.extract(text)) {
            Some(extraction) => extraction,
            None => {
                let err = ProcessingError::NonTextPayload {
                    namespace: record.namespace_string(),
                };
                return Err((record, err));
            }
        };

        if !self
            .should_emit
            .permits(extraction.match_count, self.extractor.len())
        {
            return Ok(None);
        }

        if !extraction.is_empty() {
            record.tags_mut().extend(extraction.fields);
        }

        if !self.templater.is_empty() {
            let rendered = match self.templater.render(&record) {
                Ok(rendered) => rendered,
                Err(err) => return Err((record, err)),
            };
            record.tags_mut().extend(rendered);
        }

        Ok(Some(record))
    }

    fn warn_skipped(&self, record: &Record, err: &ProcessingError) {
        warn!(
            namespace = %record.namespace_string(),
            data = %record.data,
            regexps = ?self.extractor.sources(),
            "{}, skipping record",
            err
        );
    }
}
