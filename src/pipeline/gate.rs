// src/pipeline/gate.rs
use crate::error::CompilationError;
use crate::pipeline::config::RuleSpec;
use crate::pipeline::rule::Rule;
use crate::record::Record;
use regex::Regex;
use tracing::{debug, warn};

/// Outcome of routing one record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub gates_matched: usize,
    pub errors: usize,
    pub passthrough: bool,
}

/// A membership test paired with the rule it unlocks
pub struct Gate {
    pattern: Regex,
    rule: Rule,
}

impl Gate {
    pub fn compile(pattern: &str, spec: &RuleSpec) -> Result<Self, CompilationError> {
        let pattern = Regex::new(pattern).map_err(|source| CompilationError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Gate {
            pattern,
            rule: Rule::compile(spec)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Routes records through every gate they satisfy, in configured order
pub struct GateRouter {
    gates: Vec<Gate>,
}

impl GateRouter {
    pub fn new(gates: Vec<Gate>) -> Self {
        GateRouter { gates }
    }

    pub fn compile(rules: &[(String, RuleSpec)]) -> Result<Self, CompilationError> {
        let gates = rules
            .iter()
            .map(|(pattern, spec)| Gate::compile(pattern, spec))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(gates))
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Run `record` through each matching gate's rule. A record no gate
    /// recognizes is emitted unchanged.
    pub fn route(&self, record: &Record, out: &mut Vec<Record>) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();

        let Some(text) = record.data.as_text() else {
            warn!(
                namespace = %record.namespace_string(),
                data = %record.data,
                gates = ?self.gates.iter().map(Gate::pattern).collect::<Vec<_>>(),
                "unexpected data type, only text payloads are processed; skipping record"
            );
            outcome.errors = 1;
            return outcome;
        };

        for gate in &self.gates {
            if !gate.matches(text) {
                continue;
            }
            debug!(gate = gate.pattern(), namespace = %record.namespace_string(), "gate matched");
            outcome.gates_matched += 1;
            outcome.errors += gate.rule.apply(record, out);
        }

        if outcome.gates_matched == 0 {
            out.push(record.clone());
            outcome.passthrough = true;
        }

        outcome
    }
}
