pub mod config;
pub mod emission;
pub mod gate;
pub mod rule;
pub mod template;

use crate::error::CompilationError;
use crate::record::Record;
use config::{ConfigBundle, PipelineConfig};
use gate::GateRouter;
use rule::Rule;
use std::time::{Duration, Instant};
use tracing::debug;

/// Runtime statistics for one batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessingStats {
    pub records_in: usize,
    pub records_out: usize,
    pub errors: usize,
    pub gate_matches: usize,
    pub passthrough: usize,
    pub processing_time: Duration,
}

enum Routing {
    Single(Rule),
    Gated(GateRouter),
}

/// Compiled configuration, ready to run batches.
///
/// Compiling once and reusing the processor across batches is optional;
/// [`process`] recompiles on every call.
pub struct Processor {
    routing: Routing,
}

impl Processor {
    pub fn compile(config: &PipelineConfig) -> Result<Self, CompilationError> {
        let routing = match config {
            PipelineConfig::SingleRule(spec) => Routing::Single(Rule::compile(spec)?),
            PipelineConfig::MultiRule(rules) => Routing::Gated(GateRouter::compile(rules)?),
        };
        Ok(Processor { routing })
    }

    pub fn from_bundle(bundle: &ConfigBundle) -> Result<Self, CompilationError> {
        Self::compile(&PipelineConfig::from_bundle(bundle)?)
    }

    pub fn is_gated(&self) -> bool {
        matches!(self.routing, Routing::Gated(_))
    }

    /// Transform a batch. Records that fail are logged and left out.
    pub fn process(&self, records: &[Record]) -> Vec<Record> {
        self.process_with_stats(records).0
    }

    pub fn process_with_stats(&self, records: &[Record]) -> (Vec<Record>, ProcessingStats) {
        let start_time = Instant::now();
        let mut stats = ProcessingStats {
            records_in: records.len(),
            ..ProcessingStats::default()
        };
        let mut output = Vec::with_capacity(records.len());

        for record in records {
            match &self.routing {
                Routing::Single(rule) => {
                    stats.errors += rule.apply(record, &mut output);
                }
                Routing::Gated(router) => {
                    let outcome = router.route(record, &mut output);
                    stats.errors += outcome.errors;
                    stats.gate_matches += outcome.gates_matched;
                    if outcome.passthrough {
                        stats.passthrough += 1;
                    }
                }
            }
        }

        stats.records_out = output.len();
        stats.processing_time = start_time.elapsed();

        debug!(
            records_in = stats.records_in,
            records_out = stats.records_out,
            errors = stats.errors,
            gate_matches = stats.gate_matches,
            passthrough = stats.passthrough,
            elapsed = ?stats.processing_time,
            "batch processed"
        );

        (output, stats)
    }
}

/// Compile `bundle` and run `records` through it.
///
/// A configuration error returns no records at all. Per-record failures only
/// shrink the output.
pub fn process(records: &[Record], bundle: &ConfigBundle) -> Result<Vec<Record>, CompilationError> {
    let processor = Processor::from_bundle(bundle)?;
    Ok(processor.process(records))
}
