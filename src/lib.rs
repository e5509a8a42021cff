// src/lib.rs
pub mod error;
pub mod pattern_extraction;
pub mod pipeline;
pub mod record;
pub mod split;

pub use error::*;
pub use pipeline::*;

pub use pattern_extraction::{compile_patterns, Extraction, FieldExtractor};
pub use pipeline::config::{ConfigBundle, PipelineConfig, RuleSpec, ShouldEmit};
pub use pipeline::gate::{Gate, GateRouter};
pub use pipeline::rule::Rule;
pub use pipeline::template::TagTemplater;
pub use record::{Payload, Record, TagMap, Tags};
pub use split::{split_record, split_text};
