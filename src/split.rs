// src/split.rs - fan one record out into its payload fragments
use crate::error::ProcessingError;
use crate::record::{Payload, Record};
use regex::Regex;

/// Split a record's text payload on each delimiter pattern in turn.
///
/// Every fragment in the working set is re-split by the next pattern, empty
/// fragments included. One record is produced per final fragment; all other
/// fields, the tag map included, are shared with the source record.
/// With no delimiters the record comes back as is, whatever its payload.
pub fn split_record(record: &Record, delimiters: &[Regex]) -> Result<Vec<Record>, ProcessingError> {
    if delimiters.is_empty() {
        return Ok(vec![record.clone()]);
    }

    let text = record
        .data
        .as_text()
        .ok_or_else(|| ProcessingError::NonTextPayload {
            namespace: record.namespace_string(),
        })?;

    Ok(split_text(text, delimiters)
        .into_iter()
        .map(|fragment| record.with_payload(Payload::Text(fragment.to_string())))
        .collect())
}

/// Fragment `text` on each delimiter sequentially
pub fn split_text<'t>(text: &'t str, delimiters: &[Regex]) -> Vec<&'t str> {
    let mut workspace = vec![text];

    for regex in delimiters {
        workspace = workspace
            .into_iter()
            .flat_map(|current| regex.split(current))
            .collect();
    }

    workspace
}
