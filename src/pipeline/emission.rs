// src/pipeline/emission.rs
use crate::pipeline::config::ShouldEmit;

impl ShouldEmit {
    /// Whether a record with `match_count` matches out of `total` parse
    /// patterns survives into the output batch
    pub fn permits(self, match_count: usize, total: usize) -> bool {
        match self {
            ShouldEmit::Always => true,
            ShouldEmit::AllSuccess => match_count == total,
            ShouldEmit::AnySuccess => match_count > 0,
            ShouldEmit::NoSuccess => match_count == 0,
        }
    }
}
