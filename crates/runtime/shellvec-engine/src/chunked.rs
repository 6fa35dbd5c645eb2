//! Chunked multi-round probing
//!
//! Splits a working set across as many requests as needed, skips vectors
//! whose remote prerequisites are missing, and stops at the first response
//! that carries the success marker.

use crate::module::{Context, VECTOR_PARAM};
use crate::vector::Vector;
use shellvec_core::{Error, Payload, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Items to try, owned. Reading them consumes the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet(Vec<String>);

impl WorkingSet {
    pub fn new(items: Vec<String>) -> Self {
        Self(items)
    }

    /// Whitespace-separated tokens of `text`.
    pub fn from_text(text: &str) -> Self {
        Self(text.split_whitespace().map(str::to_string).collect())
    }

    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self::from_text(&std::fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_items(self) -> Vec<String> {
        self.0
    }
}

/// Where a probing attempt gets its items from.
#[derive(Debug)]
pub enum Source {
    /// Handed over programmatically; used once.
    Supplied(WorkingSet),
    File(PathBuf),
}

impl Source {
    /// Materialise the items. A read failure is a module error naming `module`.
    pub fn assemble(self, module: &str) -> Result<Vec<String>> {
        match self {
            Source::Supplied(set) => Ok(set.into_items()),
            Source::File(path) => WorkingSet::read(&path)
                .map(WorkingSet::into_items)
                .map_err(|e| Error::module(module, format!("{}: {}", path.display(), e))),
        }
    }
}

/// `ceil(len / size)` consecutive ranges covering `0..len`; the last one
/// takes the remainder.
pub fn chunk_bounds(len: usize, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

/// Minimal payload asking whether a vector can work on the remote side.
#[derive(Debug, Clone)]
pub struct FeatureCheck {
    pub payload: Payload,
    /// Response meaning "available".
    pub expect: String,
    /// Human name of the prerequisite, for the skip warning.
    pub feature: String,
}

/// Module-specific half of a chunked attempt.
pub trait ChunkedProbe {
    /// `None` when `vector` needs no remote check.
    fn feature_check(&self, vector: &Vector) -> Result<Option<FeatureCheck>>;

    /// Full request for one chunk.
    fn round_payload(&self, vector: &Vector, chunk: &[String]) -> Result<Payload>;

    fn split_message(&self, total: usize, chunks: usize, size: usize) -> String {
        format!("Splitting {} items in {} chunks of {} items.", total, chunks, size)
    }

    fn progress_message(&self, offset: usize, item: &str) -> String {
        format!("Tried item #{}: ({}) ...", offset, item)
    }

    fn exhausted_message(&self) -> String {
        "Nothing found. Check target availability or try other credentials".to_string()
    }
}

/// A definitive success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub vector: String,
    /// Response text after the success marker.
    pub confirmed: String,
    /// Rounds sent for the winning vector, feature check excluded.
    pub rounds: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkedProbeExecutor {
    chunk_size: usize,
    start: usize,
    marker: String,
}

impl ChunkedProbeExecutor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            start: 0,
            marker: "+".to_string(),
        }
    }

    /// Skip the first `offset` items.
    pub fn starting_at(mut self, offset: usize) -> Self {
        self.start = offset;
        self
    }

    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Try `candidates` in order against `items`.
    ///
    /// The winning vector is recorded as the module's `vector` argument.
    /// Returns `None` after warning when every vector is exhausted.
    pub fn execute<P: ChunkedProbe>(
        &self,
        ctx: &mut Context<'_>,
        candidates: &[&Vector],
        probe: &P,
        items: &[String],
    ) -> Result<Option<Hit>> {
        if candidates.is_empty() {
            return Err(Error::probe("No vector available for the current capabilities"));
        }

        let remaining = items.get(self.start..).unwrap_or(&[]);
        let bounds = chunk_bounds(remaining.len(), self.chunk_size);

        for vector in candidates {
            if let Some(check) = probe.feature_check(vector)? {
                let answer = ctx.session.deliver(&vector.capability, &check.payload)?;
                if answer.as_deref().map(str::trim) != Some(check.expect.as_str()) {
                    ctx.warn(&format!(
                        "Skipping vector {}: {} not available",
                        vector.name, check.feature
                    ));
                    continue;
                }
            }

            tracing::info!(module = %ctx.module_name(), vector = %vector.name, chunks = bounds.len(), "trying vector");

            if bounds.len() > 1 {
                let message = probe.split_message(remaining.len(), bounds.len(), self.chunk_size);
                ctx.warn(&message);
            }

            for (round, range) in bounds.iter().enumerate() {
                let chunk = &remaining[range.clone()];
                let payload = probe.round_payload(vector, chunk)?;
                let response = ctx.session.deliver(&vector.capability, &payload)?;

                match response.as_deref() {
                    Some(text) if text.starts_with(self.marker.as_str()) => {
                        let confirmed = text[self.marker.len()..].trim().to_string();
                        ctx.record(VECTOR_PARAM, &vector.name);
                        return Ok(Some(Hit {
                            vector: vector.name.clone(),
                            confirmed,
                            rounds: round + 1,
                        }));
                    }
                    Some(text) if !text.trim().is_empty() => {
                        tracing::debug!(round, response = %text, "response without success marker");
                    }
                    _ => {
                        let last = &chunk[chunk.len() - 1];
                        let message = probe.progress_message(range.end + self.start, last);
                        ctx.warn(&message);
                    }
                }
            }
        }

        let message = probe.exhausted_message();
        ctx.warn(&message);
        Ok(None)
    }
}
