// Copyright 2025 Tracebench Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Replay engine
//!
//! Replays every root tree once per iteration, strictly sequentially:
//! pre-order open, post-order close, sibling order as indexed. Any failure
//! opening, attaching, or closing a unit aborts the run; a partially-emitted
//! tree is not a valid benchmark data point.

use std::time::Instant;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use tracebench_core::{RecordStore, TraceForest, TraceRecord};

use crate::governor::FlushGovernor;
use crate::sink::{SinkError, SpanHandle, SpanSink};

/// Metadata key the engine injects into every emitted root.
pub const MODEL_METADATA_KEY: &str = "model";

/// Errors that abort a replay run.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The tree index references a record the store does not hold
    #[error("Record not found in store: {0}")]
    MissingRecord(String),

    /// A child record has no span name to emit under
    #[error("Span has no name attribute: {0}")]
    MissingSpanName(String),

    /// A parent link points back into the current ancestor path
    #[error("Cycle detected: span {0} is its own ancestor")]
    CycleDetected(String),

    /// Backend sink failure
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Replay configuration.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Number of times to replay the full record set. Must be at least 1;
    /// callers validate before any I/O happens.
    pub iterations: usize,
    /// Fixed pipeline label every root unit is opened under.
    pub root_span_name: String,
    /// Model tag injected into root metadata at emission time. A replay
    /// annotation, not a property of the original trace.
    pub model_tag: String,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            iterations: 1,
            root_span_name: "Chat Pipeline".to_string(),
            model_tag: "gpt-4o".to_string(),
        }
    }
}

/// Counters accumulated across a full run, for benchmark reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub iterations: usize,
    pub roots_per_iteration: usize,
    pub spans_emitted: u64,
    pub flushes: u64,
}

/// Drives a [`SpanSink`] over the trace forest.
pub struct ReplayEngine<'a> {
    store: &'a RecordStore,
    forest: &'a TraceForest,
    options: ReplayOptions,
}

impl<'a> ReplayEngine<'a> {
    pub fn new(store: &'a RecordStore, forest: &'a TraceForest, options: ReplayOptions) -> Self {
        Self {
            store,
            forest,
            options,
        }
    }

    /// Replay every root tree once per configured iteration.
    ///
    /// After each fully-emitted root the governor is consulted; after each
    /// iteration a flush is requested unconditionally so the periodic policy
    /// can never defer final delivery.
    pub fn run(
        &self,
        sink: &mut dyn SpanSink,
        governor: &mut FlushGovernor,
    ) -> Result<ReplayStats, ReplayError> {
        let mut stats = ReplayStats {
            iterations: self.options.iterations,
            roots_per_iteration: self.forest.root_count(),
            ..ReplayStats::default()
        };

        for iteration in 0..self.options.iterations {
            let iter_start = Instant::now();
            governor.begin_iteration();

            for root_id in self.forest.roots() {
                self.replay_root(sink, root_id, &mut stats)?;
                if governor.root_completed() {
                    sink.flush()?;
                    stats.flushes += 1;
                }
            }

            sink.flush()?;
            stats.flushes += 1;

            info!(
                "Iteration {}/{} completed in {:.2}s",
                iteration + 1,
                self.options.iterations,
                iter_start.elapsed().as_secs_f64()
            );
        }

        Ok(stats)
    }

    fn replay_root(
        &self,
        sink: &mut dyn SpanSink,
        root_id: &str,
        stats: &mut ReplayStats,
    ) -> Result<(), ReplayError> {
        let record = self.lookup(root_id)?;
        let handle = sink.open_root(&self.options.root_span_name)?;

        let mut metadata = record.metadata.clone();
        metadata.insert(
            MODEL_METADATA_KEY.to_string(),
            Value::String(self.options.model_tag.clone()),
        );
        sink.attach(&handle, &record.input, &record.output, Some(&metadata))?;

        let mut path: Vec<&str> = vec![record.id.as_str()];
        for child_id in self.forest.children_of(&record.span_id) {
            self.replay_child(sink, &handle, child_id, &mut path, stats)?;
        }

        sink.close(handle)?;
        stats.spans_emitted += 1;
        Ok(())
    }

    fn replay_child(
        &self,
        sink: &mut dyn SpanSink,
        parent: &SpanHandle,
        id: &str,
        path: &mut Vec<&'a str>,
        stats: &mut ReplayStats,
    ) -> Result<(), ReplayError> {
        let record = self.lookup(id)?;

        // Fan-in from distinct parents is fine; a record on its own ancestor
        // path means a back-edge and would recurse forever.
        if path.contains(&record.id.as_str()) {
            return Err(ReplayError::CycleDetected(record.id.clone()));
        }

        let name = record
            .span_name()
            .ok_or_else(|| ReplayError::MissingSpanName(record.id.clone()))?;

        let handle = sink.open_child(parent, name)?;
        sink.attach(&handle, &record.input, &record.output, None)?;

        path.push(record.id.as_str());
        for child_id in self.forest.children_of(&record.span_id) {
            self.replay_child(sink, &handle, child_id, path, stats)?;
        }
        path.pop();

        sink.close(handle)?;
        stats.spans_emitted += 1;
        Ok(())
    }

    fn lookup(&self, id: &str) -> Result<&'a TraceRecord, ReplayError> {
        self.store
            .get(id)
            .ok_or_else(|| ReplayError::MissingRecord(id.to_string()))
    }
}
