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

//! Trace record model and JSONL record store
//!
//! One record per line, one span per record. Malformed lines are skipped
//! with a warning so a handful of bad rows cannot abort an otherwise-valid
//! benchmark run; failing to open or read the file at all is fatal.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;

/// Attributes attached to a span record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanAttributes {
    /// Human-readable operation name. Required for emitting child spans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One flat trace record, corresponding to exactly one span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Unique record identifier, the addressable key in the store.
    pub id: String,
    /// Identifier children reference when declaring this record as a parent.
    pub span_id: String,
    /// Declared parent span ids. Empty means this record is a root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub span_parents: Vec<String>,
    #[serde(default)]
    pub span_attributes: SpanAttributes,
    /// Opaque input payload, passed through without interpretation.
    #[serde(default)]
    pub input: Value,
    /// Opaque output payload, passed through without interpretation.
    #[serde(default)]
    pub output: Value,
    /// String-keyed metadata. The replay engine injects a model tag into
    /// root metadata at emission time; child metadata is never emitted.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl TraceRecord {
    /// Operation name used when this record is emitted as a child span.
    pub fn span_name(&self) -> Option<&str> {
        self.span_attributes.name.as_deref()
    }
}

/// Input-ordered collection of trace records with id lookup.
pub struct RecordStore {
    records: Vec<TraceRecord>,
    by_id: HashMap<String, usize>,
    lines_skipped: usize,
}

impl RecordStore {
    /// Load records from a JSONL file, consuming at most `limit` input lines.
    ///
    /// Open/read failures are fatal; individual malformed lines are not.
    pub fn load(path: &Path, limit: Option<usize>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), limit)
    }

    /// Parse line-delimited records from any buffered reader.
    ///
    /// The limit counts input lines consumed, not records parsed: a line
    /// skipped for being malformed still uses up one slot.
    pub fn from_reader<R: BufRead>(reader: R, limit: Option<usize>) -> Result<Self> {
        let mut records: Vec<TraceRecord> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut lines_skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            if let Some(limit) = limit {
                if idx >= limit {
                    break;
                }
            }
            let line = line?;
            match serde_json::from_str::<TraceRecord>(&line) {
                Ok(record) => {
                    by_id.insert(record.id.clone(), records.len());
                    records.push(record);
                }
                Err(e) => {
                    warn!("Skipping malformed JSON on line {}: {}", idx + 1, e);
                    lines_skipped += 1;
                }
            }
        }

        debug!(
            "Parsed {} trace records ({} malformed lines skipped)",
            records.len(),
            lines_skipped
        );

        Ok(Self {
            records,
            by_id,
            lines_skipped,
        })
    }

    /// Look up a record by its `id`.
    pub fn get(&self, id: &str) -> Option<&TraceRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// Iterate records in input order.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// Number of successfully parsed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of input lines skipped as malformed.
    pub fn lines_skipped(&self) -> usize {
        self.lines_skipped
    }
}
