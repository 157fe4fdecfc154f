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

//! Backend sink contract
//!
//! The replay engine is backend-agnostic: any adapter that can open a
//! span-like unit of work, attach payloads, nest children, close it, and
//! flush buffered data can be driven by the engine. Open/close ordering is
//! the only structural signal most tracing backends get, so adapters must
//! preserve it.

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors surfaced by a backend sink adapter.
///
/// None of these are retried here; retry/backoff policy belongs to the
/// backend client, and a failed span tree is not a valid benchmark point.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The backend rejected a span batch
    #[error("Backend rejected spans ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Transport-level failure talking to the backend
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A handle was used that the sink never issued or has already closed
    #[error("Unknown span handle: {0}")]
    UnknownHandle(u64),
}

/// Opaque token identifying an open unit of work, issued by the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanHandle(u64);

impl SpanHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Minimal span-emission contract implemented once per backend.
pub trait SpanSink {
    /// Open a top-level unit of work.
    fn open_root(&mut self, name: &str) -> Result<SpanHandle, SinkError>;

    /// Open a unit of work nested inside `parent`.
    fn open_child(&mut self, parent: &SpanHandle, name: &str) -> Result<SpanHandle, SinkError>;

    /// Attach input/output payloads and optional metadata to an open unit.
    fn attach(
        &mut self,
        handle: &SpanHandle,
        input: &Value,
        output: &Value,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), SinkError>;

    /// Finalize timing/structure for a unit. The handle is consumed.
    fn close(&mut self, handle: SpanHandle) -> Result<(), SinkError>;

    /// Block until buffered units are durably delivered.
    fn flush(&mut self) -> Result<(), SinkError>;
}
