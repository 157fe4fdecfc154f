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

//! Tracebench Client
//!
//! Blocking HTTP span client implementing the replay engine's sink contract.
//! Spans are buffered locally as they open and close; `flush` delivers the
//! buffered batch to the backend ingestion endpoint in one request.

pub mod client;
pub mod types;

pub use client::{ClientConfig, ClientError, TraceClient, API_KEY_ENV};
pub use types::{IngestResponse, SpanExport};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
