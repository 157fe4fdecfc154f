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

//! Tracebench Core
//!
//! Record model and tree indexing for replaying recorded execution traces.
//! A trace arrives as a flat, unordered set of JSONL span records; this crate
//! parses them into an addressable store and derives the parent/child forest
//! the replay engine walks.

pub mod error;
pub mod record;
pub mod tree;

pub use error::{CoreError, Result};
pub use record::{RecordStore, SpanAttributes, TraceRecord};
pub use tree::TraceForest;
