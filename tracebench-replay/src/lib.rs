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

//! Tracebench Replay
//!
//! Walks the trace forest depth-first and re-emits every span into a backend
//! sink as a nested unit of work, across a configurable number of iterations.
//! Flush cadence is governed per replayed root so buffered-but-unflushed work
//! stays bounded by the batch size rather than the full dataset.

pub mod engine;
pub mod governor;
pub mod sink;

pub use engine::{ReplayEngine, ReplayError, ReplayOptions, ReplayStats};
pub use governor::FlushGovernor;
pub use sink::{SinkError, SpanHandle, SpanSink};
