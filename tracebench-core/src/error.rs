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

//! Core error types

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while loading trace data.
///
/// Per-line parse failures are not errors at this level: the record store
/// skips malformed lines and keeps going. Only failures that make the whole
/// input unusable surface here.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error opening or reading the trace input
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
