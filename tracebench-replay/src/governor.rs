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

//! Flush cadence governor
//!
//! Decides after each fully-replayed root whether the sink should flush now
//! or keep buffering. The engine still performs a mandatory flush at the end
//! of every iteration, so an unconfigured governor never defers final
//! delivery indefinitely.

use std::num::NonZeroUsize;

/// Per-iteration flush policy driven by a configured batch size.
#[derive(Debug)]
pub struct FlushGovernor {
    batch_size: Option<NonZeroUsize>,
    roots_completed: usize,
}

impl FlushGovernor {
    /// A governor with no batch size never requests an interim flush.
    pub fn new(batch_size: Option<NonZeroUsize>) -> Self {
        Self {
            batch_size,
            roots_completed: 0,
        }
    }

    /// Reset the root counter at the start of an iteration.
    pub fn begin_iteration(&mut self) {
        self.roots_completed = 0;
    }

    /// Record one fully-replayed root; returns true exactly when the count
    /// of roots replayed so far this iteration is a positive multiple of the
    /// batch size.
    pub fn root_completed(&mut self) -> bool {
        self.roots_completed += 1;
        match self.batch_size {
            Some(batch) => self.roots_completed % batch.get() == 0,
            None => false,
        }
    }

    /// Roots replayed so far in the current iteration.
    pub fn roots_completed(&self) -> usize {
        self.roots_completed
    }
}
