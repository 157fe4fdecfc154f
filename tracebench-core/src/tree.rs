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

//! Parent/child forest derived from flat trace records
//!
//! Records link to parents by `span_id`, while the store addresses them by
//! `id`. The two fields are populated from the same identifier domain in
//! practice, so roots hold record `id`s and the child map is keyed by the
//! parent's `span_id`.

use std::collections::HashMap;

use crate::record::RecordStore;

/// Derived tree index over a record store. Read-only after construction.
///
/// Root order is input order; child order under a given parent is the order
/// in which children referencing that parent were encountered in the input,
/// which keeps repeated replays byte-for-byte comparable.
pub struct TraceForest {
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl TraceForest {
    /// Build the forest under the given hierarchy policy.
    ///
    /// With `flatten` set, every record becomes a root and parent links are
    /// dropped entirely. Otherwise a record declaring parents is registered
    /// as a child under each of them (fan-in is permitted), and only
    /// parentless records become roots.
    pub fn build(store: &RecordStore, flatten: bool) -> Self {
        let mut roots: Vec<String> = Vec::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();

        for record in store.iter() {
            if !flatten && !record.span_parents.is_empty() {
                for parent in &record.span_parents {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .push(record.id.clone());
                }
            } else {
                roots.push(record.id.clone());
            }
        }

        Self { roots, children }
    }

    /// Root record ids in input order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Child record ids registered under the given parent `span_id`.
    pub fn children_of(&self, span_id: &str) -> &[String] {
        self.children
            .get(span_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Number of parents that have at least one registered child.
    pub fn parent_count(&self) -> usize {
        self.children.len()
    }
}
