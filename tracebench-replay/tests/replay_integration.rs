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

//! Integration tests for the replay engine.
//!
//! A recording sink captures the exact open/attach/close/flush sequence so
//! nesting order, flush cadence, and determinism can be asserted end to end.

use std::io::Cursor;
use std::num::NonZeroUsize;

use serde_json::{Map, Value};

use tracebench_core::{RecordStore, TraceForest};
use tracebench_replay::{
    FlushGovernor, ReplayEngine, ReplayError, ReplayOptions, SinkError, SpanHandle, SpanSink,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    OpenRoot { handle: u64, name: String },
    OpenChild { handle: u64, parent: u64, name: String },
    Attach { handle: u64, metadata: Option<Map<String, Value>> },
    Close { handle: u64 },
    Flush,
}

#[derive(Debug, Default)]
struct RecordingSink {
    events: Vec<Event>,
    next_handle: u64,
}

impl RecordingSink {
    fn issue(&mut self) -> SpanHandle {
        self.next_handle += 1;
        SpanHandle::new(self.next_handle)
    }

    fn flush_count(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, Event::Flush)).count()
    }
}

impl SpanSink for RecordingSink {
    fn open_root(&mut self, name: &str) -> Result<SpanHandle, SinkError> {
        let handle = self.issue();
        self.events.push(Event::OpenRoot {
            handle: handle.raw(),
            name: name.to_string(),
        });
        Ok(handle)
    }

    fn open_child(&mut self, parent: &SpanHandle, name: &str) -> Result<SpanHandle, SinkError> {
        let handle = self.issue();
        self.events.push(Event::OpenChild {
            handle: handle.raw(),
            parent: parent.raw(),
            name: name.to_string(),
        });
        Ok(handle)
    }

    fn attach(
        &mut self,
        handle: &SpanHandle,
        _input: &Value,
        _output: &Value,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), SinkError> {
        self.events.push(Event::Attach {
            handle: handle.raw(),
            metadata: metadata.cloned(),
        });
        Ok(())
    }

    fn close(&mut self, handle: SpanHandle) -> Result<(), SinkError> {
        self.events.push(Event::Close { handle: handle.raw() });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.events.push(Event::Flush);
        Ok(())
    }
}

fn record(id: &str, span_id: &str, parents: &[&str]) -> String {
    serde_json::json!({
        "id": id,
        "span_id": span_id,
        "span_parents": parents,
        "span_attributes": { "name": id },
        "input": { "q": id },
        "output": { "a": id },
        "metadata": { "origin": "test" }
    })
    .to_string()
}

fn load(lines: &[String]) -> RecordStore {
    let input: String = lines.iter().map(|l| format!("{l}\n")).collect();
    RecordStore::from_reader(Cursor::new(input), None).unwrap()
}

fn run(
    store: &RecordStore,
    flatten: bool,
    iterations: usize,
    batch_size: Option<usize>,
) -> Result<(RecordingSink, tracebench_replay::ReplayStats), ReplayError> {
    let forest = TraceForest::build(store, flatten);
    let options = ReplayOptions {
        iterations,
        ..ReplayOptions::default()
    };
    let engine = ReplayEngine::new(store, &forest, options);
    let mut sink = RecordingSink::default();
    let mut governor = FlushGovernor::new(batch_size.and_then(NonZeroUsize::new));
    let stats = engine.run(&mut sink, &mut governor)?;
    Ok((sink, stats))
}

#[test]
fn test_chain_emits_strictly_nested_units() {
    // A (root) <- B <- C must emit open(A) open(B) open(C) close(C) close(B) close(A)
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &["a"]),
        record("C", "c", &["b"]),
    ]);
    let (sink, stats) = run(&store, false, 1, None).unwrap();

    let shape: Vec<String> = sink
        .events
        .iter()
        .map(|e| match e {
            Event::OpenRoot { name, .. } => format!("open-root:{name}"),
            Event::OpenChild { name, .. } => format!("open:{name}"),
            Event::Attach { .. } => "attach".to_string(),
            Event::Close { .. } => "close".to_string(),
            Event::Flush => "flush".to_string(),
        })
        .collect();

    assert_eq!(
        shape,
        vec![
            "open-root:Chat Pipeline",
            "attach",
            "open:B",
            "attach",
            "open:C",
            "attach",
            "close", // C
            "close", // B
            "close", // A
            "flush",
        ]
    );
    assert_eq!(stats.spans_emitted, 3);
    assert_eq!(stats.roots_per_iteration, 1);
}

#[test]
fn test_close_order_is_post_order() {
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &["a"]),
        record("C", "c", &["b"]),
    ]);
    let (sink, _) = run(&store, false, 1, None).unwrap();

    // handles are issued 1 (root), 2 (B), 3 (C); closes come back in reverse
    let closes: Vec<u64> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Close { handle } => Some(*handle),
            _ => None,
        })
        .collect();
    assert_eq!(closes, vec![3, 2, 1]);
}

#[test]
fn test_children_nest_under_their_own_parent_handle() {
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &["a"]),
        record("C", "c", &["b"]),
        record("D", "d", &["a"]),
    ]);
    let (sink, _) = run(&store, false, 1, None).unwrap();

    let mut parents = sink.events.iter().filter_map(|e| match e {
        Event::OpenChild { parent, name, .. } => Some((name.as_str(), *parent)),
        _ => None,
    });
    assert_eq!(parents.next(), Some(("B", 1))); // under root
    assert_eq!(parents.next(), Some(("C", 2))); // under B
    assert_eq!(parents.next(), Some(("D", 1))); // back under root
}

#[test]
fn test_model_tag_injected_into_root_metadata_only() {
    let store = load(&[record("A", "a", &[]), record("B", "b", &["a"])]);
    let (sink, _) = run(&store, false, 1, None).unwrap();

    let attachments: Vec<&Option<Map<String, Value>>> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Attach { metadata, .. } => Some(metadata),
            _ => None,
        })
        .collect();

    // root attach carries original metadata plus the injected model tag
    let root_meta = attachments[0].as_ref().unwrap();
    assert_eq!(root_meta.get("model"), Some(&Value::String("gpt-4o".into())));
    assert_eq!(root_meta.get("origin"), Some(&Value::String("test".into())));

    // child attach carries no metadata at all
    assert!(attachments[1].is_none());
}

#[test]
fn test_flatten_emits_every_record_as_a_root() {
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &["a"]),
        record("C", "c", &["b"]),
    ]);
    let (sink, stats) = run(&store, true, 1, None).unwrap();

    let root_opens = sink
        .events
        .iter()
        .filter(|e| matches!(e, Event::OpenRoot { .. }))
        .count();
    let child_opens = sink
        .events
        .iter()
        .filter(|e| matches!(e, Event::OpenChild { .. }))
        .count();

    assert_eq!(root_opens, 3);
    assert_eq!(child_opens, 0);
    assert_eq!(stats.roots_per_iteration, 3);
}

#[test]
fn test_flush_cadence_is_floor_k_over_b_plus_final() {
    // 5 roots, batch 2: interim flushes after roots 2 and 4, plus one at end
    let lines: Vec<String> = (0..5)
        .map(|i| record(&format!("R{i}"), &format!("s{i}"), &[]))
        .collect();
    let store = load(&lines);
    let (sink, stats) = run(&store, false, 1, Some(2)).unwrap();

    assert_eq!(sink.flush_count(), 3);
    assert_eq!(stats.flushes, 3);
}

#[test]
fn test_no_batch_size_flushes_once_per_iteration() {
    let lines: Vec<String> = (0..4)
        .map(|i| record(&format!("R{i}"), &format!("s{i}"), &[]))
        .collect();
    let store = load(&lines);
    let (sink, _) = run(&store, false, 3, None).unwrap();

    assert_eq!(sink.flush_count(), 3);
}

#[test]
fn test_governor_counter_resets_each_iteration() {
    // 3 roots, batch 2, 2 iterations: one interim flush per iteration (after
    // root 2), never a carry-over from the dangling third root
    let lines: Vec<String> = (0..3)
        .map(|i| record(&format!("R{i}"), &format!("s{i}"), &[]))
        .collect();
    let store = load(&lines);
    let (sink, _) = run(&store, false, 2, Some(2)).unwrap();

    // per iteration: 1 interim + 1 final
    assert_eq!(sink.flush_count(), 4);
}

#[test]
fn test_replay_is_deterministic() {
    let lines = [
        record("A", "a", &[]),
        record("B", "b", &["a"]),
        record("X", "x", &[]),
        record("C", "c", &["a"]),
    ];
    let store = load(&lines);

    let (first, _) = run(&store, false, 1, Some(1)).unwrap();
    let (second, _) = run(&store, false, 1, Some(1)).unwrap();
    assert_eq!(first.events, second.events);
}

#[test]
fn test_fan_in_child_is_replayed_under_every_parent() {
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &[]),
        record("C", "c", &["a", "b"]),
    ]);
    let (sink, stats) = run(&store, false, 1, None).unwrap();

    let c_opens = sink
        .events
        .iter()
        .filter(|e| matches!(e, Event::OpenChild { name, .. } if name == "C"))
        .count();
    assert_eq!(c_opens, 2);
    assert_eq!(stats.spans_emitted, 4);
}

#[test]
fn test_missing_child_name_aborts_the_run() {
    let nameless = serde_json::json!({
        "id": "B",
        "span_id": "b",
        "span_parents": ["a"],
        "span_attributes": {},
        "metadata": {}
    })
    .to_string();
    let store = load(&[record("A", "a", &[]), nameless]);

    let err = run(&store, false, 1, None).unwrap_err();
    assert!(matches!(err, ReplayError::MissingSpanName(id) if id == "B"));
}

#[test]
fn test_back_edge_is_detected_not_recursed() {
    // B sits under root A but also under C, which is B's own child
    let store = load(&[
        record("A", "a", &[]),
        record("B", "b", &["a", "c"]),
        record("C", "c", &["b"]),
    ]);
    let err = run(&store, false, 1, None).unwrap_err();
    assert!(matches!(err, ReplayError::CycleDetected(_)));
}

#[test]
fn test_multiple_iterations_repeat_the_full_forest() {
    let store = load(&[record("A", "a", &[]), record("B", "b", &["a"])]);
    let (sink, stats) = run(&store, false, 3, None).unwrap();

    let root_opens = sink
        .events
        .iter()
        .filter(|e| matches!(e, Event::OpenRoot { .. }))
        .count();
    assert_eq!(root_opens, 3);
    assert_eq!(stats.spans_emitted, 6);
    assert_eq!(stats.iterations, 3);
}

/// Sink that fails on flush, to check failure propagation.
struct FailingFlushSink(RecordingSink);

impl SpanSink for FailingFlushSink {
    fn open_root(&mut self, name: &str) -> Result<SpanHandle, SinkError> {
        self.0.open_root(name)
    }
    fn open_child(&mut self, parent: &SpanHandle, name: &str) -> Result<SpanHandle, SinkError> {
        self.0.open_child(parent, name)
    }
    fn attach(
        &mut self,
        handle: &SpanHandle,
        input: &Value,
        output: &Value,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<(), SinkError> {
        self.0.attach(handle, input, output, metadata)
    }
    fn close(&mut self, handle: SpanHandle) -> Result<(), SinkError> {
        self.0.close(handle)
    }
    fn flush(&mut self) -> Result<(), SinkError> {
        Err(SinkError::Rejected {
            status: 503,
            message: "ingestion backlog".to_string(),
        })
    }
}

#[test]
fn test_flush_failure_propagates() {
    let store = load(&[record("A", "a", &[])]);
    let forest = TraceForest::build(&store, false);
    let engine = ReplayEngine::new(&store, &forest, ReplayOptions::default());
    let mut sink = FailingFlushSink(RecordingSink::default());
    let mut governor = FlushGovernor::new(None);

    let err = engine.run(&mut sink, &mut governor).unwrap_err();
    assert!(matches!(err, ReplayError::Sink(SinkError::Rejected { status: 503, .. })));
}
