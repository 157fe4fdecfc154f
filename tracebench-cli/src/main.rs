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

//! Tracebench CLI
//!
//! Replays recorded trace data into an observability backend for
//! performance benchmarking. Supports hierarchical span structures and can
//! optionally flatten traces for comparison runs.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};

use tracebench_client::{ClientConfig, TraceClient};
use tracebench_core::{RecordStore, TraceForest};
use tracebench_replay::{FlushGovernor, ReplayEngine, ReplayOptions};

const TRACE_FILE: &str = "data/big_traces.jsonl";
const PROJECT_NAME: &str = "Big traces";
const DEFAULT_BACKEND_URL: &str = "http://localhost:47100";

#[derive(Parser)]
#[command(name = "tracebench")]
#[command(
    about = "Replay recorded trace data into an observability backend for performance benchmarking",
    long_about = None
)]
struct Cli {
    /// Trace file (JSONL, one span record per line)
    #[arg(long, default_value = TRACE_FILE)]
    file: PathBuf,

    /// Backend base URL
    #[arg(long, default_value = DEFAULT_BACKEND_URL)]
    url: String,

    /// Flatten trace hierarchy instead of preserving parent-child relationships
    #[arg(long)]
    flatten: bool,

    /// Number of times to replay the traces
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    iterations: u32,

    /// Limit number of trace rows to load (default: load all)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    /// Flush after every N root traces (default: flush once per iteration)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if !cli.file.exists() {
        bail!(
            "Trace file not found at {}; fetch the benchmark data first",
            cli.file.display()
        );
    }

    // Authenticate once at startup, before any trace data is parsed
    let config = ClientConfig::new(cli.url.clone(), PROJECT_NAME);
    let mut client = TraceClient::login(config)
        .context("Failed to authenticate with the trace backend")?;

    let store = RecordStore::load(&cli.file, cli.limit.map(|l| l as usize))
        .with_context(|| format!("Failed to read trace file {}", cli.file.display()))?;
    let forest = TraceForest::build(&store, cli.flatten);

    info!("Logging {} root traces", forest.root_count());

    let options = ReplayOptions {
        iterations: cli.iterations as usize,
        ..ReplayOptions::default()
    };
    let engine = ReplayEngine::new(&store, &forest, options);
    let mut governor =
        FlushGovernor::new(cli.batch_size.and_then(|b| NonZeroUsize::new(b as usize)));

    let start = Instant::now();
    let stats = engine
        .run(&mut client, &mut governor)
        .context("Replay aborted")?;

    info!(
        "Replayed {} spans across {} iterations with {} flushes",
        stats.spans_emitted, stats.iterations, stats.flushes
    );
    info!("Total time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
