//! Booklift batch pipeline
//!
//! Moves book records through three stores in chunks:
//!
//! - **file → relational**: a delimited text file into a `books` table
//! - **relational → document**: the table into a document collection
//! - **document → file**: the collection, sorted, back out to a text file
//!
//! Each hop is a [`Step`]: a [`RecordSource`] and a [`RecordSink`] joined by a
//! [`ChunkProcessor`] that buffers records into chunks and hands each chunk to
//! the sink in one write. The [`PipelineRunner`] executes steps in order and
//! stops at the first failure.
//!
//! # Example
//!
//! ```no_run
//! use booklift_batch::{pipeline, Settings};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::load(None)?;
//! let run = pipeline::run(&settings, CancellationToken::new()).await?;
//! if let Some((step, failure)) = run.failure() {
//!     eprintln!("{} failed: {}", step, failure.cause);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod config;
pub mod error;
pub mod listener;
pub mod pipeline;
pub mod processor;
pub mod runner;
pub mod sink;
pub mod source;
pub mod step;
pub mod store;

// Re-export commonly used types
pub use booklift_common::{ParseError, Record};
pub use chunk::Chunk;
pub use config::Settings;
pub use error::{BackendError, BatchError, Result};
pub use listener::{LoggingListener, RunListener, StepListener};
pub use processor::{ChunkProcessor, FaultPolicy, ProcessorState, StepStats};
pub use runner::{PipelineRunner, Run, RunStatus};
pub use sink::{Atomicity, RecordSink};
pub use source::RecordSource;
pub use step::{Step, StepFailure, StepOutcome, StepReport};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Booklift - chunked book transfer between file, relational and document stores
#[derive(Parser, Debug)]
#[command(name = "booklift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (TOML)
    #[arg(short, long, env = "BOOKLIFT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once
    Run {
        /// Records per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Input file
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate and print the resolved settings
    Check,
}
