//! catalog2parquet - convert a cataloged dataset into Parquet files
//!
//! The batch job resolves its name through a [`JobContext`], reads one table
//! through a [`Catalog`](catalog2parquet_core::Catalog), writes it to the sink
//! as Parquet and commits the run exactly once.

pub mod cli;
pub mod context;
pub mod init;
pub mod job;

pub use cli::Cli;
pub use context::{JobContext, RunStatus, StorageJobContext};
pub use init::{init_storage, init_tracing};
pub use job::{ConversionJob, JobError, JobRun, JobSummary, OutputFile, JOB_NAME_ARG};
