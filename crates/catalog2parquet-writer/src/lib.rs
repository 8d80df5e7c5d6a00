//! Parquet sink for catalog2parquet
//!
//! Encodes datasets read from a catalog as Parquet and writes them to object
//! storage through OpenDAL.

mod encoding;
mod error;
mod storage;
mod write;

pub use encoding::ParquetOptions;
pub use error::{ErrorCode, Result, WriterError};
pub use storage::build_operator;
pub use write::{write_dataset, WriteSummary, WrittenFile};
