//! Indexes the contents of uploaded ZIP archives, descending into nested JAR
//! containers, without extracting anything to disk.

pub mod config;
mod indexer;

pub use config::Config;
pub use indexer::*;
