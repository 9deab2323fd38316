#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Registry index access for ferry
//!
//! The registry index is a tree of shard files, one per crate name, each
//! holding the JSON-lines history of every published version. This crate
//! locates shards (the shard path rule is shared with the archive tree),
//! parses version records, and walks the whole index lazily.

mod config;
mod models;
mod reader;
mod shard;

pub use config::{IndexConfig, INDEX_CONFIG_FILE};
pub use models::VersionRecord;
pub use reader::{IndexReader, Records};
pub use shard::{archive_path, shard_path, shard_prefix, validate_name};
