//! treeview: live, lazily materialized tree views over hierarchical domain models
//!
//! Layers, innermost first:
//! - `domain`: identity and expansion codecs, tree snapshot types, arena graphs
//! - `application`: tree descriptions, materializer, path resolver, sessions
//! - `infrastructure`: domain model adapters, change feed, document loading
//! - `cli`: command-line surface

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
