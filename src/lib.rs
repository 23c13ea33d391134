//! pbxkit - transactional editing, validation and repair of build-project graphs.
//!
//! This crate provides the library behind the `pbxkit` command-line tool.

pub mod cli;
pub mod config;
pub mod core;
pub mod storage;
