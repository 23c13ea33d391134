//! Core domain: the project graph, its lookup cache, transactions,
//! validation and repair.
//!
//! # Architecture
//!
//! ```text
//! codec ──▶ ProjectGraph (+ LookupCache) ──▶ ProjectSession ──▶ codec
//!                 │                              │
//!                 ├── resolver (names → ids)     └── begin / commit / rollback
//!                 └── validator ──▶ repair
//! ```
//!
//! ## Graph
//!
//! [`ProjectGraph`](graph::ProjectGraph) owns every entity and a
//! [`LookupCache`](cache::LookupCache). Mutations check all preconditions
//! first and update the cache in the same call, so a failed mutation leaves
//! no trace.
//!
//! ## Transactions
//!
//! [`ProjectSession`](transaction::ProjectSession) hands out mutable access
//! only inside a transaction. Commit encodes and atomically replaces the
//! project file; rollback swaps the pre-transaction snapshot back in.
//!
//! ## Integrity
//!
//! [`validate`](validator::validate) reports broken references and
//! [`repair`](repair::repair) fixes them in a fixed order, re-checking each
//! finding against the live graph before it mutates anything.
//!
//! ## Errors
//!
//! All errors are [`PbxError`](error::PbxError) values carrying a kind, a
//! code, an origin and an optional recovery hint.
//!
//! # Modules
//!
//! - [`model`] - Entities: targets, groups, file references, phases
//! - [`graph`] - `ProjectGraph`: entity store and mutations
//! - [`cache`] - Name and path indices
//! - [`resolver`] - Identifier resolution for groups, files and targets
//! - [`transaction`] - `ProjectSession`: snapshot, commit, rollback
//! - [`validator`] - Integrity findings
//! - [`repair`] - Reference repair engine
//! - [`scheme`] - Schemes stored next to the project
//! - [`error`] - Structured error types

pub mod cache;
pub mod error;
pub mod graph;
pub mod model;
pub mod repair;
pub mod resolver;
pub mod scheme;
pub mod transaction;
pub mod validator;
