//! Persistence collaborators for project files.
//!
//! The core never touches the filesystem directly when saving: it asks a
//! [`ProjectCodec`](codec::ProjectCodec) for bytes and hands them to
//! [`write_atomic`](atomic::write_atomic).
//!
//! ```text
//! ┌──────────────┐  encode  ┌─────────┐  write_atomic  ┌──────────────┐
//! │ ProjectGraph │ ───────▶ │  bytes  │ ─────────────▶ │ project file │
//! └──────────────┘          └─────────┘                └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`codec`] - Codec trait with JSON and YAML implementations
//! - [`atomic`] - Temp-file-and-rename writes
//! - [`backup`] - Timestamped copies taken before mutation

pub mod atomic;
pub mod backup;
pub mod codec;
