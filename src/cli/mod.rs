//! CLI commands and argument parsing.
//!
//! The command-line surface of pbxkit, built on
//! [`clap`](https://docs.rs/clap). Every command loads the project file,
//! runs read-only queries directly on the graph and wraps mutations in a
//! transaction.
//!
//! # Commands
//!
//! - **Project**: `init`, `validate`, `repair`
//! - **Targets**: `target list|show|add|remove|add-dependency|remove-dependency`
//! - **Groups**: `group list|add|remove|move`
//! - **Files**: `file add|remove|resolve|list`
//! - **Phases**: `phase list|add`
//! - **Schemes**: `scheme list|show|create|add-target`
//! - **Version info**: `version`
//!
//! # Output Formats
//!
//! Commands support multiple output formats via the `-f`/`--format` flag:
//!
//! - `table` - Human-readable tables (default)
//! - `json` - Machine-readable JSON
//! - `yaml` - YAML
//!
//! # Example
//!
//! ```bash,no_run
//! pbxkit init Demo
//! pbxkit target add App --type application
//! pbxkit file add Sources/main.swift --group Sources --target App
//! pbxkit repair --fix --dry-run -f json
//! ```
//!
//! # Modules
//!
//! - [`commands`] - Command definitions
//! - [`output`] - Output formatting and table rendering

pub mod commands;
pub mod output;
