//! CLI command definitions.
//!
//! Read-only commands never open a transaction; mutating commands run in
//! exactly one.

use super::output::OutputFormat;
use crate::core::model::{PhaseKindTag, ProductType};
use crate::core::scheme::SchemeAction;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProductTypeArg {
    Application,
    Framework,
    StaticLibrary,
    DynamicLibrary,
    UnitTestBundle,
    UiTestBundle,
    Bundle,
    AppExtension,
    CommandLineTool,
}

impl From<ProductTypeArg> for ProductType {
    fn from(arg: ProductTypeArg) -> Self {
        match arg {
            ProductTypeArg::Application => Self::Application,
            ProductTypeArg::Framework => Self::Framework,
            ProductTypeArg::StaticLibrary => Self::StaticLibrary,
            ProductTypeArg::DynamicLibrary => Self::DynamicLibrary,
            ProductTypeArg::UnitTestBundle => Self::UnitTestBundle,
            ProductTypeArg::UiTestBundle => Self::UiTestBundle,
            ProductTypeArg::Bundle => Self::Bundle,
            ProductTypeArg::AppExtension => Self::AppExtension,
            ProductTypeArg::CommandLineTool => Self::CommandLineTool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PhaseKindArg {
    Sources,
    Resources,
    Frameworks,
    Headers,
    CopyFiles,
    ShellScript,
}

impl From<PhaseKindArg> for PhaseKindTag {
    fn from(arg: PhaseKindArg) -> Self {
        match arg {
            PhaseKindArg::Sources => Self::Sources,
            PhaseKindArg::Resources => Self::Resources,
            PhaseKindArg::Frameworks => Self::Frameworks,
            PhaseKindArg::Headers => Self::Headers,
            PhaseKindArg::CopyFiles => Self::CopyFiles,
            PhaseKindArg::ShellScript => Self::ShellScript,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchemeActionArg {
    Build,
    Run,
    Test,
    Profile,
    Analyze,
    Archive,
}

impl From<SchemeActionArg> for SchemeAction {
    fn from(arg: SchemeActionArg) -> Self {
        match arg {
            SchemeActionArg::Build => Self::Build,
            SchemeActionArg::Run => Self::Run,
            SchemeActionArg::Test => Self::Test,
            SchemeActionArg::Profile => Self::Profile,
            SchemeActionArg::Analyze => Self::Analyze,
            SchemeActionArg::Archive => Self::Archive,
        }
    }
}

/// pbxkit - Transactional editing, validation and repair for build projects.
#[derive(Parser)]
#[command(name = "pbxkit")]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Verbose output (debug logging on stderr)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project file; defaults to the single project document in the current directory
    #[arg(long, short = 'p', global = true, env = "PBXKIT_PROJECT")]
    pub project: Option<PathBuf>,

    /// Run everything but skip the final write
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Copy the project file aside before mutating it
    #[arg(long, global = true)]
    pub backup: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show version information
    Version,

    /// Create a new project document
    Init(InitArgs),

    /// Report integrity problems without changing anything
    Validate(ValidateArgs),

    /// Report integrity problems and, with --fix, repair them
    Repair(RepairArgs),

    /// Target commands
    #[command(subcommand)]
    Target(TargetCommands),

    /// Group hierarchy commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// File reference commands
    #[command(subcommand)]
    File(FileCommands),

    /// Build phase commands
    #[command(subcommand)]
    Phase(PhaseCommands),

    /// Scheme commands
    #[command(subcommand)]
    Scheme(SchemeCommands),
}

#[derive(Args)]
pub struct InitArgs {
    /// Project name
    pub name: String,

    /// Write YAML instead of JSON when no --project path is given
    #[arg(long)]
    pub yaml: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Skip checking file references against the filesystem
    #[arg(long)]
    pub no_fs: bool,
}

#[derive(Args)]
pub struct RepairArgs {
    /// Apply repairs instead of only reporting them
    #[arg(long)]
    pub fix: bool,

    /// Only repair findings about these targets
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Name for synthesized products
    #[arg(long)]
    pub product_name: Option<String>,

    /// Type for synthesized products
    #[arg(long, value_enum)]
    pub product_type: Option<ProductTypeArg>,

    /// Skip checking file references against the filesystem
    #[arg(long)]
    pub no_fs: bool,
}

/// Target subcommands.
#[derive(Subcommand)]
pub enum TargetCommands {
    /// List targets in declaration order
    List,
    /// Show one target with its phases and dependencies
    Show(TargetNameArgs),
    /// Add a target
    Add(TargetAddArgs),
    /// Remove a target with its phases and product
    Remove(TargetNameArgs),
    /// Make one target depend on another
    AddDependency(TargetDependencyArgs),
    /// Remove a dependency edge
    RemoveDependency(TargetDependencyArgs),
}

#[derive(Args)]
pub struct TargetNameArgs {
    /// Target name
    pub name: String,
}

#[derive(Args)]
pub struct TargetAddArgs {
    /// Target name
    pub name: String,

    /// Product type; untyped targets get no product
    #[arg(long = "type", value_enum)]
    pub product_type: Option<ProductTypeArg>,
}

#[derive(Args)]
pub struct TargetDependencyArgs {
    /// Dependent target
    pub from: String,
    /// Target depended on
    pub to: String,
}

/// Group subcommands.
#[derive(Subcommand)]
pub enum GroupCommands {
    /// List every reachable group by path
    List,
    /// Add a group under a parent ("" or "/" is the main group)
    Add(GroupAddArgs),
    /// Remove a group and everything below it
    Remove(GroupIdentArgs),
    /// Move a group or file under another group
    Move(GroupMoveArgs),
}

#[derive(Args)]
pub struct GroupAddArgs {
    /// Parent group
    pub parent: String,
    /// New group name
    pub name: String,
    /// Filesystem path; omit for a virtual group
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct GroupIdentArgs {
    /// Group path or name
    pub ident: String,
}

#[derive(Args)]
pub struct GroupMoveArgs {
    /// Group or file to move
    pub ident: String,
    /// Destination group
    pub new_parent: String,
}

/// File subcommands.
#[derive(Subcommand)]
pub enum FileCommands {
    /// Add a file reference, optionally to targets
    Add(FileAddArgs),
    /// Remove a file reference and its build files
    Remove(FileIdentArgs),
    /// Show which reference an identifier resolves to
    Resolve(FileIdentArgs),
    /// List every reachable file reference
    List,
}

#[derive(Args)]
pub struct FileAddArgs {
    /// Path relative to the group
    pub path: String,

    /// Group to add to; defaults to the main group
    #[arg(long, default_value = "")]
    pub group: String,

    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Targets whose phases should include the file
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Phase kind; derived from the extension when omitted
    #[arg(long, value_enum)]
    pub phase: Option<PhaseKindArg>,
}

#[derive(Args)]
pub struct FileIdentArgs {
    /// File path or name
    pub ident: String,
}

/// Phase subcommands.
#[derive(Subcommand)]
pub enum PhaseCommands {
    /// List a target's phases in build order
    List(TargetNameArgs),
    /// Append a phase to a target
    Add(PhaseAddArgs),
}

#[derive(Args)]
pub struct PhaseAddArgs {
    /// Target name
    pub target: String,
    /// Phase kind
    #[arg(value_enum)]
    pub kind: PhaseKindArg,
}

/// Scheme subcommands.
#[derive(Subcommand)]
pub enum SchemeCommands {
    /// List schemes
    List,
    /// Show one scheme
    Show(SchemeNameArgs),
    /// Create a scheme
    Create(SchemeCreateArgs),
    /// Add a target to a scheme
    AddTarget(SchemeAddTargetArgs),
}

#[derive(Args)]
pub struct SchemeNameArgs {
    /// Scheme name
    pub name: String,
}

#[derive(Args)]
pub struct SchemeCreateArgs {
    /// Scheme name
    pub name: String,

    /// Keep the scheme private to the current user
    #[arg(long)]
    pub private: bool,
}

#[derive(Args)]
pub struct SchemeAddTargetArgs {
    /// Scheme name
    pub scheme: String,
    /// Target name
    pub target: String,
    /// Action to add to; build, run and test when omitted
    #[arg(long, value_enum)]
    pub action: Option<SchemeActionArg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pbxkit",
            "file",
            "add",
            "Sources/main.swift",
            "--target",
            "App",
            "--target",
            "AppTests",
            "--dry-run",
            "-f",
            "json",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert_eq!(cli.format, OutputFormat::Json);
        let Some(Commands::File(FileCommands::Add(args))) = cli.command else {
            panic!("expected file add");
        };
        assert_eq!(args.targets, vec!["App", "AppTests"]);
        assert_eq!(args.group, "");
    }

    #[test]
    fn parses_repair_overrides() {
        let cli = Cli::try_parse_from([
            "pbxkit",
            "repair",
            "--fix",
            "--target",
            "App",
            "--product-type",
            "application",
        ])
        .unwrap();
        let Some(Commands::Repair(args)) = cli.command else {
            panic!("expected repair");
        };
        assert!(args.fix);
        assert_eq!(
            args.product_type.map(ProductType::from),
            Some(ProductType::Application)
        );
    }

    #[test]
    fn rejects_unknown_phase_kind() {
        assert!(Cli::try_parse_from(["pbxkit", "phase", "add", "App", "linker"]).is_err());
    }
}
