//! pbxkit CLI entrypoint.

use clap::error::ErrorKind;
use clap::Parser;
use pbxkit::cli::commands::{
    Cli, Commands, FileAddArgs, FileCommands, GroupCommands, InitArgs, PhaseCommands, RepairArgs,
    SchemeCommands, TargetCommands, ValidateArgs,
};
use pbxkit::cli::output::{output, output_error, output_rows, OutputFormat, TableRow};
use pbxkit::config::SessionConfig;
use pbxkit::core::error::{ErrorKind as PbxErrorKind, ExitCode, PbxError, Result};
use pbxkit::core::graph::{BuildFileOutcome, PhaseSelector, ProjectGraph};
use pbxkit::core::model::{FileReference, ObjectId, PhaseKindTag, SourceTree};
use pbxkit::core::repair::{repair, ProductOverride, RepairAction, RepairOptions, RepairReport};
use pbxkit::core::resolver::{resolve_file, resolve_group, resolve_target};
use pbxkit::core::scheme::SchemeStore;
use pbxkit::core::transaction::{CommitOutcome, ProjectSession, WriteMode};
use pbxkit::core::validator::{validate, Finding, ValidationReport};
use pbxkit::storage::backup::create_backup;
use pbxkit::storage::codec::{codec_for_path, ProjectCodec, YamlProjectCodec};
use serde::Serialize;
use serde_json::json;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process;
use tracing::{debug, warn};

/// Log filter directives, e.g. `PBXKIT_LOG=pbxkit=trace`.
const LOG_ENV: &str = "PBXKIT_LOG";

fn parse_format_from_args(args: &[OsString]) -> OutputFormat {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let s = arg.to_string_lossy();

        if s == "-f" || s == "--format" {
            if let Some(value) = iter.next() {
                return parse_format_value(&value.to_string_lossy());
            }
        }

        if let Some(value) = s.strip_prefix("--format=") {
            return parse_format_value(value);
        }
    }

    OutputFormat::Table
}

fn parse_format_value(value: &str) -> OutputFormat {
    let v = value.to_lowercase();
    if v == "json" {
        OutputFormat::Json
    } else if v == "yaml" || v == "yml" {
        OutputFormat::Yaml
    } else {
        OutputFormat::Table
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pbxkit=debug")
        } else {
            EnvFilter::new("pbxkit=warn")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_structured<T: Serialize>(value: &T, format: OutputFormat, context: &str) {
    if let Err(err) = output(value, format) {
        eprintln!("Failed to render {context}: {err}");
    }
}

fn output_help(help: &str, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            print!("{help}");
        }
        _ => print_structured(&json!({ "help": help }), format, "help"),
    }
}

fn output_version(format: OutputFormat) {
    let version = env!("CARGO_PKG_VERSION");
    match format {
        OutputFormat::Table => {
            println!("pbxkit {version}");
        }
        _ => print_structured(
            &json!({ "name": "pbxkit", "version": version }),
            format,
            "version",
        ),
    }
}

fn handle_clap_error(err: &clap::Error, format: OutputFormat) -> ExitCode {
    match err.kind() {
        ErrorKind::DisplayHelp => {
            let rendered = err.render().to_string();
            output_help(&rendered, format);
            ExitCode::Success
        }
        ErrorKind::DisplayVersion => {
            output_version(format);
            ExitCode::Success
        }
        _ => {
            eprintln!("{}", err.render());
            ExitCode::Error
        }
    }
}

fn main() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let is_broken_pipe = info
            .payload()
            .downcast_ref::<&str>()
            .is_some_and(|s| s.contains("Broken pipe"))
            || info
                .payload()
                .downcast_ref::<String>()
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken_pipe {
            return;
        }

        default_hook(info);
    }));

    let args: Vec<OsString> = std::env::args_os().collect();
    let format = parse_format_from_args(&args);

    match Cli::try_parse_from(&args) {
        Ok(cli) => process::exit(i32::from(run(cli))),
        Err(e) => process::exit(i32::from(handle_clap_error(&e, format))),
    }
}

fn run(cli: Cli) -> ExitCode {
    let Cli {
        format,
        verbose,
        project,
        dry_run,
        backup,
        command,
    } = cli;
    setup_tracing(verbose);

    let Some(command) = command else {
        println!("pbxkit {}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for usage information.");
        return ExitCode::Success;
    };

    match command {
        Commands::Version => {
            output_version(format);
            ExitCode::Success
        }
        Commands::Init(args) => handle_init(&args, project, dry_run, format),
        command => {
            let config = match SessionConfig::resolve(project, dry_run, backup) {
                Ok(config) => config,
                Err(e) => return output_error(&e, format),
            };
            debug!(project = %config.project_path.display(), dry_run, "resolved project");
            let ws = Workspace { config, format };
            match command {
                Commands::Validate(args) => handle_validate(ws, &args),
                Commands::Repair(args) => handle_repair(ws, &args),
                Commands::Target(cmd) => handle_target(&ws, cmd),
                Commands::Group(cmd) => handle_group(&ws, cmd),
                Commands::File(cmd) => handle_file(&ws, cmd),
                Commands::Phase(cmd) => handle_phase(&ws, cmd),
                Commands::Scheme(cmd) => handle_scheme(&ws, cmd),
                Commands::Version | Commands::Init(_) => ExitCode::Success,
            }
        }
    }
}

/// The resolved project plus how to print results.
struct Workspace {
    config: SessionConfig,
    format: OutputFormat,
}

impl Workspace {
    fn open(&self) -> Result<ProjectSession> {
        let path = &self.config.project_path;
        ProjectSession::open(path, codec_for_path(path), self.config.write_mode)
    }

    /// Runs `f` in one transaction, taking a backup first when asked to.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ProjectGraph) -> Result<T>,
    ) -> Result<(T, CommitOutcome)> {
        let mut session = self.open()?;
        if self.config.backup && !self.config.is_dry_run() {
            create_backup(&self.config.project_path)?;
        }
        session.transact(f)
    }

    fn finish(&self, message: &str, data: serde_json::Value, outcome: &CommitOutcome) -> ExitCode {
        match self.format {
            OutputFormat::Table => {
                println!("{message}");
                if let Some(warning) = data.get("warning").and_then(serde_json::Value::as_str) {
                    eprintln!("Warning: {warning}");
                }
                if !outcome.written {
                    println!("Dry run: {} was not written.", outcome.path.display());
                }
            }
            _ => print_structured(
                &json!({
                    "result": data,
                    "path": outcome.path,
                    "written": outcome.written,
                }),
                self.format,
                "result",
            ),
        }
        ExitCode::Success
    }

    fn fail(&self, err: &PbxError) -> ExitCode {
        output_error(err, self.format)
    }
}

// ----- init -----

fn handle_init(
    args: &InitArgs,
    project: Option<PathBuf>,
    dry_run: bool,
    format: OutputFormat,
) -> ExitCode {
    let extension = if args.yaml { "yaml" } else { "json" };
    let path = project.unwrap_or_else(|| PathBuf::from(format!("{}.pbxproj.{extension}", args.name)));
    if path.exists() {
        let err = PbxError::duplicate(
            "project_exists",
            format!("{} already exists", path.display()),
            "cli:init",
        );
        return output_error(&err, format);
    }

    let codec: Box<dyn ProjectCodec> = if args.yaml {
        Box::new(YamlProjectCodec)
    } else {
        codec_for_path(&path)
    };
    let mode = if dry_run {
        WriteMode::DryRun
    } else {
        WriteMode::Persist
    };
    let mut session = ProjectSession::from_graph(path.clone(), codec, mode, ProjectGraph::new(&args.name));
    match session.transact(|_| Ok(())) {
        Ok(((), outcome)) => {
            let ws = Workspace {
                config: SessionConfig::for_path(path.clone(), dry_run, false),
                format,
            };
            ws.finish(
                &format!("Created project '{}' at {}", args.name, path.display()),
                json!({ "name": args.name }),
                &outcome,
            )
        }
        Err(e) => output_error(&e, format),
    }
}

// ----- validate / repair -----

#[derive(Serialize)]
struct FindingRow {
    kind: &'static str,
    detail: String,
}

impl TableRow for FindingRow {
    fn headers() -> &'static [&'static str] {
        &["KIND", "DETAIL"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![self.kind.to_string(), self.detail.clone()]
    }
}

fn finding_rows(findings: &[Finding]) -> Vec<FindingRow> {
    findings
        .iter()
        .map(|f| FindingRow {
            kind: f.kind_name(),
            detail: f.summary(),
        })
        .collect()
}

fn print_validation(report: &ValidationReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            output_rows(&finding_rows(&report.findings), format, "No problems found.");
        }
        _ => print_structured(report, format, "validation report"),
    }
}

fn handle_validate(ws: Workspace, args: &ValidateArgs) -> ExitCode {
    let ws = if args.no_fs {
        Workspace {
            config: ws.config.without_filesystem_checks(),
            ..ws
        }
    } else {
        ws
    };
    let session = match ws.open() {
        Ok(s) => s,
        Err(e) => return ws.fail(&e),
    };
    let report = validate(session.graph(), &ws.config.validation_context());
    print_validation(&report, ws.format);
    if report.is_clean() {
        ExitCode::Success
    } else {
        ExitCode::Error
    }
}

fn describe_action(action: &RepairAction, graph: &ProjectGraph) -> (&'static str, String) {
    let target_name = |id: &ObjectId| {
        graph
            .target(id)
            .map_or_else(|| id.to_string(), |t| t.name.clone())
    };
    match action {
        RepairAction::CreatedProductsGroup { .. } => {
            ("created_products_group", "Created the Products group".to_string())
        }
        RepairAction::CreatedProduct { target, name, .. } => (
            "created_product",
            format!("Created '{name}' for target '{}'", target_name(target)),
        ),
        RepairAction::RemovedOrphan { name, .. } => {
            ("removed_orphan", format!("Removed orphaned product '{name}'"))
        }
        RepairAction::RemovedFileReference {
            name,
            build_files_removed,
            ..
        } => (
            "removed_file_reference",
            format!("Removed '{name}' and {build_files_removed} build file(s)"),
        ),
        RepairAction::RemovedBuildFile { target, .. } => (
            "removed_build_file",
            format!("Removed a broken phase entry from '{}'", target_name(target)),
        ),
        RepairAction::LinkedProduct { target, product } => (
            "linked_product",
            format!(
                "Linked '{}' to target '{}'",
                graph
                    .file_ref(product)
                    .map_or_else(|| product.to_string(), |f| f.display_name().to_string()),
                target_name(target)
            ),
        ),
        RepairAction::UnlinkedSharedProduct { target, product } => (
            "unlinked_shared_product",
            format!(
                "Unlinked '{}' from target '{}'",
                graph
                    .file_ref(product)
                    .map_or_else(|| product.to_string(), |f| f.display_name().to_string()),
                target_name(target)
            ),
        ),
        RepairAction::GroupedProduct { product } => (
            "grouped_product",
            format!(
                "Moved '{}' into the Products group",
                graph
                    .file_ref(product)
                    .map_or_else(|| product.to_string(), |f| f.display_name().to_string())
            ),
        ),
    }
}

fn print_repair(report: &RepairReport, graph: &ProjectGraph, outcome: &CommitOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<FindingRow> = report
                .applied
                .iter()
                .map(|a| {
                    let (kind, detail) = describe_action(a, graph);
                    FindingRow { kind, detail }
                })
                .collect();
            println!("Findings: {}", report.findings.len());
            output_rows(&rows, format, "Nothing to repair.");
            for skipped in &report.skipped {
                println!("Skipped {}: {}", skipped.finding.kind_name(), skipped.reason);
            }
            for failed in &report.failed {
                println!("Failed {}: {}", failed.finding.kind_name(), failed.error);
            }
            if report.orphans_removed > 0 {
                println!("Orphans removed: {}", report.orphans_removed);
            }
            if report.changed() && !outcome.written {
                println!("Dry run: {} was not written.", outcome.path.display());
            }
        }
        _ => print_structured(
            &json!({
                "report": report,
                "changed": report.changed(),
                "path": outcome.path,
                "written": outcome.written,
            }),
            format,
            "repair report",
        ),
    }
}

fn handle_repair(ws: Workspace, args: &RepairArgs) -> ExitCode {
    let ws = if args.no_fs {
        Workspace {
            config: ws.config.without_filesystem_checks(),
            ..ws
        }
    } else {
        ws
    };
    let ctx = ws.config.validation_context();

    if !args.fix {
        let session = match ws.open() {
            Ok(s) => s,
            Err(e) => return ws.fail(&e),
        };
        let report = validate(session.graph(), &ctx);
        print_validation(&report, ws.format);
        return if report.is_clean() {
            ExitCode::Success
        } else {
            ExitCode::Error
        };
    }

    let product_override = (args.product_name.is_some() || args.product_type.is_some()).then(|| {
        ProductOverride {
            name: args.product_name.clone(),
            product_type: args.product_type.map(Into::into),
        }
    });

    let mut session = match ws.open() {
        Ok(s) => s,
        Err(e) => return ws.fail(&e),
    };
    if ws.config.backup && !ws.config.is_dry_run() {
        if let Err(e) = create_backup(&ws.config.project_path) {
            return ws.fail(&e);
        }
    }
    let result = session.transact(|graph| {
        let targets = args
            .targets
            .iter()
            .map(|name| resolve_target(graph, name))
            .collect::<Result<Vec<_>>>()?;
        let options = RepairOptions {
            targets,
            product_override,
        };
        Ok(repair(graph, &ctx, &options))
    });
    match result {
        Ok((report, outcome)) => {
            print_repair(&report, session.graph(), &outcome, ws.format);
            if report.failed.is_empty() {
                ExitCode::Success
            } else {
                ExitCode::Error
            }
        }
        Err(e) => ws.fail(&e),
    }
}

// ----- targets -----

#[derive(Serialize)]
struct TargetRow {
    id: ObjectId,
    name: String,
    product_type: Option<String>,
    product: Option<String>,
    phases: usize,
    dependencies: Vec<String>,
}

impl TableRow for TargetRow {
    fn headers() -> &'static [&'static str] {
        &["NAME", "TYPE", "PRODUCT", "PHASES", "DEPENDS ON"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.product_type.clone().unwrap_or_default(),
            self.product.clone().unwrap_or_default(),
            self.phases.to_string(),
            self.dependencies.join(", "),
        ]
    }
}

fn target_row(graph: &ProjectGraph, id: &ObjectId) -> Option<TargetRow> {
    let target = graph.target(id)?;
    Some(TargetRow {
        id: id.clone(),
        name: target.name.clone(),
        product_type: target.product_type.map(|t| t.identifier().to_string()),
        product: graph
            .live_product(target)
            .and_then(|p| graph.file_ref(p))
            .map(|f| f.display_name().to_string()),
        phases: target.phases.len(),
        dependencies: target
            .dependencies
            .iter()
            .filter_map(|d| graph.target(d).map(|t| t.name.clone()))
            .collect(),
    })
}

#[allow(clippy::too_many_lines)]
fn handle_target(ws: &Workspace, cmd: TargetCommands) -> ExitCode {
    match cmd {
        TargetCommands::List => match ws.open() {
            Ok(session) => {
                let graph = session.graph();
                let rows: Vec<TargetRow> = graph
                    .targets()
                    .filter_map(|(id, _)| target_row(graph, id))
                    .collect();
                output_rows(&rows, ws.format, "No targets found.");
                ExitCode::Success
            }
            Err(e) => ws.fail(&e),
        },
        TargetCommands::Show(args) => {
            let session = match ws.open() {
                Ok(s) => s,
                Err(e) => return ws.fail(&e),
            };
            let graph = session.graph();
            let id = match resolve_target(graph, &args.name) {
                Ok(id) => id,
                Err(e) => return ws.fail(&e),
            };
            let Some(row) = target_row(graph, &id) else {
                return ws.fail(&PbxError::not_found("target_not_found", &args.name, "cli:target"));
            };
            let phases: Vec<PhaseRow> = graph
                .target(&id)
                .map(|t| phase_rows(graph, t))
                .unwrap_or_default();
            match ws.format {
                OutputFormat::Table => {
                    println!("ID:           {}", row.id);
                    println!("Name:         {}", row.name);
                    println!("Type:         {}", row.product_type.as_deref().unwrap_or("-"));
                    println!("Product:      {}", row.product.as_deref().unwrap_or("-"));
                    if !row.dependencies.is_empty() {
                        println!("Depends on:   {}", row.dependencies.join(", "));
                    }
                    output_rows(&phases, ws.format, "No phases.");
                }
                _ => print_structured(&json!({ "target": row, "phases": phases }), ws.format, "target"),
            }
            ExitCode::Success
        }
        TargetCommands::Add(args) => {
            let result = ws.mutate(|graph| {
                let id = graph.add_target(&args.name, args.product_type.map(Into::into))?;
                Ok(target_row(graph, &id))
            });
            match result {
                Ok((row, outcome)) => ws.finish(
                    &format!("Added target '{}'", args.name),
                    json!(row),
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
        TargetCommands::Remove(args) => {
            // An unreadable store must stop the removal before anything is written.
            let schemes_path = ws.config.schemes_path();
            let mut store = match SchemeStore::load(&schemes_path) {
                Ok(store) => store,
                Err(e) => return ws.fail(&e),
            };
            let result = ws.mutate(|graph| {
                let id = resolve_target(graph, &args.name)?;
                graph.remove_target(&id)
            });
            match result {
                Ok((target, outcome)) => {
                    let pruned = store.prune_target(&target.name);
                    let mut data = json!({ "name": target.name, "scheme_entries_removed": pruned });
                    if pruned > 0 && !ws.config.is_dry_run() {
                        if let Err(e) = store.save(&schemes_path) {
                            warn!(error = %e, "target removed but schemes were not updated");
                            data["warning"] = json!(format!(
                                "Schemes still list '{}': {e}",
                                target.name
                            ));
                        }
                    }
                    ws.finish(&format!("Removed target '{}'", target.name), data, &outcome)
                }
                Err(e) => ws.fail(&e),
            }
        }
        TargetCommands::AddDependency(args) => {
            let result = ws.mutate(|graph| {
                let from = resolve_target(graph, &args.from)?;
                let to = resolve_target(graph, &args.to)?;
                graph.add_dependency(&from, &to)
            });
            match result {
                Ok(((), outcome)) => ws.finish(
                    &format!("'{}' now depends on '{}'", args.from, args.to),
                    json!({ "from": args.from, "to": args.to }),
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
        TargetCommands::RemoveDependency(args) => {
            let result = ws.mutate(|graph| {
                let from = resolve_target(graph, &args.from)?;
                let to = resolve_target(graph, &args.to)?;
                graph.remove_dependency(&from, &to)
            });
            match result {
                Ok(((), outcome)) => ws.finish(
                    &format!("'{}' no longer depends on '{}'", args.from, args.to),
                    json!({ "from": args.from, "to": args.to }),
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
    }
}

// ----- groups -----

#[derive(Serialize)]
struct GroupRow {
    id: ObjectId,
    path: String,
    children: usize,
    #[serde(rename = "virtual")]
    is_virtual: bool,
}

impl TableRow for GroupRow {
    fn headers() -> &'static [&'static str] {
        &["PATH", "CHILDREN", "VIRTUAL", "ID"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            if self.path.is_empty() {
                "/".to_string()
            } else {
                self.path.clone()
            },
            self.children.to_string(),
            if self.is_virtual { "yes" } else { "no" }.to_string(),
            self.id.to_string(),
        ]
    }
}

fn handle_group(ws: &Workspace, cmd: GroupCommands) -> ExitCode {
    match cmd {
        GroupCommands::List => match ws.open() {
            Ok(session) => {
                let graph = session.graph();
                let mut rows: Vec<GroupRow> = graph
                    .groups()
                    .filter_map(|(id, group)| {
                        Some(GroupRow {
                            id: id.clone(),
                            path: graph.full_path(id)?.to_string(),
                            children: group.children.len(),
                            is_virtual: group.is_virtual(),
                        })
                    })
                    .collect();
                rows.sort_by(|a, b| a.path.cmp(&b.path));
                output_rows(&rows, ws.format, "No groups found.");
                ExitCode::Success
            }
            Err(e) => ws.fail(&e),
        },
        GroupCommands::Add(args) => {
            let result = ws.mutate(|graph| {
                let parent = resolve_group(graph, &args.parent)?;
                let id = graph.add_group(&parent, &args.name, args.path.clone())?;
                Ok(json!({ "id": id, "path": graph.full_path(&id) }))
            });
            match result {
                Ok((data, outcome)) => ws.finish(
                    &format!("Added group '{}'", args.name),
                    data,
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
        GroupCommands::Remove(args) => {
            let result = ws.mutate(|graph| {
                let id = resolve_group(graph, &args.ident)?;
                graph.remove_group(&id)?;
                Ok(id)
            });
            match result {
                Ok((id, outcome)) => ws.finish(
                    &format!("Removed group '{}'", args.ident),
                    json!({ "id": id }),
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
        GroupCommands::Move(args) => {
            let result = ws.mutate(|graph| {
                let node = match resolve_group(graph, &args.ident) {
                    Ok(id) => id,
                    Err(e) if e.kind == PbxErrorKind::ReferenceNotFound => {
                        resolve_file(graph, &args.ident)?
                    }
                    Err(e) => return Err(e),
                };
                let parent = resolve_group(graph, &args.new_parent)?;
                graph.move_node(&node, &parent)?;
                Ok(json!({ "id": node, "path": graph.full_path(&node) }))
            });
            match result {
                Ok((data, outcome)) => ws.finish(
                    &format!("Moved '{}' to '{}'", args.ident, args.new_parent),
                    data,
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
    }
}

// ----- files -----

#[derive(Serialize)]
struct FileRow {
    id: ObjectId,
    path: String,
    source_tree: SourceTree,
    product: bool,
}

impl TableRow for FileRow {
    fn headers() -> &'static [&'static str] {
        &["PATH", "SOURCE TREE", "PRODUCT", "ID"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            format!("{:?}", self.source_tree),
            if self.product { "yes" } else { "" }.to_string(),
            self.id.to_string(),
        ]
    }
}

#[derive(Serialize)]
struct BuildFileEntry {
    target: String,
    outcome: BuildFileOutcome,
}

fn add_file(graph: &mut ProjectGraph, args: &FileAddArgs) -> Result<serde_json::Value> {
    let group = resolve_group(graph, &args.group)?;
    let file = FileReference {
        name: args.name.clone(),
        ..FileReference::at_path(&args.path)
    };
    let id = graph.add_file_reference(&group, file)?;

    let selector = args
        .phase
        .map_or(PhaseSelector::Auto, |k| PhaseSelector::Kind(PhaseKindTag::from(k)));
    let mut entries = Vec::new();
    for name in &args.targets {
        let target = resolve_target(graph, name)?;
        let outcome = graph.add_build_file(&target, &selector, &id)?;
        entries.push(BuildFileEntry {
            target: name.clone(),
            outcome,
        });
    }
    Ok(json!({
        "id": id,
        "path": graph.full_path(&id),
        "build_files": entries,
    }))
}

fn handle_file(ws: &Workspace, cmd: FileCommands) -> ExitCode {
    match cmd {
        FileCommands::Add(args) => match ws.mutate(|graph| add_file(graph, &args)) {
            Ok((data, outcome)) => ws.finish(
                &format!("Added file '{}'", args.path),
                data,
                &outcome,
            ),
            Err(e) => ws.fail(&e),
        },
        FileCommands::Remove(args) => {
            let result = ws.mutate(|graph| {
                let id = resolve_file(graph, &args.ident)?;
                let removed = graph.remove_file_reference(&id)?;
                Ok(json!({ "id": id, "build_files_removed": removed }))
            });
            match result {
                Ok((data, outcome)) => ws.finish(
                    &format!("Removed file '{}'", args.ident),
                    data,
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
        FileCommands::Resolve(args) => {
            let session = match ws.open() {
                Ok(s) => s,
                Err(e) => return ws.fail(&e),
            };
            let graph = session.graph();
            match resolve_file(graph, &args.ident) {
                Ok(id) => {
                    let path = graph.full_path(&id).unwrap_or_default().to_string();
                    match ws.format {
                        OutputFormat::Table => println!("{path} ({id})"),
                        _ => print_structured(&json!({ "id": id, "path": path }), ws.format, "file"),
                    }
                    ExitCode::Success
                }
                Err(e) => ws.fail(&e),
            }
        }
        FileCommands::List => match ws.open() {
            Ok(session) => {
                let graph = session.graph();
                let mut rows: Vec<FileRow> = graph
                    .file_refs()
                    .filter_map(|(id, file)| {
                        Some(FileRow {
                            id: id.clone(),
                            path: graph.full_path(id)?.to_string(),
                            source_tree: file.source_tree,
                            product: file.is_product(),
                        })
                    })
                    .collect();
                rows.sort_by(|a, b| a.path.cmp(&b.path));
                output_rows(&rows, ws.format, "No files found.");
                ExitCode::Success
            }
            Err(e) => ws.fail(&e),
        },
    }
}

// ----- phases -----

#[derive(Serialize)]
struct PhaseRow {
    id: ObjectId,
    kind: PhaseKindTag,
    name: String,
    files: usize,
}

impl TableRow for PhaseRow {
    fn headers() -> &'static [&'static str] {
        &["PHASE", "FILES", "ID"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![self.name.clone(), self.files.to_string(), self.id.to_string()]
    }
}

fn phase_rows(graph: &ProjectGraph, target: &pbxkit::core::model::Target) -> Vec<PhaseRow> {
    graph
        .phases_of(target)
        .map(|(id, phase)| PhaseRow {
            id: id.clone(),
            kind: phase.kind.tag(),
            name: phase.kind.display_name(),
            files: phase.files.len(),
        })
        .collect()
}

fn handle_phase(ws: &Workspace, cmd: PhaseCommands) -> ExitCode {
    match cmd {
        PhaseCommands::List(args) => {
            let session = match ws.open() {
                Ok(s) => s,
                Err(e) => return ws.fail(&e),
            };
            let graph = session.graph();
            match resolve_target(graph, &args.name).map(|id| graph.target(&id).cloned()) {
                Ok(Some(target)) => {
                    output_rows(&phase_rows(graph, &target), ws.format, "No phases.");
                    ExitCode::Success
                }
                Ok(None) => ws.fail(&PbxError::not_found("target_not_found", &args.name, "cli:phase")),
                Err(e) => ws.fail(&e),
            }
        }
        PhaseCommands::Add(args) => {
            let tag = PhaseKindTag::from(args.kind);
            let result = ws.mutate(|graph| {
                let target = resolve_target(graph, &args.target)?;
                graph.add_phase(&target, tag.default_kind())
            });
            match result {
                Ok((id, outcome)) => ws.finish(
                    &format!("Added {:?} phase to '{}'", tag, args.target),
                    json!({ "id": id, "kind": tag }),
                    &outcome,
                ),
                Err(e) => ws.fail(&e),
            }
        }
    }
}

// ----- schemes -----

#[derive(Serialize)]
struct SchemeRow {
    name: String,
    shared: bool,
    targets: Vec<String>,
    stale_targets: Vec<String>,
}

impl TableRow for SchemeRow {
    fn headers() -> &'static [&'static str] {
        &["NAME", "SHARED", "TARGETS", "MISSING TARGETS"]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.shared { "yes" } else { "no" }.to_string(),
            self.targets.join(", "),
            self.stale_targets.join(", "),
        ]
    }
}

fn scheme_rows(store: &SchemeStore, graph: &ProjectGraph) -> Vec<SchemeRow> {
    let stale = store.stale_targets(graph);
    store
        .list()
        .map(|s| SchemeRow {
            name: s.name.clone(),
            shared: s.shared,
            targets: s.target_names().into_iter().map(str::to_string).collect(),
            stale_targets: stale
                .iter()
                .filter(|(scheme, _)| scheme == &s.name)
                .map(|(_, target)| target.clone())
                .collect(),
        })
        .collect()
}

fn handle_scheme(ws: &Workspace, cmd: SchemeCommands) -> ExitCode {
    let path = ws.config.schemes_path();
    let session = match ws.open() {
        Ok(s) => s,
        Err(e) => return ws.fail(&e),
    };
    let mut store = match SchemeStore::load(&path) {
        Ok(store) => store,
        Err(e) => return ws.fail(&e),
    };
    let outcome = CommitOutcome {
        path: path.clone(),
        bytes: 0,
        written: !ws.config.is_dry_run(),
    };

    match cmd {
        SchemeCommands::List => {
            output_rows(&scheme_rows(&store, session.graph()), ws.format, "No schemes found.");
            ExitCode::Success
        }
        SchemeCommands::Show(args) => match store.get(&args.name) {
            Ok(scheme) => {
                match ws.format {
                    OutputFormat::Table => {
                        println!("Name:   {}", scheme.name);
                        println!("Shared: {}", scheme.shared);
                        for (action, config) in &scheme.actions {
                            println!(
                                "{:<8} [{}] {}",
                                action.to_string(),
                                config.configuration,
                                config.targets.join(", ")
                            );
                        }
                    }
                    _ => print_structured(scheme, ws.format, "scheme"),
                }
                ExitCode::Success
            }
            Err(e) => ws.fail(&e),
        },
        SchemeCommands::Create(args) => {
            if let Err(e) = store.create(&args.name, !args.private) {
                return ws.fail(&e);
            }
            save_schemes(ws, &store, &path).map_or_else(
                |e| ws.fail(&e),
                |()| {
                    ws.finish(
                        &format!("Created scheme '{}'", args.name),
                        json!({ "name": args.name, "shared": !args.private }),
                        &outcome,
                    )
                },
            )
        }
        SchemeCommands::AddTarget(args) => {
            if let Err(e) = resolve_target(session.graph(), &args.target) {
                return ws.fail(&e);
            }
            let added = match store.add_target(&args.scheme, &args.target, args.action.map(Into::into)) {
                Ok(added) => added,
                Err(e) => return ws.fail(&e),
            };
            save_schemes(ws, &store, &path).map_or_else(
                |e| ws.fail(&e),
                |()| {
                    ws.finish(
                        &format!("Added '{}' to scheme '{}'", args.target, args.scheme),
                        json!({ "scheme": args.scheme, "target": args.target, "actions": added }),
                        &outcome,
                    )
                },
            )
        }
    }
}

fn save_schemes(ws: &Workspace, store: &SchemeStore, path: &std::path::Path) -> Result<()> {
    if ws.config.is_dry_run() {
        return Ok(());
    }
    store.save(path)
}
