//! dbscript-guard command-line tool.
//!
//! Checks proposed changes for migration scripts that reuse an ordinal,
//! either on demand (`check`) or as a git server hook (`hook pre-receive`,
//! `hook update`). Also lists the scripts at a revision and generates /
//! validates configuration files.

mod init;
mod style;

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dbscript_guard_core::config::GuardConfig;
use dbscript_guard_core::dbscript::{collect_scripts, ordinal_usage};
use dbscript_guard_core::git::{GitTreeAccessor, RepositoryHandle, TreeAccessor};
use dbscript_guard_core::guard::{DbscriptGuard, ValidationOutcome};
use dbscript_guard_core::hook::RefUpdate;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// dbscript-guard command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "dbscript-guard",
    version,
    about = "Reject changes that add migration scripts with an already used ordinal"
)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults apply when
    /// omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check one proposed change.
    Check {
        /// Repository path, or project id when `repositories.base_path` is set.
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Base revision (usually the target branch).
        #[arg(long)]
        base: String,

        /// Incoming revision (commit, tree or ref).
        #[arg(long)]
        incoming: String,

        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run as a git server hook.
    Hook {
        /// Project id used for per-project enablement. Defaults to the
        /// repository directory name.
        #[arg(long)]
        project: Option<String>,

        #[command(subcommand)]
        kind: HookKind,
    },

    /// List migration scripts at a revision.
    List {
        /// Repository path, or project id when `repositories.base_path` is set.
        #[arg(short, long, default_value = ".")]
        repo: String,

        /// Revision to list.
        #[arg(long, default_value = "HEAD")]
        reference: String,
    },

    /// Generate a configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./dbscript-guard.toml")]
        output: PathBuf,

        /// Enable the check for all projects without prompting.
        #[arg(long, conflicts_with = "no_enable")]
        yes: bool,

        /// Disable the check by default without prompting.
        #[arg(long)]
        no_enable: bool,

        /// Watched folder, skipping the prompt.
        #[arg(long)]
        watched_folder: Option<String>,
    },

    /// Validate a configuration file.
    Validate,
}

#[derive(Subcommand, Debug)]
enum HookKind {
    /// `pre-receive`: ref updates arrive on stdin as `<old> <new> <ref>`.
    PreReceive,
    /// `update`: one ref update as arguments.
    Update {
        refname: String,
        old: String,
        new: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // `init` and `validate` handle the config file themselves.
    let path = match cli.command {
        Commands::Init { .. } | Commands::Validate => None,
        _ => cli.config.as_deref(),
    };
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Hook output goes back to the pusher, so keep it quiet unless asked.
    let level = cli
        .log_level
        .as_deref()
        .or(path.map(|_| config.logging.log_level.as_str()))
        .unwrap_or("warn");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match run(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: GuardConfig) -> Result<ExitCode> {
    match cli.command {
        Commands::Check {
            repo,
            base,
            incoming,
            json,
        } => cmd_check(config, &repo, &base, &incoming, json),
        Commands::Hook { project, kind } => cmd_hook(config, project, kind),
        Commands::List { repo, reference } => cmd_list(&config, &repo, &reference),
        Commands::Init {
            output,
            yes,
            no_enable,
            watched_folder,
        } => {
            let enabled = match (yes, no_enable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            init::run_init(
                &output,
                init::InitAnswers {
                    enabled,
                    watched_folder,
                },
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => {
            let path = cli
                .config
                .context("validate needs --config <path>")?;
            cmd_validate(&path)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<GuardConfig> {
    match path {
        Some(path) => {
            GuardConfig::load_and_validate(path).context("failed to load configuration file")
        }
        None => Ok(GuardConfig::default()),
    }
}

fn accessor_for(config: &GuardConfig) -> GitTreeAccessor {
    match &config.repositories.base_path {
        Some(base) => GitTreeAccessor::with_base_path(base),
        None => GitTreeAccessor::new(),
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_check(
    config: GuardConfig,
    repo: &str,
    base: &str,
    incoming: &str,
    json: bool,
) -> Result<ExitCode> {
    let accessor = accessor_for(&config);
    let guard = DbscriptGuard::new(config, accessor);
    let outcome = guard.validate(repo, base, incoming);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("failed to serialize outcome")?
        );
    } else {
        match &outcome {
            ValidationOutcome::Accept => println!("{}", style::success("No ordinal collisions")),
            ValidationOutcome::Reject { reason } => println!("{}", style::rejection(reason)),
        }
    }

    Ok(exit_code(&outcome))
}

fn cmd_hook(config: GuardConfig, project: Option<String>, kind: HookKind) -> Result<ExitCode> {
    let project = match project {
        Some(project) => project,
        None => project_from_cwd()?,
    };
    // Inside a hook git exports GIT_DIR and the quarantine object dirs.
    let guard = DbscriptGuard::new(config, GitTreeAccessor::from_env());

    let updates = match kind {
        HookKind::Update { refname, old, new } => vec![RefUpdate::new(old, new, refname)],
        HookKind::PreReceive => read_ref_updates(std::io::stdin().lock())?,
    };

    let outcome = check_ref_updates(&guard, &project, &updates, &mut std::io::stderr().lock())?;
    Ok(exit_code(&outcome))
}

/// Check ref updates in order, stopping at the first rejection. The
/// rejection is reported on `out` (stderr, which git relays to the pusher).
fn check_ref_updates<A: TreeAccessor, W: Write>(
    guard: &DbscriptGuard<A>,
    project: &str,
    updates: &[RefUpdate],
    out: &mut W,
) -> Result<ValidationOutcome> {
    for update in updates {
        debug!(%update, "checking ref update");
        let outcome = guard.on_ref_update(project, update);
        if let ValidationOutcome::Reject { reason } = &outcome {
            writeln!(out, "*** {}: {}", update.refname, reason).context("failed to write hook output")?;
            writeln!(out, "*** push rejected by dbscript-guard").context("failed to write hook output")?;
            return Ok(outcome);
        }
    }
    Ok(ValidationOutcome::Accept)
}

fn read_ref_updates<R: BufRead>(input: R) -> Result<Vec<RefUpdate>> {
    let mut updates = Vec::new();
    for line in input.lines() {
        let line = line.context("failed to read hook input")?;
        if line.trim().is_empty() {
            continue;
        }
        let update = RefUpdate::parse_line(&line)
            .with_context(|| format!("malformed ref update line: {:?}", line))?;
        updates.push(update);
    }
    Ok(updates)
}

/// `/srv/git/ovirt-engine.git` → `ovirt-engine`; `/work/engine/.git` →
/// `engine`.
fn project_from_cwd() -> Result<String> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    project_from_git_dir(&cwd).context("cannot derive a project id from the current directory")
}

fn project_from_git_dir(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    if name == ".git" {
        return project_from_git_dir(dir.parent()?);
    }
    let name = name.strip_suffix(".git").unwrap_or(name);
    (!name.is_empty()).then(|| name.to_string())
}

fn cmd_list(config: &GuardConfig, repo: &str, reference: &str) -> Result<ExitCode> {
    let folder = config.guard.watched_folder.as_str();
    let handle = accessor_for(config)
        .open_repository(repo)
        .context("failed to open repository")?;
    let tree = handle
        .resolve_tree(reference)
        .with_context(|| format!("failed to resolve '{}'", reference))?;
    let paths = handle
        .list_files(&tree, folder)
        .context("failed to list watched folder")?;
    let scripts = collect_scripts(&paths);

    println!();
    println!(
        "{}",
        style::header(&format!("Migration scripts in {} at {}", folder, reference))
    );
    println!();

    if scripts.is_empty() {
        println!("{}", style::dim("No migration scripts found"));
        println!();
        return Ok(ExitCode::SUCCESS);
    }

    let per_ordinal = ordinal_usage(&scripts);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Ordinal", "File", "Type", "Status"]);

    let mut sorted: Vec<_> = scripts.iter().collect();
    sorted.sort_by(|a, b| (a.ordinal_key(), a.filename()).cmp(&(b.ordinal_key(), b.filename())));

    for script in sorted {
        let uses = per_ordinal.get(script.ordinal_key()).copied().unwrap_or(1);
        table.add_row(vec![
            Cell::new(script.ordinal_key()),
            Cell::new(script.filename()),
            Cell::new(script.extension()),
            style::ordinal_status(uses),
        ]);
    }

    println!("{}", table);
    println!();

    let duplicates = per_ordinal.values().filter(|&&n| n > 1).count();
    println!(
        "{} scripts, {} other files",
        scripts.len(),
        paths.len() - scripts.len()
    );
    if duplicates > 0 {
        println!(
            "{}",
            style::warn(&format!("{} ordinal(s) already used more than once", duplicates))
        );
    }
    println!();

    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(config_path: &Path) -> Result<ExitCode> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        GuardConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!(
        "  Enabled by default : {}",
        if config.guard.enabled { "yes" } else { "no" }
    );
    println!("  Watched folder     : {}", config.guard.watched_folder);
    println!(
        "  Repositories       : {}",
        config
            .repositories
            .base_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "project id is a path".into())
    );
    println!("  Log level          : {}", config.logging.log_level);

    let mut overrides: Vec<_> = config.projects.iter().collect();
    overrides.sort_by(|a, b| a.0.cmp(b.0));
    for (project, project_config) in overrides {
        if let Some(enabled) = project_config.enabled {
            println!(
                "  Project override   : {} = {}",
                project,
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    if let Some(base) = &config.repositories.base_path {
        if !base.is_dir() {
            println!();
            println!(
                "{}",
                style::warn(&format!("base_path {} does not exist", base.display()))
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// 0 to let git proceed, 1 to refuse the push.
fn exit_status(outcome: &ValidationOutcome) -> u8 {
    if outcome.is_accepted() {
        0
    } else {
        1
    }
}

fn exit_code(outcome: &ValidationOutcome) -> ExitCode {
    ExitCode::from(exit_status(outcome))
}
