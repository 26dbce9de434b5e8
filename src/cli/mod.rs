#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use crate::config::{self, Config};
use crate::core::service::WorktreeService;
use crate::core::table::{Column, SortOrder, WorktreeTable};
use crate::core::worktree::Worktree;
use crate::error::WtnavError;
use crate::nav::editor::{EditorHost, LaunchFailure};
use crate::nav::{self, OpenMode, Opened, StderrNotifier, SwitchOutcome};
use crate::output::{self, ListStyle};
use crate::tui;
use crate::tui::app::AppOptions;
use crate::tui::picker;

#[derive(Debug, Parser)]
#[command(
    name = "wtnav",
    version,
    about = "List, filter and switch between Git worktrees"
)]
pub struct Cli {
    /// Directory to act from instead of the current one
    #[arg(short = 'C', long = "workspace", global = true, value_name = "DIR")]
    pub workspace: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "ls")]
    List(ListArgs),
    #[command(alias = "sw")]
    Switch(SwitchArgs),
    /// Switch to the worktree that has main, master or trunk checked out
    Main(MainArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    Branch,
    Path,
}

impl SortKey {
    fn column(self) -> Column {
        match self {
            Self::Branch => Column::Branch,
            Self::Path => Column::Path,
        }
    }
}

#[derive(Debug, Default, Parser)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,
    /// Output in CSV format
    #[arg(long = "csv")]
    pub csv: bool,
    /// Only show worktrees whose branch or path contains FILTER
    #[arg(short = 'f', long = "filter")]
    pub filter: Option<String>,
    /// Sort by column
    #[arg(short = 's', long = "sort", value_enum)]
    pub sort: Option<SortKey>,
    /// Reverse the sort order
    #[arg(long = "desc", requires = "sort")]
    pub desc: bool,
    /// Show commit hashes
    #[arg(short = 'V', long = "details")]
    pub details: bool,
}

#[derive(Debug, Parser)]
pub struct SwitchArgs {
    /// Branch or path fragment; prompts when several worktrees match
    pub pattern: Option<String>,
    /// Open in a new window instead of replacing the current one
    #[arg(short = 'n', long = "new-window")]
    pub new_window: bool,
}

#[derive(Debug, Parser)]
pub struct MainArgs {
    /// Open in a new window instead of replacing the current one
    #[arg(short = 'n', long = "new-window")]
    pub new_window: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, draws_on_stderr(cli.cmd.as_ref(), tui::is_tty()));

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

/// Whether `cmd` may draw a screen on stderr: the TUI, or the `switch` picker.
fn draws_on_stderr(cmd: Option<&Commands>, interactive: bool) -> bool {
    interactive && matches!(cmd, None | Some(Commands::Switch(_)))
}

/// `RUST_LOG` always wins. Without it, `-v` means debug; otherwise warnings,
/// except when a screen may be drawn on stderr.
fn init_logging(verbose: bool, screen: bool) {
    let default_filter = if verbose {
        "debug"
    } else if screen {
        "off"
    } else {
        "warn"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        None => cmd_default(cli.workspace).await,
        Some(Commands::List(args)) => cmd_list(cli.workspace, args).await,
        Some(Commands::Switch(args)) => cmd_switch(cli.workspace, args).await,
        Some(Commands::Main(args)) => cmd_main(cli.workspace, args).await,
        Some(Commands::Completion(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "wtnav", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config(args)) => match args.cmd {
            ConfigCmd::List => {
                print!("{}", config::list_resolved_toml()?);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Set(set) => {
                config::set_value_string(&set.key, &set.value)?;
                println!("Set {} = {}", set.key, set.value);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Get(get) => match config::get_value_string(&get.key)? {
                Some(v) => {
                    println!("{v}");
                    Ok(ExitCode::SUCCESS)
                }
                None => anyhow::bail!(
                    "configuration key '{}' not found - use 'wtnav config list' to see available keys",
                    get.key
                ),
            },
        },
        Some(Commands::Version) => Ok(cmd_version()),
    }
}

async fn load_cfg() -> anyhow::Result<Config> {
    let cfg = tokio::task::spawn_blocking(|| -> anyhow::Result<Config> {
        let (cfg, _doc, _paths) = config::load()?;
        Ok(cfg)
    })
    .await??;
    Ok(cfg)
}

/// Loads the config and builds the service for the chosen workspace.
async fn prepare(workspace: Option<PathBuf>) -> anyhow::Result<(Config, Arc<WorktreeService>)> {
    let cfg = load_cfg().await?;
    let workspace = match workspace {
        Some(dir) => config::expand_path(&dir.to_string_lossy())?,
        None => std::env::current_dir().context("failed to determine the current directory")?,
    };
    if !workspace.is_dir() {
        anyhow::bail!("workspace is not a directory: {}", workspace.display());
    }
    log::debug!("workspace: {}", workspace.display());
    let service = WorktreeService::new(workspace, &cfg.git.command, cfg.git.timeout());
    Ok((cfg, Arc::new(service)))
}

async fn cmd_default(workspace: Option<PathBuf>) -> anyhow::Result<ExitCode> {
    if !tui::is_tty() {
        return cmd_list(workspace, ListArgs::default()).await;
    }

    let (cfg, service) = prepare(workspace).await?;
    let (failures_tx, failures) = mpsc::unbounded_channel();
    let host = EditorHost::from_config(&cfg.open).report_failures_to(failures_tx);
    let exit = tui::app::run(service, host, failures, AppOptions::from_config(&cfg)).await?;
    if let Some(line) = exit.stdout_line() {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(workspace: Option<PathBuf>, args: ListArgs) -> anyhow::Result<ExitCode> {
    let (cfg, service) = prepare(workspace).await?;
    if service.repository_root().is_none() {
        log::warn!("{} is not inside a git repository", service.workspace().display());
    }

    let sort = match args.sort {
        Some(key) => {
            let order = if args.desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            };
            Some((key.column(), order))
        }
        None => cfg.ui.initial_sort(),
    };

    let mut table = WorktreeTable::new();
    table.set_sort(sort);
    table.set_worktrees(service.list_worktrees().await);
    if let Some(filter) = &args.filter {
        table.set_filter(filter);
    }
    let rows = table.rows();

    if args.json {
        let mut out = serde_json::to_string_pretty(rows)?;
        out.push('\n');
        print!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    if args.csv {
        output::worktree_csv(rows, |wt| service.is_current_worktree(wt)).print_csv()?;
        return Ok(ExitCode::SUCCESS);
    }

    if rows.is_empty() {
        if table.all().is_empty() {
            println!("No worktrees found");
        } else {
            println!("No worktrees match '{}'", table.filter());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let style = ListStyle {
        icons: cfg.ui.icons,
        tilde_home: cfg.ui.tilde_home,
        verbose: args.details,
    };
    output::worktree_table(rows, style, |wt| service.is_current_worktree(wt)).print()?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_switch(workspace: Option<PathBuf>, args: SwitchArgs) -> anyhow::Result<ExitCode> {
    let (cfg, service) = prepare(workspace).await?;
    if service.repository_root().is_none() {
        return Err(WtnavError::NotInGitRepo.into());
    }

    let worktrees = service.list_worktrees().await;
    let pattern = args.pattern.unwrap_or_default();
    let target = resolve_target(worktrees, &pattern, tui::is_tty())?;

    let (failures_tx, failures) = mpsc::unbounded_channel();
    let mut host = EditorHost::from_config(&cfg.open).report_failures_to(failures_tx);
    let outcome = nav::switch_to_worktree(
        &service,
        &mut host,
        &mut StderrNotifier,
        &target,
        open_mode(args.new_window),
    )?;
    drop(host);
    wait_for_launch(failures).await?;
    Ok(report_outcome(&outcome))
}

async fn cmd_main(workspace: Option<PathBuf>, args: MainArgs) -> anyhow::Result<ExitCode> {
    let (cfg, service) = prepare(workspace).await?;
    if service.repository_root().is_none() {
        return Err(WtnavError::NotInGitRepo.into());
    }

    let (failures_tx, failures) = mpsc::unbounded_channel();
    let mut host = EditorHost::from_config(&cfg.open).report_failures_to(failures_tx);
    let outcome = nav::switch_to_main(
        &service,
        &mut host,
        &mut StderrNotifier,
        open_mode(args.new_window),
    )
    .await?;
    drop(host);
    wait_for_launch(failures).await?;
    Ok(report_outcome(&outcome))
}

/// Waits for the editor started by a one-shot command and turns a failed
/// launch into an error. Returns once every sender is gone.
async fn wait_for_launch(
    mut failures: mpsc::UnboundedReceiver<LaunchFailure>,
) -> anyhow::Result<()> {
    if let Some(failure) = failures.recv().await {
        anyhow::bail!(
            "failed to open {}: {}",
            failure.path.display(),
            failure.message
        );
    }
    Ok(())
}

fn open_mode(new_window: bool) -> OpenMode {
    if new_window {
        OpenMode::NewWindow
    } else {
        OpenMode::ReplaceCurrent
    }
}

/// Narrows `worktrees` with `pattern`. Several matches go to the picker when
/// `interactive`, and are an error otherwise.
fn resolve_target(
    worktrees: Vec<Worktree>,
    pattern: &str,
    interactive: bool,
) -> Result<Worktree, WtnavError> {
    let mut table = WorktreeTable::new();
    table.set_worktrees(worktrees);
    table.set_filter(pattern);

    match table.rows() {
        [] => Err(WtnavError::WorktreeNotFound(pattern.to_owned())),
        [only] => Ok(only.clone()),
        _ if interactive => picker::pick_worktree("Switch to worktree", table.all(), pattern),
        many => {
            let names: Vec<&str> = many.iter().map(Worktree::display_branch).collect();
            Err(WtnavError::AmbiguousWorktree(format!(
                "'{pattern}' ({})",
                names.join(", ")
            )))
        }
    }
}

fn report_outcome(outcome: &SwitchOutcome) -> ExitCode {
    match outcome {
        SwitchOutcome::Opened(Opened::HandOff(path)) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        SwitchOutcome::Opened(Opened::Launched) | SwitchOutcome::AlreadyHere => ExitCode::SUCCESS,
        SwitchOutcome::FocusedExisting(path) => {
            log::debug!("focused {}", path.display());
            ExitCode::SUCCESS
        }
        SwitchOutcome::NoMainWorktree => ExitCode::from(1),
    }
}

fn cmd_version() -> ExitCode {
    println!("wtnav version {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("WTNAV_GIT_COMMIT") {
        println!("  commit: {commit}");
    }
    if let Some(date) = option_env!("WTNAV_BUILD_DATE") {
        println!("  built: {date}");
    }
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}
