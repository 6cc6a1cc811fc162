//! Command-line interface for `qatrack`.
//!
//! This module provides the CLI parsing and command routing using clap.

pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use qatrack_core::{EntityKind, ListingLimits, ListingRequest, Priority, Role, Severity, Status};

use crate::config::{self, CliOverrides, Config, DB_FILE};
use crate::format::{self, ErrorOutput};
use crate::logging;
use crate::storage::SqliteStore;

/// `qatrack` (qt) - QA tracker with role-scoped listings and sequential IDs.
#[derive(Parser, Debug)]
#[command(name = "qt")]
#[command(
    author,
    version,
    about = "QA tracker: issues, test cases, requirements and friends (SQLite)",
    long_about = None,
    after_help = "Every command runs as a caller (--as) with a role (--role); listings only show what that role may see."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Output format: text (default) or json
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit diagnostics as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Act as this user
    #[arg(long = "as", global = true, value_name = "USER")]
    pub actor: Option<String>,

    /// Caller role: admin, client, tester or other
    #[arg(long, global = true)]
    pub role: Option<Role>,

    /// Project to operate on
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Workspace directory (defaults to the nearest .qatrack/)
    #[arg(long, global = true, env = "QATRACK_DIR", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a qatrack workspace
    Init(InitArgs),

    /// Create an entity
    Create(CreateArgs),

    /// List entities visible to the caller
    List(ListArgs),

    /// Show one entity by display ID
    Show(ShowArgs),

    /// Export visible entities as CSV
    Export(ExportArgs),

    /// Import entities from CSV
    Import(ImportArgs),

    /// Show or change display ID patterns
    Format(FormatCommand),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-seed display formats and rewrite missing files of an existing workspace
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Entity kind (issue, task, requirement, test_case, ...)
    pub kind: EntityKind,

    /// Title
    pub title: String,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Initial status (defaults per kind)
    #[arg(long)]
    pub status: Option<Status>,

    /// Severity (issues only)
    #[arg(long)]
    pub severity: Option<Severity>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// Assignee user id
    #[arg(long)]
    pub assignee: Option<String>,

    /// Owning suite, created if missing (test cases only)
    #[arg(long)]
    pub suite: Option<String>,

    /// Steps, one `N. description | Expected: result` per line (`\|` for a literal pipe)
    #[arg(long)]
    pub steps: Option<String>,

    /// Test data, one `N. name (type): value` per line
    #[arg(long)]
    pub data: Option<String>,

    /// Referenced display IDs, e.g. "REQ-1, REQ-4"
    #[arg(long)]
    pub refs: Option<String>,

    /// Attachment name (repeatable)
    #[arg(long = "attachment")]
    pub attachments: Vec<String>,
}

/// Filters shared by `list` and `export`.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Free-text search (also matches a display ID)
    #[arg(short, long)]
    pub search: Option<String>,

    /// Status filter (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<Status>,

    #[arg(long)]
    pub severity: Option<Severity>,

    #[arg(long)]
    pub priority: Option<Priority>,

    /// Created on or after (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date_from)]
    pub from: Option<DateTime<Utc>>,

    /// Created on or before (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date_to)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub kind: EntityKind,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Entries to skip
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub skip: i64,

    /// Page size (defaults to config default_page_size)
    #[arg(short = 'n', long, allow_negative_numbers = true)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub kind: EntityKind,

    /// Display ID (e.g. BUG-12) or bare custom ID
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    pub kind: EntityKind,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Output file; `-` for stdout (defaults to `<kind>-export-<date>.csv`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Wrap descriptions at this width (0 disables)
    #[arg(long)]
    pub wrap_width: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    pub kind: EntityKind,

    /// CSV file with a header row
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct FormatCommand {
    #[command(subcommand)]
    pub command: FormatSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum FormatSubcommand {
    /// Show patterns (all kinds, or one)
    Show {
        kind: Option<EntityKind>,
    },

    /// Set the pattern for a kind, e.g. `REQ-{customId}` (admin only)
    Set {
        kind: EntityKind,
        pattern: String,
    },
}

fn parse_date_from(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_date_bound(s, false)
}

fn parse_date_to(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    parse_date_bound(s, true)
}

/// A bare date means the start of that day for `--from` and its end for `--to`.
fn parse_date_bound(s: &str, end_of_day: bool) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD or RFC 3339, got '{s}'"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        Some(NaiveTime::MIN)
    };
    time.map(|t| Utc.from_utc_datetime(&date.and_time(t)))
        .ok_or_else(|| format!("invalid date '{s}'"))
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            project: self.project.clone(),
            actor: self.actor.clone(),
            role: self.role,
        }
    }
}

/// Resolved settings for one command invocation.
#[derive(Debug, Clone)]
pub struct Context {
    pub workspace: PathBuf,
    pub config: Config,
    pub actor: String,
    pub role: Role,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    /// Discover the workspace and layer its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no workspace exists or the configuration is invalid.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        let workspace = config::discover_workspace(cli.dir.as_deref(), &cwd)?;
        let mut config = Config::load(&workspace)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(&cli.overrides());
        config.validate()?;

        let actor = config.actor_or_default();
        let role = config.default_role;
        tracing::debug!(workspace = %workspace.display(), %actor, %role, project = %config.project, "Resolved context");
        Ok(Self {
            workspace,
            config,
            actor,
            role,
            json: cli.json,
            quiet: cli.quiet,
        })
    }

    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the database cannot be opened.
    pub fn open_store(&self) -> Result<SqliteStore> {
        Ok(SqliteStore::open_with_timeout(
            &self.workspace.join(DB_FILE),
            Some(self.config.lock_timeout_ms),
        )?)
    }

    #[must_use]
    pub const fn limits(&self) -> ListingLimits {
        ListingLimits {
            max_page_size: self.config.max_page_size,
        }
    }

    /// A listing request for the caller, carrying `filters`.
    #[must_use]
    pub fn request(&self, filters: &FilterArgs) -> ListingRequest {
        let mut request = ListingRequest::new(&self.config.project, self.role, &self.actor);
        request.search.clone_from(&filters.search);
        request.status.clone_from(&filters.status);
        request.severity = filters.severity;
        request.priority = filters.priority;
        request.date_from = filters.from;
        request.date_to = filters.to;
        request
    }
}

/// Run the CLI.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet, cli.log_json)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    let result = dispatch(&cli);
    if let Err(err) = &result {
        tracing::debug!(error = ?err, "Command failed");
        if cli.json {
            format::print_json(&ErrorOutput::from_error(err))?;
        }
    }
    result
}

fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init(args) => commands::init::execute(cli, args),
        Commands::Completions { shell } => commands::completions::execute(*shell),
        Commands::Create(args) => commands::create::execute(&Context::load(cli)?, args),
        Commands::List(args) => commands::list::execute(&Context::load(cli)?, args),
        Commands::Show(args) => commands::show::execute(&Context::load(cli)?, args),
        Commands::Export(args) => commands::export::execute(&Context::load(cli)?, args),
        Commands::Import(args) => commands::import::execute(&Context::load(cli)?, args),
        Commands::Format(format) => commands::format::execute(&Context::load(cli)?, &format.command),
    }
}
