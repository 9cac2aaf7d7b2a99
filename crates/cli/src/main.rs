// callwatch - poll the county calls-for-service feed into a local store

mod exit_codes;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use callwatch_config::{ConfigError, Settings};
use callwatch_feed::{FeedClient, FeedOptions};
use callwatch_harvest::{HarvestError, HarvestReport, Harvester};
use callwatch_recon::model::FEED_TIME_ZONE;
use callwatch_recon::{CancelToken, Category, SavedCall};
use callwatch_store::SqliteStore;

use exit_codes::{
    harvest_exit_code, HarvestErrorOutput, EXIT_CONFIG, EXIT_ERROR, EXIT_FETCH_NETWORK,
    EXIT_STORE_OPEN, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "callwatch")]
#[command(about = "Track active police and fire calls for service")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file [default: <config dir>/callwatch/config.toml]
    #[arg(long, global = true, env = "CALLWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides settings and CALLWATCH_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one harvest: fetch both feeds, reconcile, write changes
    #[command(after_help = "\
Examples:
  callwatch harvest
  callwatch harvest --json
  callwatch harvest --feed-url http://localhost:8080/api --db ./calls.db")]
    Harvest {
        /// Feed base URL (overrides settings and CALLWATCH_FEED_URL)
        #[arg(long)]
        feed_url: Option<String>,

        /// Print the harvest report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Harvest repeatedly; a failed run is logged and the next run retries
    Watch {
        /// Feed base URL (overrides settings and CALLWATCH_FEED_URL)
        #[arg(long)]
        feed_url: Option<String>,

        /// Seconds between harvest starts [default: harvest.interval_secs]
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many runs
        #[arg(long)]
        max_runs: Option<u64>,

        /// Print one JSON report per line
        #[arg(long)]
        json: bool,
    },

    /// List calls currently marked active in the store
    Active {
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,

        #[arg(long)]
        json: bool,
    },

    /// Inspect settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file path in use
    Path,
    /// Print effective settings (file + environment + flags) as TOML
    Show,
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Police,
    Fire,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Police => Category::Police,
            CategoryArg::Fire => Category::Fire,
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\ntarget:  ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Harvest { feed_url, json } => cmd_harvest(config, cli.db, feed_url, json),
        Commands::Watch {
            feed_url,
            interval,
            max_runs,
            json,
        } => cmd_watch(config, cli.db, feed_url, interval, max_runs, json),
        Commands::Active { category, json } => {
            cmd_active(config, cli.db, category.map(Category::from), json)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => cmd_config_path(config),
            ConfigCommands::Show => cmd_config_show(config, cli.db),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// stderr fmt subscriber; also receives `log` records from the library crates.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Io(_) => Some("check --config or CALLWATCH_CONFIG".to_string()),
            ConfigError::Parse(_) => Some("run `callwatch config show` with no file to see the expected layout".to_string()),
            ConfigError::Validation(_) => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }

    pub fn harvest(err: &HarvestError) -> Self {
        let hint = match err {
            HarvestError::Cancelled => Some("raise harvest.deadline_secs if the feed is slow".to_string()),
            HarvestError::UnknownStatus { .. } => {
                Some("no calls were written; the feed may have added a new status".to_string())
            }
            _ => None,
        };
        Self { code: harvest_exit_code(err), message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// shared setup
// ============================================================================

/// Settings file, then environment, then flags.
fn load_settings(
    config: Option<&Path>,
    db: Option<PathBuf>,
    feed_url: Option<String>,
) -> Result<Settings, CliError> {
    let mut settings = Settings::load(config).map_err(CliError::config)?;
    if let Some(db) = db {
        settings.store.path = Some(db);
    }
    if let Some(url) = feed_url {
        settings.feed.base_url = url;
    }
    settings.validate().map_err(|e| CliError::config(e).with_hint("check --feed-url"))?;
    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<SqliteStore, CliError> {
    let path = settings.db_path();
    SqliteStore::open(&path).map_err(|e| {
        CliError::new(EXIT_STORE_OPEN, format!("cannot open {}: {}", path.display(), e))
            .with_hint("use --db or CALLWATCH_DB to choose another location")
    })
}

fn build_harvester(settings: &Settings) -> Result<Harvester<FeedClient, SqliteStore>, CliError> {
    let feed = FeedClient::new(FeedOptions {
        base_url: settings.feed.base_url.clone(),
        referer: settings.feed.referer.clone(),
        timeout: settings.feed.timeout(),
        max_retries: settings.feed.max_retries,
        retry_base: settings.feed.retry_base(),
    })
    .map_err(|e| CliError::new(EXIT_FETCH_NETWORK, e.to_string()))?;
    let store = open_store(settings)?;
    Ok(Harvester::new(feed, store))
}

fn print_report(report: &HarvestReport, json: bool, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = if pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        }
        .map_err(|e| CliError::io(format!("JSON encode error: {}", e)))?;
        writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        return Ok(());
    }

    for c in &report.categories {
        writeln!(
            out,
            "{:<7} {} fetched, {} created, {} updated, {} resolved, {} unchanged",
            format!("{}:", c.category),
            c.fetched,
            c.summary.created,
            c.summary.updated,
            c.summary.resolved,
            c.summary.unchanged,
        )
        .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

fn print_error_json(err: &HarvestError) {
    if let Ok(output) = serde_json::to_string(&HarvestErrorOutput::from_harvest_error(err)) {
        eprintln!("{}", output);
    }
}

// ============================================================================
// harvest
// ============================================================================

fn cmd_harvest(
    config: Option<&Path>,
    db: Option<PathBuf>,
    feed_url: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config, db, feed_url)?;
    let harvester = build_harvester(&settings)?;

    let cancel = CancelToken::with_deadline(settings.harvest.deadline());
    match harvester.harvest(&cancel) {
        Ok(report) => print_report(&report, json, true),
        Err(e) => {
            if json {
                print_error_json(&e);
            }
            Err(CliError::harvest(&e))
        }
    }
}

// ============================================================================
// watch
// ============================================================================

fn cmd_watch(
    config: Option<&Path>,
    db: Option<PathBuf>,
    feed_url: Option<String>,
    interval: Option<u64>,
    max_runs: Option<u64>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config, db, feed_url)?;
    let interval = match interval {
        Some(0) => return Err(CliError::args("--interval must be > 0")),
        Some(secs) => std::time::Duration::from_secs(secs),
        None => settings.harvest.interval(),
    };
    if max_runs == Some(0) {
        return Err(CliError::args("--max-runs must be > 0"));
    }
    let harvester = build_harvester(&settings)?;

    log::info!(
        "watching {} every {:?}, storing in {}",
        settings.feed.base_url,
        interval,
        settings.db_path().display()
    );

    let mut runs = 0u64;
    let mut failures = 0u64;
    let mut last_error = None;
    loop {
        runs += 1;
        let started = Instant::now();
        let cancel = CancelToken::with_deadline(settings.harvest.deadline());

        match harvester.harvest(&cancel) {
            Ok(report) => {
                print_report(&report, json, false)?;
                last_error = None;
            }
            Err(e) => {
                // The next run is the retry.
                failures += 1;
                log::warn!("harvest {} failed: {}", runs, e);
                if json {
                    print_error_json(&e);
                }
                last_error = Some(e);
            }
        }

        if max_runs.is_some_and(|max| runs >= max) {
            break;
        }
        thread::sleep(interval.saturating_sub(started.elapsed()));
    }

    log::info!("watch finished: {} runs, {} failed", runs, failures);
    match last_error {
        Some(e) if failures == runs => Err(CliError::harvest(&e)),
        _ => Ok(()),
    }
}

// ============================================================================
// active
// ============================================================================

fn cmd_active(
    config: Option<&Path>,
    db: Option<PathBuf>,
    category: Option<Category>,
    json: bool,
) -> Result<(), CliError> {
    let settings = load_settings(config, db, None)?;
    let store = open_store(&settings)?;
    let calls: Vec<SavedCall> = store
        .load_active(&CancelToken::new())
        .map_err(|e| CliError::new(EXIT_STORE_OPEN, e.to_string()))?
        .into_iter()
        .filter(|c| category.map_or(true, |cat| c.category == cat))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(&calls)
            .map_err(|e| CliError::io(format!("JSON encode error: {}", e)))?;
        writeln!(out, "{}", text).map_err(|e| CliError::io(e.to_string()))?;
        return Ok(());
    }

    for call in &calls {
        let received = call.received.with_timezone(&FEED_TIME_ZONE);
        writeln!(
            out,
            "{}  {:<6} {:<10} {:<8} {}  {}",
            received.format("%Y-%m-%d %H:%M"),
            call.category,
            call.last_known_status,
            call.id,
            call.reason,
            call.location,
        )
        .map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_path(config: Option<&Path>) -> Result<(), CliError> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::config_path);
    println!("{}", path.display());
    Ok(())
}

fn cmd_config_show(config: Option<&Path>, db: Option<PathBuf>) -> Result<(), CliError> {
    let settings = load_settings(config, db, None)?;
    let text = settings.to_toml().map_err(CliError::config)?;
    print!("{}", text);
    Ok(())
}
