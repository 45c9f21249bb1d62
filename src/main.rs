//! # tcs
//!
//! Search a ThreatConnect-style threat-intelligence API from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! tcs --config ./config/tcs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tcs init` | Write a default configuration file |
//! | `tcs detect <value>` | Print the indicator type inferred for a value |
//! | `tcs query "<input>"` | Print the TQL a search would send |
//! | `tcs search "<input>"` | Run a search and print grouped results |
//! | `tcs browse "<input>"` | Run a search and page through it interactively |
//! | `tcs show <kind> <id>` | Print one record with its associations |
//! | `tcs completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # What would be sent for a hash?
//! tcs query d41d8cd98f00b204e9800998ecf8427e
//!
//! # Indicators and groups at once, highest rated first
//! tcs search "cobalt strike" --scope both --sort rating
//!
//! # TQL passes through untouched
//! tcs search 'rating >= 4 and typeName in ("Host")' --json
//! ```

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tc_search::browse;
use tc_search::config;
use tc_search::progress::ProgressMode;
use tc_search::search::{self, DisplayArgs, QueryArgs};
use tc_search::show::{self, ShowArgs};
use tc_search_core::detect;

/// tcs: search and browse threat-intelligence indicators and groups.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Credentials can also be supplied through `TC_ACCESS_ID`,
/// `TC_SECRET_KEY`, and `TC_INSTANCE`.
#[derive(Parser)]
#[command(
    name = "tcs",
    about = "Search and browse threat-intelligence indicators and groups",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tcs.toml`. A missing file means built-in
    /// defaults plus environment variables.
    #[arg(long, global = true, default_value = "./config/tcs.toml")]
    config: PathBuf,

    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress on stderr: off, human, or json. Defaults to human on a TTY.
    #[arg(long, global = true)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented default configuration file.
    ///
    /// Fails if the file already exists.
    Init,

    /// Print the indicator type inferred for a value, or `unknown`.
    Detect {
        value: String,
    },

    /// Print the TQL a search would send, without calling the API.
    ///
    /// With `--scope both`, prints one line per collection.
    Query {
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Search and print grouped results.
    ///
    /// Values reported by several owners are merged into one row.
    /// Sorting and filtering happen locally on the fetched page.
    Search {
        #[command(flatten)]
        args: QueryArgs,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Search, then page through results one record at a time.
    ///
    /// Type `?` at the prompt for commands.
    Browse {
        #[command(flatten)]
        args: QueryArgs,
    },

    /// Print one indicator or group with its associated records.
    Show {
        #[command(flatten)]
        args: ShowArgs,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tcs=debug,tc_search=debug,tc_search_core=debug"
    } else {
        "tcs=warn,tc_search=warn,tc_search_core=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Commands that don't require config
    match &cli.command {
        Commands::Init => {
            config::write_default_config(&cli.config)?;
            println!("Wrote {}", cli.config.display());
            println!("Set api.access_id, api.secret_key and api.instance before searching.");
            return Ok(());
        }
        Commands::Detect { value } => {
            println!("{}", detect::detect_type_name(value).unwrap_or("unknown"));
            return Ok(());
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "tcs", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Query { args } => {
            search::run_query(&cfg, &args)?;
        }
        Commands::Search { args, display } => {
            search::run_search(&cfg, &args, &display, progress.as_ref()).await?;
        }
        Commands::Browse { args } => {
            browse::run_browse(&cfg, &args, progress.as_ref()).await?;
        }
        Commands::Show { args } => {
            show::run_show(&cfg, &args).await?;
        }
        Commands::Init | Commands::Detect { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
