//! flock-act - Bulk follow, unfollow, block and unblock
//!
//! Unix-style tool that walks a GitHub user collection and performs an
//! action on each account, optionally gated on membership in another
//! collection.

use clap::{Args, Parser, Subcommand, ValueEnum};
use libflock::api::github::GithubClient;
use libflock::api::ActionSink;
use libflock::logging::LoggingConfig;
use libflock::options::DEFAULT_RETRY_AFTER_SECS;
use libflock::{
    ActionKind, Assertion, Config, FlockError, LookupSetBuilder, Recipe, RecipeOptions,
    RecipeReport, Result, TargetSelector,
};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "flock-act")]
#[command(version)]
#[command(about = "Perform bulk actions on GitHub accounts")]
#[command(long_about = "\
flock-act - Perform bulk actions on GitHub accounts

DESCRIPTION:
    flock-act paginates through a GitHub user collection and follows,
    unfollows, blocks or unblocks every account in it. Requests are paced to
    stay under the primary and secondary rate limits, so large runs can take
    hours.

COMMANDS:
    all     Act on every account of a collection
    assert  Act on accounts depending on their presence in another collection
    one     Act on a single account

TARGETS:
    followers, following                    the authenticated user
    user:<name>:followers|following         another user
    repo:<owner>/<name>:stargazers|subscribers

USAGE EXAMPLES:
    # Follow everyone who stars a repository
    flock-act all follow repo:rust-lang/rust:stargazers

    # Unfollow everyone who does not follow back
    flock-act assert unfollow following --lookup followers --when not-found

    # Follow back your followers you are not yet following
    flock-act assert follow followers --lookup following --when not-found

    # Block a single account
    flock-act one block spammer

CONFIGURATION:
    Configuration file: ~/.config/flock/config.toml

    Override with environment variables:
        FLOCK_CONFIG        - Path to config file
        FLOCK_GITHUB_TOKEN  - API token (falls back to GITHUB_TOKEN)
        FLOCK_LOG_FORMAT    - text, json or pretty
        FLOCK_LOG_LEVEL     - Log level filter

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Authentication error (missing or rejected token)
    3 - Invalid input (bad action, target or option)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Act on every account of a collection
    All {
        /// follow, unfollow, block or unblock
        action: String,

        /// Collection to walk
        target: String,

        #[command(flatten)]
        options: OptionArgs,

        /// Output format for the final report
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Act on accounts whose presence in a lookup collection matches
    Assert {
        /// follow, unfollow, block or unblock
        action: String,

        /// Collection to walk
        target: String,

        /// Collection to check membership against
        #[arg(long)]
        lookup: String,

        /// Act when the account is found in, or missing from, the lookup
        #[arg(long, value_enum)]
        when: When,

        #[command(flatten)]
        options: OptionArgs,

        /// Output format for the final report
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Act on a single account
    One {
        /// follow, unfollow, block or unblock
        action: String,

        /// Account login
        account: String,

        /// Seconds sent in the Retry-After header
        #[arg(long, default_value_t = DEFAULT_RETRY_AFTER_SECS)]
        retry_after: u64,
    },
}

/// Pacing options; unset flags fall back to `[defaults]` in the config file.
#[derive(Args, Debug, Default)]
struct OptionArgs {
    /// First page of the walked collection to request
    #[arg(long)]
    page: Option<u32>,

    /// Last page of the walked collection to request (the lookup is always read in full)
    #[arg(long)]
    page_limit: Option<u32>,

    /// Accounts per page
    #[arg(long)]
    per_page: Option<u32>,

    /// Seconds to sleep after each request
    #[arg(long = "sleep")]
    sleep_seconds: Option<u64>,

    /// Seconds sent in the Retry-After header
    #[arg(long = "retry-after")]
    retry_after_seconds: Option<u64>,

    /// Actions between secondary rate limit pauses
    #[arg(long)]
    requests_per_interval: Option<u32>,

    /// Minutes to pause every interval
    #[arg(long = "sleep-per-interval")]
    sleep_per_interval_minutes: Option<u64>,

    /// Fraction of the rate limit below which requests pause for an hour
    #[arg(long = "threshold")]
    rate_limit_threshold: Option<f64>,
}

impl From<OptionArgs> for RecipeOptions {
    fn from(args: OptionArgs) -> Self {
        RecipeOptions {
            page: args.page,
            page_limit: args.page_limit,
            per_page: args.per_page,
            sleep_seconds: args.sleep_seconds,
            retry_after_seconds: args.retry_after_seconds,
            requests_per_interval: args.requests_per_interval,
            sleep_per_interval_minutes: args.sleep_per_interval_minutes,
            rate_limit_threshold: args.rate_limit_threshold,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum When {
    Found,
    NotFound,
}

impl From<When> for Assertion {
    fn from(when: When) -> Self {
        match when {
            When::Found => Assertion::Found,
            When::NotFound => Assertion::NotFound,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::All {
            action,
            target,
            options,
            format,
        } => {
            let action: ActionKind = action.parse()?;
            let target: TargetSelector = target.parse()?;
            let (config, client) = connect()?;
            let options = config.defaults.merge(options.into()).resolve(Some(action))?;

            let report = Recipe::new(&client, &options)
                .perform(&client.action(action), &target)
                .await?;
            print_report(&report, format)?;
        }
        Commands::Assert {
            action,
            target,
            lookup,
            when,
            options,
            format,
        } => {
            let action: ActionKind = action.parse()?;
            let target: TargetSelector = target.parse()?;
            let lookup: TargetSelector = lookup.parse()?;
            let (config, client) = connect()?;
            let options = config.defaults.merge(options.into()).resolve(Some(action))?;

            // --page and --page-limit bound the walked collection only
            let lookup_options = options.whole_collection();
            let lookup_set = LookupSetBuilder::new(&client, &lookup_options)
                .build(&lookup)
                .await?;
            let report = Recipe::new(&client, &options)
                .perform_with_assert(&lookup_set, when.into(), &client.action(action), &target)
                .await?;
            print_report(&report, format)?;
        }
        Commands::One {
            action,
            account,
            retry_after,
        } => {
            let action: ActionKind = action.parse()?;
            if account.trim().is_empty() {
                return Err(FlockError::InvalidInput(
                    "Account must not be empty".to_string(),
                ));
            }
            let (_, client) = connect()?;

            let result = client.action(action).act(&account, retry_after).await?;
            debug!(status = result.status, "Action accepted");
            println!("{} {}", action.past_tense(), account);
        }
    }

    Ok(())
}

/// Load configuration and build an authenticated client
fn connect() -> Result<(Config, GithubClient)> {
    let config = Config::load()?;
    let token = config.github.resolve_token()?;
    let client = GithubClient::new(&config.github, token)?;
    Ok((config, client))
}

fn print_report(report: &RecipeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| FlockError::Output(format!("Failed to serialize report: {}", e)))?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            println!(
                "{} {} of {} accounts in {}",
                report.action.past_tense(),
                report.dispatched,
                report.discovered,
                report.target
            );
            println!("  skipped:         {}", report.skipped);
            println!("  pages fetched:   {}", report.pages_fetched);
            println!("  throttle pauses: {}", report.throttle_pauses);
            println!("  rate remaining:  {}", report.rate_remaining);
        }
    }
    Ok(())
}
