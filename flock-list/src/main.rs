use anyhow::{Context, Result};
use clap::Parser;
use libflock::api::github::GithubClient;
use libflock::api::GraphSource;
use libflock::logging::LoggingConfig;
use libflock::paginate::Paginator;
use libflock::pause::TokioPauser;
use libflock::{Config, RecipeOptions, TargetSelector};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "flock-list")]
#[command(version, about = "List accounts of a GitHub user collection")]
#[command(long_about = r#"List the accounts of a GitHub user collection, one login per line.

Pages are fetched with the same rate limit pacing as flock-act, so listing a
large collection is slow but safe to leave running.

EXAMPLES:
    # Who follows me
    flock-list followers

    # Stargazers of a repository, first two pages only
    flock-list repo:rust-lang/rust:stargazers --page-limit 2

    # Accounts I follow that do not follow me back
    comm -23 <(flock-list following | sort) <(flock-list followers | sort)

    # Current rate limit of the token
    flock-list --rate

    # JSON output for scripting
    flock-list user:octocat:followers --format json | jq '.[]'

TARGETS:
    followers, following                    the authenticated user
    user:<name>:followers|following         another user
    repo:<owner>/<name>:stargazers|subscribers

OUTPUT FORMATS:
    text  - One login per line (default)
    json  - JSON array of logins

EXIT CODES:
    0 - Success (including empty collections)
    1 - Error (missing token, bad target, request failed, etc.)
"#)]
struct Args {
    /// Collection to list
    #[arg(required_unless_present = "rate", value_name = "TARGET")]
    target: Option<String>,

    /// Show the rate limit of the token instead of listing
    #[arg(long, conflicts_with = "target")]
    rate: bool,

    /// First page to request
    #[arg(long)]
    page: Option<u32>,

    /// Last page to request
    #[arg(long)]
    page_limit: Option<u32>,

    /// Accounts per page
    #[arg(long)]
    per_page: Option<u32>,

    /// Seconds to sleep after each page
    #[arg(long = "sleep")]
    sleep_seconds: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Rate limit of the authenticated user
#[derive(Debug, Serialize)]
struct RateReport {
    login: String,
    limit: i64,
    used: i64,
    remaining: i64,
    reset_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::from_env(args.verbose).init();

    tracing::debug!("flock-list started with args: {:?}", args);

    let config = Config::load().context("Failed to load configuration")?;
    let token = config
        .github
        .resolve_token()
        .context("Failed to resolve API token")?;
    let client =
        GithubClient::new(&config.github, token).context("Failed to create GitHub client")?;

    if args.rate {
        return show_rate(&client, &args.format).await;
    }

    let target: TargetSelector = args
        .target
        .as_deref()
        .unwrap_or_default()
        .parse()
        .context("Failed to parse target")?;

    let overrides = RecipeOptions {
        page: args.page,
        page_limit: args.page_limit,
        per_page: args.per_page,
        sleep_seconds: args.sleep_seconds,
        ..Default::default()
    };
    let options = config
        .defaults
        .merge(overrides)
        .resolve(None)
        .context("Invalid options")?;

    let mut paginator = Paginator::start(&client, &TokioPauser, &target, &options)
        .await
        .context("Failed to query rate limit")?;
    let accounts = paginator
        .collect_all()
        .await
        .with_context(|| format!("Failed to list {}", target))?;

    match args.format.as_str() {
        "json" => {
            let logins: Vec<&str> = accounts.iter().map(|a| a.id.as_str()).collect();
            println!("{}", serde_json::to_string_pretty(&logins)?);
        }
        _ => {
            for account in &accounts {
                println!("{}", account.id);
            }
        }
    }

    Ok(())
}

async fn show_rate(client: &GithubClient, format: &str) -> Result<()> {
    let login = client
        .authenticated_login()
        .await
        .context("Failed to look up the authenticated user")?;
    let snapshot = client
        .query_rate()
        .await
        .context("Failed to query rate limit")?;

    let report = RateReport {
        login,
        limit: snapshot.limit,
        used: snapshot.used,
        remaining: snapshot.remaining,
        reset_at: snapshot.reset_at(),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => {
            let reset = report
                .reset_at
                .map(|t| {
                    t.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                })
                .unwrap_or_else(|| "unknown".to_string());
            println!("{}", report.login);
            println!("  limit:     {}", report.limit);
            println!("  used:      {}", report.used);
            println!("  remaining: {}", report.remaining);
            println!("  resets at: {}", reset);
        }
    }

    Ok(())
}
