//! ghdata CLI - GitHub repository dataset collection.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use ghdata::Seed;
use tracing_subscriber::EnvFilter;

use crate::commands::crawl::CrawlKind;

#[derive(Parser)]
#[command(name = "ghdata")]
#[command(version)]
#[command(about = "Collect repository datasets from the GitHub API")]
#[command(
    long_about = "ghdata samples a population of GitHub repositories through the search API \
and crawls their closed issues, issue comments, commit activity and stargazer history \
into CSV files. Samples are reproducible from a two-number seed, and commit and star \
activity is bucketed into weekly intervals."
)]
#[command(after_long_help = r#"EXAMPLES
    Collect the repository population:
        $ ghdata repos -o data/repos.csv

    Draw the published 500-repository sample:
        $ ghdata sample -i data/repos.csv -o data/sample.csv --seed 420,69

    Crawl issue comments for the sample, checking collaborator status:
        $ ghdata comments -i data/sample.csv --collaborators

    Weekly star history over the whole population through the REST API:
        $ ghdata stars -i data/repos.csv --source rest

    Generate shell completions:
        $ ghdata completions bash > ~/.local/share/bash-completion/completions/ghdata

CONFIGURATION
    ghdata reads configuration from:
      1. ~/.config/ghdata/config.toml (or $XDG_CONFIG_HOME/ghdata/config.toml)
      2. ./ghdata.toml
      3. Environment variables (GHDATA_* prefix, sections separated by __)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GHDATA_GITHUB__TOKEN          GitHub personal access token
    GITHUB_TOKEN                  Used when no token is configured otherwise
    GHDATA_CRAWL__CONCURRENCY     Repositories crawled in parallel (default: 1)
    GHDATA_CRAWL__DATA_DIR        Directory relative paths are resolved against
    GHDATA_SAMPLE__SEED           Default sampling seed (default: 420,69)
    RUST_LOG                      Log filter when output is not a terminal
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the repository population through the search API
    Repos(ReposArgs),
    /// Copy a reproducible random sample of a CSV file's rows
    Sample(SampleArgs),
    /// Crawl closed issues (pull requests excluded)
    Issues(CrawlArgs),
    /// Crawl issue comments, one row per issue plus one per comment
    Comments {
        #[command(flatten)]
        args: CrawlArgs,

        /// Look up whether each author is a repository collaborator
        #[arg(long)]
        collaborators: bool,

        /// Also request comments for issues reporting none
        #[arg(long)]
        all_issues: bool,
    },
    /// Crawl weekly commit counts
    Commits(CrawlArgs),
    /// Crawl weekly cumulative star counts
    Stars {
        #[command(flatten)]
        args: CrawlArgs,

        /// API used to list stargazers
        #[arg(long, value_enum, default_value_t = StarSourceArg::Graphql)]
        source: StarSourceArg,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Options for the `repos` command.
#[derive(Debug, Clone, clap::Args)]
struct ReposArgs {
    /// Output CSV file (relative paths resolve against the data directory)
    #[arg(short, long, default_value = "repos.csv")]
    output: PathBuf,

    /// Replace the default search term ("library")
    #[arg(short, long)]
    term: Option<String>,

    /// Replace the default minimum star count (100)
    #[arg(long)]
    min_stars: Option<u64>,

    /// Stop after this many repositories
    #[arg(short, long)]
    limit: Option<usize>,

    /// Only print how many repositories match
    #[arg(long)]
    count_only: bool,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long)]
    no_rate_limit: bool,
}

/// Options for the `sample` command.
#[derive(Debug, Clone, clap::Args)]
struct SampleArgs {
    /// Population CSV file
    #[arg(short, long, default_value = "repos.csv")]
    input: PathBuf,

    /// Sampled CSV file
    #[arg(short, long, default_value = "sample.csv")]
    output: PathBuf,

    /// Rows to draw (default from config or 500)
    #[arg(short, long)]
    size: Option<usize>,

    /// Seed as two unsigned integers, e.g. 420,69 (default from config)
    #[arg(long)]
    seed: Option<Seed>,
}

/// Options shared by the crawl commands.
#[derive(Debug, Clone, clap::Args)]
struct CrawlArgs {
    /// Repository CSV file to crawl
    #[arg(short, long, default_value = "repos.csv")]
    input: PathBuf,

    /// Output CSV file (default: <command>.csv in the data directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Crawl a random sample of this many repositories instead of all of them
    #[arg(short, long)]
    sample_size: Option<usize>,

    /// Seed for --sample-size (default from config or 420,69)
    #[arg(long, requires = "sample_size")]
    seed: Option<Seed>,

    /// First year of the crawl window (default from config or 2016)
    #[arg(long)]
    start_year: Option<i32>,

    /// Last year of the crawl window, inclusive (default from config or 2019)
    #[arg(long)]
    end_year: Option<i32>,

    /// Repositories crawled in parallel (default from config or 1)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Page cap per listing (default from config)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Disable proactive rate limiting (may cause API throttling)
    #[arg(short = 'R', long)]
    no_rate_limit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StarSourceArg {
    /// Paginated stargazers endpoint
    Rest,
    /// Cursor-paginated GraphQL stargazers connection
    Graphql,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a terminal
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("ghdata=info,ghdata_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = config::Config::load();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        return match commands::meta::handle_completions(*shell) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let cancel = shutdown::setup_shutdown_handler();

    let result = match cli.command {
        Commands::Repos(args) => commands::population::handle_repos(args, &config, cancel).await,
        Commands::Sample(args) => commands::sample::handle_sample(args, &config)
            .map(|_| commands::Outcome::Complete),
        Commands::Issues(args) => {
            commands::crawl::handle_crawl(CrawlKind::Issues, args, &config, cancel).await
        }
        Commands::Comments {
            args,
            collaborators,
            all_issues,
        } => {
            let kind = CrawlKind::Comments {
                collaborators,
                all_issues,
            };
            commands::crawl::handle_crawl(kind, args, &config, cancel).await
        }
        Commands::Commits(args) => {
            commands::crawl::handle_crawl(CrawlKind::Commits, args, &config, cancel).await
        }
        Commands::Stars { args, source } => {
            commands::crawl::handle_crawl(CrawlKind::Stars { source }, args, &config, cancel).await
        }
        Commands::Completions { .. } => Ok(commands::Outcome::Complete),
    };

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    }
}
