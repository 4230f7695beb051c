//! wiki-bot main entry point
//!
//! This is the command-line interface for the wiki question-answering bot and
//! its companion agent graphs.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use url::Url;
use wiki_bot::agents::feeler::FeelerLimits;
use wiki_bot::agents::{FeelerGraph, QaGraph, ResolverGraph};
use wiki_bot::auth::{Authenticator, CredentialStore, InteractiveLogin};
use wiki_bot::config::{load_config_with_hash, Config};
use wiki_bot::crawler::{crawl, Document, MissingCookies};
use wiki_bot::index::populate_index;
use wiki_bot::llm::{AnthropicChat, OpenAiChat, OpenAiEmbeddings};
use wiki_bot::output::{load_statistics, print_statistics, StatusLine};
use wiki_bot::storage::{open_index, SqliteIndex, VectorStore};

/// wiki-bot: Ask questions about a private Wiki.js site
///
/// wiki-bot logs into the wiki with your browser session, scrapes every page,
/// indexes them for similarity search, and answers questions from the index.
#[derive(Parser, Debug)]
#[command(name = "wiki-bot")]
#[command(version = "1.0.0")]
#[command(about = "Retrieval-augmented question answering over a private wiki", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with your browser and save the session cookies
    Login,

    /// Crawl the wiki and rebuild the index
    Crawl {
        /// Discard saved cookies first, forcing a fresh login
        #[arg(short, long)]
        reset: bool,
    },

    /// Answer a question from the index
    Ask {
        question: String,

        /// Re-crawl with the saved cookies and rebuild the index first
        #[arg(short, long)]
        reset: bool,
    },

    /// Interpret a feeling and come up with some encouragement
    Feel { text: String },

    /// Rewrite a file until a test command passes
    Resolve {
        /// File holding the code to fix; rewritten in place
        #[arg(long, value_name = "FILE")]
        code: PathBuf,

        /// Command that exits 0 when the code is correct
        #[arg(long, value_name = "CMD")]
        test_command: String,
    },

    /// Show index statistics and the latest build
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load_config_with_hash(cli.config.as_deref())
        .context("Failed to load configuration")?;
    match &cli.config {
        Some(path) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            path.display(),
            config_hash
        ),
        None => tracing::debug!("No configuration file given; using defaults"),
    }

    match cli.command {
        Command::Login => handle_login(&config).await,
        Command::Crawl { reset } => handle_crawl(&config, &config_hash, reset).await,
        Command::Ask { question, reset } => {
            handle_ask(&config, &config_hash, &question, reset).await
        }
        Command::Feel { text } => handle_feel(&config, &text).await,
        Command::Resolve { code, test_command } => {
            handle_resolve(&config, &code, &test_command).await
        }
        Command::Stats => handle_stats(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wiki_bot=info,warn"),
            1 => EnvFilter::new("wiki_bot=debug,info"),
            2 => EnvFilter::new("wiki_bot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn authenticator(config: &Config) -> anyhow::Result<InteractiveLogin> {
    let url = Url::parse(&config.wiki.base_url)
        .with_context(|| format!("Invalid wiki URL: {}", config.wiki.base_url))?;
    Ok(InteractiveLogin::new(url))
}

fn open_configured_index(config: &Config) -> anyhow::Result<SqliteIndex> {
    let path = Path::new(&config.index.database_path);
    open_index(path).with_context(|| format!("Failed to open index at {}", path.display()))
}

/// Handles `login`: runs the interactive login and saves the cookies
async fn handle_login(config: &Config) -> anyhow::Result<()> {
    let store = CredentialStore::new(&config.wiki.cookie_file);
    let cookies = authenticator(config)?
        .login()
        .await
        .context("Login failed")?;
    store.save(&cookies).context("Failed to save cookies")?;

    println!(
        "✓ Saved {} cookies to {}",
        cookies.len(),
        store.path().display()
    );
    Ok(())
}

/// Crawls and rebuilds the index, returning the number of chunks written
async fn crawl_and_index(
    config: &Config,
    config_hash: &str,
    missing: MissingCookies,
) -> anyhow::Result<usize> {
    let auth = authenticator(config)?;
    let documents: Vec<Document> = crawl(config, &auth, missing)
        .await
        .context("Crawl failed")?;

    let embedder =
        OpenAiEmbeddings::from_config(&config.llm).context("Failed to set up embeddings")?;
    let mut index = open_configured_index(config)?;

    // A crawl yields the whole wiki, so the previous chunks are replaced
    let chunks = populate_index(
        &mut index,
        &embedder,
        &documents,
        &config.index,
        config_hash,
        true,
    )
    .await
    .context("Indexing failed")?;

    Ok(chunks)
}

/// Handles `crawl`
async fn handle_crawl(config: &Config, config_hash: &str, reset: bool) -> anyhow::Result<()> {
    if reset {
        let store = CredentialStore::new(&config.wiki.cookie_file);
        if store.remove().context("Failed to remove cookie file")? {
            tracing::info!("Discarded saved cookies");
        }
    }

    let chunks = crawl_and_index(config, config_hash, MissingCookies::Login).await?;
    println!("✓ Indexed {} chunks", chunks);
    Ok(())
}

/// Handles `ask`
async fn handle_ask(
    config: &Config,
    config_hash: &str,
    question: &str,
    reset: bool,
) -> anyhow::Result<()> {
    if reset {
        crawl_and_index(config, config_hash, MissingCookies::Fail).await?;
    } else {
        println!("Using existing vector store (pass --reset to refresh).");
    }

    let llm = OpenAiChat::from_config(&config.llm).context("Failed to set up chat model")?;
    let embedder =
        OpenAiEmbeddings::from_config(&config.llm).context("Failed to set up embeddings")?;
    let index = open_configured_index(config)?;

    if index.count_chunks().context("Failed to read the index")? == 0 {
        bail!("The index is empty. Run `wiki-bot crawl` first.");
    }

    println!("Question: {}", question);
    let mut status = StatusLine::stdout();
    let graph = QaGraph::new(&llm, &embedder, &index, config.index.top_k);
    let result = graph.run(question, Some(&mut status)).await;
    status.clear()?;

    match result.context("Question answering failed")?.answer {
        Some(answer) => println!("Answer: {}\n", answer),
        None => println!("Sorry, I could not work out what you are asking.\n"),
    }
    Ok(())
}

/// Handles `feel`
async fn handle_feel(config: &Config, text: &str) -> anyhow::Result<()> {
    let llm = AnthropicChat::from_config(&config.llm).context("Failed to set up agent model")?;
    let graph = FeelerGraph::new(&llm, FeelerLimits::from(&config.agents));

    let mut status = StatusLine::stdout();
    let result = graph.run(text, Some(&mut status)).await;
    status.clear()?;

    let ctx = result.context("Feeler run failed")?;
    println!("Interpretation: {}\n", ctx.interpretation);
    if let Some(output) = ctx.final_output {
        println!("{}", output);
    }
    Ok(())
}

/// Handles `resolve`
async fn handle_resolve(config: &Config, code: &Path, test_command: &str) -> anyhow::Result<()> {
    let llm = AnthropicChat::from_config(&config.llm).context("Failed to set up agent model")?;
    let graph = ResolverGraph::new(
        &llm,
        code,
        test_command,
        config.agents.max_resolver_iterations,
    )?;

    let mut status = StatusLine::stdout();
    let result = graph.run(Some(&mut status)).await;
    status.clear()?;

    let ctx = result.context("Resolver run failed")?;
    if ctx.passed {
        println!("✓ Tests pass after {} attempt(s)", ctx.iterations);
        Ok(())
    } else {
        println!("{}", ctx.error_log);
        bail!("Tests still failing after {} attempts", ctx.iterations)
    }
}

/// Handles `stats`: shows statistics from the index database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.index.database_path);

    let index = open_configured_index(config)?;
    let stats = load_statistics(&index)?;
    print_statistics(&stats)?;

    Ok(())
}
