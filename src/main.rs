use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rssreader::config::Config;
use rssreader::feed;
use rssreader::reader::Reader;
use rssreader::storage::{JsonFileStore, SettingsStore};
use rssreader::util::{render_description, strip_control_chars, truncate_to_width};

/// Column budget for titles in listings.
const TITLE_WIDTH: usize = 64;
/// Wrap width for rendered article bodies.
const BODY_WIDTH: usize = 80;

/// Get the config directory path (~/.config/rssreader/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("rssreader"))
}

#[derive(Parser, Debug)]
#[command(name = "rssreader", about = "Personal RSS reader")]
struct Args {
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (defaults to ~/.config/rssreader/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscribed feeds with their unread counts
    List,
    /// Subscribe to a feed after checking that it is valid
    Add { location: String },
    /// Unsubscribe from a feed
    Remove { feed: usize },
    /// Fetch new articles for one feed, or all of them
    Refresh { feed: Option<usize> },
    /// List the articles of a feed, newest first
    Articles { feed: usize },
    /// Show an article and mark it read
    Open { feed: usize, article: usize },
    /// Mark an article read without showing it
    MarkRead { feed: usize, article: usize },
    /// Change a setting
    #[command(subcommand)]
    Set(SetCommand),
    /// Delete all stored feeds and settings
    Clear,
}

#[derive(Subcommand, Debug)]
enum SetCommand {
    /// Render article markup instead of showing it literally
    AllowHtml { value: bool },
    /// Retention cap applied at each merge
    MaxArticles { value: usize },
    /// Fetch timeout in milliseconds
    Timeout { ms: u64 },
    /// Persisted debug flag
    Debug { value: bool },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    let default_level = if args.debug || config.debug {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings_path = config.settings_path(&config_dir);
    if let Some(parent) = settings_path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory '{}'", parent.display())
            })?;
            restrict_permissions(parent);
        }
    }

    let mut reader = Reader::load(JsonFileStore::new(&settings_path))
        .with_context(|| format!("Failed to load settings '{}'", settings_path.display()))?;

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;

    run(args.command, &mut reader, &client).await
}

async fn run<S: SettingsStore>(
    command: Command,
    reader: &mut Reader<S>,
    client: &reqwest::Client,
) -> Result<()> {
    match command {
        Command::List => {
            if reader.feeds().is_empty() {
                println!("You have no feeds yet. Use `rssreader add <location>` to add one. Happy feeding!");
            }
            for (i, entry) in reader.feeds().iter().enumerate() {
                let title = strip_control_chars(entry.display_title());
                let unread = entry
                    .feed
                    .as_ref()
                    .map(|f| f.unread_count.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>3}  {:<width$}  {:>4}",
                    i,
                    truncate_to_width(&title, TITLE_WIDTH),
                    unread,
                    width = TITLE_WIDTH
                );
            }
        }
        Command::Add { location } => {
            let index = feed::subscribe(reader, client, &location)
                .await
                .context("Failed to add feed")?;
            println!(
                "Feed has been added: {}",
                strip_control_chars(reader.feed(index)?.display_title())
            );
        }
        Command::Remove { feed } => {
            let removed = reader.delete_feed(feed)?;
            println!("Deleted feed \"{}\"", strip_control_chars(removed.display_title()));
        }
        Command::Refresh { feed: Some(index) } => {
            let result = feed::refresh_one(reader, client, index).await;
            let outcome = result.result.context("Failed to refresh feed")?;
            println!("{} new article(s)", outcome.new_articles());
        }
        Command::Refresh { feed: None } => {
            let results = feed::refresh_all(reader, client).await;
            for result in &results {
                let title = reader
                    .feed(result.index)
                    .map(|e| strip_control_chars(e.display_title()).into_owned())
                    .unwrap_or_default();
                match &result.result {
                    Ok(outcome) => println!(
                        "{:>3}  {}: {} new",
                        result.index,
                        truncate_to_width(&title, TITLE_WIDTH),
                        outcome.new_articles()
                    ),
                    Err(e) => eprintln!(
                        "{:>3}  {}: {}",
                        result.index,
                        truncate_to_width(&title, TITLE_WIDTH),
                        e
                    ),
                }
            }
        }
        Command::Articles { feed } => {
            let entry = reader.feed(feed)?;
            let Some(materialized) = &entry.feed else {
                println!("Feed has not been fetched yet. Run `rssreader refresh {}`.", feed);
                return Ok(());
            };
            println!("{}", strip_control_chars(&materialized.title));
            for (i, article) in materialized.articles.iter().enumerate() {
                let marker = if article.is_read() { ' ' } else { '*' };
                println!(
                    "{:>3} {} {}",
                    i,
                    marker,
                    truncate_to_width(&strip_control_chars(&article.title), TITLE_WIDTH)
                );
            }
        }
        Command::Open { feed, article } => {
            let allow_html = reader.settings().allow_html;
            let feed_title = reader
                .feed(feed)?
                .feed
                .as_ref()
                .map(|f| f.title.clone())
                .unwrap_or_default();
            let opened = reader.open_article(feed, article)?;
            println!(
                "{} | {}",
                strip_control_chars(&feed_title),
                strip_control_chars(&opened.title)
            );
            println!();
            println!(
                "{}",
                render_description(&opened.description, allow_html, BODY_WIDTH)
            );
            println!("Read more: {}", strip_control_chars(&opened.link));
        }
        Command::MarkRead { feed, article } => {
            if !reader.mark_read(feed, article)? {
                println!("Article was already read");
            }
        }
        Command::Set(setting) => match setting {
            SetCommand::AllowHtml { value } => reader.set_allow_html(value)?,
            SetCommand::MaxArticles { value } => reader.set_max_articles_per_feed(value)?,
            SetCommand::Timeout { ms } => reader.set_fetch_timeout(ms)?,
            SetCommand::Debug { value } => reader.set_debug(value)?,
        },
        Command::Clear => {
            reader.clear()?;
            println!("All feeds and settings cleared.");
        }
    }

    Ok(())
}

/// SEC-007: User-only access to the data directory on Unix.
fn restrict_permissions(dir: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set directory permissions to 0700"
            );
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
