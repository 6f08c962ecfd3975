//! CLI entry point for `mailquery`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use mailquery::config::Config;
use mailquery::mailbox::{Mailbox, MemoryMailbox};
use mailquery::query::{parse_query, StandardAnalyzer};
use mailquery::search::params::{Cursor, SearchRequest};
use mailquery::search::response::{HitRecord, SearchResponse};

#[derive(Parser)]
#[command(name = "mailquery", version, about = "Search a mailbox with a query language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Search a mailbox file
    Search {
        /// Mailbox JSON file
        mailbox: PathBuf,
        /// Query; the configured default query when omitted
        query: Option<String>,
        #[arg(long)]
        offset: Option<i64>,
        #[arg(short, long)]
        limit: Option<i64>,
        /// dateDesc, dateAsc, subjAsc, subjDesc, nameAsc, nameDesc, score, none
        #[arg(short, long)]
        sort: Option<String>,
        /// Comma-separated result types (conversation, message, part, contact, ...)
        #[arg(short, long)]
        types: Option<String>,
        /// Inline expansion: none, first, all, hits
        #[arg(long)]
        fetch: Option<String>,
        /// Prefer HTML bodies for expanded messages
        #[arg(long)]
        html: bool,
        /// Mark expanded unread messages as read
        #[arg(long)]
        mark_read: bool,
        /// Include To/Cc addresses in message summaries
        #[arg(long)]
        recipients: bool,
        /// Resume after this item id
        #[arg(long, value_name = "ID")]
        cursor_id: Option<u32>,
        /// Sort value of the cursor item
        #[arg(long, value_name = "VALUE", requires = "cursor_id")]
        cursor_sort: Option<String>,
        /// Qualify hit ids with the account id
        #[arg(long)]
        qualify_ids: bool,
        #[arg(long)]
        json: bool,
        /// Write read-flag changes back to the mailbox file
        #[arg(long)]
        save: bool,
    },
    /// Show how a query parses and compiles
    Explain {
        query: String,
        /// Mailbox used to resolve tag and folder names
        #[arg(short, long)]
        mailbox: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Write it to the config file if none exists yet
        #[arg(long)]
        init: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = mailquery::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Search {
            mailbox,
            query,
            offset,
            limit,
            sort,
            types,
            fetch,
            html,
            mark_read,
            recipients,
            cursor_id,
            cursor_sort,
            qualify_ids,
            json,
            save,
        } => {
            let request = SearchRequest {
                query,
                offset,
                limit,
                types,
                sort_by: sort,
                fetch,
                want_html: html,
                mark_read,
                want_recipients: recipients,
                cursor: cursor_id.map(|id| Cursor {
                    prev_id: mailquery::model::ItemId(id),
                    sort_value: cursor_sort,
                }),
                include_mailbox: qualify_ids,
                ..SearchRequest::default()
            };
            cmd_search(&mailbox, &request, &config, json, save)
        }
        Commands::Explain { query, mailbox } => cmd_explain(&query, mailbox.as_deref(), &config),
        Commands::Config { init } => cmd_config(&config, init),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_file = mailquery::config::log_file_path(config);
    let log_dir = mailquery::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mailquery.log".to_string());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print the effective configuration, optionally writing it out.
fn cmd_config(config: &Config, init: bool) -> anyhow::Result<()> {
    let contents = toml::to_string_pretty(config)?;
    if init {
        let path = mailquery::config::config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
        if path.exists() {
            anyhow::bail!("Config file already exists: {}", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &contents)?;
        tracing::info!(path = %path.display(), "Saved config");
        eprintln!("Wrote {}", path.display());
    }
    print!("{contents}");
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailquery", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Run a search against a mailbox file and print the page.
fn cmd_search(
    path: &Path,
    request: &SearchRequest,
    config: &Config,
    json: bool,
    save: bool,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("Mailbox file not found: {}", path.display());
    }

    let mailbox = MemoryMailbox::load(path)?;
    let start = Instant::now();
    let response = mailquery::search::execute(&mailbox, request, config, None)?;
    tracing::info!(
        hits = response.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Search finished"
    );

    if save {
        mailbox.save(path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_search_results_table(&response);
    }
    Ok(())
}

/// Print the canonical form of a query and, with a mailbox, its plan.
fn cmd_explain(query: &str, mailbox: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    match mailbox {
        Some(path) => {
            let mailbox = MemoryMailbox::load(path)?;
            let parsed = parse_query(query, mailbox.analyzer(), config.search.max_query_depth)?;
            println!("Query: {}", parsed.dump());
            let op = parsed.compile(&mailbox, true)?;
            println!("Plan:  {op}");
        }
        None => {
            let parsed = parse_query(query, &StandardAnalyzer, config.search.max_query_depth)?;
            println!("Query: {}", parsed.dump());
            println!("Plan:  (pass --mailbox to resolve tags and folders)");
        }
    }
    Ok(())
}

/// Print search results as a human-readable table.
fn print_search_results_table(response: &SearchResponse) {
    use humansize::{format_size, BINARY};

    println!();
    println!(
        "  {} result(s), sorted by {}{}",
        response.len(),
        response.sort_by,
        if response.more { ", more available" } else { "" }
    );
    println!();

    if response.is_empty() {
        return;
    }

    println!(
        "  {} {} {} {} {} {:>9}",
        pad("Type", 6),
        pad("Id", 10),
        pad("Date", 16),
        pad("From", 24),
        pad("Subject", 40),
        "Size"
    );
    println!("  {}", "-".repeat(112));

    for record in &response.hits {
        let row = TableRow::from(record);
        println!(
            "  {} {} {} {} {} {:>9}",
            pad(row.kind, 6),
            pad(&row.id, 10),
            pad(&row.date, 16),
            pad(&row.from, 24),
            pad(&row.subject, 40),
            row.size.map(|s| format_size(s, BINARY)).unwrap_or_default()
        );
    }
    println!();
}

struct TableRow {
    kind: &'static str,
    id: String,
    date: String,
    from: String,
    subject: String,
    size: Option<u64>,
}

impl From<&HitRecord> for TableRow {
    fn from(record: &HitRecord) -> Self {
        let id = record.id().unwrap_or_default().to_string();
        let short_date = |d: &str| d.get(..16).unwrap_or(d).replace('T', " ");
        match record {
            HitRecord::Conversation(c) => Self {
                kind: "conv",
                id,
                date: short_date(&c.date),
                from: c
                    .senders
                    .first()
                    .map(|s| s.name.clone().unwrap_or_else(|| s.address.clone()))
                    .unwrap_or_default(),
                subject: format!("{} ({})", c.subject, c.message_count),
                size: None,
            },
            HitRecord::Message(m) => Self {
                kind: "msg",
                id,
                date: short_date(&m.date),
                from: m
                    .addresses
                    .first()
                    .map(|s| s.name.clone().unwrap_or_else(|| s.address.clone()))
                    .unwrap_or_default(),
                subject: m.subject.clone(),
                size: Some(m.size),
            },
            HitRecord::Part(p) => Self {
                kind: "part",
                id: format!("{id}/{}", p.part),
                date: short_date(&p.date),
                from: p.from.address.clone(),
                subject: p.filename.clone().unwrap_or_else(|| p.content_type.clone()),
                size: Some(p.size),
            },
            HitRecord::Contact(c) => Self {
                kind: "cn",
                id,
                date: String::new(),
                from: c.email.clone().unwrap_or_default(),
                subject: c.full_name.clone(),
                size: None,
            },
            HitRecord::Note(n) => Self {
                kind: "note",
                id,
                date: short_date(&n.date),
                from: String::new(),
                subject: n.content.lines().next().unwrap_or_default().to_string(),
                size: None,
            },
            HitRecord::Appointment(a) => Self {
                kind: "appt",
                id,
                date: short_date(&a.start),
                from: a.location.clone(),
                subject: a.subject.clone(),
                size: None,
            },
            HitRecord::Document(d) | HitRecord::Wiki(d) => Self {
                kind: if matches!(record, HitRecord::Wiki(_)) {
                    "wiki"
                } else {
                    "doc"
                },
                id,
                date: short_date(&d.date),
                from: String::new(),
                subject: d.name.clone(),
                size: Some(d.size),
            },
            HitRecord::Proxied(value) => Self {
                kind: "remote",
                id: value
                    .get("id")
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .unwrap_or_default(),
                date: String::new(),
                from: String::new(),
                subject: String::new(),
                size: None,
            },
        }
    }
}

/// Truncate and left-align `s` to exactly `width` terminal columns.
fn pad(s: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    if UnicodeWidthStr::width(s) <= width {
        out.push_str(s);
        used = UnicodeWidthStr::width(s);
    } else {
        for ch in s.chars() {
            let w = UnicodeWidthChar::width(ch).unwrap_or(0);
            if used + w + 3 > width {
                break;
            }
            out.push(ch);
            used += w;
        }
        out.push_str("...");
        used += 3;
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}
