//! Command-line entry point for `mailsweep`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use mailsweep_core::cache::AGE_UNKNOWN_HOURS;
use mailsweep_core::export::text;
use mailsweep_core::export::{write_domain_summary_csv, write_messages_csv};
use mailsweep_core::{
    AppConfig, AuditLog, AutomationRule, CacheRepository, CancelFlag, MailService, MatchOperator,
    MessageRecord, RuleAction, RuleBuilder, RuleEngine, RuleRepository, SimulatedMailbox,
    score_messages, search,
};

#[derive(Parser)]
#[command(name = "mailsweep", version, about = "Personal mailbox cleanup assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Mailbox account the cache and rules belong to
    #[arg(long, global = true, value_name = "EMAIL")]
    account: Option<String>,

    /// Configuration file (defaults to the platform config path)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the cache from a mailbox
    Index {
        /// Mailbox file to read
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
    /// Inspect or maintain the cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
    /// Manage automation rules
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Run automation rules over the cached messages
    Run {
        /// Apply actions to the mailbox instead of simulating them
        #[arg(long)]
        live: bool,
        /// Mailbox file the actions apply to (required for --live)
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,
        /// Only process messages from this sender domain
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,
    },
    /// Score cached messages with the threat heuristics
    Score {
        /// Only score messages from this sender domain
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,
        /// Show at most this many flagged messages
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
    /// Fuzzy-search cached messages
    Search {
        /// Text to look for in subjects and senders
        query: String,
        /// Show at most this many matches
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export reports as CSV
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache metadata and the busiest domains
    Info,
    /// Run the integrity check without changing anything
    Validate,
    /// Repair recoverable inconsistencies
    Repair,
    /// Delete the cached snapshot
    Clear,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// List all rules
    List,
    /// Show one rule in full
    Show {
        /// Rule id, or a unique prefix of one
        id: String,
    },
    /// Add a rule
    Add(AddRuleArgs),
    /// Remove a rule
    Remove {
        /// Rule id, or a unique prefix of one
        id: String,
    },
    /// Enable a rule
    Enable {
        /// Rule id, or a unique prefix of one
        id: String,
    },
    /// Disable a rule
    Disable {
        /// Rule id, or a unique prefix of one
        id: String,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// Export every cached message
    Messages {
        /// Destination CSV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Export per-domain message counts
    Domains {
        /// Destination CSV file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    /// Permanently delete the message
    Delete,
    /// Move the message to a folder (requires --folder)
    Move,
    /// Mark the message as read
    MarkRead,
    /// Mark the message as unread
    MarkUnread,
    /// Append a category (requires --category)
    Categorize,
    /// Set the follow-up flag
    Flag,
}

#[derive(Args)]
struct AddRuleArgs {
    /// Rule name
    #[arg(long)]
    name: String,

    /// Free-form description
    #[arg(long, default_value = "")]
    description: String,

    /// What to do with matched messages
    #[arg(long, value_enum)]
    action: ActionArg,

    /// Destination folder for the move action
    #[arg(long, value_name = "NAME")]
    folder: Option<String>,

    /// Category name for the categorize action
    #[arg(long, value_name = "NAME")]
    category: Option<String>,

    /// Higher priority rules run first
    #[arg(long, default_value_t = 0)]
    priority: i32,

    /// Create the rule disabled
    #[arg(long)]
    disabled: bool,

    /// Combine conditions with OR instead of AND
    #[arg(long)]
    any: bool,

    /// Sender address contains this text
    #[arg(long, value_name = "TEXT")]
    from: Option<String>,

    /// Subject contains this text
    #[arg(long, value_name = "TEXT")]
    subject_contains: Option<String>,

    /// Attachment flag equals this value
    #[arg(long, value_name = "BOOL")]
    has_attachments: Option<bool>,

    /// Read flag equals this value
    #[arg(long, value_name = "BOOL")]
    is_read: Option<bool>,

    /// Importance equals this value exactly
    #[arg(long, value_name = "TEXT")]
    importance: Option<String>,

    /// Size is at least this many bytes
    #[arg(long, value_name = "BYTES")]
    min_size: Option<i64>,

    /// Size is at most this many bytes
    #[arg(long, value_name = "BYTES")]
    max_size: Option<i64>,

    /// Received at least this many days ago
    #[arg(long, value_name = "DAYS")]
    older_than_days: Option<i64>,

    /// Body preview contains this text
    #[arg(long, value_name = "TEXT")]
    body_contains: Option<String>,

    /// Message carries this category
    #[arg(long, value_name = "NAME")]
    with_category: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().await,
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    debug!(data_dir = %config.data_dir().display(), "Resolved data directory");

    match cli.command {
        Commands::Index { input } => cmd_index(&config, cli.account.as_deref(), &input).await,
        Commands::Cache { command } => cmd_cache(&config, cli.account.as_deref(), command).await,
        Commands::Rules { command } => cmd_rules(&config, cli.account.as_deref(), command).await,
        Commands::Run {
            live,
            input,
            domain,
        } => {
            cmd_run(
                &config,
                cli.account.as_deref(),
                live,
                input.as_deref(),
                domain.as_deref(),
            )
            .await
        }
        Commands::Score { domain, top } => {
            cmd_score(&config, cli.account.as_deref(), domain.as_deref(), top).await
        }
        Commands::Search { query, limit } => {
            cmd_search(&config, cli.account.as_deref(), &query, limit).await
        }
        Commands::Export { command } => cmd_export(&config, cli.account.as_deref(), command).await,
    }
}

fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "mailsweep=warn,mailsweep_core=warn",
        1 => "mailsweep=info,mailsweep_core=info",
        2 => "mailsweep=debug,mailsweep_core=debug",
        _ => "mailsweep=trace,mailsweep_core=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Picks the account to operate on: the explicit flag if given, otherwise
/// the single existing cache's mailbox address.
async fn resolve_account(config: &AppConfig, explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(account) = explicit {
        return Ok(account.to_string());
    }

    let dir = config.data_dir();
    let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
        bail!(
            "No data under {}; run `mailsweep index` first or pass --account",
            dir.display()
        );
    };
    let mut cache_files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("cache-") && name.ends_with(".json") {
            cache_files.push(entry.path());
        }
    }

    match cache_files.as_slice() {
        [] => bail!(
            "No cache found under {}; run `mailsweep index` first or pass --account",
            dir.display()
        ),
        [single] => {
            let mut cache = CacheRepository::new(single.clone());
            if cache.load().await? && !cache.metadata().mailbox_email.is_empty() {
                Ok(cache.metadata().mailbox_email.clone())
            } else {
                bail!(
                    "Cache at {} is unreadable; pass --account",
                    single.display()
                )
            }
        }
        _ => bail!("Multiple caches found under {}; pass --account", dir.display()),
    }
}

async fn open_cache(config: &AppConfig, account: &str) -> anyhow::Result<CacheRepository> {
    let mut cache = CacheRepository::new(config.cache_path(account));
    cache.load().await?;
    Ok(cache)
}

async fn cmd_index(
    config: &AppConfig,
    account: Option<&str>,
    input: &Path,
) -> anyhow::Result<()> {
    let mailbox = SimulatedMailbox::from_file(input)
        .await
        .with_context(|| format!("failed to load mailbox from {}", input.display()))?;
    let account = account
        .map_or_else(|| mailbox.mailbox_email().to_string(), str::to_string);

    let raws = mailbox.list_messages().await?;
    let records: Vec<MessageRecord> = raws.into_iter().map(MessageRecord::from).collect();

    let mut cache = CacheRepository::new(config.cache_path(&account));
    let stats = cache.rebuild(&account, records);
    if stats.messages_indexed == 0 {
        remove_if_exists(cache.path()).await?;
        println!("Mailbox has no messages; nothing was cached.");
        return Ok(());
    }
    cache.save().await?;

    println!(
        "Indexed {} messages across {} domains for {account}.",
        stats.messages_indexed, stats.domains
    );
    if stats.unparsed_senders > 0 {
        println!(
            "{} messages had no parseable sender domain.",
            stats.unparsed_senders
        );
    }
    Ok(())
}

async fn cmd_cache(
    config: &AppConfig,
    account: Option<&str>,
    command: CacheCommands,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let mut cache = open_cache(config, &account).await?;

    match command {
        CacheCommands::Info => {
            print!("{}", text::cache_report(&cache, 10));
            let age = cache.age_hours().await;
            if age >= AGE_UNKNOWN_HOURS {
                println!("Age:       unknown");
            } else {
                println!("Age:       {age:.1} hours");
            }
            if cache.is_stale(&config.cache).await {
                println!(
                    "Stale:     older than the configured {:.0} hour maximum",
                    config.cache.max_age_hours
                );
            }
            if cache.needs_refresh(&config.cache).await {
                println!("The cache needs a refresh; run `mailsweep index`.");
            }
        }
        CacheCommands::Validate => {
            if cache.validate() {
                println!("Cache passed the integrity check.");
            } else {
                println!("Cache FAILED the integrity check; re-run `mailsweep index` to rebuild it.");
            }
        }
        CacheCommands::Repair => {
            // Counters were already straightened while loading; writing the
            // snapshot back makes the on-disk copy agree.
            if cache.message_count() == 0 {
                println!("Nothing cached; nothing to repair.");
            } else {
                cache.save().await?;
                println!(
                    "Snapshot rewritten: {} messages across {} domains.",
                    cache.message_count(),
                    cache.domain_count()
                );
            }
            if !cache.validate() {
                println!("Cache is still invalid; re-run `mailsweep index` to rebuild it.");
            }
        }
        CacheCommands::Clear => {
            remove_if_exists(cache.path()).await?;
            println!("Cache cleared for {account}.");
        }
    }
    Ok(())
}

async fn cmd_rules(
    config: &AppConfig,
    account: Option<&str>,
    command: RuleCommands,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let repo = RuleRepository::open(&config.data_dir(), &account).await?;

    match command {
        RuleCommands::List => {
            let rules = repo.list().await;
            if rules.is_empty() {
                println!("No rules defined. Add one with `mailsweep rules add`.");
                return Ok(());
            }
            for rule in rules {
                let id = rule.id.to_string();
                let state = if rule.enabled { "on " } else { "off" };
                println!(
                    "{}  [{}] p{:<4} {:<30} {:<12} runs {} (ok {}, failed {})",
                    &id[..8],
                    state,
                    rule.priority,
                    rule.name,
                    rule.action.kind(),
                    rule.execution_count,
                    rule.success_count,
                    rule.failure_count
                );
            }
        }
        RuleCommands::Show { id } => {
            let rule = resolve_rule(&repo, &id).await?;
            println!("{}", serde_json::to_string_pretty(&rule)?);
        }
        RuleCommands::Add(args) => {
            let rule = build_rule(args)?;
            if rule.conditions.is_empty() {
                println!("Warning: this rule has no conditions and will never match.");
            }
            let id = rule.id;
            repo.save(rule).await?;
            println!("Added rule {id}.");
        }
        RuleCommands::Remove { id } => match try_resolve_rule(&repo, &id).await? {
            Some(rule) => {
                repo.remove(rule.id).await?;
                println!("Removed rule '{}'.", rule.name);
            }
            None => println!("No rule matches '{id}'."),
        },
        RuleCommands::Enable { id } => match try_resolve_rule(&repo, &id).await? {
            Some(rule) => {
                repo.set_enabled(rule.id, true).await?;
                println!("Enabled rule '{}'.", rule.name);
            }
            None => println!("No rule matches '{id}'."),
        },
        RuleCommands::Disable { id } => match try_resolve_rule(&repo, &id).await? {
            Some(rule) => {
                repo.set_enabled(rule.id, false).await?;
                println!("Disabled rule '{}'.", rule.name);
            }
            None => println!("No rule matches '{id}'."),
        },
    }
    Ok(())
}

async fn cmd_run(
    config: &AppConfig,
    account: Option<&str>,
    live: bool,
    input: Option<&Path>,
    domain: Option<&str>,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let mut cache = open_cache(config, &account).await?;
    if cache.is_empty() {
        println!("The cache is empty; run `mailsweep index` first.");
        return Ok(());
    }
    if cache.is_stale(&config.cache).await || cache.needs_refresh(&config.cache).await {
        warn!("Cache is stale; actions are based on an old snapshot");
    }

    let messages: Vec<MessageRecord> = match domain {
        Some(domain) => cache
            .bucket(&domain.to_lowercase())
            .map(|b| b.messages.clone())
            .unwrap_or_default(),
        None => cache.all_messages().cloned().collect(),
    };
    if messages.is_empty() {
        println!("No cached messages matched the selection.");
        return Ok(());
    }

    let mut mailbox = match input {
        Some(path) => SimulatedMailbox::from_file(path)
            .await
            .with_context(|| format!("failed to load mailbox from {}", path.display()))?,
        None if live => bail!("--live needs --input pointing at the mailbox file"),
        None => SimulatedMailbox::new(account.clone()),
    };

    let rules = RuleRepository::open(&config.data_dir(), &account).await?;
    let audit = AuditLog::new(config.audit_path());

    let cancel = CancelFlag::new();
    let cancel_handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let dry_run = !live;
    let report = RuleEngine::new(&mut mailbox, &rules, &audit, &config.rules)
        .execute(&messages, dry_run, &cancel)
        .await?;

    if live {
        if let Some(path) = input {
            mailbox.save_to(path).await?;
        }
        for removal in &report.removals {
            cache.remove_message(&removal.domain, &removal.message_id);
        }
        if !report.removals.is_empty() {
            if cache.message_count() > 0 {
                cache.save().await?;
            } else {
                remove_if_exists(cache.path()).await?;
            }
            info!(removed = report.removals.len(), "Evicted actioned messages from the cache");
        }
    }

    print!("{}", text::run_report(&report));
    println!("Audit log: {}", audit.path().display());
    Ok(())
}

async fn cmd_score(
    config: &AppConfig,
    account: Option<&str>,
    domain: Option<&str>,
    top: usize,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let cache = open_cache(config, &account).await?;

    let mut scores = match domain {
        Some(domain) => match cache.bucket(&domain.to_lowercase()) {
            Some(bucket) => score_messages(bucket.messages.iter(), &config.scoring),
            None => Vec::new(),
        },
        None => score_messages(cache.all_messages(), &config.scoring),
    };
    scores.truncate(top);
    print!("{}", text::score_report(&scores));
    Ok(())
}

async fn cmd_search(
    config: &AppConfig,
    account: Option<&str>,
    query: &str,
    limit: usize,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let cache = open_cache(config, &account).await?;
    let hits = search(cache.all_messages(), query, limit);
    print!("{}", text::search_report(&hits));
    Ok(())
}

async fn cmd_export(
    config: &AppConfig,
    account: Option<&str>,
    command: ExportCommands,
) -> anyhow::Result<()> {
    let account = resolve_account(config, account).await?;
    let cache = open_cache(config, &account).await?;

    match command {
        ExportCommands::Messages { output } => {
            let rows = write_messages_csv(&output, cache.all_messages()).await?;
            println!("Wrote {rows} messages to {}.", output.display());
        }
        ExportCommands::Domains { output } => {
            let rows = write_domain_summary_csv(&output, cache.buckets()).await?;
            println!("Wrote {rows} domains to {}.", output.display());
        }
    }
    Ok(())
}

fn build_rule(args: AddRuleArgs) -> anyhow::Result<AutomationRule> {
    let action = match args.action {
        ActionArg::Delete => RuleAction::Delete,
        ActionArg::Move => match args.folder {
            Some(folder) => RuleAction::Move { folder },
            None => bail!("--action move needs --folder"),
        },
        ActionArg::MarkRead => RuleAction::MarkAsRead,
        ActionArg::MarkUnread => RuleAction::MarkAsUnread,
        ActionArg::Categorize => match args.category {
            Some(category) => RuleAction::Categorize { category },
            None => bail!("--action categorize needs --category"),
        },
        ActionArg::Flag => RuleAction::Flag,
    };

    let mut builder = RuleBuilder::new(args.name)
        .description(args.description)
        .action(action)
        .priority(args.priority)
        .enabled(!args.disabled);
    if args.any {
        builder = builder.operator(MatchOperator::Or);
    }
    if let Some(pattern) = args.from {
        builder = builder.from(pattern);
    }
    if let Some(pattern) = args.subject_contains {
        builder = builder.subject_contains(pattern);
    }
    if let Some(value) = args.has_attachments {
        builder = builder.has_attachments(value);
    }
    if let Some(value) = args.is_read {
        builder = builder.is_read(value);
    }
    if let Some(value) = args.importance {
        builder = builder.importance(value);
    }
    if let Some(bytes) = args.min_size {
        builder = builder.min_size(bytes);
    }
    if let Some(bytes) = args.max_size {
        builder = builder.max_size(bytes);
    }
    if let Some(days) = args.older_than_days {
        builder = builder.older_than_days(days);
    }
    if let Some(pattern) = args.body_contains {
        builder = builder.body_contains(pattern);
    }
    if let Some(name) = args.with_category {
        builder = builder.category(name);
    }
    Ok(builder.build())
}

/// Resolves a rule by full id or unique id prefix; `None` when nothing
/// matches.
async fn try_resolve_rule(
    repo: &RuleRepository,
    id: &str,
) -> anyhow::Result<Option<AutomationRule>> {
    let needle = id.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }
    if let Ok(full) = Uuid::parse_str(&needle) {
        return Ok(repo.get(full).await);
    }

    let matches: Vec<AutomationRule> = repo
        .list()
        .await
        .into_iter()
        .filter(|r| r.id.to_string().starts_with(&needle))
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.into_iter().next()),
        n => bail!("'{id}' is ambiguous; it prefixes {n} rule ids"),
    }
}

async fn resolve_rule(repo: &RuleRepository, id: &str) -> anyhow::Result<AutomationRule> {
    match try_resolve_rule(repo, id).await? {
        Some(rule) => Ok(rule),
        None => bail!("no rule matches '{id}'"),
    }
}

async fn remove_if_exists(path: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
