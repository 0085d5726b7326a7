//! hermod-cache — offline cache maintenance and migration tool.
//!
//! Operates directly on a cache file or database while the daemon is
//! stopped: inspection, cleanup, selective deletion, TSV export, and
//! backend-to-backend migration.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hermod::cache::migrate::migrate_settings;
use hermod::sanitize::truncate_for_log;
use hermod::{CacheBackendKind, CacheEntry, CacheSettings, HermodError, TransCache};

/// Hermod cache management tool.
#[derive(Parser)]
#[command(name = "hermod-cache")]
#[command(version = hermod::PKG_VERSION)]
#[command(about = "Hermod cache management tool")]
struct Args {
    /// Cache file (text backend) or database file (sqlite backend).
    #[arg(short = 'f', long, default_value = "trans_dictionary.txt", global = true)]
    file: PathBuf,

    /// Storage backend of the cache file.
    #[arg(long, default_value = "text", global = true)]
    backend: CacheBackendKind,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List cache entries, optionally filtered by language pair
    List {
        from: Option<String>,
        to: Option<String>,
    },

    /// Remove all entries for a language pair
    Clear { from: String, to: String },

    /// Remove every entry (asks for confirmation)
    ClearAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show cache statistics
    Stats,

    /// Remove entries unused for more than the given number of days
    Cleanup { days: u32 },

    /// Look up one translation
    Search {
        from: String,
        to: String,
        text: String,
    },

    /// Delete one entry by id
    Delete { id: i64 },

    /// Export entries as TSV to stdout, optionally filtered by language pair
    Export {
        from: Option<String>,
        to: Option<String>,
    },

    /// Copy every entry from one backend into another
    Migrate {
        /// Source backend kind
        #[arg(long = "from")]
        from_kind: CacheBackendKind,
        /// Source cache file or database
        #[arg(long = "from-config")]
        from_config: PathBuf,
        /// Destination backend kind
        #[arg(long = "to")]
        to_kind: CacheBackendKind,
        /// Destination cache file or database
        #[arg(long = "to-config")]
        to_config: PathBuf,
        /// Suppress per-batch progress logging
        #[arg(long)]
        no_progress: bool,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> hermod::Result<ExitCode> {
    // Migration opens its own pair of backends.
    if let Command::Migrate {
        from_kind,
        from_config,
        to_kind,
        to_config,
        no_progress,
    } = &args.command
    {
        let report = migrate_settings(
            &CacheSettings::new(*from_kind, from_config),
            &CacheSettings::new(*to_kind, to_config),
            !no_progress,
        )?;
        println!(
            "Migrated {} entries, {} failed",
            report.migrated, report.failed
        );
        return Ok(if report.is_complete() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let cache = TransCache::open(&CacheSettings::new(args.backend, &args.file))?;

    match args.command {
        Command::List { from, to } => cmd_list(&cache, from.as_deref(), to.as_deref())?,
        Command::Clear { from, to } => cmd_clear(&cache, &from, &to)?,
        Command::ClearAll { yes } => cmd_clear_all(&cache, yes)?,
        Command::Stats => cmd_stats(&cache)?,
        Command::Cleanup { days } => cmd_cleanup(&cache, days)?,
        Command::Search { from, to, text } => cmd_search(&cache, &from, &to, &text)?,
        Command::Delete { id } => cmd_delete(&cache, id)?,
        Command::Export { from, to } => cmd_export(&cache, from.as_deref(), to.as_deref())?,
        Command::Migrate { .. } => unreachable!("handled above"),
    }

    Ok(ExitCode::SUCCESS)
}

fn matches_pair(entry: &CacheEntry, from: Option<&str>, to: Option<&str>) -> bool {
    from.map_or(true, |f| entry.from_lang == f) && to.map_or(true, |t| entry.to_lang == t)
}

fn format_timestamp(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

fn cmd_list(cache: &TransCache, from: Option<&str>, to: Option<&str>) -> hermod::Result<()> {
    println!();
    println!(
        "{:<5} {:<4} {:<4} {:<8} {:<33} {:<33} {:<19}",
        "ID", "From", "To", "Count", "Source", "Translation", "Last Used"
    );
    println!("{}", "-".repeat(110));

    let mut displayed = 0usize;
    cache.scan(|entry| {
        if !matches_pair(entry, from, to) {
            return;
        }
        println!(
            "{:<5} {:<4} {:<4} {:<8} {:<33} {:<33} {}",
            entry.id,
            entry.from_lang,
            entry.to_lang,
            entry.count,
            truncate_for_log(&entry.source_text, 30),
            truncate_for_log(&entry.translated_text, 30),
            format_timestamp(entry.last_used)
        );
        displayed += 1;
    })?;

    println!("\nTotal: {displayed} entries\n");
    Ok(())
}

fn cmd_clear(cache: &TransCache, from: &str, to: &str) -> hermod::Result<()> {
    if !hermod::lang::validate_language_code(from) || !hermod::lang::validate_language_code(to) {
        return Err(HermodError::InvalidInput(
            "invalid language code (must be ISO 639-2)".into(),
        ));
    }

    let removed = cache.delete_pair(from, to)?;
    println!("Removed {removed} entries ({from} -> {to})");
    cache.save()?;
    println!("Cache saved successfully");
    Ok(())
}

fn cmd_clear_all(cache: &TransCache, yes: bool) -> hermod::Result<()> {
    if !yes {
        print!("WARNING: This will delete ALL cache entries!\nAre you sure? (yes/no): ");
        io::stdout().flush()?;
        let mut response = String::new();
        io::stdin().lock().read_line(&mut response)?;
        if response.trim() != "yes" {
            println!("Operation cancelled");
            return Ok(());
        }
    }

    let removed = cache.clear()?;
    println!("Removed {removed} entries");
    cache.save()?;
    println!("Cache cleared and saved successfully");
    Ok(())
}

fn cmd_stats(cache: &TransCache) -> hermod::Result<()> {
    struct PairStats {
        from: String,
        to: String,
        count: usize,
        last_used: i64,
    }

    let mut pairs: Vec<PairStats> = Vec::new();
    let mut total = 0usize;
    let mut total_usage = 0u64;
    let mut oldest = i64::MAX;
    let mut newest = i64::MIN;

    cache.scan(|entry| {
        total += 1;
        total_usage += u64::from(entry.count);
        oldest = oldest.min(entry.last_used);
        newest = newest.max(entry.last_used);

        match pairs
            .iter_mut()
            .find(|p| p.from == entry.from_lang && p.to == entry.to_lang)
        {
            Some(pair) => {
                pair.count += 1;
                pair.last_used = pair.last_used.max(entry.last_used);
            }
            None => pairs.push(PairStats {
                from: entry.from_lang.clone(),
                to: entry.to_lang.clone(),
                count: 1,
                last_used: entry.last_used,
            }),
        }
    })?;

    println!("\n=== Cache Statistics ===\n");
    println!("Total entries: {total}");
    println!("Total usage count: {total_usage}");
    if total > 0 {
        println!(
            "Average usage per entry: {:.2}",
            total_usage as f64 / total as f64
        );
        println!();
        println!("Oldest entry: {}", format_timestamp(oldest));
        println!("Newest entry: {}", format_timestamp(newest));
    }

    println!("\nEntries by language pair:");
    println!("  {:<4} -> {:<4} : {:<8} {:<19}", "From", "To", "Count", "Last Used");
    println!("  {}", "-".repeat(48));
    for pair in &pairs {
        println!(
            "  {:<4} -> {:<4} : {:<8} {}",
            pair.from,
            pair.to,
            pair.count,
            format_timestamp(pair.last_used)
        );
    }
    println!();
    Ok(())
}

fn cmd_cleanup(cache: &TransCache, days: u32) -> hermod::Result<()> {
    if days == 0 {
        return Err(HermodError::InvalidInput("days must be >= 1".into()));
    }
    let removed = cache.cleanup(days)?;
    println!("Removed {removed} entries older than {days} days");
    cache.save()?;
    println!("Cache saved successfully");
    Ok(())
}

fn cmd_search(cache: &TransCache, from: &str, to: &str, text: &str) -> hermod::Result<()> {
    match cache.lookup(from, to, text) {
        None => println!("No matching entry found"),
        Some(entry) => {
            println!("\n=== Cache Entry Found ===\n");
            println!("ID:           {}", entry.id);
            println!("Hash:         {}", entry.hash);
            println!("From:         {}", entry.from_lang);
            println!("To:           {}", entry.to_lang);
            println!("Source:       {}", entry.source_text);
            println!("Translation:  {}", entry.translated_text);
            println!("Count:        {}", entry.count);
            println!("Created:      {}", format_timestamp(entry.created_at));
            println!("Last used:    {}", format_timestamp(entry.last_used));
            println!();
        }
    }
    Ok(())
}

fn cmd_delete(cache: &TransCache, id: i64) -> hermod::Result<()> {
    if !cache.delete_by_id(id)? {
        return Err(HermodError::InvalidInput(format!(
            "entry with ID {id} not found"
        )));
    }
    println!("Deleted entry ID {id}");
    cache.save()?;
    println!("Cache saved successfully");
    Ok(())
}

fn cmd_export(cache: &TransCache, from: Option<&str>, to: Option<&str>) -> hermod::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cache.scan(|entry| {
        if !matches_pair(entry, from, to) {
            return;
        }
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            entry.id,
            entry.from_lang,
            entry.to_lang,
            entry.source_text,
            entry.translated_text,
            entry.count,
            entry.created_at,
            entry.last_used
        );
    })?;
    Ok(())
}
