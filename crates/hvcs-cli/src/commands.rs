use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::Colorize;
use hvcs_sdk::{
    CommitOptions, FeedbackRecord, IngestRequest, ObjectId, RepoConfig, Repository, StagedChange,
    StateValue,
};
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let json = matches!(cli.format, OutputFormat::Json);
    let root = cli.repo.unwrap_or_else(RepoConfig::repo_dir_from_env);

    match cli.command {
        Command::Init(args) => cmd_init(args, root, json),
        Command::Status => cmd_status(&open(&root)?, json),
        Command::Add(args) => cmd_add(&open(&root)?, args),
        Command::Rm(args) => {
            open(&root)?.remove(&args.path)?;
            println!("  {} {}", "removed:".red(), args.path);
            Ok(())
        }
        Command::Commit(args) => cmd_commit(&open(&root)?, args, json),
        Command::Log(args) => cmd_log(&open(&root)?, args, json),
        Command::Show(args) => cmd_show(&open(&root)?, args, json),
        Command::Branch(args) => cmd_branch(&open(&root)?, args, json),
        Command::Checkout(args) => cmd_checkout(&open(&root)?, args),
        Command::Ingest(args) => cmd_ingest(&open(&root)?, args, json),
        Command::State(args) => cmd_state(&open(&root)?, args.action, json),
        Command::Feedback(args) => cmd_feedback(&open(&root)?, args.action, json),
    }
}

fn open(root: &Path) -> anyhow::Result<Repository> {
    debug!(root = %root.display(), "opening repository");
    Repository::open(root).with_context(|| format!("opening repository at {}", root.display()))
}

fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

fn format_time(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Repository path for a file given on the command line.
fn repo_path(file: &Path) -> String {
    let path = file.to_string_lossy().replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

fn emit(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn cmd_init(args: InitArgs, root: PathBuf, json: bool) -> anyhow::Result<()> {
    let path = args.path.unwrap_or(root);
    let mut config = RepoConfig::load(&path)?;
    if let Some(branch) = args.default_branch {
        config.default_branch = branch;
    }
    let repo = Repository::init_with_config(&path, config)?;
    let branch = repo.current_branch()?;
    if json {
        return emit(json!({ "path": path, "branch": branch }));
    }
    println!(
        "{} Initialized Hybrid VCS repository in {}",
        "✓".green().bold(),
        path.display().to_string().bold()
    );
    println!("  Branch: {}", branch.yellow());
    Ok(())
}

fn cmd_status(repo: &Repository, json: bool) -> anyhow::Result<()> {
    let status = repo.status()?;
    if json {
        return emit(serde_json::to_value(&status)?);
    }
    println!("On branch {}", status.branch.yellow().bold());
    match &status.head_commit_hash {
        Some(head) => println!(
            "Head: {} ({} commit(s))",
            head.short_hex().cyan(),
            status.history_length
        ),
        None => println!("No commits yet"),
    }
    let staged = repo.staged()?;
    if staged.is_empty() {
        println!("\nNothing staged.");
    } else {
        println!("\nStaged changes:");
        for (path, change) in staged.iter() {
            match change {
                StagedChange::Upsert { size, .. } => {
                    println!("  {} {} ({size} bytes)", "staged:".green(), path)
                }
                StagedChange::Remove => println!("  {} {}", "removed:".red(), path),
            }
        }
    }
    let stats = repo.stats();
    if stats.blobs_written > 0 {
        let (saved, percent) = stats.compression().savings();
        println!(
            "\nStored {} blob(s) this session, {} dedup hit(s), saved {saved} bytes ({percent:.1}%)",
            stats.blobs_written, stats.dedup_hits
        );
    }
    Ok(())
}

fn cmd_add(repo: &Repository, args: AddArgs) -> anyhow::Result<()> {
    if args.as_path.is_some() && args.files.len() > 1 {
        bail!("--as takes exactly one file");
    }
    let mut batch = Vec::with_capacity(args.files.len());
    for file in &args.files {
        let content =
            fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let path = args.as_path.clone().unwrap_or_else(|| repo_path(file));
        batch.push((path, content));
    }
    let paths: Vec<String> = batch.iter().map(|(p, _)| p.clone()).collect();
    if let [(path, content)] = batch.as_slice() {
        repo.stage(path, content)?;
    } else {
        repo.stage_many(batch)?;
    }
    for path in paths {
        println!("  {} {}", "staged:".green(), path);
    }
    Ok(())
}

fn cmd_commit(repo: &Repository, args: CommitArgs, json: bool) -> anyhow::Result<()> {
    let author = args.author.unwrap_or_else(default_author);
    let options = CommitOptions::new(args.message, author).allow_empty(args.allow_empty);
    let id = repo.commit_with(options)?;
    let branch = repo.current_branch()?;
    if json {
        return emit(json!({ "commit_hash": id, "branch": branch }));
    }
    println!("{} [{}] {}", "✓".green().bold(), branch.yellow(), id.short_hex().cyan());
    Ok(())
}

fn cmd_log(repo: &Repository, args: LogArgs, json: bool) -> anyhow::Result<()> {
    let history = repo.get_history(args.branch.as_deref(), Some(args.limit))?;
    let mut entries = Vec::new();
    for entry in history {
        entries.push(entry?);
    }
    if json {
        return emit(serde_json::to_value(&entries)?);
    }
    if entries.is_empty() {
        println!("No commits yet.");
        return Ok(());
    }
    for entry in &entries {
        let first_line = entry.message.lines().next().unwrap_or("");
        if args.oneline {
            println!("{} {}", entry.commit_hash.short_hex().yellow(), first_line);
            continue;
        }
        println!("{} {}", "commit".yellow(), entry.commit_hash.to_hex().yellow());
        println!("Author: {}", entry.author);
        println!("Date:   {}", format_time(entry.timestamp_ms));
        println!("\n    {}\n", entry.message);
        for path in &entry.changed_paths {
            println!("    {} {}", "~".dimmed(), path);
        }
        if !entry.changed_paths.is_empty() {
            println!();
        }
    }
    Ok(())
}

fn cmd_show(repo: &Repository, args: ShowArgs, json: bool) -> anyhow::Result<()> {
    let id = repo.resolve(&args.rev)?;
    if let Some(path) = args.path {
        let content = repo.read_file(&id, &path)?;
        io::stdout().write_all(&content)?;
        return Ok(());
    }
    let record = repo.get_commit(&id)?;
    let files = repo.get_version(&id)?;
    if json {
        let sizes: serde_json::Map<String, serde_json::Value> = files
            .iter()
            .map(|(path, bytes)| (path.clone(), json!(bytes.len())))
            .collect();
        return emit(json!({ "commit": record, "files": sizes }));
    }
    println!("{} {}", "commit".yellow(), record.commit_hash.to_hex().yellow());
    if let Some(parent) = &record.parent_hash {
        println!("Parent: {}", parent.short_hex());
    }
    println!("Tree:   {}", record.tree_hash.short_hex());
    println!("Author: {}", record.author);
    println!("Date:   {}", format_time(record.timestamp_ms));
    println!("\n    {}\n", record.message);
    for (path, bytes) in &files {
        println!("  {:>10}  {}", bytes.len(), path);
    }
    Ok(())
}

fn cmd_branch(repo: &Repository, args: BranchArgs, json: bool) -> anyhow::Result<()> {
    match (args.name, args.delete) {
        (Some(name), true) => {
            repo.delete_branch(&name)?;
            println!("Deleted branch {}", name.yellow());
        }
        (None, true) => bail!("branch name required with --delete"),
        (Some(name), false) => {
            let from: Option<ObjectId> = args.from.as_deref().map(|r| repo.resolve(r)).transpose()?;
            let target = repo.create_branch(&name, from)?;
            println!("Created branch {} at {}", name.yellow(), target.short_hex().cyan());
        }
        (None, false) => {
            let branches = repo.list_branches()?;
            if json {
                return emit(serde_json::to_value(&branches)?);
            }
            for branch in branches {
                let head = branch
                    .head
                    .map(|h| h.short_hex())
                    .unwrap_or_else(|| "(unborn)".into());
                if branch.is_current {
                    println!("* {} {}", branch.name.green().bold(), head.dimmed());
                } else {
                    println!("  {} {}", branch.name, head.dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_checkout(repo: &Repository, args: CheckoutArgs) -> anyhow::Result<()> {
    if args.create {
        repo.create_branch(&args.branch, None)?;
    }
    repo.checkout(&args.branch, args.discard)?;
    println!("Switched to {}", args.branch.yellow().bold());
    Ok(())
}

fn cmd_ingest(repo: &Repository, args: IngestArgs, json: bool) -> anyhow::Result<()> {
    let content = match &args.file {
        Some(file) => fs::read(file).with_context(|| format!("reading {}", file.display()))?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let message = args
        .message
        .unwrap_or_else(|| format!("ingest {}", args.path));
    let author = args.author.unwrap_or_else(default_author);
    let mut request = IngestRequest::new(args.path.clone(), content, author, message, args.source);
    if let Some(branch) = args.branch {
        request = request.on_branch(branch);
    }
    let receipt = repo.ingest(request)?;
    if json {
        return emit(serde_json::to_value(receipt)?);
    }
    if receipt.created {
        println!(
            "{} {} committed as {}",
            "✓".green().bold(),
            args.path,
            receipt.commit_hash.short_hex().cyan()
        );
    } else {
        println!(
            "{} unchanged (head {})",
            args.path,
            receipt.commit_hash.short_hex().dimmed()
        );
    }
    Ok(())
}

fn cmd_state(repo: &Repository, action: StateAction, json: bool) -> anyhow::Result<()> {
    match action {
        StateAction::Set { key, json: text } => {
            let value = StateValue::from_json(&text)?;
            repo.save_state(&key, &value)?;
            println!("Set {}", key.bold());
        }
        StateAction::Get { key } => {
            println!("{}", repo.load_state(&key)?.to_json_pretty()?);
        }
        StateAction::List { prefix } => {
            let keys = repo.list_state_keys(&prefix)?;
            if json {
                return emit(json!(keys));
            }
            for key in keys {
                println!("{key}");
            }
        }
        StateAction::Delete { key } => {
            if !repo.delete_state(&key)? {
                bail!("state key not found: {key}");
            }
            println!("Deleted {}", key.bold());
        }
    }
    Ok(())
}

fn cmd_feedback(repo: &Repository, action: FeedbackAction, json: bool) -> anyhow::Result<()> {
    match action {
        FeedbackAction::Add {
            rev,
            severity,
            category,
            params,
        } => {
            let commit = repo.resolve(&rev)?;
            let params = StateValue::from_json(&params)?;
            let record = FeedbackRecord::new(severity, category, params, commit);
            let id = repo.record_feedback(&record)?;
            println!(
                "Recorded feedback #{id} on {}",
                commit.short_hex().cyan()
            );
        }
        FeedbackAction::List { rev, category } => {
            let commit = repo.resolve(&rev)?;
            let records = repo.feedback_for_commit(&commit, category.as_deref())?;
            if json {
                return emit(serde_json::to_value(&records)?);
            }
            for record in records {
                println!(
                    "[{}] {} severity {}: {}",
                    record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    record.category.bold(),
                    record.severity,
                    record.params.to_json_pretty()?
                );
            }
        }
    }
    Ok(())
}
