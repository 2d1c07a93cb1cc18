use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hvcs",
    about = "Hybrid VCS: versioned content plus structured state",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Repository directory (default: $HYBRID_VCS or ./hybrid_repo)
    #[arg(short = 'C', long, global = true)]
    pub repo: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a repository
    Init(InitArgs),
    /// Show branch, head, and staged changes
    Status,
    /// Stage files
    Add(AddArgs),
    /// Stage the removal of a path
    Rm(RmArgs),
    /// Commit staged changes
    Commit(CommitArgs),
    /// Show history
    Log(LogArgs),
    /// Show a commit, or one file in it
    Show(ShowArgs),
    /// List, create, or delete branches
    Branch(BranchArgs),
    /// Switch the active branch
    Checkout(CheckoutArgs),
    /// Version one file, committing only if it changed
    Ingest(IngestArgs),
    /// Structured state records
    State(StateArgs),
    /// Feedback linked to commits
    Feedback(FeedbackArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<PathBuf>,
    #[arg(long)]
    pub default_branch: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// Store under this repository path instead of the file path (single file only)
    #[arg(long = "as")]
    pub as_path: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    pub path: String,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: String,
    #[arg(short, long)]
    pub author: Option<String>,
    #[arg(long)]
    pub allow_empty: bool,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(short, long)]
    pub branch: Option<String>,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Branch name or full commit hash
    pub rev: String,
    pub path: Option<String>,
}

#[derive(Args)]
pub struct BranchArgs {
    pub name: Option<String>,
    #[arg(short = 'd', long)]
    pub delete: bool,
    /// Start point (branch or commit); defaults to the active branch
    #[arg(long)]
    pub from: Option<String>,
}

#[derive(Args)]
pub struct CheckoutArgs {
    pub branch: String,
    /// Create the branch first
    #[arg(short = 'b', long)]
    pub create: bool,
    /// Drop staged changes instead of refusing
    #[arg(long)]
    pub discard: bool,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Repository path to version
    pub path: String,
    /// Read content from this file instead of stdin
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    #[arg(short, long)]
    pub author: Option<String>,
    #[arg(short, long)]
    pub message: Option<String>,
    #[arg(long, default_value = "cli")]
    pub source: String,
    #[arg(long)]
    pub branch: Option<String>,
}

#[derive(Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand)]
pub enum StateAction {
    /// Store a JSON value
    Set { key: String, json: String },
    Get { key: String },
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
    Delete { key: String },
}

#[derive(Args)]
pub struct FeedbackArgs {
    #[command(subcommand)]
    pub action: FeedbackAction,
}

#[derive(Subcommand)]
pub enum FeedbackAction {
    /// Attach feedback to a commit
    Add {
        rev: String,
        #[arg(short, long)]
        severity: u8,
        #[arg(short, long)]
        category: String,
        /// JSON parameters
        #[arg(short, long, default_value = "null")]
        params: String,
    },
    /// Feedback recorded for a commit
    List {
        rev: String,
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["hvcs", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
        assert!(cli.repo.is_none());
    }

    #[test]
    fn parse_global_repo() {
        let cli = Cli::try_parse_from(["hvcs", "status", "-C", "/tmp/r"]).unwrap();
        assert_eq!(cli.repo, Some(PathBuf::from("/tmp/r")));
    }

    #[test]
    fn parse_add_requires_files() {
        assert!(Cli::try_parse_from(["hvcs", "add"]).is_err());
        let cli = Cli::try_parse_from(["hvcs", "add", "a.txt", "--as", "docs/a.txt"]).unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.files, vec![PathBuf::from("a.txt")]);
            assert_eq!(args.as_path, Some("docs/a.txt".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_commit() {
        let cli = Cli::try_parse_from(["hvcs", "commit", "-m", "hello", "--allow-empty"]).unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.message, "hello");
            assert!(args.allow_empty);
            assert!(args.author.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_log() {
        let cli = Cli::try_parse_from(["hvcs", "log", "--oneline", "-n", "5", "-b", "dev"]).unwrap();
        if let Command::Log(args) = cli.command {
            assert!(args.oneline);
            assert_eq!(args.limit, 5);
            assert_eq!(args.branch, Some("dev".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_branch_delete() {
        let cli = Cli::try_parse_from(["hvcs", "branch", "-d", "old"]).unwrap();
        if let Command::Branch(args) = cli.command {
            assert!(args.delete);
            assert_eq!(args.name, Some("old".into()));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_checkout_create() {
        let cli = Cli::try_parse_from(["hvcs", "checkout", "-b", "feature", "--discard"]).unwrap();
        if let Command::Checkout(args) = cli.command {
            assert!(args.create);
            assert!(args.discard);
            assert_eq!(args.branch, "feature");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_ingest() {
        let cli = Cli::try_parse_from([
            "hvcs", "ingest", "pages/a.html", "-f", "a.html", "--source", "crawler-2",
        ])
        .unwrap();
        if let Command::Ingest(args) = cli.command {
            assert_eq!(args.path, "pages/a.html");
            assert_eq!(args.source, "crawler-2");
            assert_eq!(args.file, Some(PathBuf::from("a.html")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_state_set() {
        let cli = Cli::try_parse_from(["hvcs", "state", "set", "cfg", "{\"a\":1}"]).unwrap();
        if let Command::State(StateArgs {
            action: StateAction::Set { key, json },
        }) = cli.command
        {
            assert_eq!(key, "cfg");
            assert_eq!(json, "{\"a\":1}");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_feedback_add() {
        let cli = Cli::try_parse_from([
            "hvcs", "feedback", "add", "main", "-s", "8", "-c", "training",
        ])
        .unwrap();
        if let Command::Feedback(FeedbackArgs {
            action: FeedbackAction::Add { severity, params, .. },
        }) = cli.command
        {
            assert_eq!(severity, 8);
            assert_eq!(params, "null");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_verbose_json() {
        let cli = Cli::try_parse_from(["hvcs", "--verbose", "--format", "json", "status"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
