use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::{SystemTime, UNIX_EPOCH},
};

use bright_pulse::{
    store, Call, IdeaId, Ledger, LedgerConfig, Principal, Receipt, Reward, Transaction,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bright-pulse", version, about = "Idea submission and voting ledger")]
struct Cli {
    /// Ledger state file (JSON snapshot)
    #[arg(long, global = true, default_value = "bright-pulse.json")]
    state: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create a new ledger owned by <owner>
    Init {
        #[arg(long)]
        owner: String,
        /// JSON file with reward_amount / max_title_len / max_description_len
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Submit an idea
    Submit {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
    /// Vote on an idea
    Vote {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        id: IdeaId,
    },
    /// Show an idea
    Idea {
        #[arg(long)]
        id: IdeaId,
    },
    /// Show the reward points of a principal
    Points {
        #[arg(long)]
        who: String,
    },
    /// Check whether a principal voted on an idea
    HasVoted {
        #[arg(long)]
        id: IdeaId,
        #[arg(long)]
        who: String,
    },
    /// Change the reward per vote (owner only)
    SetReward {
        #[arg(long)]
        caller: String,
        #[arg(long)]
        amount: Reward,
    },
    /// Apply a JSON array of transactions as one block
    Mine {
        #[arg(long)]
        batch: PathBuf,
        /// Block timestamp in seconds, defaults to now
        #[arg(long)]
        timestamp: Option<u64>,
    },
    /// Print the full ledger snapshot
    Snapshot,
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    process::exit(2);
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e),
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Runs one call under the state-file lock, persists on success and exits 1
/// on a rejected call.
fn run_call(state: &Path, tx: Transaction, mutates: bool) {
    let receipt: Receipt = store::update(state, |ledger| {
        let receipt = ledger.execute(&tx)?;
        let changed = mutates && receipt.result.is_ok();
        Ok((receipt, changed))
    })
    .unwrap_or_else(|e| fail(e));
    print_json(&receipt);
    if !receipt.result.is_ok() {
        process::exit(1);
    }
}

fn init_cmd(state: &Path, owner: String, config: Option<PathBuf>, force: bool) {
    let config = match config {
        Some(path) => LedgerConfig::from_json_file(&path).unwrap_or_else(|e| fail(e)),
        None => LedgerConfig::default(),
    };
    let ledger = Ledger::new(Principal::from(owner), config);
    store::create(state, &ledger, force).unwrap_or_else(|e| fail(e));
    tracing::info!(state = %state.display(), owner = %ledger.owner(), "ledger initialized");
    print_json(&ledger.snapshot());
}

fn mine_cmd(state: &Path, batch: &Path, timestamp: Option<u64>) {
    let raw = fs::read(batch).unwrap_or_else(|e| fail(format!("{}: {e}", batch.display())));
    let txs: Vec<Transaction> =
        serde_json::from_slice(&raw).unwrap_or_else(|e| fail(format!("{}: {e}", batch.display())));
    let block = store::update(state, |ledger| {
        let block = ledger.apply_block(&txs, timestamp.unwrap_or_else(now))?;
        Ok((block, true))
    })
    .unwrap_or_else(|e| fail(e));
    print_json(&block);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let state = cli.state.as_path();
    match cli.cmd {
        Cmd::Init {
            owner,
            config,
            force,
        } => init_cmd(state, owner, config, force),
        Cmd::Submit {
            caller,
            title,
            description,
        } => run_call(
            state,
            Transaction::new(caller, Call::SubmitIdea { title, description }),
            true,
        ),
        Cmd::Vote { caller, id } => {
            run_call(state, Transaction::new(caller, Call::VoteOnIdea { id }), true)
        }
        Cmd::Idea { id } => run_call(state, Transaction::new("cli", Call::GetIdea { id }), false),
        Cmd::Points { who } => {
            let tx = Transaction::new(who.clone(), Call::GetUserPoints { who: who.into() });
            run_call(state, tx, false)
        }
        Cmd::HasVoted { id, who } => {
            let tx = Transaction::new(who.clone(), Call::HasVoted { id, who: who.into() });
            run_call(state, tx, false)
        }
        Cmd::SetReward { caller, amount } => run_call(
            state,
            Transaction::new(caller, Call::SetRewardAmount { amount }),
            true,
        ),
        Cmd::Mine { batch, timestamp } => mine_cmd(state, &batch, timestamp),
        Cmd::Snapshot => {
            let snapshot = store::read(state, |ledger| ledger.snapshot()).unwrap_or_else(|e| fail(e));
            print_json(&snapshot)
        }
    }
}
