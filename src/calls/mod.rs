//! Caller-facing calls and block application.
//!
//! A block is an ordered batch of [`Transaction`]s. Each transaction is
//! applied on its own: a rejected call yields an error receipt and leaves the
//! ledger untouched, while the calls around it proceed normally.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Reward;
use crate::error::LedgerError;
use crate::ideas::{Idea, IdeaId};
use crate::ledger::Ledger;
use crate::points::Points;
use crate::Principal;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "call", rename_all = "kebab-case")]
pub enum Call {
    SubmitIdea { title: String, description: String },
    GetIdea { id: IdeaId },
    VoteOnIdea { id: IdeaId },
    GetUserPoints { who: Principal },
    HasVoted { id: IdeaId, who: Principal },
    SetRewardAmount { amount: Reward },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Call::SubmitIdea { .. } => "submit-idea",
            Call::GetIdea { .. } => "get-idea",
            Call::VoteOnIdea { .. } => "vote-on-idea",
            Call::GetUserPoints { .. } => "get-user-points",
            Call::HasVoted { .. } => "has-voted",
            Call::SetRewardAmount { .. } => "set-reward-amount",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Principal,
    #[serde(flatten)]
    pub call: Call,
}

impl Transaction {
    pub fn new(sender: impl Into<Principal>, call: Call) -> Self {
        Self {
            sender: sender.into(),
            call,
        }
    }

    pub fn dispatch(&self, ledger: &mut Ledger) -> Result<CallOutput, LedgerError> {
        let sender = &self.sender;
        match &self.call {
            Call::SubmitIdea { title, description } => ledger
                .submit_idea(sender, title, description)
                .map(CallOutput::Uint),
            Call::GetIdea { id } => Ok(CallOutput::Idea(ledger.get_idea(*id))),
            Call::VoteOnIdea { id } => ledger.vote_on_idea(sender, *id).map(CallOutput::Bool),
            Call::GetUserPoints { who } => Ok(CallOutput::Points(ledger.get_user_points(who))),
            Call::HasVoted { id, who } => Ok(CallOutput::Bool(ledger.has_voted(*id, who))),
            Call::SetRewardAmount { amount } => ledger
                .set_reward_amount(sender, *amount)
                .map(|()| CallOutput::Bool(true)),
        }
    }
}

/// Successful call result.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CallOutput {
    Uint(u64),
    Bool(bool),
    Points(Points),
    Idea(Option<Idea>),
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResult {
    Ok { value: CallOutput },
    Err { code: u32, message: String },
}

impl CallResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CallResult::Ok { .. })
    }

    pub fn value(&self) -> Option<&CallOutput> {
        match self {
            CallResult::Ok { value } => Some(value),
            CallResult::Err { .. } => None,
        }
    }

    pub fn err_code(&self) -> Option<u32> {
        match self {
            CallResult::Ok { .. } => None,
            CallResult::Err { code, .. } => Some(*code),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Receipt {
    pub sender: Principal,
    pub call: &'static str,
    pub result: CallResult,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BlockReceipt {
    pub height: u64,
    pub timestamp: u64,
    pub receipts: Vec<Receipt>,
}

impl Receipt {
    /// Caller-facing errors become error receipts; internal invariant
    /// violations are handed back to the block producer.
    fn from_outcome(
        tx: &Transaction,
        outcome: Result<CallOutput, LedgerError>,
    ) -> Result<Self, LedgerError> {
        let result = match outcome {
            Ok(value) => CallResult::Ok { value },
            Err(err) => match err.code() {
                Some(code) => CallResult::Err {
                    code: code.as_u32(),
                    message: err.to_string(),
                },
                None => return Err(err),
            },
        };
        Ok(Self {
            sender: tx.sender.clone(),
            call: tx.call.name(),
            result,
        })
    }
}

impl Ledger {
    /// Single call outside of a block; the height does not move.
    pub fn execute(&mut self, tx: &Transaction) -> Result<Receipt, LedgerError> {
        let outcome = tx.dispatch(self);
        Receipt::from_outcome(tx, outcome)
    }

    pub fn apply_block(
        &mut self,
        txs: &[Transaction],
        timestamp: u64,
    ) -> Result<BlockReceipt, LedgerError> {
        let mut receipts = Vec::with_capacity(txs.len());
        for tx in txs {
            receipts.push(self.execute(tx)?);
        }
        self.seal_block(timestamp);
        let accepted = receipts.iter().filter(|r| r.result.is_ok()).count();
        info!(
            height = self.height(),
            txs = txs.len(),
            accepted,
            "block applied"
        );
        Ok(BlockReceipt {
            height: self.height(),
            timestamp,
            receipts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    fn submit(sender: &str) -> Transaction {
        Transaction::new(
            sender,
            Call::SubmitIdea {
                title: "Test Idea".into(),
                description: "Description".into(),
            },
        )
    }

    #[test]
    fn duplicate_vote_in_one_block_fails_with_102() {
        let mut ledger = Ledger::new("deployer".into(), LedgerConfig::default());
        ledger.apply_block(&[submit("wallet_1")], 1).unwrap();

        let vote = Transaction::new("wallet_1", Call::VoteOnIdea { id: 0 });
        let block = ledger.apply_block(&[vote.clone(), vote], 2).unwrap();

        assert_eq!(block.height, 2);
        assert_eq!(block.receipts[0].result.value(), Some(&CallOutput::Bool(true)));
        assert_eq!(block.receipts[1].result.err_code(), Some(102));
        assert_eq!(ledger.get_idea(0).unwrap().votes, 1);
        assert_eq!(ledger.get_user_points(&"wallet_1".into()), 10);
    }

    #[test]
    fn failing_call_does_not_affect_neighbours() {
        let mut ledger = Ledger::new("deployer".into(), LedgerConfig::default());
        let block = ledger
            .apply_block(
                &[
                    Transaction::new("wallet_2", Call::VoteOnIdea { id: 0 }),
                    submit("wallet_1"),
                    Transaction::new("wallet_2", Call::VoteOnIdea { id: 0 }),
                    Transaction::new(
                        "wallet_2",
                        Call::GetUserPoints {
                            who: "wallet_2".into(),
                        },
                    ),
                ],
                7,
            )
            .unwrap();

        let results: Vec<&CallResult> = block.receipts.iter().map(|r| &r.result).collect();
        assert_eq!(results[0].err_code(), Some(101));
        assert_eq!(results[1].value(), Some(&CallOutput::Uint(0)));
        assert_eq!(results[2].value(), Some(&CallOutput::Bool(true)));
        assert_eq!(results[3].value(), Some(&CallOutput::Points(10)));
        assert_eq!(ledger.timestamp(), 7);
    }

    #[test]
    fn transactions_parse_from_flat_json() {
        let raw = r#"[
            {"sender": "wallet_1", "call": "submit-idea", "title": "T", "description": "D"},
            {"sender": "wallet_2", "call": "vote-on-idea", "id": 0},
            {"sender": "wallet_2", "call": "has-voted", "id": 0, "who": "wallet_2"}
        ]"#;
        let txs: Vec<Transaction> = serde_json::from_str(raw).unwrap();
        assert_eq!(txs[1], Transaction::new("wallet_2", Call::VoteOnIdea { id: 0 }));

        let mut ledger = Ledger::new("deployer".into(), LedgerConfig::default());
        let block = ledger.apply_block(&txs, 0).unwrap();
        assert_eq!(block.receipts[2].result.value(), Some(&CallOutput::Bool(true)));
        assert_eq!(block.receipts[2].call, "has-voted");
    }

    #[test]
    fn validation_errors_carry_code_103() {
        let mut ledger = Ledger::new("deployer".into(), LedgerConfig::default());
        let tx = Transaction::new(
            "wallet_1",
            Call::SubmitIdea {
                title: "x".repeat(40),
                description: String::new(),
            },
        );
        let receipt = ledger.execute(&tx).unwrap();
        assert_eq!(receipt.result.err_code(), Some(103));
        assert_eq!(ledger.idea_count(), 0);
        assert_eq!(ledger.height(), 0);
    }
}
