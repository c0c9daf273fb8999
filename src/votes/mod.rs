//! Vote ledger: the set of `(idea, voter)` pairs that have voted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ideas::IdeaId;
use crate::Principal;

/// Existence of a record is the "has voted" fact.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct VoteRecord {
    pub idea_id: IdeaId,
    pub voter: Principal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoteLedger {
    records: BTreeSet<(IdeaId, Principal)>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_voted(&self, idea_id: IdeaId, voter: &Principal) -> bool {
        self.records.contains(&(idea_id, voter.clone()))
    }

    /// Checks and inserts in one step.
    pub fn record_vote(&mut self, idea_id: IdeaId, voter: &Principal) -> Result<(), LedgerError> {
        if !self.records.insert((idea_id, voter.clone())) {
            return Err(LedgerError::AlreadyVoted {
                idea_id,
                voter: voter.clone(),
            });
        }
        Ok(())
    }

    pub fn votes_for(&self, idea_id: IdeaId) -> usize {
        self.records
            .range((idea_id, Principal::default())..)
            .take_while(|(id, _)| *id == idea_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = VoteRecord> + '_ {
        self.records.iter().map(|(idea_id, voter)| VoteRecord {
            idea_id: *idea_id,
            voter: voter.clone(),
        })
    }
}

impl FromIterator<VoteRecord> for VoteLedger {
    fn from_iter<T: IntoIterator<Item = VoteRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().map(|r| (r.idea_id, r.voter)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_vote_for_same_pair_is_rejected() {
        let mut ledger = VoteLedger::new();
        let bob = Principal::from("bob");
        assert!(!ledger.has_voted(0, &bob));
        ledger.record_vote(0, &bob).unwrap();
        assert!(ledger.has_voted(0, &bob));

        let err = ledger.record_vote(0, &bob).unwrap_err();
        assert_eq!(
            err,
            LedgerError::AlreadyVoted {
                idea_id: 0,
                voter: bob.clone()
            }
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn pairs_are_independent() {
        let mut ledger = VoteLedger::new();
        let alice = Principal::from("alice");
        let bob = Principal::from("bob");
        ledger.record_vote(0, &alice).unwrap();
        ledger.record_vote(0, &bob).unwrap();
        ledger.record_vote(1, &alice).unwrap();
        assert!(!ledger.has_voted(1, &bob));
        assert_eq!(ledger.votes_for(0), 2);
        assert_eq!(ledger.votes_for(1), 1);
        assert_eq!(ledger.votes_for(2), 0);
    }

    #[test]
    fn collects_from_records() {
        let ledger: VoteLedger = vec![
            VoteRecord {
                idea_id: 2,
                voter: "carol".into(),
            },
            VoteRecord {
                idea_id: 0,
                voter: "alice".into(),
            },
        ]
        .into_iter()
        .collect();
        let ids: Vec<IdeaId> = ledger.records().map(|r| r.idea_id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
