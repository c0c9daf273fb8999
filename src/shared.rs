use std::sync::Arc;

use parking_lot::Mutex;

use crate::calls::{BlockReceipt, Receipt, Transaction};
use crate::config::Reward;
use crate::error::LedgerError;
use crate::ideas::{Idea, IdeaId};
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::points::Points;
use crate::Principal;

/// Cloneable handle for hosts that call into one ledger from several
/// threads. Each operation holds the lock for its whole duration, so the
/// has-voted check and the vote commit can never interleave with another
/// call.
#[derive(Clone, Debug)]
pub struct SharedLedger {
    inner: Arc<Mutex<Ledger>>,
}

impl SharedLedger {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    pub fn submit_idea(
        &self,
        caller: &Principal,
        title: &str,
        description: &str,
    ) -> Result<IdeaId, LedgerError> {
        self.inner.lock().submit_idea(caller, title, description)
    }

    pub fn get_idea(&self, id: IdeaId) -> Option<Idea> {
        self.inner.lock().get_idea(id)
    }

    pub fn vote_on_idea(&self, voter: &Principal, idea_id: IdeaId) -> Result<bool, LedgerError> {
        self.inner.lock().vote_on_idea(voter, idea_id)
    }

    pub fn get_user_points(&self, who: &Principal) -> Points {
        self.inner.lock().get_user_points(who)
    }

    pub fn has_voted(&self, idea_id: IdeaId, who: &Principal) -> bool {
        self.inner.lock().has_voted(idea_id, who)
    }

    pub fn set_reward_amount(&self, caller: &Principal, amount: Reward) -> Result<(), LedgerError> {
        self.inner.lock().set_reward_amount(caller, amount)
    }

    pub fn execute(&self, tx: &Transaction) -> Result<Receipt, LedgerError> {
        self.inner.lock().execute(tx)
    }

    pub fn apply_block(&self, txs: &[Transaction], timestamp: u64) -> Result<BlockReceipt, LedgerError> {
        self.inner.lock().apply_block(txs, timestamp)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().snapshot()
    }

    /// Runs `f` with exclusive access, for multi-call sequences that must
    /// observe no other writer.
    pub fn with<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> R {
        f(&mut *self.inner.lock())
    }
}
