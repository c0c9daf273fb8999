use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::config::{LedgerConfig, Reward};
use crate::error::LedgerError;
use crate::ideas::{Idea, IdeaId, IdeaRegistry, TextBounds};
use crate::points::{Points, PointsStore};
use crate::votes::{VoteLedger, VoteRecord};

/// Opaque caller identity supplied by the host. Only compared for equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    IdeaSubmitted {
        id: IdeaId,
        author: Principal,
    },
    VoteCast {
        idea_id: IdeaId,
        voter: Principal,
        votes: u64,
    },
    PointsCredited {
        to: Principal,
        amount: Reward,
    },
    RewardChanged {
        amount: Reward,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub owner: Principal,
    pub config: LedgerConfig,
    pub ideas: Vec<Idea>,
    pub votes: Vec<VoteRecord>,
    pub points: BTreeMap<Principal, Points>,
    pub events: Vec<LedgerEvent>,
    #[serde(with = "hex_root")]
    pub state_root: [u8; 32],
}

/// The three stores plus the rules they are mutated under. Every mutation
/// goes through `&mut self`, so one call runs to completion before the next.
#[derive(Clone, Debug)]
pub struct Ledger {
    meta: SnapshotMetadata,
    owner: Principal,
    config: LedgerConfig,
    ideas: IdeaRegistry,
    votes: VoteLedger,
    points: PointsStore,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    pub fn new(owner: Principal, config: LedgerConfig) -> Self {
        Self {
            meta: SnapshotMetadata::default(),
            owner,
            config,
            ideas: IdeaRegistry::new(),
            votes: VoteLedger::new(),
            points: PointsStore::new(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn ideas(&self) -> &IdeaRegistry {
        &self.ideas
    }

    pub fn votes(&self) -> &VoteLedger {
        &self.votes
    }

    pub fn points(&self) -> &PointsStore {
        &self.points
    }

    fn bounds(&self) -> TextBounds {
        TextBounds {
            max_title_len: self.config.max_title_len,
            max_description_len: self.config.max_description_len,
        }
    }

    pub fn submit_idea(
        &mut self,
        caller: &Principal,
        title: &str,
        description: &str,
    ) -> Result<IdeaId, LedgerError> {
        let bounds = self.bounds();
        let id = self
            .ideas
            .submit(&bounds, title, description, caller)
            .map_err(|err| {
                debug!(%caller, %err, "idea rejected");
                err
            })?;
        self.events.push(LedgerEvent::IdeaSubmitted {
            id,
            author: caller.clone(),
        });
        info!(id, author = %caller, "idea submitted");
        Ok(id)
    }

    pub fn get_idea(&self, id: IdeaId) -> Option<Idea> {
        self.ideas.get(id).cloned()
    }

    /// Existence and duplicate checks run before any store is touched; the
    /// record, the count increment and the credit then commit together.
    pub fn vote_on_idea(&mut self, voter: &Principal, idea_id: IdeaId) -> Result<bool, LedgerError> {
        if !self.ideas.contains(idea_id) {
            debug!(idea_id, %voter, "vote on unknown idea");
            return Err(LedgerError::IdeaNotFound(idea_id));
        }
        if self.votes.has_voted(idea_id, voter) {
            debug!(idea_id, %voter, "duplicate vote");
            return Err(LedgerError::AlreadyVoted {
                idea_id,
                voter: voter.clone(),
            });
        }

        self.votes.record_vote(idea_id, voter)?;
        let votes = self.ideas.increment_votes(idea_id).map_err(|err| {
            error!(idea_id, %voter, %err, "vote recorded without a matching idea");
            err
        })?;
        let reward = self.config.reward_amount;
        let balance = self.points.credit(voter, Points::from(reward));

        self.events.push(LedgerEvent::VoteCast {
            idea_id,
            voter: voter.clone(),
            votes,
        });
        self.events.push(LedgerEvent::PointsCredited {
            to: voter.clone(),
            amount: reward,
        });
        info!(idea_id, %voter, votes, balance = %balance, "vote recorded");
        Ok(true)
    }

    pub fn get_user_points(&self, who: &Principal) -> Points {
        self.points.balance_of(who)
    }

    pub fn has_voted(&self, idea_id: IdeaId, who: &Principal) -> bool {
        self.votes.has_voted(idea_id, who)
    }

    pub fn idea_count(&self) -> u64 {
        self.ideas.next_id()
    }

    pub fn reward_amount(&self) -> Reward {
        self.config.reward_amount
    }

    /// Applies to votes recorded after the change only.
    pub fn set_reward_amount(&mut self, caller: &Principal, amount: Reward) -> Result<(), LedgerError> {
        if caller != &self.owner {
            warn!(%caller, "reward change by non-owner rejected");
            return Err(LedgerError::OwnerOnly {
                caller: caller.clone(),
            });
        }
        if amount == 0 {
            return Err(LedgerError::ZeroReward);
        }
        self.config.reward_amount = amount;
        self.events.push(LedgerEvent::RewardChanged { amount });
        info!(amount, "reward amount changed");
        Ok(())
    }

    /// Number of blocks applied so far.
    pub fn height(&self) -> u64 {
        self.meta.height
    }

    pub fn timestamp(&self) -> u64 {
        self.meta.timestamp
    }

    pub(crate) fn seal_block(&mut self, timestamp: u64) {
        self.meta.height += 1;
        self.meta.timestamp = timestamp;
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.owner, &self.config, &self.ideas, &self.votes, &self.points)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            owner: self.owner.clone(),
            config: self.config.clone(),
            ideas: self.ideas.iter().cloned().collect(),
            votes: self.votes.records().collect(),
            points: self.points.accounts().clone(),
            events: self.events.clone(),
            state_root: self.state_root(),
        }
    }

    /// Rebuilds a ledger from a snapshot. The root only catches accidental
    /// damage, so the config and the stores are re-checked against each
    /// other and against the event log.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, LedgerError> {
        snapshot
            .config
            .validate()
            .map_err(|err| LedgerError::InconsistentSnapshot(err.to_string()))?;
        let ideas = IdeaRegistry::from_ideas(snapshot.ideas)?;
        let votes: VoteLedger = snapshot.votes.into_iter().collect();
        let points = PointsStore::from(snapshot.points);

        let computed = compute_state_root(&snapshot.owner, &snapshot.config, &ideas, &votes, &points);
        if computed != snapshot.state_root {
            return Err(LedgerError::CorruptSnapshot {
                expected: hex::encode(snapshot.state_root),
                computed: hex::encode(computed),
            });
        }
        check_consistency(&ideas, &votes)?;
        check_event_log(&snapshot.events, &votes, &points)?;

        Ok(Self {
            meta: snapshot.meta,
            owner: snapshot.owner,
            config: snapshot.config,
            ideas,
            votes,
            points,
            events: snapshot.events,
        })
    }
}

fn check_consistency(ideas: &IdeaRegistry, votes: &VoteLedger) -> Result<(), LedgerError> {
    if let Some(orphan) = votes.records().find(|r| !ideas.contains(r.idea_id)) {
        return Err(LedgerError::InconsistentSnapshot(format!(
            "vote by {} references missing idea {}",
            orphan.voter, orphan.idea_id
        )));
    }
    for idea in ideas.iter() {
        let recorded = votes.votes_for(idea.id) as u64;
        if idea.votes != recorded {
            return Err(LedgerError::InconsistentSnapshot(format!(
                "idea {} counts {} votes but {} are recorded",
                idea.id, idea.votes, recorded
            )));
        }
    }
    Ok(())
}

/// Every vote record has exactly one `VoteCast` and every balance is the
/// sum of its `PointsCredited` events, one credit per vote.
fn check_event_log(
    events: &[LedgerEvent],
    votes: &VoteLedger,
    points: &PointsStore,
) -> Result<(), LedgerError> {
    let mut cast: BTreeMap<(IdeaId, &Principal), u32> = BTreeMap::new();
    let mut credited: BTreeMap<&Principal, (Points, usize)> = BTreeMap::new();
    for event in events {
        match event {
            LedgerEvent::VoteCast { idea_id, voter, .. } => {
                *cast.entry((*idea_id, voter)).or_default() += 1;
            }
            LedgerEvent::PointsCredited { to, amount } => {
                let entry = credited.entry(to).or_default();
                entry.0 = entry.0.saturating_add(Points::from(*amount));
                entry.1 += 1;
            }
            LedgerEvent::IdeaSubmitted { .. } | LedgerEvent::RewardChanged { .. } => {}
        }
    }

    if let Some(((idea_id, voter), n)) = cast.iter().find(|(_, n)| **n != 1) {
        return Err(LedgerError::InconsistentSnapshot(format!(
            "{voter} has {n} vote events for idea {idea_id}"
        )));
    }
    let recorded = votes.records().map(|r| (r.idea_id, r.voter));
    if !recorded.eq(cast.keys().map(|(id, voter)| (*id, (*voter).clone()))) {
        return Err(LedgerError::InconsistentSnapshot(
            "vote records do not match the vote events".to_string(),
        ));
    }

    let mut votes_by_voter: BTreeMap<&Principal, usize> = BTreeMap::new();
    for (_, voter) in cast.keys() {
        *votes_by_voter.entry(*voter).or_default() += 1;
    }
    if credited.len() != points.accounts().len() {
        return Err(LedgerError::InconsistentSnapshot(format!(
            "{} credited principals but {} point accounts",
            credited.len(),
            points.accounts().len()
        )));
    }
    for (who, balance) in points.accounts() {
        let (sum, credits) = credited.get(who).copied().unwrap_or_default();
        if sum != *balance {
            return Err(LedgerError::InconsistentSnapshot(format!(
                "{who} holds {balance} points but was credited {sum}"
            )));
        }
        let cast_votes = votes_by_voter.get(who).copied().unwrap_or(0);
        if credits != cast_votes {
            return Err(LedgerError::InconsistentSnapshot(format!(
                "{who} received {credits} credits for {cast_votes} votes"
            )));
        }
    }
    Ok(())
}

const LEAF: u8 = 0x00;
const NODE: u8 = 0x01;

/// Length-prefixed parts under a domain tag.
fn leaf(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF]);
    hasher.update(tag.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn compute_state_root(
    owner: &Principal,
    config: &LedgerConfig,
    ideas: &IdeaRegistry,
    votes: &VoteLedger,
    points: &PointsStore,
) -> [u8; 32] {
    let mut leaves = vec![leaf(
        "config",
        &[
            owner.as_str().as_bytes(),
            &config.reward_amount.to_le_bytes(),
            &(config.max_title_len as u64).to_le_bytes(),
            &(config.max_description_len as u64).to_le_bytes(),
        ],
    )];
    leaves.extend(ideas.iter().map(|idea| {
        leaf(
            "idea",
            &[
                &idea.id.to_le_bytes(),
                idea.title.as_bytes(),
                idea.description.as_bytes(),
                idea.author.as_str().as_bytes(),
                &idea.votes.to_le_bytes(),
            ],
        )
    }));
    leaves.extend(votes.records().map(|record| {
        leaf(
            "vote",
            &[&record.idea_id.to_le_bytes(), record.voter.as_str().as_bytes()],
        )
    }));
    leaves.extend(
        points
            .accounts()
            .iter()
            .map(|(who, balance)| leaf("points", &[who.as_str().as_bytes(), &balance.to_le_bytes()])),
    );
    fold_root(leaves)
}

/// Pairs neighbours level by level, carrying an odd last node up unchanged.
/// The root also commits to the leaf count.
fn fold_root(leaves: Vec<[u8; 32]>) -> [u8; 32] {
    let count = leaves.len() as u64;
    let mut level = leaves;
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut hasher = Sha256::new();
                    hasher.update([NODE]);
                    hasher.update(left);
                    hasher.update(right);
                    hasher.finalize().into()
                }
                _ => pair[0],
            })
            .collect();
    }
    let mut hasher = Sha256::new();
    hasher.update(b"bright-pulse/root");
    hasher.update(count.to_le_bytes());
    hasher.update(level.first().copied().unwrap_or([0u8; 32]));
    hasher.finalize().into()
}

mod hex_root {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("state root must be 32 bytes"))
    }
}
