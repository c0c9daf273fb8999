//! Idea submission and community voting ledger.
//!
//! Participants submit ideas, other participants vote on them once each, and
//! every successful vote credits the voter with reward points. The crate is
//! split into the stores the ledger is made of and the layer that composes
//! them:
//!
//! * [`ideas`] — sequential ids, idea content and live vote counts.
//! * [`votes`] — the `(idea, voter)` records that prevent duplicate votes.
//! * [`points`] — per-principal reward balances.
//! * [`ledger`] — the [`Ledger`] owning all three, its events and snapshots.
//! * [`calls`] — caller-facing calls, receipts and block application.
//! * [`shared`] — a thread-safe handle serializing access to one ledger.
//!
//! Authentication, transaction transport and block production belong to the
//! host; the ledger trusts the caller identity it is handed.

pub mod calls;
pub mod config;
pub mod ideas;
pub mod ledger;
pub mod points;
pub mod shared;
pub mod store;
pub mod votes;

mod error;

pub use calls::{BlockReceipt, Call, CallOutput, CallResult, Receipt, Transaction};
pub use config::{ConfigError, LedgerConfig, Reward};
pub use error::{ErrorCode, LedgerError};
pub use ideas::{Idea, IdeaId};
pub use ledger::{Ledger, LedgerEvent, LedgerSnapshot, Principal};
pub use points::Points;
pub use shared::SharedLedger;
