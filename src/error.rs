use thiserror::Error;

use crate::ideas::IdeaId;
use crate::Principal;

/// Numeric codes relayed to callers for rejected calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    OwnerOnly = 100,
    IdeaNotFound = 101,
    AlreadyVoted = 102,
    InvalidInput = 103,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

/// Canonical error type for every ledger operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Title longer than the configured bound.
    #[error("title is {len} bytes, limit is {max}")]
    TitleTooLong { len: usize, max: usize },

    /// Titles are restricted to printable ASCII and whitespace.
    #[error("title contains non-ASCII or control characters")]
    TitleNotPrintable,

    /// Description longer than the configured bound.
    #[error("description is {len} bytes, limit is {max}")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("reward amount must be greater than zero")]
    ZeroReward,

    #[error("idea {0} does not exist")]
    IdeaNotFound(IdeaId),

    #[error("{voter} already voted on idea {idea_id}")]
    AlreadyVoted { idea_id: IdeaId, voter: Principal },

    #[error("{caller} is not the ledger owner")]
    OwnerOnly { caller: Principal },

    /// Orchestration bug; never produced by well-formed calls.
    #[error("ledger invariant violated: {0}")]
    Invariant(String),

    #[error("snapshot state root mismatch: expected {expected}, computed {computed}")]
    CorruptSnapshot { expected: String, computed: String },

    #[error("inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),
}

impl LedgerError {
    /// Caller-facing code, `None` for internal failures.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            LedgerError::TitleTooLong { .. }
            | LedgerError::TitleNotPrintable
            | LedgerError::DescriptionTooLong { .. }
            | LedgerError::ZeroReward => Some(ErrorCode::InvalidInput),
            LedgerError::IdeaNotFound(_) => Some(ErrorCode::IdeaNotFound),
            LedgerError::AlreadyVoted { .. } => Some(ErrorCode::AlreadyVoted),
            LedgerError::OwnerOnly { .. } => Some(ErrorCode::OwnerOnly),
            LedgerError::Invariant(_)
            | LedgerError::CorruptSnapshot { .. }
            | LedgerError::InconsistentSnapshot(_) => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.code() == Some(ErrorCode::InvalidInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_contract_constants() {
        assert_eq!(ErrorCode::OwnerOnly.as_u32(), 100);
        assert_eq!(ErrorCode::IdeaNotFound.as_u32(), 101);
        assert_eq!(ErrorCode::AlreadyVoted.as_u32(), 102);
        let dup = LedgerError::AlreadyVoted {
            idea_id: 0,
            voter: Principal::from("alice"),
        };
        assert_eq!(dup.code(), Some(ErrorCode::AlreadyVoted));
        assert!(LedgerError::TitleNotPrintable.is_validation());
        assert_eq!(LedgerError::Invariant("x".into()).code(), None);
    }
}
