//! Idea registry: sequential ids, idea content, live vote counts.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::Principal;

pub type IdeaId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Idea {
    pub id: IdeaId,
    pub title: String,
    pub description: String,
    pub author: Principal,
    pub votes: u64,
}

/// Length bounds applied on submission, in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextBounds {
    pub max_title_len: usize,
    pub max_description_len: usize,
}

impl TextBounds {
    pub fn check(&self, title: &str, description: &str) -> Result<(), LedgerError> {
        if !title.bytes().all(is_title_byte) {
            return Err(LedgerError::TitleNotPrintable);
        }
        if title.len() > self.max_title_len {
            return Err(LedgerError::TitleTooLong {
                len: title.len(),
                max: self.max_title_len,
            });
        }
        if description.len() > self.max_description_len {
            return Err(LedgerError::DescriptionTooLong {
                len: description.len(),
                max: self.max_description_len,
            });
        }
        Ok(())
    }
}

fn is_title_byte(b: u8) -> bool {
    b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Ideas are stored densely: the idea with id `n` lives at index `n`, so the
/// next id is always the number of stored ideas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdeaRegistry {
    ideas: Vec<Idea>,
}

impl IdeaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from ideas in id order. Fails unless ids are `0..n`.
    pub fn from_ideas(ideas: Vec<Idea>) -> Result<Self, LedgerError> {
        for (idx, idea) in ideas.iter().enumerate() {
            if idea.id != idx as IdeaId {
                return Err(LedgerError::InconsistentSnapshot(format!(
                    "idea at position {idx} carries id {}",
                    idea.id
                )));
            }
        }
        Ok(Self { ideas })
    }

    pub fn submit(
        &mut self,
        bounds: &TextBounds,
        title: &str,
        description: &str,
        author: &Principal,
    ) -> Result<IdeaId, LedgerError> {
        bounds.check(title, description)?;
        let id = self.next_id();
        self.ideas.push(Idea {
            id,
            title: title.to_string(),
            description: description.to_string(),
            author: author.clone(),
            votes: 0,
        });
        Ok(id)
    }

    pub fn get(&self, id: IdeaId) -> Option<&Idea> {
        usize::try_from(id).ok().and_then(|idx| self.ideas.get(idx))
    }

    pub fn contains(&self, id: IdeaId) -> bool {
        self.get(id).is_some()
    }

    /// Only the voting flow calls this, after it has checked the id exists.
    pub(crate) fn increment_votes(&mut self, id: IdeaId) -> Result<u64, LedgerError> {
        let idea = usize::try_from(id)
            .ok()
            .and_then(|idx| self.ideas.get_mut(idx))
            .ok_or_else(|| {
                LedgerError::Invariant(format!("vote count increment on missing idea {id}"))
            })?;
        idea.votes += 1;
        Ok(idea.votes)
    }

    pub fn next_id(&self) -> IdeaId {
        self.ideas.len() as IdeaId
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Idea> {
        self.ideas.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: TextBounds = TextBounds {
        max_title_len: 32,
        max_description_len: 256,
    };

    fn alice() -> Principal {
        Principal::from("alice")
    }

    #[test]
    fn ids_are_sequential_from_zero() {
        let mut registry = IdeaRegistry::new();
        for expected in 0..5 {
            let id = registry.submit(&BOUNDS, "Same", "Same text", &alice()).unwrap();
            assert_eq!(id, expected);
        }
        assert_eq!(registry.next_id(), 5);
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn bounds_are_enforced_before_allocation() {
        let mut registry = IdeaRegistry::new();
        let long_title = "t".repeat(33);
        let err = registry.submit(&BOUNDS, &long_title, "", &alice()).unwrap_err();
        assert_eq!(err, LedgerError::TitleTooLong { len: 33, max: 32 });

        let err = registry.submit(&BOUNDS, "Café", "", &alice()).unwrap_err();
        assert_eq!(err, LedgerError::TitleNotPrintable);

        for title in ["nul\0byte", "esc\x1b[31m", "bell\x07", "del\x7f"] {
            let err = registry.submit(&BOUNDS, title, "", &alice()).unwrap_err();
            assert_eq!(err, LedgerError::TitleNotPrintable);
        }

        // 86 three-byte characters = 258 bytes
        let long_desc = "€".repeat(86);
        let err = registry.submit(&BOUNDS, "ok", &long_desc, &alice()).unwrap_err();
        assert_eq!(err, LedgerError::DescriptionTooLong { len: 258, max: 256 });

        assert!(registry.is_empty());
        assert_eq!(registry.next_id(), 0);
    }

    #[test]
    fn limits_are_inclusive_and_description_accepts_unicode() {
        let mut registry = IdeaRegistry::new();
        let title = "x".repeat(32);
        let desc = "ü".repeat(128);
        let id = registry.submit(&BOUNDS, &title, &desc, &alice()).unwrap();
        let idea = registry.get(id).unwrap();
        assert_eq!(idea.title, title);
        assert_eq!(idea.description, desc);
        assert_eq!(idea.author, alice());
        assert_eq!(idea.votes, 0);
    }

    #[test]
    fn titles_accept_punctuation_and_whitespace() {
        let mut registry = IdeaRegistry::new();
        let id = registry
            .submit(&BOUNDS, "Tabs\tand\nlines, ok? ~{}!", "", &alice())
            .unwrap();
        assert_eq!(registry.get(id).unwrap().title, "Tabs\tand\nlines, ok? ~{}!");
    }

    #[test]
    fn get_on_unassigned_id_is_absent() {
        let mut registry = IdeaRegistry::new();
        registry.submit(&BOUNDS, "a", "b", &alice()).unwrap();
        assert!(registry.get(1).is_none());
        assert!(registry.get(u64::MAX).is_none());
    }

    #[test]
    fn increment_on_missing_idea_is_an_invariant_violation() {
        let mut registry = IdeaRegistry::new();
        let err = registry.increment_votes(3).unwrap_err();
        assert!(matches!(err, LedgerError::Invariant(_)));
        assert_eq!(err.code(), None);

        registry.submit(&BOUNDS, "a", "b", &alice()).unwrap();
        assert_eq!(registry.increment_votes(0).unwrap(), 1);
        assert_eq!(registry.increment_votes(0).unwrap(), 2);
    }

    #[test]
    fn from_ideas_rejects_gaps() {
        let idea = Idea {
            id: 1,
            title: "a".into(),
            description: String::new(),
            author: alice(),
            votes: 0,
        };
        assert!(IdeaRegistry::from_ideas(vec![idea]).is_err());
    }
}
