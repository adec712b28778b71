//! Turn records - the append-only history of a session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GameState, StateChange};
use crate::mechanics::{Proposal, TurnOutcome};

/// Unique identifier for turn records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What happened in one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: TurnId,
    /// 1-based position in the session.
    pub number: u32,
    /// Player's raw text.
    pub input: String,
    pub proposal: Proposal,
    pub outcome: TurnOutcome,
    pub changes: Vec<StateChange>,
    /// State after the turn resolved.
    pub state: GameState,
}

/// Append-only list of turn records.
///
/// Records are only handed out by shared reference, so once appended they
/// never change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnLog {
    records: Vec<TurnRecord>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return it.
    pub fn append(
        &mut self,
        input: impl Into<String>,
        proposal: Proposal,
        outcome: TurnOutcome,
        changes: Vec<StateChange>,
        state: GameState,
    ) -> &TurnRecord {
        let number = self.records.len() as u32 + 1;
        self.records.push(TurnRecord {
            id: TurnId::new(),
            number,
            input: input.into(),
            proposal,
            outcome,
            changes,
            state,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[TurnRecord] {
        &self.records
    }

    /// The last `window` records, oldest first.
    pub fn recent(&self, window: usize) -> &[TurnRecord] {
        let start = self.records.len().saturating_sub(window);
        &self.records[start..]
    }

    pub fn last(&self) -> Option<&TurnRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::{ActionKind, CandidateIntent};

    #[test]
    fn test_append_numbers_turns() {
        let mut log = TurnLog::new();
        for text in ["look", "wait", "sing"] {
            log.append(
                text,
                Proposal::Intent(CandidateIntent::new(ActionKind::Other)),
                TurnOutcome::NarrativeOnly { rule: None },
                Vec::new(),
                GameState::default(),
            );
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.records()[0].number, 1);
        assert_eq!(log.last().unwrap().input, "sing");

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].input, "wait");
        assert_eq!(log.recent(10).len(), 3);
        assert_ne!(log.records()[0].id, log.records()[1].id);
    }
}
