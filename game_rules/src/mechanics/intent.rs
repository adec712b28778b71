//! Candidate intents - the bounded shape every player action is reduced to.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::{ItemId, LocationId};

/// What the player is trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    Take,
    Drop,
    Use,
    Examine,
    Talk,
    /// Anything else; allowed to proceed narratively.
    Other,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::Move,
        ActionKind::Take,
        ActionKind::Drop,
        ActionKind::Use,
        ActionKind::Examine,
        ActionKind::Talk,
        ActionKind::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Take => "take",
            ActionKind::Drop => "drop",
            ActionKind::Use => "use",
            ActionKind::Examine => "examine",
            ActionKind::Talk => "talk",
            ActionKind::Other => "other",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// An unvalidated proposal of a player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIntent {
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    /// Person or thing addressed, e.g. the guard in "ask the guard about the key".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Free-text reason given by the interpreter. Never inspected by the engine.
    #[serde(default)]
    pub justification: String,
}

impl CandidateIntent {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            location: None,
            item: None,
            flag: None,
            subject: None,
            justification: String::new(),
        }
    }

    /// Intent to move to a location.
    pub fn move_to(location: impl Into<String>) -> Self {
        Self::new(ActionKind::Move).with_location(location)
    }

    /// Intent to pick up an item.
    pub fn take(item: impl Into<String>) -> Self {
        Self::new(ActionKind::Take).with_item(item)
    }

    /// Intent to drop a carried item.
    pub fn drop_item(item: impl Into<String>) -> Self {
        Self::new(ActionKind::Drop).with_item(item)
    }

    /// Intent to use a carried item.
    pub fn use_item(item: impl Into<String>) -> Self {
        Self::new(ActionKind::Use).with_item(item)
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(LocationId::new(location));
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(ItemId::new(item));
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }
}

/// What the interpreter hands to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proposal {
    Intent(CandidateIntent),
    /// No usable intent could be produced (unparseable reply, timeout, ...).
    Unrecognized { reason: String },
}

impl Proposal {
    pub fn unrecognized(reason: impl Into<String>) -> Self {
        Proposal::Unrecognized {
            reason: reason.into(),
        }
    }

    pub fn intent(&self) -> Option<&CandidateIntent> {
        match self {
            Proposal::Intent(intent) => Some(intent),
            Proposal::Unrecognized { .. } => None,
        }
    }
}

impl From<CandidateIntent> for Proposal {
    fn from(intent: CandidateIntent) -> Self {
        Proposal::Intent(intent)
    }
}
