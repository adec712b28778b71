//! Turn outcomes and narrative directives.

use serde::{Deserialize, Serialize};

use super::ActionKind;
use crate::entities::{EntityType, ItemId, LocationId};
use crate::rule_set::humanize;
use crate::world_state::{GameState, StateChange};

/// A candidate intent that collides with the world's mechanics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    #[error("to {action} you must name a {target}")]
    MissingTarget {
        action: ActionKind,
        target: EntityType,
    },
    #[error("there is no place called {}", humanize(.0.as_str()))]
    UnknownLocation(LocationId),
    #[error("there is no such thing as a {}", humanize(.0.as_str()))]
    UnknownItem(ItemId),
    #[error("nothing in this world is called {}", humanize(.0))]
    UnknownFlag(String),
    #[error("you are already at the {}", humanize(.0.as_str()))]
    AlreadyThere(LocationId),
    #[error("the {} cannot be reached from the {}", humanize(.to.as_str()), humanize(.from.as_str()))]
    NotAdjacent { from: LocationId, to: LocationId },
    #[error("you are not carrying the {}", humanize(.0.as_str()))]
    NotCarried(ItemId),
    #[error("you already have the {}", humanize(.0.as_str()))]
    AlreadyCarried(ItemId),
    #[error("there is no {} here", humanize(.0.as_str()))]
    NotHere(ItemId),
    #[error("you cannot carry more than {limit} items")]
    InventoryFull { limit: usize },
}

/// Why a turn was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("unrecognized intent: {reason}")]
    Unrecognized { reason: String },
    #[error("rule violation: {0}")]
    RuleViolation(Violation),
    #[error("precondition failed: {reason}")]
    PreconditionFailed {
        /// Rule or exit whose guard failed.
        rule: Option<String>,
        reason: String,
    },
}

/// Terminal state of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The world changed.
    Applied { rule: Option<String> },
    /// Accepted without mechanical effect.
    NarrativeOnly { rule: Option<String> },
    /// Refused; the world is unchanged.
    Rejected(Rejection),
}

impl TurnOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TurnOutcome::Applied { .. })
    }

    pub fn is_narrative_only(&self) -> bool {
        matches!(self, TurnOutcome::NarrativeOnly { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, TurnOutcome::Rejected(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            TurnOutcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Id of the rule that decided the turn.
    pub fn rule(&self) -> Option<&str> {
        match self {
            TurnOutcome::Applied { rule } | TurnOutcome::NarrativeOnly { rule } => rule.as_deref(),
            TurnOutcome::Rejected(Rejection::PreconditionFailed { rule, .. }) => rule.as_deref(),
            TurnOutcome::Rejected(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TurnOutcome::Applied { .. } => "applied",
            TurnOutcome::NarrativeOnly { .. } => "narrative_only",
            TurnOutcome::Rejected(_) => "rejected",
        }
    }
}

/// Structured description of a mechanical outcome for the narrator to render.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NarrativeDirective {
    /// Plain statement of what happened, usable as-is.
    pub text: String,
    pub changes: Vec<StateChange>,
}

impl NarrativeDirective {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            changes: Vec::new(),
        }
    }

    pub fn with_changes(mut self, changes: Vec<StateChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// Result of resolving one intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The authoritative next state.
    pub state: GameState,
    pub outcome: TurnOutcome,
    pub directive: NarrativeDirective,
}

impl Resolution {
    /// A rejection: the state is handed back untouched.
    pub fn rejected(state: &GameState, rejection: Rejection) -> Self {
        let text = match &rejection {
            Rejection::Unrecognized { .. } => "Nothing happens. Try rephrasing that.".to_string(),
            Rejection::RuleViolation(violation) => capitalize(&format!("{}.", violation)),
            Rejection::PreconditionFailed { reason, .. } => reason.clone(),
        };
        Self {
            state: state.clone(),
            outcome: TurnOutcome::Rejected(rejection),
            directive: NarrativeDirective::new(text),
        }
    }
}

pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
