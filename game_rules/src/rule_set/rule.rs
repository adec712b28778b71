//! Rule entries: kind, trigger, guard and effects.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Condition;
use crate::entities::{EntityType, ItemId, LocationId};
use crate::mechanics::{ActionKind, CandidateIntent};
use crate::world_state::{FlagValue, GameState};

/// The closed set of rule kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Movement,
    ItemUse,
    ConditionCheck,
    DialogueGate,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [
        RuleKind::Movement,
        RuleKind::ItemUse,
        RuleKind::ConditionCheck,
        RuleKind::DialogueGate,
    ];

    /// The rule kind consulted for an action.
    pub fn for_action(action: ActionKind) -> Self {
        match action {
            ActionKind::Move => RuleKind::Movement,
            ActionKind::Take | ActionKind::Drop | ActionKind::Use => RuleKind::ItemUse,
            ActionKind::Talk => RuleKind::DialogueGate,
            ActionKind::Examine | ActionKind::Other => RuleKind::ConditionCheck,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Movement => "movement",
            RuleKind::ItemUse => "item_use",
            RuleKind::ConditionCheck => "condition_check",
            RuleKind::DialogueGate => "dialogue_gate",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Symbolic pattern an intent must match for a rule to fire.
///
/// Every field left out matches anything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trigger {
    /// Intent action; must be one the rule kind serves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,

    /// Player's current location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<LocationId>,

    /// Intent's target location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<LocationId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,

    /// Who or what is addressed; compared case-insensitively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl Trigger {
    /// Check whether an intent, issued from `state`, matches this trigger.
    pub fn matches(&self, intent: &CandidateIntent, state: &GameState) -> bool {
        self.action.map_or(true, |action| action == intent.action)
            && self.from.as_ref().map_or(true, |from| from == &state.location)
            && self
                .to
                .as_ref()
                .map_or(true, |to| intent.location.as_ref() == Some(to))
            && self
                .item
                .as_ref()
                .map_or(true, |item| intent.item.as_ref() == Some(item))
            && self
                .flag
                .as_ref()
                .map_or(true, |flag| intent.flag.as_deref() == Some(flag.as_str()))
            && self.subject.as_ref().map_or(true, |subject| {
                intent
                    .subject
                    .as_deref()
                    .is_some_and(|s| s.trim().eq_ignore_ascii_case(subject.trim()))
            })
    }

    pub(crate) fn references(&self) -> Vec<(EntityType, &str)> {
        let mut refs = Vec::new();
        if let Some(from) = &self.from {
            refs.push((EntityType::Location, from.as_str()));
        }
        if let Some(to) = &self.to {
            refs.push((EntityType::Location, to.as_str()));
        }
        if let Some(item) = &self.item {
            refs.push((EntityType::Item, item.as_str()));
        }
        if let Some(flag) = &self.flag {
            refs.push((EntityType::Flag, flag.as_str()));
        }
        refs
    }
}

fn default_flag_value() -> FlagValue {
    FlagValue::Bool(true)
}

/// A state mutation or narrative constraint produced by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    MoveTo(LocationId),
    AddItem(ItemId),
    RemoveItem(ItemId),
    SetFlag {
        flag: String,
        #[serde(default = "default_flag_value")]
        value: FlagValue,
    },
    /// Reset a flag to the falsy value of its type.
    ClearFlag(String),
    /// Add `delta` to an integer flag, never dropping below zero.
    Adjust { flag: String, delta: i64 },
    /// Constrain the narration without touching state.
    Narrate(String),
}

impl Effect {
    pub fn set_flag(flag: impl Into<String>) -> Self {
        Effect::SetFlag {
            flag: flag.into(),
            value: FlagValue::Bool(true),
        }
    }

    pub(crate) fn reference(&self) -> Option<(EntityType, &str)> {
        match self {
            Effect::MoveTo(location) => Some((EntityType::Location, location.as_str())),
            Effect::AddItem(item) | Effect::RemoveItem(item) => Some((EntityType::Item, item.as_str())),
            Effect::SetFlag { flag, .. } | Effect::ClearFlag(flag) | Effect::Adjust { flag, .. } => {
                Some((EntityType::Flag, flag.as_str()))
            }
            Effect::Narrate(_) => None,
        }
    }
}

/// A validated rule entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Condition>,
    #[serde(default)]
    pub effect: Vec<Effect>,
    /// Text relayed to the narrator when the rule applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Text relayed when the guard blocks the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<String>,
}

impl Rule {
    pub fn new(id: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: id.into(),
            kind,
            trigger: Trigger::default(),
            guard: None,
            effect: Vec::new(),
            narrative: None,
            denial: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect.push(effect);
        self
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = Some(narrative.into());
        self
    }

    pub fn with_denial(mut self, denial: impl Into<String>) -> Self {
        self.denial = Some(denial.into());
        self
    }

    /// Whether the rule applies to the intent: same kind family and matching trigger.
    pub fn matches(&self, intent: &CandidateIntent, state: &GameState) -> bool {
        self.kind == RuleKind::for_action(intent.action) && self.trigger.matches(intent, state)
    }

    /// One-line summary used as a rule excerpt in prompts.
    pub fn excerpt(&self) -> String {
        let mut parts = vec![format!("[{}] {}", self.kind, self.id)];
        if let Some(action) = self.trigger.action {
            parts.push(format!("action={}", action));
        }
        if let Some(from) = &self.trigger.from {
            parts.push(format!("from={}", from));
        }
        if let Some(to) = &self.trigger.to {
            parts.push(format!("to={}", to));
        }
        if let Some(item) = &self.trigger.item {
            parts.push(format!("item={}", item));
        }
        if let Some(flag) = &self.trigger.flag {
            parts.push(format!("flag={}", flag));
        }
        if let Some(subject) = &self.trigger.subject {
            parts.push(format!("subject={}", subject));
        }
        if let Some(guard) = &self.guard {
            parts.push(format!("requires: {}", guard.describe()));
        }
        parts.join(" ")
    }
}
