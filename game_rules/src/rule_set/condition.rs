//! Conditions - guards on rules and exits, and the building block of end conditions.

use serde::{Deserialize, Serialize};

use crate::entities::{EntityType, ItemId, LocationId};
use crate::world_state::{FlagValue, GameState};

/// A predicate over the game state.
///
/// Serialized externally tagged, so a rule file writes `{ "flag": "has_key" }`
/// or `{ "all": [{ "has_item": "lamp" }, { "not_flag": "lamp_broken" }] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// The item is in the player's inventory.
    HasItem(ItemId),
    /// The item is not in the player's inventory.
    LacksItem(ItemId),
    /// The flag is truthy.
    Flag(String),
    /// The flag is falsy.
    NotFlag(String),
    FlagEquals { flag: String, value: FlagValue },
    CounterAtLeast { flag: String, value: i64 },
    CounterAtMost { flag: String, value: i64 },
    /// The player stands at the location.
    At(LocationId),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn has_item(item: impl Into<String>) -> Self {
        Condition::HasItem(ItemId::new(item))
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Condition::Flag(name.into())
    }

    pub fn not_flag(name: impl Into<String>) -> Self {
        Condition::NotFlag(name.into())
    }

    /// Evaluate the condition against a game state.
    pub fn holds(&self, state: &GameState) -> bool {
        match self {
            Condition::HasItem(item) => state.has_item(item),
            Condition::LacksItem(item) => !state.has_item(item),
            Condition::Flag(flag) => state.flag_is_set(flag),
            Condition::NotFlag(flag) => !state.flag_is_set(flag),
            Condition::FlagEquals { flag, value } => state.flag(flag) == Some(value),
            Condition::CounterAtLeast { flag, value } => {
                state.counter(flag).is_some_and(|current| current >= *value)
            }
            Condition::CounterAtMost { flag, value } => {
                state.counter(flag).is_some_and(|current| current <= *value)
            }
            Condition::At(location) => &state.location == location,
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(state)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.holds(state)),
            Condition::Not(inner) => !inner.holds(state),
        }
    }

    /// Human-readable explanation of what the condition demands.
    pub fn describe(&self) -> String {
        match self {
            Condition::HasItem(item) => format!("you need the {}", humanize(item.as_str())),
            Condition::LacksItem(item) => {
                format!("you cannot be carrying the {}", humanize(item.as_str()))
            }
            Condition::Flag(flag) => format!("{} must be true", humanize(flag)),
            Condition::NotFlag(flag) => format!("{} must not be true", humanize(flag)),
            Condition::FlagEquals { flag, value } => {
                format!("{} must be {}", humanize(flag), value)
            }
            Condition::CounterAtLeast { flag, value } => {
                format!("{} must be at least {}", humanize(flag), value)
            }
            Condition::CounterAtMost { flag, value } => {
                format!("{} must be at most {}", humanize(flag), value)
            }
            Condition::At(location) => format!("you must be at the {}", humanize(location.as_str())),
            Condition::All(conditions) => conditions
                .iter()
                .map(Condition::describe)
                .collect::<Vec<_>>()
                .join(" and "),
            Condition::Any(conditions) => conditions
                .iter()
                .map(Condition::describe)
                .collect::<Vec<_>>()
                .join(" or "),
            Condition::Not(inner) => format!("not ({})", inner.describe()),
        }
    }

    /// Every location, item and flag this condition mentions.
    pub fn references(&self) -> Vec<(EntityType, &str)> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<(EntityType, &'a str)>) {
        match self {
            Condition::HasItem(item) | Condition::LacksItem(item) => {
                refs.push((EntityType::Item, item.as_str()))
            }
            Condition::Flag(flag)
            | Condition::NotFlag(flag)
            | Condition::FlagEquals { flag, .. }
            | Condition::CounterAtLeast { flag, .. }
            | Condition::CounterAtMost { flag, .. } => refs.push((EntityType::Flag, flag.as_str())),
            Condition::At(location) => refs.push((EntityType::Location, location.as_str())),
            Condition::All(conditions) | Condition::Any(conditions) => {
                for condition in conditions {
                    condition.collect_references(refs);
                }
            }
            Condition::Not(inner) => inner.collect_references(refs),
        }
    }

    /// Flags compared numerically by this condition.
    pub(crate) fn counter_flags(&self) -> Vec<&str> {
        match self {
            Condition::CounterAtLeast { flag, .. } | Condition::CounterAtMost { flag, .. } => {
                vec![flag.as_str()]
            }
            Condition::All(conditions) | Condition::Any(conditions) => {
                conditions.iter().flat_map(Condition::counter_flags).collect()
            }
            Condition::Not(inner) => inner.counter_flags(),
            _ => Vec::new(),
        }
    }

    /// Flags compared against a literal value, with that value.
    pub(crate) fn flag_values(&self) -> Vec<(&str, &FlagValue)> {
        match self {
            Condition::FlagEquals { flag, value } => vec![(flag.as_str(), value)],
            Condition::All(conditions) | Condition::Any(conditions) => {
                conditions.iter().flat_map(Condition::flag_values).collect()
            }
            Condition::Not(inner) => inner.flag_values(),
            _ => Vec::new(),
        }
    }
}

/// `rusty_key` -> `rusty key`.
pub(crate) fn humanize(id: &str) -> String {
    id.replace(['_', '-'], " ")
}
