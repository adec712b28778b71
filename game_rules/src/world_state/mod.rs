//! World state management - the authoritative record of the current game.
//!
//! A [`GameState`] is a plain value. The enforcement engine takes one in and
//! hands a new one back; nothing mutates it from the side.

mod history;

pub use history::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::entities::{ItemId, LocationId};
use crate::rule_set::RuleSet;

/// Flag value types for world facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    /// `true`, non-zero, or non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Int(n) => *n != 0,
            FlagValue::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "boolean",
            FlagValue::Int(_) => "integer",
            FlagValue::Text(_) => "text",
        }
    }

    pub fn same_type(&self, other: &FlagValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The falsy value of the same type.
    pub fn cleared(&self) -> FlagValue {
        match self {
            FlagValue::Bool(_) => FlagValue::Bool(false),
            FlagValue::Int(_) => FlagValue::Int(0),
            FlagValue::Text(_) => FlagValue::Text(String::new()),
        }
    }
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(n) => write!(f, "{}", n),
            FlagValue::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// A game state that does not fit its rule set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("unknown location '{0}'")]
    UnknownLocation(LocationId),
    #[error("unknown item '{0}'")]
    UnknownItem(ItemId),
    #[error("undeclared flag '{0}'")]
    UnknownFlag(String),
    #[error("item '{0}' is both carried and lying in the world")]
    ItemInTwoPlaces(ItemId),
}

/// One observable difference between two game states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateChange {
    Moved {
        from: LocationId,
        to: LocationId,
    },
    ItemGained(ItemId),
    ItemLost(ItemId),
    FlagChanged {
        flag: String,
        from: Option<FlagValue>,
        to: FlagValue,
    },
}

impl std::fmt::Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateChange::Moved { to, .. } => write!(f, "the player is now at {}", to),
            StateChange::ItemGained(item) => write!(f, "the player now carries {}", item),
            StateChange::ItemLost(item) => write!(f, "the player no longer carries {}", item),
            StateChange::FlagChanged { flag, to, .. } => write!(f, "{} is now {}", flag, to),
        }
    }
}

/// The complete state of a running game.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameState {
    /// Where the player stands.
    pub location: LocationId,

    /// Items the player carries.
    pub inventory: BTreeSet<ItemId>,

    /// World facts, one entry per declared flag.
    pub flags: BTreeMap<String, FlagValue>,

    /// Items lying in the world, by location.
    #[serde(default)]
    pub placements: BTreeMap<ItemId, LocationId>,

    /// Number of turns that changed the world.
    pub turn: u32,
}

impl GameState {
    /// Create the starting state described by a rule set.
    pub fn new(rules: &RuleSet) -> Self {
        let start = rules.start();
        let inventory: BTreeSet<ItemId> = start.inventory.iter().cloned().collect();
        let placements = rules
            .items()
            .iter()
            .filter(|item| !inventory.contains(&item.id))
            .filter_map(|item| item.found_at.clone().map(|loc| (item.id.clone(), loc)))
            .collect();

        Self {
            location: start.location.clone(),
            inventory,
            flags: rules.flags_default().clone(),
            placements,
            turn: 0,
        }
    }

    /// Check the state against a rule set, e.g. after loading a save.
    pub fn validate(&self, rules: &RuleSet) -> Result<(), StateError> {
        if rules.location(&self.location).is_none() {
            return Err(StateError::UnknownLocation(self.location.clone()));
        }
        for item in &self.inventory {
            if rules.item(item).is_none() {
                return Err(StateError::UnknownItem(item.clone()));
            }
        }
        for (item, location) in &self.placements {
            if rules.item(item).is_none() {
                return Err(StateError::UnknownItem(item.clone()));
            }
            if rules.location(location).is_none() {
                return Err(StateError::UnknownLocation(location.clone()));
            }
            if self.inventory.contains(item) {
                return Err(StateError::ItemInTwoPlaces(item.clone()));
            }
        }
        for flag in self.flags.keys() {
            if !rules.has_flag(flag) {
                return Err(StateError::UnknownFlag(flag.clone()));
            }
        }
        Ok(())
    }

    pub fn has_item(&self, item: &ItemId) -> bool {
        self.inventory.contains(item)
    }

    pub fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }

    /// Whether the flag exists and is truthy.
    pub fn flag_is_set(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(FlagValue::is_truthy)
    }

    /// Integer value of a counter flag.
    pub fn counter(&self, name: &str) -> Option<i64> {
        self.flags.get(name).and_then(FlagValue::as_int)
    }

    /// Items lying at a location.
    pub fn items_at(&self, location: &LocationId) -> Vec<&ItemId> {
        self.placements
            .iter()
            .filter(|(_, loc)| *loc == location)
            .map(|(item, _)| item)
            .collect()
    }

    /// Items lying where the player stands.
    pub fn visible_items(&self) -> Vec<&ItemId> {
        self.items_at(&self.location)
    }

    /// Flags that are currently truthy.
    pub fn set_flags(&self) -> impl Iterator<Item = (&String, &FlagValue)> {
        self.flags.iter().filter(|(_, value)| value.is_truthy())
    }

    /// Differences from `before` to `self`, ignoring the turn counter.
    pub fn changes_since(&self, before: &GameState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if self.location != before.location {
            changes.push(StateChange::Moved {
                from: before.location.clone(),
                to: self.location.clone(),
            });
        }

        for item in self.inventory.difference(&before.inventory) {
            changes.push(StateChange::ItemGained(item.clone()));
        }
        for item in before.inventory.difference(&self.inventory) {
            changes.push(StateChange::ItemLost(item.clone()));
        }

        for (flag, value) in &self.flags {
            let previous = before.flags.get(flag);
            if previous != Some(value) {
                changes.push(StateChange::FlagChanged {
                    flag: flag.clone(),
                    from: previous.cloned(),
                    to: value.clone(),
                });
            }
        }

        changes
    }

    /// Whether anything other than the turn counter differs.
    pub fn same_world(&self, other: &GameState) -> bool {
        self.location == other.location
            && self.inventory == other.inventory
            && self.flags == other.flags
            && self.placements == other.placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "start": { "location": "cell", "inventory": ["torch"] },
                "locations": [{ "id": "cell" }, { "id": "hall" }],
                "items": [
                    { "id": "torch", "found_at": "hall" },
                    { "id": "key", "found_at": "hall" },
                    { "id": "coin" }
                ],
                "flags_default": { "door_open": false, "hp": 3 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_new_state_from_rules() {
        let rules = rules();
        let state = GameState::new(&rules);

        assert_eq!(state.location, LocationId::new("cell"));
        assert!(state.has_item(&ItemId::new("torch")));
        // Carried items are not also placed in the world.
        assert_eq!(state.placements.len(), 1);
        assert_eq!(state.items_at(&LocationId::new("hall")), vec![&ItemId::new("key")]);
        assert!(state.visible_items().is_empty());
        assert_eq!(state.counter("hp"), Some(3));
        assert!(!state.flag_is_set("door_open"));
        assert_eq!(state.turn, 0);
        assert!(state.validate(&rules).is_ok());
    }

    #[test]
    fn test_validate_rejects_foreign_state() {
        let rules = rules();

        let mut state = GameState::new(&rules);
        state.location = LocationId::new("moon");
        assert_eq!(
            state.validate(&rules),
            Err(StateError::UnknownLocation(LocationId::new("moon")))
        );

        let mut state = GameState::new(&rules);
        state.inventory.insert(ItemId::new("sword"));
        assert_eq!(
            state.validate(&rules),
            Err(StateError::UnknownItem(ItemId::new("sword")))
        );

        let mut state = GameState::new(&rules);
        state.flags.insert("dragon_slain".into(), FlagValue::Bool(true));
        assert!(matches!(state.validate(&rules), Err(StateError::UnknownFlag(_))));

        let mut state = GameState::new(&rules);
        state.inventory.insert(ItemId::new("key"));
        assert!(matches!(state.validate(&rules), Err(StateError::ItemInTwoPlaces(_))));
    }

    #[test]
    fn test_changes_since() {
        let rules = rules();
        let before = GameState::new(&rules);
        let mut after = before.clone();
        after.location = LocationId::new("hall");
        after.inventory.remove(&ItemId::new("torch"));
        after.flags.insert("door_open".into(), FlagValue::Bool(true));
        after.turn += 1;

        let changes = after.changes_since(&before);
        assert_eq!(changes.len(), 3);
        assert!(changes.contains(&StateChange::ItemLost(ItemId::new("torch"))));
        assert!(!after.same_world(&before));
        assert!(before.changes_since(&before).is_empty());
    }

    #[test]
    fn test_flag_values() {
        assert!(FlagValue::Int(2).is_truthy());
        assert!(!FlagValue::Text(String::new()).is_truthy());
        assert_eq!(FlagValue::Int(7).cleared(), FlagValue::Int(0));
        let parsed: FlagValue = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(parsed, FlagValue::Text("open".into()));
    }
}
