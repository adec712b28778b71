//! Location definitions - the nodes and edges of the location graph.

use serde::{Deserialize, Serialize};

use super::LocationId;
use crate::rule_set::Condition;

/// A location in the game world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,

    /// Display name; falls back to the id when omitted.
    #[serde(default)]
    pub name: String,

    /// Description seed handed to the narrator.
    #[serde(default)]
    pub description: String,

    /// Directed edges to other locations.
    #[serde(default)]
    pub exits: Vec<Exit>,
}

impl Location {
    /// Create a new location with no exits.
    pub fn new(id: impl Into<String>) -> Self {
        let id = LocationId::new(id);
        Self {
            name: id.0.clone(),
            id,
            description: String::new(),
            exits: Vec::new(),
        }
    }

    /// Set the description seed.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an unguarded exit.
    pub fn with_exit(mut self, to: impl Into<String>) -> Self {
        self.exits.push(Exit::new(to));
        self
    }

    /// Add an exit that only opens when `guard` holds.
    pub fn with_guarded_exit(mut self, to: impl Into<String>, guard: Condition) -> Self {
        self.exits.push(Exit::new(to).with_guard(guard));
        self
    }

    /// Name to show the player.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    /// Find the exit leading to `target`, if any.
    pub fn exit_to(&self, target: &LocationId) -> Option<&Exit> {
        self.exits.iter().find(|exit| &exit.to == target)
    }
}

/// A directed edge between two locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    pub to: LocationId,

    /// Condition that must hold to traverse this edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Condition>,

    /// Text used when the guard blocks the way (e.g. "The door is locked.").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<String>,
}

impl Exit {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: LocationId::new(to),
            guard: None,
            denial: None,
        }
    }

    pub fn with_guard(mut self, guard: Condition) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_denial(mut self, denial: impl Into<String>) -> Self {
        self.denial = Some(denial.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_lookup() {
        let hall = Location::new("hall")
            .with_exit("yard")
            .with_guarded_exit("vault", Condition::flag("has_key"));

        assert!(hall.exit_to(&LocationId::new("yard")).unwrap().guard.is_none());
        assert!(hall.exit_to(&LocationId::new("vault")).unwrap().guard.is_some());
        assert!(hall.exit_to(&LocationId::new("cellar")).is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut loc = Location::new("crypt");
        loc.name.clear();
        assert_eq!(loc.display_name(), "crypt");
    }
}
