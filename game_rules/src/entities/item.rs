//! Item definitions.

use serde::{Deserialize, Serialize};

use super::{ItemId, LocationId};

/// An item the player can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Where the item lies when the game starts. `None` means it only enters
    /// play through a rule effect or the starting inventory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_at: Option<LocationId>,
}

impl Item {
    /// Create a new item with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = ItemId::new(id);
        Self {
            name: id.0.clone(),
            id,
            description: String::new(),
            found_at: None,
        }
    }

    /// Place the item at a location.
    pub fn found_at(mut self, location: impl Into<String>) -> Self {
        self.found_at = Some(LocationId::new(location));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}
