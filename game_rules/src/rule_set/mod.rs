//! Rule Set - the static, validated world definition.
//!
//! A rule file declares `locations`, `items`, `flags_default` and an ordered
//! list of `rules`, plus the starting position, an optional quest, an
//! inventory limit and end conditions. [`RuleSet`] is only ever constructed
//! through validation, so holding one means every reference inside it
//! resolves.

mod condition;
mod error;
mod rule;

pub use condition::*;
pub use error::*;
pub use rule::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::entities::{EntityType, Item, ItemId, Location, LocationId};
use crate::world_state::FlagValue;

/// How overlapping rules are ordered when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Earlier-declared rules override later ones.
    #[default]
    FirstDeclared,
    /// Later-declared rules override earlier ones.
    LastDeclared,
}

/// The quest presented when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub name: String,
    #[serde(default)]
    pub intro: String,
    /// Short statement of what winning means.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

/// Where and with what the player begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartState {
    pub location: LocationId,
    #[serde(default)]
    pub inventory: Vec<ItemId>,
}

/// Win and lose conditions checked after every turn.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndConditions {
    /// Player turns allowed before the game is lost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win: Option<Condition>,
    /// The game is lost as soon as any of these holds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lose: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lose_message: Option<String>,
}

/// Raw rule file contents before validation.
#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    title: String,
    #[serde(default)]
    quest: Option<Quest>,
    start: StartState,
    #[serde(default)]
    inventory_limit: Option<usize>,
    #[serde(default)]
    precedence: Precedence,
    #[serde(default)]
    locations: Vec<Location>,
    #[serde(default)]
    items: Vec<Item>,
    #[serde(default)]
    flags_default: BTreeMap<String, FlagValue>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
    #[serde(default)]
    end_conditions: EndConditions,
}

/// A rule as written; `kind` stays a string so unknown kinds can be reported by entry.
#[derive(Debug, Deserialize)]
struct RuleEntry {
    #[serde(default)]
    id: Option<String>,
    kind: String,
    #[serde(default)]
    trigger: Trigger,
    #[serde(default)]
    guard: Option<Condition>,
    #[serde(default)]
    effect: Effects,
    #[serde(default)]
    narrative: Option<String>,
    #[serde(default)]
    denial: Option<String>,
}

/// `effect` may be a single effect or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Effects {
    One(Effect),
    Many(Vec<Effect>),
}

impl Default for Effects {
    fn default() -> Self {
        Effects::Many(Vec::new())
    }
}

impl From<Effects> for Vec<Effect> {
    fn from(effects: Effects) -> Self {
        match effects {
            Effects::One(effect) => vec![effect],
            Effects::Many(effects) => effects,
        }
    }
}

/// The validated, immutable world definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSet {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    quest: Option<Quest>,
    start: StartState,
    #[serde(skip_serializing_if = "Option::is_none")]
    inventory_limit: Option<usize>,
    precedence: Precedence,
    locations: Vec<Location>,
    items: Vec<Item>,
    flags_default: BTreeMap<String, FlagValue>,
    rules: Vec<Rule>,
    end_conditions: EndConditions,
}

impl RuleSet {
    /// Parse and validate a JSON rule file.
    pub fn from_json_str(source: &str) -> Result<Self, RuleLoadError> {
        let document: RuleDocument =
            serde_json::from_str(source).map_err(|e| RuleLoadError::Parse {
                format: "JSON",
                message: e.to_string(),
            })?;
        Self::from_document(document)
    }

    /// Parse and validate a TOML rule file.
    pub fn from_toml_str(source: &str) -> Result<Self, RuleLoadError> {
        let document: RuleDocument = toml::from_str(source).map_err(|e| RuleLoadError::Parse {
            format: "TOML",
            message: e.to_string(),
        })?;
        Self::from_document(document)
    }

    /// Load a rule file, choosing the format by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleLoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let read = || {
            std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let rules = match extension.as_deref() {
            Some("json") => Self::from_json_str(&read()?)?,
            Some("toml") => Self::from_toml_str(&read()?)?,
            _ => return Err(RuleLoadError::UnsupportedFormat(path.to_path_buf())),
        };

        tracing::info!(
            path = %path.display(),
            locations = rules.locations.len(),
            items = rules.items.len(),
            rules = rules.rules.len(),
            "Rule set loaded"
        );
        Ok(rules)
    }

    fn from_document(document: RuleDocument) -> Result<Self, RuleLoadError> {
        let catalog = Catalog::build(
            &document.locations,
            &document.items,
            &document.flags_default,
        )?;

        for location in &document.locations {
            for (index, exit) in location.exits.iter().enumerate() {
                let entry = format!("location '{}' exit {}", location.id, index);
                catalog.check(&entry, EntityType::Location, exit.to.as_str())?;
                if let Some(guard) = &exit.guard {
                    catalog.check_condition(&entry, guard)?;
                }
            }
        }

        for item in &document.items {
            if let Some(found_at) = &item.found_at {
                catalog.check(
                    &format!("item '{}'", item.id),
                    EntityType::Location,
                    found_at.as_str(),
                )?;
            }
        }

        catalog.check("start", EntityType::Location, document.start.location.as_str())?;
        let mut seen = HashSet::new();
        for item in &document.start.inventory {
            catalog.check("start", EntityType::Item, item.as_str())?;
            if !seen.insert(item) {
                return Err(RuleLoadError::invalid(
                    "start",
                    format!("item '{}' listed twice in the starting inventory", item),
                ));
            }
        }
        if let Some(limit) = document.inventory_limit {
            if document.start.inventory.len() > limit {
                return Err(RuleLoadError::invalid(
                    "start",
                    format!(
                        "starting inventory holds {} items but the limit is {}",
                        document.start.inventory.len(),
                        limit
                    ),
                ));
            }
        }

        let mut rules = Vec::with_capacity(document.rules.len());
        let mut rule_ids = HashSet::new();
        for (index, entry) in document.rules.into_iter().enumerate() {
            let rule = catalog.validate_rule(index, entry)?;
            if !rule_ids.insert(rule.id.clone()) {
                return Err(RuleLoadError::DuplicateId {
                    collection: "rule",
                    id: rule.id,
                });
            }
            rules.push(rule);
        }

        let end = &document.end_conditions;
        for condition in end.win.iter().chain(end.lose.iter()) {
            catalog.check_condition("end_conditions", condition)?;
        }

        Ok(Self {
            title: document.title,
            quest: document.quest,
            start: document.start,
            inventory_limit: document.inventory_limit,
            precedence: document.precedence,
            locations: document.locations,
            items: document.items,
            flags_default: document.flags_default,
            rules,
            end_conditions: document.end_conditions,
        })
    }

    /// Override the precedence declared in the rule file.
    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn quest(&self) -> Option<&Quest> {
        self.quest.as_ref()
    }

    pub fn start(&self) -> &StartState {
        &self.start
    }

    pub fn inventory_limit(&self) -> Option<usize> {
        self.inventory_limit
    }

    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Get location by ID.
    pub fn location(&self, id: &LocationId) -> Option<&Location> {
        self.locations.iter().find(|location| &location.id == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Get item by ID.
    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn flags_default(&self) -> &BTreeMap<String, FlagValue> {
        &self.flags_default
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags_default.contains_key(name)
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules of a kind, in the order they are tried.
    pub fn rules_by_precedence(&self, kind: RuleKind) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().filter(|r| r.kind == kind).collect();
        if self.precedence == Precedence::LastDeclared {
            rules.reverse();
        }
        rules
    }

    pub fn end_conditions(&self) -> &EndConditions {
        &self.end_conditions
    }
}

/// Id lookup tables used while validating a document.
struct Catalog<'a> {
    locations: HashSet<&'a str>,
    items: HashSet<&'a str>,
    flags: &'a BTreeMap<String, FlagValue>,
}

impl<'a> Catalog<'a> {
    fn build(
        all_locations: &'a [Location],
        all_items: &'a [Item],
        flags: &'a BTreeMap<String, FlagValue>,
    ) -> Result<Self, RuleLoadError> {
        let mut locations = HashSet::new();
        for location in all_locations {
            if location.id.as_str().trim().is_empty() {
                return Err(RuleLoadError::invalid("locations", "location with an empty id"));
            }
            if !locations.insert(location.id.as_str()) {
                return Err(RuleLoadError::DuplicateId {
                    collection: "location",
                    id: location.id.to_string(),
                });
            }
        }

        let mut items = HashSet::new();
        for item in all_items {
            if item.id.as_str().trim().is_empty() {
                return Err(RuleLoadError::invalid("items", "item with an empty id"));
            }
            if !items.insert(item.id.as_str()) {
                return Err(RuleLoadError::DuplicateId {
                    collection: "item",
                    id: item.id.to_string(),
                });
            }
        }

        if flags.keys().any(|name| name.trim().is_empty()) {
            return Err(RuleLoadError::invalid("flags_default", "flag with an empty name"));
        }

        Ok(Self {
            locations,
            items,
            flags,
        })
    }

    fn check(&self, entry: &str, entity: EntityType, id: &str) -> Result<(), RuleLoadError> {
        let known = match entity {
            EntityType::Location => self.locations.contains(id),
            EntityType::Item => self.items.contains(id),
            EntityType::Flag => self.flags.contains_key(id),
        };
        if known {
            Ok(())
        } else {
            Err(RuleLoadError::DanglingReference {
                entry: entry.to_string(),
                entity,
                id: id.to_string(),
            })
        }
    }

    fn check_counter(&self, entry: &str, flag: &str) -> Result<(), RuleLoadError> {
        match self.flags.get(flag) {
            Some(FlagValue::Int(_)) => Ok(()),
            Some(_) => Err(RuleLoadError::invalid(
                entry,
                format!("flag '{}' is used as a counter but is not an integer", flag),
            )),
            None => self.check(entry, EntityType::Flag, flag),
        }
    }

    /// A literal written to or compared with a flag must match its declared type.
    fn check_value(&self, entry: &str, flag: &str, value: &FlagValue) -> Result<(), RuleLoadError> {
        match self.flags.get(flag) {
            Some(declared) if !declared.same_type(value) => Err(RuleLoadError::invalid(
                entry,
                format!(
                    "flag '{}' is declared {} but is given the {} value {}",
                    flag,
                    declared.type_name(),
                    value.type_name(),
                    value
                ),
            )),
            Some(_) => Ok(()),
            None => self.check(entry, EntityType::Flag, flag),
        }
    }

    fn check_condition(&self, entry: &str, condition: &Condition) -> Result<(), RuleLoadError> {
        for (entity, id) in condition.references() {
            self.check(entry, entity, id)?;
        }
        for flag in condition.counter_flags() {
            self.check_counter(entry, flag)?;
        }
        for (flag, value) in condition.flag_values() {
            self.check_value(entry, flag, value)?;
        }
        Ok(())
    }

    fn validate_rule(&self, index: usize, entry: RuleEntry) -> Result<Rule, RuleLoadError> {
        let id = entry
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("rule_{}", index + 1));
        let name = format!("rule '{}'", id);

        let kind: RuleKind = entry
            .kind
            .parse()
            .map_err(|kind| RuleLoadError::UnknownKind {
                entry: name.clone(),
                kind,
            })?;

        if let Some(action) = entry.trigger.action {
            if RuleKind::for_action(action) != kind {
                return Err(RuleLoadError::invalid(
                    &name,
                    format!("a {} rule cannot be triggered by the '{}' action", kind, action),
                ));
            }
        }
        for (entity, target) in entry.trigger.references() {
            self.check(&name, entity, target)?;
        }

        if let Some(guard) = &entry.guard {
            self.check_condition(&name, guard)?;
        }

        let effect: Vec<Effect> = entry.effect.into();
        for effect in &effect {
            if let Some((entity, target)) = effect.reference() {
                self.check(&name, entity, target)?;
            }
            match effect {
                Effect::Adjust { flag, .. } => self.check_counter(&name, flag)?,
                Effect::SetFlag { flag, value } => self.check_value(&name, flag, value)?,
                _ => {}
            }
        }

        Ok(Rule {
            id,
            kind,
            trigger: entry.trigger,
            guard: entry.guard,
            effect,
            narrative: entry.narrative,
            denial: entry.denial,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOWER: &str = r#"{
        "title": "The Tower",
        "start": { "location": "cell", "inventory": ["torch"] },
        "inventory_limit": 2,
        "locations": [
            { "id": "cell", "exits": [{ "to": "hall" }] },
            { "id": "hall", "exits": [{ "to": "cell" }, { "to": "vault", "guard": { "flag": "has_key" } }] },
            { "id": "vault" }
        ],
        "items": [
            { "id": "torch" },
            { "id": "key", "found_at": "hall" }
        ],
        "flags_default": { "has_key": false, "hp": 5 },
        "rules": [
            { "id": "pick_key", "kind": "item_use", "trigger": { "action": "take", "item": "key" },
              "effect": [{ "add_item": "key" }, { "set_flag": { "flag": "has_key" } }] },
            { "kind": "condition_check", "trigger": { "flag": "hp" },
              "effect": { "adjust": { "flag": "hp", "delta": -1 } } }
        ],
        "end_conditions": { "max_turns": 30, "win": { "at": "vault" } }
    }"#;

    #[test]
    fn test_load_valid_rule_set() {
        let rules = RuleSet::from_json_str(TOWER).unwrap();
        assert_eq!(rules.title(), "The Tower");
        assert_eq!(rules.locations().len(), 3);
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(rules.rules()[1].id, "rule_2");
        assert_eq!(rules.rules()[1].effect.len(), 1);
        assert_eq!(rules.inventory_limit(), Some(2));
        assert!(rules.location(&LocationId::new("vault")).is_some());
    }

    #[test]
    fn test_load_is_idempotent() {
        let first = RuleSet::from_json_str(TOWER).unwrap();
        let second = RuleSet::from_json_str(TOWER).unwrap();
        assert_eq!(first, second);

        // Reloading the serialized form yields the same structure.
        let serialized = serde_json::to_string(&first).unwrap();
        let reloaded = RuleSet::from_json_str(&serialized).unwrap();
        assert_eq!(first, reloaded);
    }

    #[test]
    fn test_unknown_kind_names_the_rule() {
        let source = TOWER.replace("\"item_use\"", "\"teleport\"");
        let err = RuleSet::from_json_str(&source).unwrap_err();
        assert!(matches!(err, RuleLoadError::UnknownKind { ref kind, .. } if kind == "teleport"));
        assert_eq!(err.entry(), Some("rule 'pick_key'"));
    }

    #[test]
    fn test_dangling_exit_fails() {
        let source = TOWER.replace(r#"{ "to": "cell" }, "#, r#"{ "to": "dungeon" }, "#);
        let err = RuleSet::from_json_str(&source).unwrap_err();
        match err {
            RuleLoadError::DanglingReference { entry, entity, id } => {
                assert_eq!(entry, "location 'hall' exit 0");
                assert_eq!(entity, EntityType::Location);
                assert_eq!(id, "dungeon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_location_fails() {
        let source = TOWER.replace(r#"{ "id": "vault" }"#, r#"{ "id": "cell" }"#);
        let err = RuleSet::from_json_str(&source).unwrap_err();
        assert!(matches!(err, RuleLoadError::DuplicateId { collection: "location", .. }));
    }

    #[test]
    fn test_undeclared_flag_in_effect_fails() {
        let source = TOWER.replace(r#""flag": "has_key" } }]"#, r#""flag": "has_sword" } }]"#);
        let err = RuleSet::from_json_str(&source).unwrap_err();
        assert!(matches!(
            err,
            RuleLoadError::DanglingReference { entity: EntityType::Flag, ref id, .. } if id == "has_sword"
        ));
    }

    #[test]
    fn test_trigger_action_must_fit_kind() {
        let source = TOWER.replace(r#""action": "take""#, r#""action": "move""#);
        let err = RuleSet::from_json_str(&source).unwrap_err();
        assert!(matches!(err, RuleLoadError::InvalidEntry { .. }));
    }

    #[test]
    fn test_counter_must_be_integer() {
        let source = TOWER.replace(r#""hp": 5"#, r#""hp": true"#);
        let err = RuleSet::from_json_str(&source).unwrap_err();
        assert!(err.to_string().contains("not an integer"));
    }

    #[test]
    fn test_flag_values_must_match_declared_type() {
        let source = r#"{
            "start": { "location": "pit" },
            "locations": [{ "id": "pit" }],
            "flags_default": { "hp": 3, "mood": "calm" },
            "rules": [{ "id": "heal", "kind": "condition_check", "effect": { "set_flag": { "flag": "hp" } } }],
            "end_conditions": { "lose": [{ "counter_at_most": { "flag": "hp", "value": 0 } }] }
        }"#;
        let err = RuleSet::from_json_str(source).unwrap_err();
        assert!(matches!(err, RuleLoadError::InvalidEntry { .. }));
        assert_eq!(err.entry(), Some("rule 'heal'"));
        assert!(err.to_string().contains("declared integer"));

        let fixed = source.replace(
            r#"{ "flag": "hp" }"#,
            r#"{ "flag": "hp", "value": 5 }"#,
        );
        assert!(RuleSet::from_json_str(&fixed).is_ok());

        let compared = source
            .replace(r#""effect": { "set_flag": { "flag": "hp" } }"#, r#""guard": { "flag_equals": { "flag": "mood", "value": 1 } }"#);
        let err = RuleSet::from_json_str(&compared).unwrap_err();
        assert_eq!(err.entry(), Some("rule 'heal'"));
        assert!(err.to_string().contains("declared text"));
    }

    #[test]
    fn test_start_inventory_over_limit_fails() {
        let source = TOWER.replace(r#""inventory_limit": 2"#, r#""inventory_limit": 0"#);
        assert!(RuleSet::from_json_str(&source).is_err());
    }

    #[test]
    fn test_load_toml() {
        let source = r#"
            title = "Cellar"

            [start]
            location = "stairs"

            [[locations]]
            id = "stairs"
            exits = [{ to = "cellar", guard = { flag = "lamp_lit" }, denial = "It is too dark." }]

            [[locations]]
            id = "cellar"

            [flags_default]
            lamp_lit = false

            [[rules]]
            id = "light"
            kind = "condition_check"
            trigger = { flag = "lamp_lit" }
            effect = { set_flag = { flag = "lamp_lit" } }
        "#;
        let rules = RuleSet::from_toml_str(source).unwrap();
        assert_eq!(rules.start().location, LocationId::new("stairs"));
        assert_eq!(rules.rules()[0].effect, vec![Effect::set_flag("lamp_lit")]);
        let exit = &rules.locations()[0].exits[0];
        assert_eq!(exit.denial.as_deref(), Some("It is too dark."));
    }

    #[test]
    fn test_precedence_order() {
        let source = r#"{
            "start": { "location": "a" },
            "locations": [{ "id": "a" }],
            "rules": [
                { "id": "first", "kind": "dialogue_gate" },
                { "id": "second", "kind": "dialogue_gate" }
            ]
        }"#;
        let rules = RuleSet::from_json_str(source).unwrap();
        assert_eq!(rules.precedence(), Precedence::FirstDeclared);
        let ids: Vec<_> = rules
            .rules_by_precedence(RuleKind::DialogueGate)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, ["first", "second"]);

        let rules = rules.with_precedence(Precedence::LastDeclared);
        assert_eq!(rules.precedence(), Precedence::LastDeclared);
        let ids: Vec<_> = rules
            .rules_by_precedence(RuleKind::DialogueGate)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, ["second", "first"]);
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let err = RuleSet::load("world.yaml").unwrap_err();
        assert!(matches!(err, RuleLoadError::UnsupportedFormat(_)));
    }
}
