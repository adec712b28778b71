//! Context Assembler - Builds the bounded context for interpreter prompts.
//!
//! The assembler works as follows:
//! 1. **Scene**: Describe the current location, its exits and the items in reach
//! 2. **Status**: List the inventory and the flags that are set
//! 3. **Scoring**: Score every rule by how strongly it relates to the scene
//!    and to the words the player used
//! 4. **Selection**: Keep the highest scoring rule excerpts, up to a fixed count
//! 5. **History**: Keep the most recent turns, up to a fixed window
//! 6. **Assembly**: Build structured context for the prompt

use game_rules::{Condition, GameState, ItemId, LocationId, Rule, RuleSet, TurnLog, TurnOutcome};
use serde::{Deserialize, Serialize};

/// Bounds and weights for context assembly.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum number of rule excerpts to include.
    pub max_rule_excerpts: usize,

    /// Number of recent turns to include.
    pub history_window: usize,

    /// Score for a rule whose trigger or guard names a word the player typed.
    pub mention_weight: f32,

    /// Score for a rule tied to the current location or its exits.
    pub scene_weight: f32,

    /// Score for a rule tied to an item in reach.
    pub item_weight: f32,

    /// Minimum score for inclusion.
    pub score_threshold: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_rule_excerpts: 8,
            history_window: 6,
            mention_weight: 3.0,
            scene_weight: 2.0,
            item_weight: 1.5,
            score_threshold: 0.5,
        }
    }
}

/// The context assembler builds prompts from state, rules and history.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ContextConfig::default())
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Score rules against the scene and the player's words.
    ///
    /// Rules with equal scores keep their declaration order.
    pub fn score_rules<'a>(
        &self,
        player_text: &str,
        state: &GameState,
        rules: &'a RuleSet,
    ) -> Vec<(&'a Rule, f32)> {
        let words = normalize(player_text);
        let exits: Vec<&LocationId> = rules
            .location(&state.location)
            .map(|here| here.exits.iter().map(|exit| &exit.to).collect())
            .unwrap_or_default();
        let in_reach = |item: &ItemId| state.has_item(item) || state.visible_items().contains(&item);

        let mut scored: Vec<(&Rule, f32)> = rules
            .rules()
            .iter()
            .map(|rule| {
                let mut score = 0.0;
                let trigger = &rule.trigger;

                if trigger.from.as_ref() == Some(&state.location) {
                    score += self.config.scene_weight;
                }
                if trigger.to.as_ref().is_some_and(|to| exits.contains(&to)) {
                    score += self.config.scene_weight;
                }
                if trigger.item.as_ref().is_some_and(|item| in_reach(item)) {
                    score += self.config.item_weight;
                }

                let mentioned = mentioned_names(rule, rules)
                    .iter()
                    .any(|name| !name.is_empty() && words.contains(name.as_str()));
                if mentioned {
                    score += self.config.mention_weight;
                }

                // Unconditional rules apply everywhere.
                if trigger.from.is_none() && trigger.to.is_none() && trigger.item.is_none() {
                    score += self.config.score_threshold;
                }

                (rule, score)
            })
            .filter(|(_, score)| *score >= self.config.score_threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.config.max_rule_excerpts);
        scored
    }

    /// Assemble complete context for the interpreter prompt.
    pub fn assemble(
        &self,
        player_text: &str,
        state: &GameState,
        rules: &RuleSet,
        log: &TurnLog,
    ) -> PromptContext {
        let here = rules.location(&state.location);

        let exits = here
            .map(|location| {
                location
                    .exits
                    .iter()
                    .map(|exit| ExitContext {
                        id: exit.to.to_string(),
                        name: location_name(&exit.to, rules),
                        open: exit.guard.as_ref().map_or(true, |guard| guard.holds(state)),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let rule_excerpts = self
            .score_rules(player_text, state, rules)
            .into_iter()
            .map(|(rule, _)| rule.excerpt())
            .collect();

        let history = log
            .recent(self.config.history_window)
            .iter()
            .map(|record| HistoryEntry {
                input: record.input.clone(),
                outcome: describe_outcome(&record.outcome),
            })
            .collect();

        PromptContext {
            player_action: player_text.to_string(),
            goal: rules
                .quest()
                .and_then(|quest| quest.goal.clone())
                .filter(|goal| !goal.is_empty()),
            location: LocationContext {
                id: state.location.to_string(),
                name: location_name(&state.location, rules),
                description: here.map(|l| l.description.clone()).unwrap_or_default(),
            },
            exits,
            visible_items: state
                .visible_items()
                .into_iter()
                .map(|item| item_context(item, rules))
                .collect(),
            inventory: state.inventory.iter().map(|item| item_context(item, rules)).collect(),
            flags: state
                .set_flags()
                .map(|(name, value)| format!("{} = {}", name, value))
                .collect(),
            rule_excerpts,
            history,
        }
    }
}

/// Lowercased words, with ids like `rusty_key` spoken as "rusty key".
fn normalize(text: &str) -> String {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!(" {} ", words.join(" "))
}

fn spoken(id: &str) -> String {
    normalize(&id.replace(['_', '-'], " "))
}

fn mentioned_names(rule: &Rule, rules: &RuleSet) -> Vec<String> {
    let trigger = &rule.trigger;
    let mut names = Vec::new();

    for location in trigger.from.iter().chain(trigger.to.iter()) {
        names.push(spoken(location.as_str()));
        if let Some(location) = rules.location(location) {
            names.push(normalize(&location.name));
        }
    }
    if let Some(item) = &trigger.item {
        names.push(spoken(item.as_str()));
        if let Some(item) = rules.item(item) {
            names.push(normalize(&item.name));
        }
    }
    if let Some(flag) = &trigger.flag {
        names.push(spoken(flag));
    }
    if let Some(subject) = &trigger.subject {
        names.push(normalize(subject));
    }
    if let Some(guard) = &rule.guard {
        collect_guard_names(guard, &mut names);
    }

    // An empty normalized name is " " after padding.
    names.retain(|name| !name.trim().is_empty());
    names
}

fn collect_guard_names(condition: &Condition, names: &mut Vec<String>) {
    for (_, id) in condition.references() {
        names.push(spoken(id));
    }
}

fn location_name(id: &LocationId, rules: &RuleSet) -> String {
    rules
        .location(id)
        .map(|location| location.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn item_context(id: &ItemId, rules: &RuleSet) -> ItemContext {
    ItemContext {
        id: id.to_string(),
        name: rules
            .item(id)
            .map(|item| item.display_name().to_string())
            .unwrap_or_else(|| id.to_string()),
    }
}

fn describe_outcome(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Applied { .. } => "applied".to_string(),
        TurnOutcome::NarrativeOnly { .. } => "no effect".to_string(),
        TurnOutcome::Rejected(rejection) => format!("rejected ({})", rejection),
    }
}

/// The assembled context ready for prompt generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    /// What the player typed this turn.
    pub player_action: String,
    pub goal: Option<String>,
    pub location: LocationContext,
    pub exits: Vec<ExitContext>,
    pub visible_items: Vec<ItemContext>,
    pub inventory: Vec<ItemContext>,
    /// Set flags as `name = value`.
    pub flags: Vec<String>,
    pub rule_excerpts: Vec<String>,
    /// Oldest first.
    pub history: Vec<HistoryEntry>,
}

impl PromptContext {
    /// Format the context as a prompt string.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Current Location\n");
        prompt.push_str(&format!("{} (id: {})\n", self.location.name, self.location.id));
        if !self.location.description.is_empty() {
            prompt.push_str(&self.location.description);
            prompt.push('\n');
        }
        prompt.push('\n');

        prompt.push_str("## Exits\n");
        if self.exits.is_empty() {
            prompt.push_str("- none\n");
        }
        for exit in &self.exits {
            prompt.push_str(&format!(
                "- {} (id: {}){}\n",
                exit.name,
                exit.id,
                if exit.open { "" } else { " [blocked]" }
            ));
        }
        prompt.push('\n');

        prompt.push_str("## Items Here\n");
        push_items(&mut prompt, &self.visible_items);
        prompt.push_str("## Inventory\n");
        push_items(&mut prompt, &self.inventory);

        if !self.flags.is_empty() {
            prompt.push_str("## World Facts\n");
            for flag in &self.flags {
                prompt.push_str(&format!("- {}\n", flag));
            }
            prompt.push('\n');
        }

        if let Some(goal) = &self.goal {
            prompt.push_str("## Quest Goal\n");
            prompt.push_str(goal);
            prompt.push_str("\n\n");
        }

        if !self.rule_excerpts.is_empty() {
            prompt.push_str("## Relevant Rules\n");
            for excerpt in &self.rule_excerpts {
                prompt.push_str(&format!("- {}\n", excerpt));
            }
            prompt.push('\n');
        }

        if !self.history.is_empty() {
            prompt.push_str("## Recent Turns\n");
            for entry in &self.history {
                prompt.push_str(&format!("- \"{}\" -> {}\n", entry.input, entry.outcome));
            }
            prompt.push('\n');
        }

        prompt.push_str("## Player Action\n");
        prompt.push_str(&self.player_action);
        prompt.push('\n');

        prompt
    }
}

fn push_items(prompt: &mut String, items: &[ItemContext]) {
    if items.is_empty() {
        prompt.push_str("- nothing\n");
    }
    for item in items {
        prompt.push_str(&format!("- {} (id: {})\n", item.name, item.id));
    }
    prompt.push('\n');
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationContext {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitContext {
    pub id: String,
    pub name: String,
    /// Whether the exit's guard currently holds.
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub input: String,
    pub outcome: String,
}
