//! Game mechanics - the rule enforcement engine.
//!
//! Resolving a candidate intent works as follows:
//! 1. **Resolve**: every target the intent names must exist and be in reach
//!    (item carried, location adjacent). Otherwise the turn is a rule violation.
//! 2. **Match**: rules of the kind serving the action are tried in precedence
//!    order; the first whose trigger matches wins.
//! 3. **Guard**: a failed guard on the rule (or on the exit being taken)
//!    rejects the turn as a failed precondition.
//! 4. **Apply**: the built-in mechanic for move/take/drop runs, then the
//!    rule's effects, all on a copy of the state. Any failing effect rejects
//!    the whole turn.
//! 5. **Classify**: a changed world is `Applied`, an unchanged one is
//!    `NarrativeOnly`.
//!
//! The engine never sees raw player text and never mutates its input.

mod ending;
mod intent;
mod outcome;

pub use ending::*;
pub use intent::*;
pub use outcome::*;

use crate::entities::{EntityType, ItemId};
use crate::rule_set::{humanize, Effect, Rule, RuleKind, RuleSet};
use crate::world_state::{FlagValue, GameState, StateChange, TurnLog};

/// Resolve one candidate intent against the current state.
pub fn apply(intent: &CandidateIntent, state: &GameState, rules: &RuleSet) -> Resolution {
    if let Err(violation) = resolve_targets(intent, state, rules) {
        tracing::debug!(action = %intent.action, %violation, "Intent violates the rules");
        return Resolution::rejected(state, Rejection::RuleViolation(violation));
    }

    let rule = rules
        .rules_by_precedence(RuleKind::for_action(intent.action))
        .into_iter()
        .find(|rule| rule.matches(intent, state));

    if let Some(rejection) = rule.and_then(|rule| check_rule_guard(rule, state)) {
        return Resolution::rejected(state, rejection);
    }
    if let Some(rejection) = check_exit_guard(intent, state, rules) {
        return Resolution::rejected(state, rejection);
    }

    let mut next = state.clone();
    let mut narration = Vec::new();

    if let Err(violation) = apply_builtin(intent, &mut next, rules) {
        return Resolution::rejected(state, Rejection::RuleViolation(violation));
    }
    if let Some(rule) = rule {
        if let Err(violation) = apply_effects(&rule.effect, &mut next, rules, &mut narration) {
            return Resolution::rejected(state, Rejection::RuleViolation(violation));
        }
        if let Some(text) = &rule.narrative {
            narration.insert(0, text.clone());
        }
    }

    let rule_id = rule.map(|rule| rule.id.clone());

    if next.same_world(state) {
        tracing::debug!(action = %intent.action, rule = ?rule_id, "Intent has no mechanical effect");
        let text = if narration.is_empty() {
            "Nothing much happens.".to_string()
        } else {
            narration.join(" ")
        };
        return Resolution {
            state: state.clone(),
            outcome: TurnOutcome::NarrativeOnly { rule: rule_id },
            directive: NarrativeDirective::new(text),
        };
    }

    next.turn += 1;
    let changes = next.changes_since(state);
    let mut text = describe_changes(&changes, rules);
    text.extend(narration);

    tracing::debug!(action = %intent.action, rule = ?rule_id, changes = changes.len(), "Intent applied");
    Resolution {
        state: next,
        outcome: TurnOutcome::Applied { rule: rule_id },
        directive: NarrativeDirective::new(text.join(" ")).with_changes(changes),
    }
}

/// Resolve a proposal and append the turn record.
///
/// An unrecognized proposal is rejected without consulting any rule.
pub fn adjudicate(
    input: &str,
    proposal: Proposal,
    state: &GameState,
    rules: &RuleSet,
    log: &mut TurnLog,
) -> Resolution {
    let resolution = match &proposal {
        Proposal::Intent(intent) => apply(intent, state, rules),
        Proposal::Unrecognized { reason } => Resolution::rejected(
            state,
            Rejection::Unrecognized {
                reason: reason.clone(),
            },
        ),
    };

    let record = log.append(
        input,
        proposal,
        resolution.outcome.clone(),
        resolution.directive.changes.clone(),
        resolution.state.clone(),
    );
    tracing::debug!(
        turn = record.number,
        outcome = record.outcome.label(),
        "Turn recorded"
    );

    resolution
}

fn resolve_targets(
    intent: &CandidateIntent,
    state: &GameState,
    rules: &RuleSet,
) -> Result<(), Violation> {
    if let Some(flag) = &intent.flag {
        if !rules.has_flag(flag) {
            return Err(Violation::UnknownFlag(flag.clone()));
        }
    }
    if let Some(item) = &intent.item {
        if rules.item(item).is_none() {
            return Err(Violation::UnknownItem(item.clone()));
        }
    }
    if let Some(location) = &intent.location {
        if rules.location(location).is_none() {
            return Err(Violation::UnknownLocation(location.clone()));
        }
    }

    let missing = |target| Violation::MissingTarget {
        action: intent.action,
        target,
    };

    match intent.action {
        ActionKind::Move => {
            let target = intent
                .location
                .as_ref()
                .ok_or_else(|| missing(EntityType::Location))?;
            if target == &state.location {
                return Err(Violation::AlreadyThere(target.clone()));
            }
            let reachable = rules
                .location(&state.location)
                .and_then(|here| here.exit_to(target))
                .is_some();
            if !reachable {
                return Err(Violation::NotAdjacent {
                    from: state.location.clone(),
                    to: target.clone(),
                });
            }
        }
        ActionKind::Take => {
            let item = intent.item.as_ref().ok_or_else(|| missing(EntityType::Item))?;
            if state.has_item(item) {
                return Err(Violation::AlreadyCarried(item.clone()));
            }
            if !lies_here(item, state) {
                return Err(Violation::NotHere(item.clone()));
            }
        }
        ActionKind::Drop | ActionKind::Use => {
            let item = intent.item.as_ref().ok_or_else(|| missing(EntityType::Item))?;
            if !state.has_item(item) {
                return Err(Violation::NotCarried(item.clone()));
            }
        }
        ActionKind::Examine | ActionKind::Talk | ActionKind::Other => {
            if let Some(item) = &intent.item {
                if !state.has_item(item) && !lies_here(item, state) {
                    return Err(Violation::NotHere(item.clone()));
                }
            }
        }
    }

    Ok(())
}

fn lies_here(item: &ItemId, state: &GameState) -> bool {
    state.placements.get(item) == Some(&state.location)
}

fn check_rule_guard(rule: &Rule, state: &GameState) -> Option<Rejection> {
    let guard = rule.guard.as_ref()?;
    if guard.holds(state) {
        return None;
    }
    tracing::debug!(rule = %rule.id, "Rule guard not satisfied");
    let reason = rule
        .denial
        .clone()
        .unwrap_or_else(|| format!("You can't do that yet: {}.", guard.describe()));
    Some(Rejection::PreconditionFailed {
        rule: Some(rule.id.clone()),
        reason,
    })
}

fn check_exit_guard(
    intent: &CandidateIntent,
    state: &GameState,
    rules: &RuleSet,
) -> Option<Rejection> {
    if intent.action != ActionKind::Move {
        return None;
    }
    let target = intent.location.as_ref()?;
    let exit = rules.location(&state.location)?.exit_to(target)?;
    let guard = exit.guard.as_ref()?;
    if guard.holds(state) {
        return None;
    }
    tracing::debug!(from = %state.location, to = %target, "Exit guard not satisfied");
    let reason = exit.denial.clone().unwrap_or_else(|| {
        format!(
            "The way to the {} is barred: {}.",
            humanize(target.as_str()),
            guard.describe()
        )
    });
    Some(Rejection::PreconditionFailed {
        rule: Some(format!("exit {} -> {}", state.location, target)),
        reason,
    })
}

/// Move, take and drop change the world even when no rule mentions them.
fn apply_builtin(
    intent: &CandidateIntent,
    state: &mut GameState,
    rules: &RuleSet,
) -> Result<(), Violation> {
    match (intent.action, &intent.location, &intent.item) {
        (ActionKind::Move, Some(target), _) => state.location = target.clone(),
        (ActionKind::Take, _, Some(item)) => add_item(state, item, rules)?,
        (ActionKind::Drop, _, Some(item)) => {
            state.inventory.remove(item);
            state.placements.insert(item.clone(), state.location.clone());
        }
        _ => {}
    }
    Ok(())
}

fn apply_effects(
    effects: &[Effect],
    state: &mut GameState,
    rules: &RuleSet,
    narration: &mut Vec<String>,
) -> Result<(), Violation> {
    for effect in effects {
        match effect {
            Effect::MoveTo(location) => state.location = location.clone(),
            Effect::AddItem(item) => add_item(state, item, rules)?,
            Effect::RemoveItem(item) => {
                state.inventory.remove(item);
            }
            Effect::SetFlag { flag, value } => {
                state.flags.insert(flag.clone(), value.clone());
            }
            Effect::ClearFlag(flag) => {
                if let Some(value) = state.flags.get_mut(flag) {
                    *value = value.cleared();
                }
            }
            Effect::Adjust { flag, delta } => {
                let current = state.counter(flag).unwrap_or(0);
                let next = current.saturating_add(*delta).max(0);
                state.flags.insert(flag.clone(), FlagValue::Int(next));
            }
            Effect::Narrate(text) => narration.push(text.clone()),
        }
    }
    Ok(())
}

fn add_item(state: &mut GameState, item: &ItemId, rules: &RuleSet) -> Result<(), Violation> {
    if state.has_item(item) {
        return Ok(());
    }
    if let Some(limit) = rules.inventory_limit() {
        if state.inventory.len() >= limit {
            return Err(Violation::InventoryFull { limit });
        }
    }
    state.placements.remove(item);
    state.inventory.insert(item.clone());
    Ok(())
}

fn describe_changes(changes: &[StateChange], rules: &RuleSet) -> Vec<String> {
    changes
        .iter()
        .filter_map(|change| match change {
            StateChange::Moved { to, .. } => {
                let name = rules
                    .location(to)
                    .map(|location| location.display_name().to_string())
                    .unwrap_or_else(|| humanize(to.as_str()));
                Some(format!("You go to {}.", name))
            }
            StateChange::ItemGained(item) => Some(format!("You now have the {}.", item_name(item, rules))),
            StateChange::ItemLost(item) => {
                Some(format!("You no longer have the {}.", item_name(item, rules)))
            }
            StateChange::FlagChanged { .. } => None,
        })
        .collect()
}

fn item_name(item: &ItemId, rules: &RuleSet) -> String {
    rules
        .item(item)
        .map(|item| humanize(item.display_name()))
        .unwrap_or_else(|| humanize(item.as_str()))
}
