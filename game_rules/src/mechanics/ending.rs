//! Win and lose conditions.

use serde::{Deserialize, Serialize};

use crate::rule_set::RuleSet;
use crate::world_state::GameState;

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ending {
    Won { message: String },
    Lost { message: String },
}

impl Ending {
    pub fn message(&self) -> &str {
        match self {
            Ending::Won { message } | Ending::Lost { message } => message,
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Ending::Won { .. })
    }
}

/// Check the end conditions after `turns_taken` player turns.
///
/// Losing is checked before winning, and running out of turns before any
/// lose condition.
pub fn check_end(state: &GameState, turns_taken: usize, rules: &RuleSet) -> Option<Ending> {
    let end = rules.end_conditions();

    if let Some(max_turns) = end.max_turns {
        if turns_taken >= max_turns as usize {
            return Some(Ending::Lost {
                message: format!("You ran out of time! ({} turns)", max_turns),
            });
        }
    }

    if let Some(condition) = end.lose.iter().find(|c| c.holds(state)) {
        let message = end
            .lose_message
            .clone()
            .unwrap_or_else(|| format!("You have met a losing condition: {}.", condition.describe()));
        return Some(Ending::Lost { message });
    }

    if end.win.as_ref().is_some_and(|c| c.holds(state)) {
        let message = end
            .win_message
            .clone()
            .unwrap_or_else(|| "You have won the game! Congratulations!".to_string());
        return Some(Ending::Won { message });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LocationId;
    use crate::world_state::FlagValue;

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "start": { "location": "gate" },
                "locations": [{ "id": "gate" }, { "id": "throne" }],
                "flags_default": { "hp": 3 },
                "end_conditions": {
                    "max_turns": 10,
                    "win": { "at": "throne" },
                    "lose": [{ "counter_at_most": { "flag": "hp", "value": 0 } }],
                    "lose_message": "You collapse."
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_no_ending_at_start() {
        let rules = rules();
        assert_eq!(check_end(&GameState::new(&rules), 0, &rules), None);
    }

    #[test]
    fn test_win_and_lose() {
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.location = LocationId::new("throne");
        assert!(check_end(&state, 3, &rules).unwrap().is_win());

        // Losing takes priority over winning.
        state.flags.insert("hp".into(), FlagValue::Int(0));
        assert_eq!(
            check_end(&state, 3, &rules),
            Some(Ending::Lost {
                message: "You collapse.".into()
            })
        );
    }

    #[test]
    fn test_out_of_turns() {
        let rules = rules();
        let state = GameState::new(&rules);
        let ending = check_end(&state, 10, &rules).unwrap();
        assert!(!ending.is_win());
        assert!(ending.message().contains("10 turns"));
    }
}
