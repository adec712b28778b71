//! System prompts for the Game Master.

use game_rules::{NarrativeDirective, Resolution, RuleSet};

/// Instructions for turning player text into a candidate intent.
pub const INTERPRETER_SYSTEM_PROMPT: &str = r#"You are the Game Master of a text adventure.
You do not decide what happens. You translate the player's action into a single intent,
which the game engine then checks against the rules.

Reply with exactly one JSON object and nothing else:
{
  "action": "move" | "take" | "drop" | "use" | "examine" | "talk" | "other",
  "location": "<location id, for move>",
  "item": "<item id, for take, drop, use or examine>",
  "flag": "<world fact id, if the action targets one>",
  "subject": "<who or what is addressed, for talk>",
  "justification": "<one short sentence on why you chose this intent>",
  "narration": "<two or three sentences describing the attempt in second person>"
}

Use the ids shown in the context. Leave out fields that do not apply.
If the player asks for something impossible, still report what they tried.
Never invent items, places or facts that are not in the context."#;

/// Instructions for rewriting a decided outcome.
pub const NARRATOR_SYSTEM_PROMPT: &str = r#"You are the narrator of a text adventure.
The game engine has already decided what happened. Retell it vividly in second person,
in at most three short paragraphs. Do not add items, exits, or outcomes that are not listed.
Do not contradict the listed changes. Reply with prose only."#;

/// User message asking the narrator to retell a resolved turn.
pub fn narrator_message(
    player_action: &str,
    plain_text: &str,
    resolution: &Resolution,
    rules: &RuleSet,
) -> String {
    let mut message = String::new();

    message.push_str("## Player Action\n");
    message.push_str(player_action);
    message.push_str("\n\n");

    let location = rules
        .location(&resolution.state.location)
        .map(|location| location.display_name().to_string())
        .unwrap_or_else(|| resolution.state.location.to_string());
    message.push_str("## Location\n");
    message.push_str(&location);
    message.push_str("\n\n");

    push_changes(&mut message, &resolution.directive);

    message.push_str("## What Happened\n");
    message.push_str(plain_text);
    message.push('\n');

    message
}

fn push_changes(message: &mut String, directive: &NarrativeDirective) {
    message.push_str("## Changes\n");
    if directive.changes.is_empty() {
        message.push_str("- nothing changed\n");
    }
    for change in &directive.changes {
        message.push_str(&format!("- {}\n", change));
    }
    message.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_rules::{apply, CandidateIntent, GameState};

    #[test]
    fn test_narrator_message_lists_changes() {
        let rules = RuleSet::from_json_str(
            r#"{
                "start": { "location": "hall", "inventory": ["torch"] },
                "locations": [{ "id": "hall", "name": "Great Hall" }],
                "items": [{ "id": "torch" }]
            }"#,
        )
        .unwrap();
        let state = GameState::new(&rules);
        let resolution = apply(&CandidateIntent::drop_item("torch"), &state, &rules);

        let message = narrator_message("drop torch", &resolution.directive.text, &resolution, &rules);
        assert!(message.contains("Great Hall"));
        assert!(message.contains("- the player no longer carries torch"));
        assert!(message.contains("You no longer have the torch."));
    }
}
