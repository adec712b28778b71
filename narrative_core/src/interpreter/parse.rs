//! Tolerant parsing of interpreter replies.
//!
//! Models wrap JSON in code fences, add chatter around it, and use their own
//! verbs. Anything that still contains a JSON object with an action is
//! accepted; everything else is a [`ReplyError`].

use game_rules::{ActionKind, CandidateIntent, ItemId, LocationId, RuleSet};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplyError {
    #[error("reply contains no JSON object")]
    NoJson,
    #[error("reply is not valid JSON: {0}")]
    Malformed(String),
    #[error("reply names no action")]
    MissingAction,
}

type Fields = serde_json::Map<String, Value>;

// Keys models use for each field, canonical key first.
const ACTION_KEYS: &[&str] = &["action", "intent", "verb"];
const LOCATION_KEYS: &[&str] = &["location", "destination", "target_location"];
const ITEM_KEYS: &[&str] = &["item", "object", "target_item"];
const FLAG_KEYS: &[&str] = &["flag"];
const SUBJECT_KEYS: &[&str] = &["subject", "npc"];
const JUSTIFICATION_KEYS: &[&str] = &["justification", "reason"];
const NARRATION_KEYS: &[&str] = &["narration", "narrative", "description"];

/// A reply reduced to a candidate intent.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub intent: CandidateIntent,
    /// The model's own telling of the attempt.
    pub narration: Option<String>,
}

/// Parse a reply, resolving names the model used to ids of `rules`.
///
/// Names that match nothing are kept verbatim so the engine can reject them.
pub fn parse_reply(text: &str, rules: &RuleSet) -> Result<ParsedReply, ReplyError> {
    let json = extract_json(text).ok_or(ReplyError::NoJson)?;
    let fields: Fields =
        serde_json::from_str(json).map_err(|e| ReplyError::Malformed(e.to_string()))?;

    let action = field(&fields, ACTION_KEYS).ok_or(ReplyError::MissingAction)?;
    let mut intent = CandidateIntent::new(action_from_word(&action));
    let mut location = field(&fields, LOCATION_KEYS);
    let mut item = field(&fields, ITEM_KEYS);
    let mut subject = field(&fields, SUBJECT_KEYS);

    // A bare "target" fills whichever slot the action needs.
    if let Some(target) = field(&fields, &["target"]) {
        let slot = match intent.action {
            ActionKind::Move => &mut location,
            ActionKind::Take | ActionKind::Drop | ActionKind::Use | ActionKind::Examine => &mut item,
            ActionKind::Talk | ActionKind::Other => &mut subject,
        };
        slot.get_or_insert(target);
    }

    intent.location = location.map(|name| resolve_location(&name, rules));
    intent.item = item.map(|name| resolve_item(&name, rules));
    intent.flag = field(&fields, FLAG_KEYS).map(|name| resolve_flag(&name, rules));
    intent.subject = subject;
    intent.justification = field(&fields, JUSTIFICATION_KEYS).unwrap_or_default();

    Ok(ParsedReply {
        intent,
        narration: field(&fields, NARRATION_KEYS),
    })
}

/// Map a verb to an action; unknown verbs become [`ActionKind::Other`].
pub fn action_from_word(word: &str) -> ActionKind {
    let word = word.trim().to_lowercase();
    if let Ok(action) = word.parse() {
        return action;
    }

    let head = word
        .split(|c: char| !c.is_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default();

    match head {
        "go" | "walk" | "run" | "head" | "enter" | "climb" | "travel" | "return" | "flee"
        | "descend" | "ascend" => ActionKind::Move,
        "get" | "grab" | "pick" | "collect" | "steal" | "obtain" => ActionKind::Take,
        "discard" | "put" | "throw" | "toss" => ActionKind::Drop,
        "open" | "unlock" | "light" | "apply" | "push" | "pull" | "turn" | "wield"
        | "activate" => ActionKind::Use,
        "look" | "inspect" | "read" | "search" | "check" | "study" | "observe"
        | "investigate" | "x" => ActionKind::Examine,
        "ask" | "speak" | "say" | "tell" | "greet" | "chat" | "shout" | "call" => ActionKind::Talk,
        _ => ActionKind::Other,
    }
}

fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// First usable value among `keys`; blanks and "null"/"none" count as absent.
fn field(fields: &Fields, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let text = match fields.get(*key)? {
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return None,
        };
        let absent =
            text.is_empty() || text.eq_ignore_ascii_case("null") || text.eq_ignore_ascii_case("none");
        (!absent).then_some(text)
    })
}

/// Comparison key: lowercase words without articles, joined by `_`.
fn name_key(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !matches!(w.as_str(), "the" | "a" | "an"))
        .collect::<Vec<_>>()
        .join("_")
}

fn resolve_location(name: &str, rules: &RuleSet) -> LocationId {
    let key = name_key(name);
    rules
        .locations()
        .iter()
        .find(|l| name_key(l.id.as_str()) == key || name_key(&l.name) == key)
        .map(|l| l.id.clone())
        .unwrap_or_else(|| LocationId::new(name))
}

fn resolve_item(name: &str, rules: &RuleSet) -> ItemId {
    let key = name_key(name);
    rules
        .items()
        .iter()
        .find(|i| name_key(i.id.as_str()) == key || name_key(&i.name) == key)
        .map(|i| i.id.clone())
        .unwrap_or_else(|| ItemId::new(name))
}

fn resolve_flag(name: &str, rules: &RuleSet) -> String {
    let key = name_key(name);
    rules
        .flags_default()
        .keys()
        .find(|flag| name_key(flag) == key)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "start": { "location": "hall" },
                "locations": [{ "id": "hall" }, { "id": "wine_cellar", "name": "The Wine Cellar" }],
                "items": [{ "id": "rusty_key", "name": "Rusty Key" }],
                "flags_default": { "hasKey": false }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parses_fenced_reply_with_chatter() {
        let reply = "Sure! Here is the intent:\n```json\n{\"action\": \"take\", \"item\": \"rusty_key\", \"narration\": \"You reach for the key.\"}\n```\nHave fun.";
        let parsed = parse_reply(reply, &rules()).unwrap();
        assert_eq!(parsed.intent, CandidateIntent::take("rusty_key"));
        assert_eq!(parsed.narration.as_deref(), Some("You reach for the key."));
    }

    #[test]
    fn test_resolves_names_to_ids() {
        let rules = rules();
        let parsed = parse_reply(
            r#"{"action": "walk", "location": "the wine cellar", "item": "Rusty Key", "flag": "haskey"}"#,
            &rules,
        )
        .unwrap();

        assert_eq!(parsed.intent.action, ActionKind::Move);
        assert_eq!(parsed.intent.location, Some(LocationId::new("wine_cellar")));
        assert_eq!(parsed.intent.item, Some(ItemId::new("rusty_key")));
        assert_eq!(parsed.intent.flag.as_deref(), Some("hasKey"));
    }

    #[test]
    fn test_unknown_names_are_kept() {
        let parsed = parse_reply(r#"{"action": "take", "item": "golden crown"}"#, &rules()).unwrap();
        assert_eq!(parsed.intent.item, Some(ItemId::new("golden crown")));
    }

    #[test]
    fn test_null_like_fields_are_dropped() {
        let parsed = parse_reply(
            r#"{"action": "examine", "item": null, "location": "", "subject": "none"}"#,
            &rules(),
        )
        .unwrap();
        assert_eq!(parsed.intent, CandidateIntent::new(ActionKind::Examine));
        assert_eq!(parsed.narration, None);
    }

    #[test]
    fn test_canonical_key_wins_over_synonym() {
        let parsed = parse_reply(
            r#"{"action":"examine","item":"rusty key","description":"An old key.","narration":"You turn the key over."}"#,
            &rules(),
        )
        .unwrap();
        assert_eq!(parsed.intent.item, Some(ItemId::new("rusty_key")));
        assert_eq!(parsed.narration.as_deref(), Some("You turn the key over."));

        let parsed = parse_reply(
            r#"{"verb":"take","object":"rusty key","narrative":"Got it."}"#,
            &rules(),
        )
        .unwrap();
        assert_eq!(parsed.intent, CandidateIntent::take("rusty_key"));
        assert_eq!(parsed.narration.as_deref(), Some("Got it."));
    }

    #[test]
    fn test_target_follows_the_action() {
        let rules = rules();
        let moved = parse_reply(r#"{"action":"move","target":"wine cellar"}"#, &rules).unwrap();
        assert_eq!(moved.intent, CandidateIntent::move_to("wine_cellar"));
        assert_eq!(moved.intent.subject, None);

        let taken = parse_reply(r#"{"action":"take","target":"Rusty Key"}"#, &rules).unwrap();
        assert_eq!(taken.intent, CandidateIntent::take("rusty_key"));

        let talked = parse_reply(r#"{"action":"talk","target":"the innkeeper"}"#, &rules).unwrap();
        assert_eq!(talked.intent.subject.as_deref(), Some("the innkeeper"));

        let both = parse_reply(
            r#"{"action":"move","location":"hall","target":"wine cellar"}"#,
            &rules,
        )
        .unwrap();
        assert_eq!(both.intent.location, Some(LocationId::new("hall")));
    }

    #[test]
    fn test_action_synonyms() {
        assert_eq!(action_from_word("Pick up"), ActionKind::Take);
        assert_eq!(action_from_word("look_at"), ActionKind::Examine);
        assert_eq!(action_from_word("ASK"), ActionKind::Talk);
        assert_eq!(action_from_word("drop"), ActionKind::Drop);
        assert_eq!(action_from_word("juggle"), ActionKind::Other);
    }

    #[test]
    fn test_reply_errors() {
        let rules = rules();
        assert_eq!(parse_reply("I cannot do that.", &rules), Err(ReplyError::NoJson));
        assert!(matches!(
            parse_reply("{action: take}", &rules),
            Err(ReplyError::Malformed(_))
        ));
        assert_eq!(
            parse_reply(r#"{"narration": "You wait."}"#, &rules),
            Err(ReplyError::MissingAction)
        );
    }
}
