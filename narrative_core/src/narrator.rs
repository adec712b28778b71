//! Narrator - renders resolved turns as player-facing text.
//!
//! Rejections are always told in the engine's own words, since the model's
//! narration was written before the rules had their say.

use game_rules::{Resolution, RuleSet, TurnOutcome};
use std::sync::Arc;
use std::time::Duration;

use crate::interpreter::Interpretation;
use crate::llm::{ChatMessage, FinishReason, LlmPort, LlmRequest};
use crate::prompts::{narrator_message, NARRATOR_SYSTEM_PROMPT};

/// Shown when the game master could not be reached.
pub const SILENT_WORLD: &str =
    "The world is silent, as if holding its breath. (The Game Master could not be reached. Try again in a moment.)";

pub struct Narrator {
    llm: Option<Arc<dyn LlmPort>>,
    timeout: Duration,
    temperature: f32,
    max_paragraphs: usize,
}

impl Narrator {
    /// A narrator that only uses the interpreter's and engine's text.
    pub fn new(max_paragraphs: usize) -> Self {
        Self {
            llm: None,
            timeout: Duration::from_secs(60),
            temperature: 0.8,
            max_paragraphs: max_paragraphs.max(1),
        }
    }

    /// Rewrite accepted turns through a second call to the service.
    pub fn with_embellishment(mut self, llm: Arc<dyn LlmPort>, timeout: Duration) -> Self {
        self.llm = Some(llm);
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Plain text for a turn, without consulting the service.
    pub fn render(&self, resolution: &Resolution, interpretation: &Interpretation) -> String {
        match &resolution.outcome {
            TurnOutcome::Rejected(_) if interpretation.is_service_failure() => SILENT_WORLD.to_string(),
            TurnOutcome::Rejected(_) => resolution.directive.text.clone(),
            TurnOutcome::Applied { .. } | TurnOutcome::NarrativeOnly { .. } => interpretation
                .narration
                .clone()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| resolution.directive.text.clone()),
        }
    }

    /// Final text for a turn, embellished when enabled and trimmed.
    pub async fn narrate(
        &self,
        player_text: &str,
        resolution: &Resolution,
        interpretation: &Interpretation,
        rules: &RuleSet,
    ) -> String {
        let plain = self.render(resolution, interpretation);

        let text = match &self.llm {
            Some(llm) if !resolution.outcome.is_rejected() => {
                self.embellish(llm.as_ref(), player_text, &plain, resolution, rules)
                    .await
                    .unwrap_or(plain)
            }
            _ => plain,
        };

        trim_paragraphs(&text, self.max_paragraphs)
    }

    async fn embellish(
        &self,
        llm: &dyn LlmPort,
        player_text: &str,
        plain: &str,
        resolution: &Resolution,
        rules: &RuleSet,
    ) -> Option<String> {
        let request = LlmRequest::new(vec![ChatMessage::user(narrator_message(
            player_text,
            plain,
            resolution,
            rules,
        ))])
        .with_system_prompt(NARRATOR_SYSTEM_PROMPT)
        .with_temperature(self.temperature);

        match tokio::time::timeout(self.timeout, llm.generate(request)).await {
            Ok(Ok(response)) if !response.content.trim().is_empty() => {
                if response.finish_reason == FinishReason::Length {
                    tracing::debug!("Narration was cut off by the token limit");
                }
                Some(response.content)
            }
            Ok(Ok(_)) => {
                tracing::warn!("Narrator returned an empty reply");
                None
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "Narration failed, using plain text");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Narration timed out, using plain text");
                None
            }
        }
    }
}

/// Keep the first `max` paragraphs; paragraphs are separated by blank lines.
pub fn trim_paragraphs(text: &str, max: usize) -> String {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current = Vec::new();

    for line in text.trim().lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .iter()
        .take(max.max(1))
        .map(|lines| lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, LlmResponse, MockLlmPort};
    use game_rules::{apply, CandidateIntent, GameState, Proposal};

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "start": { "location": "hall", "inventory": ["torch"] },
                "locations": [{ "id": "hall" }],
                "items": [{ "id": "torch" }, { "id": "sword" }]
            }"#,
        )
        .unwrap()
    }

    fn interpretation(intent: CandidateIntent, narration: Option<&str>) -> Interpretation {
        Interpretation {
            proposal: Proposal::Intent(intent),
            narration: narration.map(str::to_string),
            service_failure: None,
        }
    }

    #[test]
    fn test_accepted_turn_prefers_model_narration() {
        let rules = rules();
        let state = GameState::new(&rules);
        let intent = CandidateIntent::drop_item("torch");
        let resolution = apply(&intent, &state, &rules);

        let narrator = Narrator::new(3);
        let told = narrator.render(&resolution, &interpretation(intent.clone(), Some("It clatters.")));
        assert_eq!(told, "It clatters.");

        let plain = narrator.render(&resolution, &interpretation(intent, None));
        assert_eq!(plain, "You no longer have the torch.");
    }

    #[test]
    fn test_rejection_ignores_model_narration() {
        let rules = rules();
        let state = GameState::new(&rules);
        let intent = CandidateIntent::use_item("sword");
        let resolution = apply(&intent, &state, &rules);

        let told = Narrator::new(3).render(
            &resolution,
            &interpretation(intent, Some("You swing the sword mightily.")),
        );
        assert_eq!(told, "You are not carrying the sword.");
    }

    #[test]
    fn test_service_failure_is_silent_world() {
        let rules = rules();
        let state = GameState::new(&rules);
        let resolution = game_rules::Resolution::rejected(
            &state,
            game_rules::Rejection::Unrecognized {
                reason: "timeout".into(),
            },
        );
        let failed = Interpretation {
            proposal: Proposal::unrecognized("timeout"),
            narration: None,
            service_failure: Some(LlmError::Timeout(Duration::from_secs(1))),
        };

        assert_eq!(Narrator::new(3).render(&resolution, &failed), SILENT_WORLD);
    }

    #[tokio::test]
    async fn test_embellishment_and_fallback() {
        let rules = rules();
        let state = GameState::new(&rules);
        let intent = CandidateIntent::drop_item("torch");
        let resolution = apply(&intent, &state, &rules);
        let interpretation = interpretation(intent, None);

        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .withf(|request| request.messages[0].content.contains("no longer carries torch"))
            .times(1)
            .returning(|_| Ok(LlmResponse::new("The torch gutters on the flagstones.\n\nDarkness creeps in.")));
        let narrator = Narrator::new(1).with_embellishment(Arc::new(mock), Duration::from_secs(5));
        let told = narrator.narrate("drop torch", &resolution, &interpretation, &rules).await;
        assert_eq!(told, "The torch gutters on the flagstones.");

        let mut failing = MockLlmPort::new();
        failing
            .expect_generate()
            .returning(|_| Err(LlmError::InvalidResponse("garbage".into())));
        let narrator = Narrator::new(3).with_embellishment(Arc::new(failing), Duration::from_secs(5));
        let told = narrator.narrate("drop torch", &resolution, &interpretation, &rules).await;
        assert_eq!(told, "You no longer have the torch.");
    }

    #[tokio::test]
    async fn test_rejections_are_not_embellished() {
        let rules = rules();
        let state = GameState::new(&rules);
        let intent = CandidateIntent::use_item("sword");
        let resolution = apply(&intent, &state, &rules);

        // No expectations: any call would panic.
        let narrator = Narrator::new(3).with_embellishment(Arc::new(MockLlmPort::new()), Duration::from_secs(5));
        let told = narrator
            .narrate("swing sword", &resolution, &interpretation(intent, None), &rules)
            .await;
        assert_eq!(told, "You are not carrying the sword.");
    }

    #[test]
    fn test_trim_paragraphs() {
        let text = "First line\nstill first.\n  \nSecond.\n\n\nThird.";
        assert_eq!(trim_paragraphs(text, 2), "First line\nstill first.\n\nSecond.");
        assert_eq!(trim_paragraphs(text, 10), "First line\nstill first.\n\nSecond.\n\nThird.");
        assert_eq!(trim_paragraphs("", 3), "");
    }
}
