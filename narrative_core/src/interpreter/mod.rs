//! Intent Interpreter - turns free player text into a proposal for the engine.
//!
//! The interpreter only proposes. Whatever the model replies, the result is a
//! [`Proposal`] that the enforcement engine is free to reject, and no failure
//! of the service ever surfaces as an error.

mod parse;

pub use parse::*;

use game_rules::{GameState, Proposal, RuleSet, TurnLog};
use std::sync::Arc;
use std::time::Duration;

use crate::context_assembler::ContextAssembler;
use crate::llm::{ChatMessage, LlmError, LlmPort, LlmRequest};
use crate::prompts::INTERPRETER_SYSTEM_PROMPT;

/// What the interpreter made of one line of player text.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub proposal: Proposal,
    /// The model's telling of the attempt, if it offered one.
    pub narration: Option<String>,
    /// Set when the service could not be reached in time.
    pub service_failure: Option<LlmError>,
}

impl Interpretation {
    fn unrecognized(reason: impl Into<String>) -> Self {
        Self {
            proposal: Proposal::unrecognized(reason),
            narration: None,
            service_failure: None,
        }
    }

    fn service_failed(error: LlmError) -> Self {
        Self {
            proposal: Proposal::unrecognized(format!("game master unavailable: {}", error)),
            narration: None,
            service_failure: Some(error),
        }
    }

    pub fn is_service_failure(&self) -> bool {
        self.service_failure.is_some()
    }
}

pub struct IntentInterpreter {
    llm: Arc<dyn LlmPort>,
    assembler: ContextAssembler,
    timeout: Duration,
    temperature: f32,
}

impl IntentInterpreter {
    /// `timeout` bounds the whole exchange, retries included.
    pub fn new(llm: Arc<dyn LlmPort>, assembler: ContextAssembler, timeout: Duration) -> Self {
        Self {
            llm,
            assembler,
            timeout,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn interpret(
        &self,
        player_text: &str,
        state: &GameState,
        rules: &RuleSet,
        log: &TurnLog,
    ) -> Interpretation {
        let context = self.assembler.assemble(player_text, state, rules, log);
        let request = LlmRequest::new(vec![ChatMessage::user(context.to_prompt_string())])
            .with_system_prompt(INTERPRETER_SYSTEM_PROMPT)
            .with_temperature(self.temperature)
            .json();

        let response = match tokio::time::timeout(self.timeout, self.llm.generate(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                tracing::warn!(%error, "Interpreter could not reach the game master");
                return Interpretation::service_failed(error);
            }
            Err(_) => {
                let error = LlmError::Timeout(self.timeout);
                tracing::warn!(%error, "Interpreter gave up waiting for the game master");
                return Interpretation::service_failed(error);
            }
        };

        match parse_reply(&response.content, rules) {
            Ok(reply) => {
                tracing::debug!(
                    action = %reply.intent.action,
                    location = ?reply.intent.location,
                    item = ?reply.intent.item,
                    "Interpreted player action"
                );
                Interpretation {
                    proposal: reply.intent.into(),
                    narration: reply.narration,
                    service_failure: None,
                }
            }
            Err(error) => {
                tracing::warn!(%error, reply = %response.content, "Unusable interpreter reply");
                Interpretation::unrecognized(error.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmPort};
    use async_trait::async_trait;
    use game_rules::{ActionKind, CandidateIntent};

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "start": { "location": "hall", "inventory": ["torch"] },
                "locations": [{ "id": "hall", "exits": [{ "to": "yard" }] }, { "id": "yard" }],
                "items": [{ "id": "torch" }]
            }"#,
        )
        .unwrap()
    }

    fn interpreter(llm: impl LlmPort + 'static) -> IntentInterpreter {
        IntentInterpreter::new(
            Arc::new(llm),
            ContextAssembler::with_defaults(),
            Duration::from_secs(5),
        )
    }

    struct SilentLlm;

    #[async_trait]
    impl LlmPort for SilentLlm {
        async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(LlmResponse::new("{}"))
        }
    }

    #[tokio::test]
    async fn test_interprets_reply() {
        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .withf(|request| {
                request.json_mode
                    && request.system_prompt.is_some()
                    && request.messages[0].content.contains("go outside")
            })
            .times(1)
            .returning(|_| {
                Ok(LlmResponse::new(
                    r#"{"action": "go", "location": "yard", "narration": "You step outside."}"#,
                ))
            });

        let rules = rules();
        let state = GameState::new(&rules);
        let interpretation = interpreter(mock)
            .interpret("go outside", &state, &rules, &TurnLog::new())
            .await;

        assert_eq!(
            interpretation.proposal,
            Proposal::Intent(CandidateIntent::move_to("yard"))
        );
        assert_eq!(interpretation.narration.as_deref(), Some("You step outside."));
        assert!(!interpretation.is_service_failure());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_unrecognized() {
        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .returning(|_| Ok(LlmResponse::new("The torch flickers.")));

        let rules = rules();
        let state = GameState::new(&rules);
        let interpretation = interpreter(mock)
            .interpret("wave the torch", &state, &rules, &TurnLog::new())
            .await;

        assert!(matches!(interpretation.proposal, Proposal::Unrecognized { .. }));
        assert!(!interpretation.is_service_failure());
    }

    #[tokio::test]
    async fn test_service_error_is_unrecognized() {
        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .returning(|_| Err(LlmError::RequestFailed("connection refused".into())));

        let rules = rules();
        let state = GameState::new(&rules);
        let interpretation = interpreter(mock)
            .interpret("look", &state, &rules, &TurnLog::new())
            .await;

        assert!(matches!(interpretation.proposal, Proposal::Unrecognized { .. }));
        assert_eq!(
            interpretation.service_failure,
            Some(LlmError::RequestFailed("connection refused".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unrecognized() {
        let rules = rules();
        let state = GameState::new(&rules);
        let interpretation = interpreter(SilentLlm)
            .interpret("look", &state, &rules, &TurnLog::new())
            .await;

        assert!(matches!(interpretation.proposal, Proposal::Unrecognized { .. }));
        assert_eq!(
            interpretation.service_failure,
            Some(LlmError::Timeout(Duration::from_secs(5)))
        );
    }

    #[tokio::test]
    async fn test_unknown_verb_becomes_other() {
        let mut mock = MockLlmPort::new();
        mock.expect_generate()
            .returning(|_| Ok(LlmResponse::new(r#"{"action": "juggle", "item": "torch"}"#)));

        let rules = rules();
        let state = GameState::new(&rules);
        let interpretation = interpreter(mock)
            .interpret("juggle the torch", &state, &rules, &TurnLog::new())
            .await;

        let intent = interpretation.proposal.intent().unwrap();
        assert_eq!(intent.action, ActionKind::Other);
    }
}
