//! Session loop - one player, one game, one turn at a time.
//!
//! The session owns the only [`GameState`]. Each input line is either an
//! engine command or a turn: interpret, adjudicate, narrate, record, then
//! check whether the game has ended.

mod command;

pub use command::*;

use game_rules::{
    adjudicate, check_end, Ending, GameState, RuleLoadError, RuleSet, TurnLog, TurnOutcome,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::context_assembler::{ContextAssembler, ContextConfig};
use crate::interpreter::IntentInterpreter;
use crate::llm::LlmPort;
use crate::narrator::Narrator;
use crate::persist::{self, PersistError, SaveGame, Transcript};

/// Default location of the save file.
pub const DEFAULT_SAVE_PATH: &str = "saves/savegame.json";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load the rule set")]
    Rules(#[from] RuleLoadError),
    #[error("the session has already finished")]
    Finished,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    Quit,
    Ending(Ending),
    /// The game master failed too many times in a row.
    ServiceUnavailable,
}

/// What to show the player after one input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Blank input.
    Empty,
    /// Output of an engine command.
    Info(String),
    /// Narration of a resolved turn.
    Turn { text: String, outcome: TurnOutcome },
    /// The session is over.
    Finished { text: String, reason: EndReason },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Empty => "",
            Reply::Info(text) | Reply::Turn { text, .. } | Reply::Finished { text, .. } => text,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Reply::Finished { .. })
    }
}

/// Time one exchange with the service may take: every attempt plus the
/// sleeps between them.
fn turn_budget(config: &Config) -> std::time::Duration {
    config
        .llm
        .timeout
        .saturating_mul(config.retry.max_retries.saturating_add(1))
        .saturating_add(config.retry.max_backoff())
}

pub struct Session {
    rules: RuleSet,
    state: GameState,
    log: TurnLog,
    turns_taken: usize,
    interpreter: IntentInterpreter,
    narrator: Narrator,
    save_path: PathBuf,
    transcript: Option<Transcript>,
    consecutive_failures: u32,
    max_consecutive_failures: u32,
    finished: bool,
}

impl Session {
    pub fn new(rules: RuleSet, llm: Arc<dyn LlmPort>, config: &Config) -> Self {
        let assembler = ContextAssembler::new(ContextConfig {
            max_rule_excerpts: config.session.max_rule_excerpts,
            history_window: config.session.history_window,
            ..Default::default()
        });
        let turn_budget = turn_budget(config);

        let interpreter = IntentInterpreter::new(Arc::clone(&llm), assembler, turn_budget)
            .with_temperature(config.llm.interpreter_temperature);
        let mut narrator = Narrator::new(config.session.max_paragraphs)
            .with_temperature(config.llm.narrator_temperature);
        if config.session.embellish {
            narrator = narrator.with_embellishment(llm, turn_budget);
        }

        let state = GameState::new(&rules);
        tracing::info!(world = rules.title(), location = %state.location, "Session started");

        Self {
            rules,
            state,
            log: TurnLog::new(),
            turns_taken: 0,
            interpreter,
            narrator,
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
            transcript: None,
            consecutive_failures: 0,
            max_consecutive_failures: config.session.max_consecutive_failures.max(1),
            finished: false,
        }
    }

    /// Load the rule set from a file and start a session on it.
    pub fn from_rules_file(
        path: impl AsRef<Path>,
        llm: Arc<dyn LlmPort>,
        config: &Config,
    ) -> Result<Self, SessionError> {
        let rules = RuleSet::load(path)?;
        Ok(Self::new(rules, llm, config))
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = path.into();
        self
    }

    pub fn with_transcript(mut self, transcript: Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn log(&self) -> &TurnLog {
        &self.log
    }

    /// Player turns taken, including rejected ones.
    pub fn turns_taken(&self) -> usize {
        self.turns_taken
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Opening text: title, quest and starting location.
    pub fn intro(&self) -> String {
        let mut parts = Vec::new();
        if !self.rules.title().is_empty() {
            parts.push(self.rules.title().to_string());
        }
        if let Some(quest) = self.rules.quest() {
            let mut text = format!("Quest: {}", quest.name);
            if !quest.intro.is_empty() {
                text.push('\n');
                text.push_str(&quest.intro);
            }
            if let Some(goal) = &quest.goal {
                text.push_str(&format!("\nGoal: {}", goal));
            }
            parts.push(text);
        }
        if let Some(location) = self.rules.location(&self.state.location) {
            if !location.description.is_empty() {
                parts.push(location.description.clone());
            }
        }
        parts.join("\n\n")
    }

    /// Status line shown before each prompt, with every counter flag.
    pub fn header(&self) -> String {
        let location = self
            .rules
            .location(&self.state.location)
            .map(|location| location.display_name().to_string())
            .unwrap_or_else(|| self.state.location.to_string());

        let mut header = format!("---[ Location: {} | Turn: {}", location, self.turns_taken);
        for (name, value) in &self.state.flags {
            if let Some(count) = value.as_int() {
                header.push_str(&format!(" | {}: {}", name, count));
            }
        }
        header.push_str(" ]---");
        header
    }

    /// Handle one line of player input.
    pub async fn handle_input(&mut self, line: &str) -> Result<Reply, SessionError> {
        if self.finished {
            return Err(SessionError::Finished);
        }

        let input = line.trim();
        if input.is_empty() {
            return Ok(Reply::Empty);
        }

        if let Some(command) = MetaCommand::parse(input) {
            return Ok(self.run_command(command).await);
        }

        Ok(self.play_turn(input).await)
    }

    async fn run_command(&mut self, command: MetaCommand) -> Reply {
        match command {
            MetaCommand::Help => Reply::Info(HELP_TEXT.to_string()),
            MetaCommand::Inventory => Reply::Info(self.inventory_text()),
            MetaCommand::Save => match self.save().await {
                Ok(()) => Reply::Info("... Game saved. ...".to_string()),
                Err(error) => {
                    tracing::warn!(%error, "Save failed");
                    Reply::Info(format!("... Could not save: {} ...", error))
                }
            },
            MetaCommand::Load => self.load().await,
            MetaCommand::Quit => {
                self.finished = true;
                tracing::info!(turns = self.turns_taken, "Player quit");
                Reply::Finished {
                    text: "Goodbye Traveller!".to_string(),
                    reason: EndReason::Quit,
                }
            }
        }
    }

    async fn play_turn(&mut self, input: &str) -> Reply {
        let interpretation = self
            .interpreter
            .interpret(input, &self.state, &self.rules, &self.log)
            .await;
        let resolution = adjudicate(
            input,
            interpretation.proposal.clone(),
            &self.state,
            &self.rules,
            &mut self.log,
        );
        let text = self
            .narrator
            .narrate(input, &resolution, &interpretation, &self.rules)
            .await;

        tracing::info!(
            turn = self.log.len(),
            outcome = resolution.outcome.label(),
            rule = ?resolution.outcome.rule(),
            "Turn resolved"
        );

        self.state = resolution.state;
        self.turns_taken += 1;

        if let (Some(transcript), Some(record)) = (&self.transcript, self.log.last()) {
            if let Err(error) = transcript.append(record, &text).await {
                tracing::warn!(%error, "Could not write transcript");
            }
        }

        if interpretation.is_service_failure() {
            self.consecutive_failures += 1;
            tracing::warn!(
                failures = self.consecutive_failures,
                max = self.max_consecutive_failures,
                "Game master unavailable, running degraded"
            );
            if self.consecutive_failures >= self.max_consecutive_failures {
                return self.give_up(text).await;
            }
        } else {
            self.consecutive_failures = 0;
        }

        if let Some(reply) = self.finish_if_ended(&text) {
            return reply;
        }

        Reply::Turn {
            text,
            outcome: resolution.outcome,
        }
    }

    async fn give_up(&mut self, text: String) -> Reply {
        self.finished = true;
        tracing::error!(failures = self.consecutive_failures, "Ending session, game master unreachable");

        let saved = match self.save().await {
            Ok(()) => " Your progress has been saved.",
            Err(error) => {
                tracing::warn!(%error, "Could not save before ending");
                ""
            }
        };
        Reply::Finished {
            text: format!(
                "{}\n\nThe Game Master has fallen silent. The session ends here.{}",
                text, saved
            ),
            reason: EndReason::ServiceUnavailable,
        }
    }

    fn finish_if_ended(&mut self, text: &str) -> Option<Reply> {
        let ending = check_end(&self.state, self.turns_taken, &self.rules)?;
        self.finished = true;
        tracing::info!(won = ending.is_win(), turns = self.turns_taken, "Game over");

        let banner = if ending.is_win() {
            "--- GAME OVER: YOU WIN! ---"
        } else {
            "--- GAME OVER: YOU LOSE! ---"
        };
        Some(Reply::Finished {
            text: format!("{}\n\n{}\n{}", text, banner, ending.message()),
            reason: EndReason::Ending(ending),
        })
    }

    async fn save(&self) -> Result<(), PersistError> {
        let game = SaveGame::new(self.state.clone(), self.turns_taken, &self.rules);
        persist::save(&self.save_path, &game).await
    }

    async fn load(&mut self) -> Reply {
        match self.restore("... Game loaded. ...").await {
            Ok(reply) => reply,
            Err(PersistError::NoSave(_)) => Reply::Info("... No save file found. ...".to_string()),
            Err(error) => load_failed(&error),
        }
    }

    /// Continue the game in the save file, if there is one.
    ///
    /// Returns `None` when no save exists and the session starts fresh.
    pub async fn resume(&mut self) -> Option<Reply> {
        if self.finished {
            return None;
        }
        match self.restore("... Resuming your saved game. ...").await {
            Ok(reply) => Some(reply),
            Err(PersistError::NoSave(_)) => None,
            Err(error) => Some(load_failed(&error)),
        }
    }

    async fn restore(&mut self, text: &str) -> Result<Reply, PersistError> {
        let game = persist::load(&self.save_path, &self.rules).await?;
        self.state = game.state;
        self.turns_taken = game.turns_taken;
        self.consecutive_failures = 0;
        Ok(self
            .finish_if_ended(text)
            .unwrap_or_else(|| Reply::Info(text.to_string())))
    }

    fn inventory_text(&self) -> String {
        let mut text = String::from("--- Inventory ---\n");
        if self.state.inventory.is_empty() {
            text.push_str("  (empty)\n");
        }
        for id in &self.state.inventory {
            let name = self
                .rules
                .item(id)
                .map(|item| item.display_name().to_string())
                .unwrap_or_else(|| id.to_string());
            text.push_str(&format!("  * {}\n", name));
        }
        text.push_str("-----------------");
        text
    }
}

fn load_failed(error: &PersistError) -> Reply {
    tracing::warn!(%error, "Load failed");
    Reply::Info(format!("... Could not load save: {} ...", error))
}
