//! Save games and turn transcripts on disk.

use game_rules::{GameState, RuleSet, StateError, TurnRecord};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const SAVE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("no save file at {0}")]
    NoSave(PathBuf),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a valid save file")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("save was made for '{found}', not '{expected}'")]
    WrongWorld { expected: String, found: String },
    #[error("saved state does not fit the rules: {0}")]
    Incompatible(#[from] StateError),
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub version: u32,
    /// Title of the rule set the game was played with.
    pub world: String,
    pub state: GameState,
    /// Player turns taken, counted against `max_turns`.
    pub turns_taken: usize,
}

impl SaveGame {
    pub fn new(state: GameState, turns_taken: usize, rules: &RuleSet) -> Self {
        Self {
            version: SAVE_VERSION,
            world: rules.title().to_string(),
            state,
            turns_taken,
        }
    }
}

/// Write a save file, creating parent directories as needed.
pub async fn save(path: &Path, game: &SaveGame) -> Result<(), PersistError> {
    let io_error = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    let json = serde_json::to_vec_pretty(game).map_err(|source| PersistError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    tokio::fs::write(path, json).await.map_err(io_error)?;

    tracing::info!(path = %path.display(), turn = game.state.turn, "Game saved");
    Ok(())
}

/// Read a save file and check it against the rule set.
pub async fn load(path: &Path, rules: &RuleSet) -> Result<SaveGame, PersistError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PersistError::NoSave(path.to_path_buf()))
        }
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let game: SaveGame = serde_json::from_slice(&bytes).map_err(|source| PersistError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    if game.world != rules.title() {
        return Err(PersistError::WrongWorld {
            expected: rules.title().to_string(),
            found: game.world,
        });
    }
    game.state.validate(rules)?;

    tracing::info!(path = %path.display(), turn = game.state.turn, "Game loaded");
    Ok(game)
}

/// One transcript line per turn.
#[derive(Debug, Serialize)]
struct TranscriptEntry<'a> {
    turn: u32,
    input: &'a str,
    proposal: &'a game_rules::Proposal,
    outcome: &'a game_rules::TurnOutcome,
    changes: &'a [game_rules::StateChange],
    narration: &'a str,
}

/// Append-only JSON Lines transcript.
#[derive(Debug, Clone)]
pub struct Transcript {
    path: PathBuf,
}

impl Transcript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &TurnRecord, narration: &str) -> Result<(), PersistError> {
        let io_error = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        let entry = TranscriptEntry {
            turn: record.number,
            input: &record.input,
            proposal: &record.proposal,
            outcome: &record.outcome,
            changes: &record.changes,
            narration,
        };
        let mut line = serde_json::to_string(&entry).map_err(|source| PersistError::Format {
            path: self.path.clone(),
            source,
        })?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_error)?;
        file.write_all(line.as_bytes()).await.map_err(io_error)?;
        file.flush().await.map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_rules::{adjudicate, CandidateIntent, ItemId, TurnLog};

    fn rules() -> RuleSet {
        RuleSet::from_json_str(
            r#"{
                "title": "Cellar",
                "start": { "location": "cellar", "inventory": ["torch"] },
                "locations": [{ "id": "cellar" }],
                "items": [{ "id": "torch" }],
                "flags_default": { "lit": true }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves").join("game.json");
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.inventory.remove(&ItemId::new("torch"));
        state.turn = 4;

        save(&path, &SaveGame::new(state.clone(), 7, &rules)).await.unwrap();
        let loaded = load(&path, &rules).await.unwrap();

        assert_eq!(loaded.state, state);
        assert_eq!(loaded.turns_taken, 7);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(&dir.path().join("nope.json"), &rules()).await;
        assert!(matches!(result, Err(PersistError::NoSave(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.json");
        let rules = rules();
        let mut state = GameState::new(&rules);
        state.flags.insert("dragon_slain".into(), game_rules::FlagValue::Bool(true));

        save(&path, &SaveGame::new(state, 1, &rules)).await.unwrap();
        assert!(matches!(
            load(&path, &rules).await,
            Err(PersistError::Incompatible(StateError::UnknownFlag(_)))
        ));

        tokio::fs::write(&path, b"{ not json").await.unwrap();
        assert!(matches!(load(&path, &rules).await, Err(PersistError::Format { .. })));
    }

    #[tokio::test]
    async fn test_transcript_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = Transcript::new(dir.path().join("logs").join("transcript.jsonl"));
        let rules = rules();
        let state = GameState::new(&rules);
        let mut log = TurnLog::new();

        adjudicate("drop torch", CandidateIntent::drop_item("torch").into(), &state, &rules, &mut log);
        adjudicate("dance", game_rules::Proposal::unrecognized("?"), &state, &rules, &mut log);
        for record in log.records() {
            transcript.append(record, "narration").await.unwrap();
        }

        let contents = tokio::fs::read_to_string(transcript.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["turn"], 1);
        assert_eq!(lines[0]["input"], "drop torch");
        assert!(lines[0]["outcome"].get("applied").is_some());
        assert_eq!(lines[1]["narration"], "narration");
    }
}
