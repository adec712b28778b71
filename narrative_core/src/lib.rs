//! # Narrative Core (The Cortex)
//!
//! The AI side of the adventure. This crate turns free player text into
//! proposals for `game_rules`, tells the engine's decisions back as prose and
//! runs the session loop around both.
//!
//! ## Core Components
//!
//! - **llm**: The language model port, an Ollama adapter and a retrying wrapper
//! - **context_assembler**: Picks the state, rules and history a prompt needs
//! - **interpreter**: Player text to a [`game_rules::Proposal`]
//! - **narrator**: A [`game_rules::Resolution`] to player-facing text
//! - **session**: The turn loop, engine commands, save and load
//!
//! ## Design Philosophy
//!
//! - **The engine decides**: Nothing the model says changes the world directly
//! - **Fail soft**: A silent or confused model degrades a turn, never the session

pub mod config;
pub mod context_assembler;
pub mod interpreter;
pub mod llm;
pub mod narrator;
pub mod persist;
pub mod prompts;
pub mod session;

pub use config::{Config, ConfigError, LlmConfig, SessionConfig};
pub use context_assembler::*;
pub use interpreter::{IntentInterpreter, Interpretation};
pub use narrator::Narrator;
pub use session::*;
