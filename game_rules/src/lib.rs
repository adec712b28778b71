//! # Game Rules
//!
//! The "World Bible" crate - rule sets, game state and the enforcement engine.
//! This crate is the single source of truth for game state and does not contain any AI logic.
//!
//! ```no_run
//! use game_rules::{adjudicate, CandidateIntent, GameState, RuleSet, TurnLog};
//!
//! let rules = RuleSet::load("worlds/tower.json")?;
//! let mut state = GameState::new(&rules);
//! let mut log = TurnLog::new();
//!
//! let resolution = adjudicate("take the lamp", CandidateIntent::take("lamp").into(), &state, &rules, &mut log);
//! state = resolution.state;
//! # Ok::<(), game_rules::RuleLoadError>(())
//! ```

pub mod entities;
pub mod mechanics;
pub mod rule_set;
pub mod world_state;

pub use entities::*;
pub use mechanics::*;
pub use rule_set::*;
pub use world_state::*;
