//! Engine commands handled without consulting the game master.

/// A command recognized before any interpretation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    Inventory,
    Save,
    Load,
    Quit,
}

impl MetaCommand {
    /// Parse a trimmed input line, ignoring case.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "help" | "?" => Some(MetaCommand::Help),
            "inventory" | "inv" | "i" => Some(MetaCommand::Inventory),
            "save" => Some(MetaCommand::Save),
            "load" => Some(MetaCommand::Load),
            "quit" | "exit" => Some(MetaCommand::Quit),
            _ => None,
        }
    }
}

pub const HELP_TEXT: &str = "\
--- Help ---
Type what you want to do (e.g., 'look at the chest', 'go to the forest').

Engine commands:
  help        - Show this message
  inventory   - Check your items
  save        - Save your game
  load        - Load your last save
  quit        - Exit the game
------------";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(MetaCommand::parse("  QUIT "), Some(MetaCommand::Quit));
        assert_eq!(MetaCommand::parse("exit"), Some(MetaCommand::Quit));
        assert_eq!(MetaCommand::parse("Inventory"), Some(MetaCommand::Inventory));
        assert_eq!(MetaCommand::parse("save the princess"), None);
        assert_eq!(MetaCommand::parse(""), None);
    }
}
