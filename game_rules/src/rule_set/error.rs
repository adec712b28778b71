use std::path::PathBuf;

use crate::entities::EntityType;

/// Why a rule set failed to load. Loading is all-or-nothing.
#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("failed to read rule set {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rule set is not valid {format}: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("unsupported rule set format for {0} (expected .json or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("{entry}: unknown rule kind '{kind}' (expected movement, item_use, condition_check or dialogue_gate)")]
    UnknownKind { entry: String, kind: String },

    #[error("{entry}: references unknown {entity} '{id}'")]
    DanglingReference {
        entry: String,
        entity: EntityType,
        id: String,
    },

    #[error("duplicate {collection} id '{id}'")]
    DuplicateId {
        collection: &'static str,
        id: String,
    },

    #[error("{entry}: {reason}")]
    InvalidEntry { entry: String, reason: String },
}

impl RuleLoadError {
    pub(crate) fn invalid(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        RuleLoadError::InvalidEntry {
            entry: entry.into(),
            reason: reason.into(),
        }
    }

    /// The entry that caused the failure, when the error names one.
    pub fn entry(&self) -> Option<&str> {
        match self {
            RuleLoadError::UnknownKind { entry, .. }
            | RuleLoadError::DanglingReference { entry, .. }
            | RuleLoadError::InvalidEntry { entry, .. } => Some(entry),
            RuleLoadError::DuplicateId { id, .. } => Some(id),
            _ => None,
        }
    }
}
