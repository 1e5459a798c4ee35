use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The kind of artifact a generation job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// A LaTeX study guide.
    StudyGuide,
    /// A Beamer slide deck.
    Presentation,
}

impl GenerationKind {
    /// Canonical snake_case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StudyGuide => "study_guide",
            Self::Presentation => "presentation",
        }
    }

    /// URL path segment used by the backend for this kind.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::StudyGuide => "study-guide",
            Self::Presentation => "presentation",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "study_guide" | "study-guide" => Ok(Self::StudyGuide),
            "presentation" => Ok(Self::Presentation),
            other => Err(CoreError::Validation(format!(
                "Unknown generation kind '{other}'. Must be one of: study_guide, presentation"
            ))),
        }
    }
}
