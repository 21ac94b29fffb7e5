//! Conflicted file model.
//!
//! The backend reports a conflicted path by which of the three index stages
//! (base, ours, theirs) it still holds. The detector turns that presence
//! pattern into the familiar two-letter status code and decides whether the
//! file needs hunk resolution or a keep/delete decision.

use serde::{Deserialize, Serialize};

use super::markers::Hunk;

// ---------------------------------------------------------------------------
// Status codes
// ---------------------------------------------------------------------------

/// Two-letter conflict status as shown by `git status --short`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Both modified.
    UU,
    /// Both added.
    AA,
    /// Both deleted.
    DD,
    /// Added by us.
    AU,
    /// Added by them.
    UA,
    /// Deleted by them.
    UD,
    /// Deleted by us.
    DU,
}

/// An index stage of a conflicted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Base = 1,
    Ours = 2,
    Theirs = 3,
}

impl StatusCode {
    pub const ALL: [StatusCode; 7] = [
        Self::UU,
        Self::AA,
        Self::DD,
        Self::AU,
        Self::UA,
        Self::UD,
        Self::DU,
    ];

    /// Derive the code from which index stages are present.
    pub fn from_stages(base: bool, ours: bool, theirs: bool) -> Option<Self> {
        match (base, ours, theirs) {
            (true, true, true) => Some(Self::UU),
            (false, true, true) => Some(Self::AA),
            (true, false, false) => Some(Self::DD),
            (false, true, false) => Some(Self::AU),
            (false, false, true) => Some(Self::UA),
            (true, true, false) => Some(Self::UD),
            (true, false, true) => Some(Self::DU),
            (false, false, false) => None,
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UU => "UU",
            Self::AA => "AA",
            Self::DD => "DD",
            Self::AU => "AU",
            Self::UA => "UA",
            Self::UD => "UD",
            Self::DU => "DU",
        }
    }

    /// Both sides carry content, so the file has hunks to resolve.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::UU | Self::AA)
    }

    pub fn is_structural(&self) -> bool {
        !self.is_textual()
    }

    /// The stage whose content "keep" restores.
    pub fn surviving_stage(&self) -> Option<Stage> {
        match self {
            Self::UD | Self::AU => Some(Stage::Ours),
            Self::DU | Self::UA => Some(Stage::Theirs),
            Self::DD => Some(Stage::Base),
            Self::UU | Self::AA => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::UU => "both modified",
            Self::AA => "both added",
            Self::DD => "both deleted",
            Self::AU => "added by us",
            Self::UA => "added by them",
            Self::UD => "deleted by them",
            Self::DU => "deleted by us",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Conflicted file
// ---------------------------------------------------------------------------

/// One path left conflicted by the last replay step.
///
/// Rebuilt from backend status on every refresh; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictedFile {
    pub path: String,
    pub code: StatusCode,
    /// Parsed hunks, present only for textual conflicts whose content has
    /// been loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hunks: Option<Vec<Hunk>>,
}

impl ConflictedFile {
    pub fn new(path: impl Into<String>, code: StatusCode) -> Self {
        Self {
            path: path.into(),
            code,
            hunks: None,
        }
    }

    pub fn is_textual(&self) -> bool {
        self.code.is_textual()
    }
}

/// Base, ours and theirs blobs of a conflicted path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictSides {
    pub base: Option<Vec<u8>>,
    pub ours: Option<Vec<u8>>,
    pub theirs: Option<Vec<u8>>,
}

impl ConflictSides {
    pub fn code(&self) -> Option<StatusCode> {
        StatusCode::from_stages(self.base.is_some(), self.ours.is_some(), self.theirs.is_some())
    }

    pub fn stage(&self, stage: Stage) -> Option<&[u8]> {
        match stage {
            Stage::Base => self.base.as_deref(),
            Stage::Ours => self.ours.as_deref(),
            Stage::Theirs => self.theirs.as_deref(),
        }
    }

    /// Unified diff from base to the given side, for previewing an
    /// add/delete conflict before choosing.
    pub fn preview(&self, stage: Stage) -> String {
        let base = String::from_utf8_lossy(self.base.as_deref().unwrap_or_default());
        let side = String::from_utf8_lossy(self.stage(stage).unwrap_or_default());
        diffy::create_patch(&base, &side).to_string()
    }
}
