use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message recorded when the collaborator answers with no usable text.
pub const EMPTY_SOLUTION_MESSAGE: &str = "No solution generated.";

/// Message recorded when a failure carries no description of its own.
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to solve the problem.";

/// Opaque identifier of a problem item, stable for the item's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemId(Uuid);

impl ProblemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ProblemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProblemId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ProblemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Academic subject hint attached to an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    #[default]
    General,
    Math,
    Physics,
    Chemistry,
    Biology,
    Programming,
    Language,
    History,
}

impl Subject {
    pub const ALL: [Subject; 8] = [
        Subject::General,
        Subject::Math,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::Programming,
        Subject::Language,
        Subject::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::General => "general",
            Subject::Math => "math",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::Programming => "programming",
            Subject::Language => "language",
            Subject::History => "history",
        }
    }

    /// Human-readable name used in prompts and terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Subject::General => "General",
            Subject::Math => "Mathematics",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::Programming => "Computer Science",
            Subject::Language => "Language & Literature",
            Subject::History => "History",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "maths" | "mathematics" => return Ok(Subject::Math),
            "cs" | "code" | "coding" => return Ok(Subject::Programming),
            _ => {}
        }
        Subject::ALL
            .into_iter()
            .find(|subject| subject.as_str() == wanted)
            .ok_or_else(|| format!("unknown subject: {}", s))
    }
}

/// Local, transient reference to a user-supplied image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    /// Displayable `data:` URI; never persisted or uploaded elsewhere.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub preview_uri: String,
}

/// Lifecycle of a problem item. `Completed` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProblemStatus {
    #[default]
    Analyzing,
    Completed { solution: String },
    Error { message: String },
}

impl ProblemStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProblemStatus::Analyzing)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProblemStatus::Analyzing => "analyzing",
            ProblemStatus::Completed { .. } => "completed",
            ProblemStatus::Error { .. } => "error",
        }
    }
}

/// Outcome reported by a solve resolver for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SolveOutcome {
    Solved(String),
    Failed(String),
}

impl SolveOutcome {
    /// Terminal status this outcome drives an item into.
    ///
    /// Blank solutions count as failures and blank failure messages get a
    /// fallback, so a terminal status never carries empty text.
    pub fn into_status(self) -> ProblemStatus {
        match self {
            SolveOutcome::Solved(text) if text.trim().is_empty() => ProblemStatus::Error {
                message: EMPTY_SOLUTION_MESSAGE.to_string(),
            },
            SolveOutcome::Solved(solution) => ProblemStatus::Completed { solution },
            SolveOutcome::Failed(message) if message.trim().is_empty() => ProblemStatus::Error {
                message: FALLBACK_ERROR_MESSAGE.to_string(),
            },
            SolveOutcome::Failed(message) => ProblemStatus::Error { message },
        }
    }
}

/// One uploaded problem and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemItem {
    pub id: ProblemId,
    pub image: ImageReference,
    #[serde(default)]
    pub subject: Subject,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: ProblemStatus,
}

impl ProblemItem {
    /// A fresh item in the `Analyzing` state.
    pub fn new(image: ImageReference, subject: Subject, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ProblemId::new(),
            image,
            subject,
            created_at,
            status: ProblemStatus::Analyzing,
        }
    }

    /// Empty unless the item completed.
    pub fn solution_text(&self) -> &str {
        match &self.status {
            ProblemStatus::Completed { solution } => solution,
            _ => "",
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ProblemStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Apply a solve outcome. Returns `false` if the item was already terminal.
    pub fn resolve(&mut self, outcome: SolveOutcome) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = outcome.into_status();
        true
    }
}
