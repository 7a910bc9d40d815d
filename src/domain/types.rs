//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Why a document is being served from somewhere other than the exact
/// `(locale, slug)` the caller asked for. Not an error: surfaced to the UI as
/// a machine-readable banner reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// A translation exists but its current revision is unapproved; the
    /// approved source-locale document is served instead.
    TranslationNotApproved,
    /// No translation exists; the source-locale document is served.
    NoTranslation,
    /// The document exists but has no approved content at all.
    NoContent,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::TranslationNotApproved => "translation_not_approved",
            FallbackReason::NoTranslation => "no_translation",
            FallbackReason::NoContent => "no_content",
        }
    }
}

/// Progress of a localization relative to its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslationStatus {
    #[serde(rename = "outdated")]
    Outdated,
    #[serde(rename = "in-progress")]
    InProgress,
}

/// Number of source revisions a translation may lag behind before it is
/// reported as outdated rather than in progress.
pub const TRANSLATION_OUTDATED_AGE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    MoveTree,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::MoveTree => "move_tree",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed => "failed",
        }
    }
}
