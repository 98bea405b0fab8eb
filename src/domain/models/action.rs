//! Rewrite actions and their parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ComposerError;

/// Identifier of an action, without its parameters.
///
/// This is what the processing indicator and the error channel are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Grammar,
    Translate,
    Localization,
    Clarity,
    Length,
    ReadingLevel,
    Audience,
    Tone,
    Intent,
    Domain,
    Summarize,
    Structure,
    Plagiarism,
}

impl ActionKind {
    pub const ALL: [Self; 13] = [
        Self::Grammar,
        Self::Translate,
        Self::Localization,
        Self::Clarity,
        Self::Length,
        Self::ReadingLevel,
        Self::Audience,
        Self::Tone,
        Self::Intent,
        Self::Domain,
        Self::Summarize,
        Self::Structure,
        Self::Plagiarism,
    ];

    /// Wire identifier sent to the transformation service
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Translate => "translate",
            Self::Localization => "localization",
            Self::Clarity => "clarity",
            Self::Length => "length",
            Self::ReadingLevel => "readingLevel",
            Self::Audience => "audience",
            Self::Tone => "tone",
            Self::Intent => "intent",
            Self::Domain => "domain",
            Self::Summarize => "summarize",
            Self::Structure => "structure",
            Self::Plagiarism => "plagiarism",
        }
    }

    /// Reserved actions are listed but cannot be dispatched yet.
    pub const fn is_available(self) -> bool {
        !matches!(self, Self::Structure | Self::Plagiarism)
    }

    /// Name of the single parameter the action takes, if any
    pub const fn parameter(self) -> Option<&'static str> {
        match self {
            Self::Translate => Some("language"),
            Self::Localization => Some("region"),
            Self::Length => Some("percentage"),
            Self::ReadingLevel => Some("level"),
            Self::Audience => Some("audience"),
            Self::Tone => Some("tone"),
            Self::Intent => Some("intent"),
            Self::Domain => Some("domain"),
            Self::Grammar
            | Self::Clarity
            | Self::Summarize
            | Self::Structure
            | Self::Plagiarism => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Grammar => "Fix grammar, spelling and punctuation",
            Self::Translate => "Translate into another language",
            Self::Localization => "Adapt wording to a regional variant",
            Self::Clarity => "Make the text clearer and easier to follow",
            Self::Length => "Shorten or expand to a percentage of the original",
            Self::ReadingLevel => "Rewrite for a target reading level",
            Self::Audience => "Tailor the text to an audience",
            Self::Tone => "Change the tone",
            Self::Intent => "Rewrite to serve a stated intent",
            Self::Domain => "Adapt vocabulary to a professional domain",
            Self::Summarize => "Summarize the text",
            Self::Structure => "Restructure the text (reserved)",
            Self::Plagiarism => "Check for plagiarism (reserved)",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    /// Accepts `readingLevel`, `reading-level` and `reading_level` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// An action together with its statically-shaped parameters.
///
/// Serialized the way the transformation service expects it:
/// `{"action": "translate", "actionParams": {"language": "French"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "actionParams", rename_all = "camelCase")]
pub enum Action {
    Grammar,
    Translate { language: String },
    Localization { region: String },
    Clarity,
    Length { percentage: u16 },
    ReadingLevel { level: String },
    Audience { audience: String },
    Tone { tone: String },
    Intent { intent: String },
    Domain { domain: String },
    Summarize,
    Structure,
    Plagiarism,
}

/// Accepted range for [`Action::Length`], in percent of the original length.
pub const LENGTH_PERCENTAGE_RANGE: std::ops::RangeInclusive<u16> = 1..=500;

impl Action {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Grammar => ActionKind::Grammar,
            Self::Translate { .. } => ActionKind::Translate,
            Self::Localization { .. } => ActionKind::Localization,
            Self::Clarity => ActionKind::Clarity,
            Self::Length { .. } => ActionKind::Length,
            Self::ReadingLevel { .. } => ActionKind::ReadingLevel,
            Self::Audience { .. } => ActionKind::Audience,
            Self::Tone { .. } => ActionKind::Tone,
            Self::Intent { .. } => ActionKind::Intent,
            Self::Domain { .. } => ActionKind::Domain,
            Self::Summarize => ActionKind::Summarize,
            Self::Structure => ActionKind::Structure,
            Self::Plagiarism => ActionKind::Plagiarism,
        }
    }

    fn validate(&self) -> Result<(), ComposerError> {
        let text_param = match self {
            Self::Structure | Self::Plagiarism => {
                return Err(ComposerError::UnsupportedAction(self.kind()));
            }
            Self::Length { percentage } => {
                if !LENGTH_PERCENTAGE_RANGE.contains(percentage) {
                    return Err(ComposerError::InvalidParameters(format!(
                        "length percentage must be within {}..={}, got {percentage}",
                        LENGTH_PERCENTAGE_RANGE.start(),
                        LENGTH_PERCENTAGE_RANGE.end()
                    )));
                }
                None
            }
            Self::Translate { language: value }
            | Self::Localization { region: value }
            | Self::ReadingLevel { level: value }
            | Self::Audience { audience: value }
            | Self::Tone { tone: value }
            | Self::Intent { intent: value }
            | Self::Domain { domain: value } => Some(value),
            Self::Grammar | Self::Clarity | Self::Summarize => None,
        };

        if let Some(value) = text_param {
            if value.trim().is_empty() {
                let name = self.kind().parameter().unwrap_or("parameter");
                return Err(ComposerError::InvalidParameters(format!(
                    "{} requires a non-empty {name}",
                    self.kind()
                )));
            }
        }

        Ok(())
    }
}

/// A fully specified rewrite request. Immutable once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(flatten)]
    pub action: Action,
    pub model_id: String,
    pub temperature: f32,
}

/// Accepted sampling temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

impl ActionRequest {
    pub fn new(action: Action, model_id: impl Into<String>, temperature: f32) -> Self {
        Self {
            action,
            model_id: model_id.into(),
            temperature,
        }
    }

    pub const fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Check the request before anything is dispatched
    pub fn validate(&self) -> Result<(), ComposerError> {
        self.action.validate()?;

        if self.model_id.trim().is_empty() {
            return Err(ComposerError::InvalidParameters(
                "model id cannot be empty".to_string(),
            ));
        }

        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(ComposerError::InvalidParameters(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }

        Ok(())
    }
}
