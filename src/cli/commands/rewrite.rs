//! Implementation of the `composer rewrite` command.
//!
//! Loads a text file into an in-memory document, runs one action through the
//! orchestrator and writes the result back out. Ctrl-C cancels the action;
//! whatever was streamed so far stays in the document.

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cli::output::progress::{create_spinner_with_message, hidden_spinner, ProgressBarExt};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::ErrorKind;
use crate::domain::models::{Action, ActionKind, ActionRequest, Config, Position, TextRange};
use crate::infrastructure::document::MemoryDocument;
use crate::infrastructure::transform::{HttpTransformService, RetryPolicy};
use crate::services::{
    ActionEvent, ActionOrchestrator, OrchestratorSettings, StreamingTransformClient,
};

#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// Text file to rewrite
    pub file: PathBuf,

    /// Action to run (see `composer actions`)
    #[arg(short, long)]
    pub action: ActionKind,

    /// Character range to rewrite, e.g. `10..42` (whole document if omitted)
    #[arg(short, long, value_parser = parse_selection)]
    pub selection: Option<TextRange>,

    /// Model identifier (defaults to `composer.default_model`)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature, 0.0 to 2.0 (defaults to `composer.default_temperature`)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    #[command(flatten)]
    pub params: ActionParams,

    /// Write the result back into FILE
    #[arg(long, conflicts_with = "output")]
    pub in_place: bool,

    /// Write the result to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Action-specific parameters; each action reads at most one.
#[derive(Args, Debug, Default)]
pub struct ActionParams {
    /// Target language (translate)
    #[arg(long)]
    pub language: Option<String>,

    /// Target region (localization)
    #[arg(long)]
    pub region: Option<String>,

    /// Target length in percent of the original (length)
    #[arg(long)]
    pub percentage: Option<u16>,

    /// Target reading level (readingLevel)
    #[arg(long)]
    pub level: Option<String>,

    /// Target audience (audience)
    #[arg(long)]
    pub audience: Option<String>,

    /// Target tone (tone)
    #[arg(long)]
    pub tone: Option<String>,

    /// Intended purpose (intent)
    #[arg(long)]
    pub intent: Option<String>,

    /// Subject domain (domain)
    #[arg(long)]
    pub domain: Option<String>,
}

fn parse_selection(value: &str) -> Result<TextRange, String> {
    let (start, end) = value
        .split_once("..")
        .ok_or_else(|| format!("expected START..END, got '{value}'"))?;
    let start: usize = start
        .trim()
        .parse()
        .map_err(|err| format!("invalid start '{start}': {err}"))?;
    let end: usize = end
        .trim()
        .parse()
        .map_err(|err| format!("invalid end '{end}': {err}"))?;
    Ok(TextRange::new(Position(start), Position(end)))
}

fn required(value: Option<&String>, flag: &str, kind: ActionKind) -> Result<String> {
    value
        .cloned()
        .ok_or_else(|| anyhow!("--{flag} is required for the {kind} action"))
}

/// Build the typed action for `kind` from the command-line parameters.
pub fn build_action(kind: ActionKind, params: &ActionParams) -> Result<Action> {
    let action = match kind {
        ActionKind::Grammar => Action::Grammar,
        ActionKind::Clarity => Action::Clarity,
        ActionKind::Summarize => Action::Summarize,
        ActionKind::Structure => Action::Structure,
        ActionKind::Plagiarism => Action::Plagiarism,
        ActionKind::Translate => Action::Translate {
            language: required(params.language.as_ref(), "language", kind)?,
        },
        ActionKind::Localization => Action::Localization {
            region: required(params.region.as_ref(), "region", kind)?,
        },
        ActionKind::Length => Action::Length {
            percentage: params
                .percentage
                .ok_or_else(|| anyhow!("--percentage is required for the {kind} action"))?,
        },
        ActionKind::ReadingLevel => Action::ReadingLevel {
            level: required(params.level.as_ref(), "level", kind)?,
        },
        ActionKind::Audience => Action::Audience {
            audience: required(params.audience.as_ref(), "audience", kind)?,
        },
        ActionKind::Tone => Action::Tone {
            tone: required(params.tone.as_ref(), "tone", kind)?,
        },
        ActionKind::Intent => Action::Intent {
            intent: required(params.intent.as_ref(), "intent", kind)?,
        },
        ActionKind::Domain => Action::Domain {
            domain: required(params.domain.as_ref(), "domain", kind)?,
        },
    };
    Ok(action)
}

/// A rewrite that ended without completing, with the pipeline's error kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RewriteFailed {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStatus {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct RewriteOutput {
    pub file: PathBuf,
    pub action: ActionKind,
    pub status: RewriteStatus,
    pub chunks_applied: usize,
    /// Where the result was written, `None` for stdout
    pub written_to: Option<PathBuf>,
    pub error: Option<String>,
    /// Resulting document text when it is not written to a file
    pub document: Option<String>,
}

impl CommandOutput for RewriteOutput {
    fn to_human(&self) -> String {
        match (&self.document, &self.written_to) {
            (Some(document), _) => document.clone(),
            (None, Some(path)) => format!(
                "Rewrote {} with {} ({} chunk(s)) -> {}",
                self.file.display(),
                self.action,
                self.chunks_applied,
                path.display()
            ),
            (None, None) => format!(
                "{} was left unchanged ({} chunk(s) streamed before the action stopped)",
                self.file.display(),
                self.chunks_applied
            ),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RewriteArgs, config: &Config, json_mode: bool) -> Result<()> {
    let original = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let mut document = MemoryDocument::new(original);
    if let Some(selection) = args.selection {
        document
            .set_selection(selection.start, selection.end)
            .with_context(|| format!("Selection {selection} is outside the document"))?;
    }

    let action = build_action(args.action, &args.params)?;
    let request = ActionRequest::new(
        action,
        args.model
            .clone()
            .unwrap_or_else(|| config.composer.default_model.clone()),
        args.temperature
            .unwrap_or(config.composer.default_temperature),
    );

    let service = HttpTransformService::from_config(&config.service)
        .context("Failed to create transform service client")?;
    let client = StreamingTransformClient::new(
        Arc::new(service),
        RetryPolicy::from_config(&config.retry),
    );
    let document = Arc::new(Mutex::new(document));
    let orchestrator = ActionOrchestrator::new(
        Arc::clone(&document),
        client,
        OrchestratorSettings::from(&config.composer),
    );

    let mut events = orchestrator.subscribe_events();
    orchestrator.open_panel().await;
    orchestrator.dispatch(request)?;

    let spinner = if json_mode {
        hidden_spinner()
    } else {
        create_spinner_with_message(format!("Rewriting with {}...", args.action))
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    let terminal = loop {
        tokio::select! {
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                spinner.set_message("Cancelling...");
                orchestrator.cancel_active();
            }
            event = events.recv() => match event {
                Ok(ActionEvent::ChunkApplied { index, .. }) => {
                    spinner.set_message(format!("{} chunk(s) applied", index + 1));
                }
                Ok(event) if event.is_terminal() => break event,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Progress events lagged"),
                Err(RecvError::Closed) => bail!("Orchestrator stopped without reporting an outcome"),
            },
        }
    };

    orchestrator.close_panel().await;
    let content = document.lock().await.content().to_string();

    let (status, chunks_applied, failure) = match &terminal {
        ActionEvent::Completed { summary, .. } => {
            spinner.finish_success(format!("{} chunk(s) applied", summary.chunks_applied));
            (RewriteStatus::Completed, summary.chunks_applied, None)
        }
        ActionEvent::Cancelled { chunks_applied, .. } => {
            spinner.finish_warning("Cancelled");
            let failure = RewriteFailed {
                kind: ErrorKind::Cancelled,
                message: "Rewrite cancelled".to_string(),
            };
            (RewriteStatus::Cancelled, *chunks_applied, Some(failure))
        }
        ActionEvent::Failed {
            kind,
            message,
            chunks_applied,
            ..
        } => {
            spinner.finish_error(message.clone());
            let failure = RewriteFailed {
                kind: *kind,
                message: message.clone(),
            };
            (RewriteStatus::Failed, *chunks_applied, Some(failure))
        }
        other => bail!("Unexpected terminal event: {other:?}"),
    };

    // Partial results are only shown, never written over a file
    let destination = if args.in_place {
        Some(args.file.clone())
    } else {
        args.output.clone()
    };
    let show_document = destination.is_none();
    let written_to = match destination {
        Some(path) if status == RewriteStatus::Completed => {
            tokio::fs::write(&path, &content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path)
        }
        _ => None,
    };

    let result = RewriteOutput {
        file: args.file,
        action: args.action,
        status,
        chunks_applied,
        written_to,
        error: failure
            .as_ref()
            .filter(|failed| failed.kind != ErrorKind::Cancelled)
            .map(|failed| failed.message.clone()),
        document: show_document.then_some(content),
    };
    output(&result, json_mode);

    match failure {
        None => Ok(()),
        Some(failure) => Err(failure.into()),
    }
}
