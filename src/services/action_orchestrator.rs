//! Top-level controller for composer actions.
//!
//! Drives one action at a time through resolve, stream and patch:
//!
//! ```text
//! Idle -> Resolving -> Streaming -> Finalizing -> Idle
//!            |             |
//!            +-> Failed / Cancelled -> Idle
//! ```
//!
//! `dispatch` validates and claims the single processing slot synchronously,
//! then runs the pipeline on a spawned task. Callers observe progress through
//! the processing signal, the state signal and the event channel; failures
//! never surface anywhere else.

use futures::StreamExt;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::errors::{ComposerError, ErrorKind};
use crate::domain::models::action::{ActionKind, ActionRequest};
use crate::domain::models::config::ComposerConfig;
use crate::domain::models::document::VisualFeedback;
use crate::domain::models::scope::Scope;
use crate::domain::models::session::{
    OrchestratorState, SessionId, SessionStatus, TransformSession,
};
use crate::domain::ports::{Document, SharedDocument, TransformRequest};
use crate::services::document_patcher::{DocumentPatcher, EditSession, PatchSummary};
use crate::services::scope_tracker::ScopeTracker;
use crate::services::streaming_client::{StreamingTransformClient, TransformStream};
use crate::services::text_extractor::TextExtractor;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorSettings {
    pub visual_feedback: VisualFeedback,
}

impl From<&ComposerConfig> for OrchestratorSettings {
    fn from(config: &ComposerConfig) -> Self {
        Self {
            visual_feedback: config.visual_feedback,
        }
    }
}

/// Notification published for every action outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ActionEvent {
    Started {
        session: SessionId,
        action: ActionKind,
    },
    ChunkApplied {
        session: SessionId,
        action: ActionKind,
        /// Zero-based sequence number of the chunk
        index: usize,
    },
    Completed {
        session: SessionId,
        action: ActionKind,
        summary: PatchSummary,
    },
    Failed {
        session: SessionId,
        action: ActionKind,
        kind: ErrorKind,
        message: String,
        /// Chunks left in the document
        chunks_applied: usize,
    },
    Cancelled {
        session: SessionId,
        action: ActionKind,
        chunks_applied: usize,
    },
    /// Refused at dispatch; no session was created
    Rejected {
        action: ActionKind,
        kind: ErrorKind,
        message: String,
    },
}

impl ActionEvent {
    pub const fn action(&self) -> ActionKind {
        match self {
            Self::Started { action, .. }
            | Self::ChunkApplied { action, .. }
            | Self::Completed { action, .. }
            | Self::Failed { action, .. }
            | Self::Cancelled { action, .. }
            | Self::Rejected { action, .. } => *action,
        }
    }

    /// True for the last event a session publishes
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

struct ActiveSession {
    id: SessionId,
    action: ActionKind,
    cancel: CancellationToken,
}

/// How a session's pipeline ended, before terminal bookkeeping.
enum Outcome {
    Completed(PatchSummary),
    Failed(ComposerError, usize),
    Cancelled(usize),
}

struct Inner<D> {
    document: SharedDocument<D>,
    client: StreamingTransformClient,
    patcher: DocumentPatcher,
    extractor: TextExtractor,
    settings: OrchestratorSettings,
    scope: Mutex<ScopeTracker>,
    active: Mutex<Option<ActiveSession>>,
    processing: watch::Sender<Option<ActionKind>>,
    state: watch::Sender<OrchestratorState>,
    events: broadcast::Sender<ActionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs composer actions against a shared document, one at a time.
pub struct ActionOrchestrator<D> {
    inner: Arc<Inner<D>>,
}

impl<D> Clone for ActionOrchestrator<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Document + 'static> ActionOrchestrator<D> {
    pub fn new(
        document: SharedDocument<D>,
        client: StreamingTransformClient,
        settings: OrchestratorSettings,
    ) -> Self {
        let (processing, _) = watch::channel(None);
        let (state, _) = watch::channel(OrchestratorState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                document,
                client,
                patcher: DocumentPatcher::new(),
                extractor: TextExtractor::new(),
                settings,
                scope: Mutex::new(ScopeTracker::new()),
                active: Mutex::new(None),
                processing,
                state,
                events,
            }),
        }
    }

    pub fn document(&self) -> SharedDocument<D> {
        Arc::clone(&self.inner.document)
    }

    /// Start `request` against the current scope.
    ///
    /// Returns as soon as the action is accepted; the rewrite itself runs in
    /// the background. Must be called within a tokio runtime.
    ///
    /// # Errors
    /// - [`ComposerError::Busy`] if another action is in flight, whatever the
    ///   request; the running session is left untouched
    /// - [`ComposerError::UnsupportedAction`] / [`ComposerError::InvalidParameters`]
    ///   if the request does not validate
    pub fn dispatch(&self, request: ActionRequest) -> Result<SessionId, ComposerError> {
        let action = request.kind();

        // busy takes precedence over validation
        if let Some(active) = self.processing_action() {
            return Err(self.inner.reject_busy(action, active));
        }

        if let Err(err) = request.validate() {
            warn!(%action, error = %err, "Rejected invalid action request");
            self.inner.reject(action, &err);
            return Err(err);
        }

        let mut busy_with = None;
        let claimed = self.inner.processing.send_if_modified(|current| match current {
            Some(active) => {
                busy_with = Some(*active);
                false
            }
            None => {
                *current = Some(action);
                true
            }
        });
        if !claimed {
            return Err(self
                .inner
                .reject_busy(action, busy_with.unwrap_or(action)));
        }

        let scope = lock(&self.inner.scope).current().clone();
        let session = TransformSession::new(request, scope);
        let session_id = session.id;
        let cancel = CancellationToken::new();

        *lock(&self.inner.active) = Some(ActiveSession {
            id: session_id,
            action,
            cancel: cancel.clone(),
        });
        self.inner.emit(ActionEvent::Started {
            session: session_id,
            action,
        });

        let span = info_span!("action", session = %session_id, %action);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(session, cancel).await }.instrument(span));

        Ok(session_id)
    }

    /// Stop the running action, if any. Text already written stays.
    pub fn cancel_active(&self) -> bool {
        match lock(&self.inner.active).as_ref() {
            Some(active) => {
                info!(session = %active.id, action = %active.action, "Cancelling active action");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Panel opened: capture the scope from the current selection.
    pub async fn open_panel(&self) -> Scope {
        let document = self.inner.document.lock().await;
        lock(&self.inner.scope).capture(&*document)
    }

    /// Selection moved while the panel is open.
    pub async fn selection_changed(&self) -> Scope {
        self.open_panel().await
    }

    /// Panel closed: cancel in-flight work, wait for it to wind down and clear
    /// the scope. Calling it again is harmless.
    pub async fn close_panel(&self) {
        self.cancel_active();
        self.wait_idle().await;
        lock(&self.inner.scope).reset();
        debug!("Composer panel closed");
    }

    /// Wait until no action is processing.
    pub async fn wait_idle(&self) {
        let mut processing = self.inner.processing.subscribe();
        // The sender lives as long as `self`, so this only ends on idle.
        let _ = processing.wait_for(Option::is_none).await;
    }

    pub fn processing_action(&self) -> Option<ActionKind> {
        *self.inner.processing.borrow()
    }

    pub fn subscribe_processing(&self) -> watch::Receiver<Option<ActionKind>> {
        self.inner.processing.subscribe()
    }

    pub fn state(&self) -> OrchestratorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<OrchestratorState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ActionEvent> {
        self.inner.events.subscribe()
    }

    pub fn current_scope(&self) -> Scope {
        lock(&self.inner.scope).current().clone()
    }
}

impl<D: Document + 'static> Inner<D> {
    async fn run(&self, mut session: TransformSession, cancel: CancellationToken) {
        let action = session.request.kind();
        let outcome = self.execute(&mut session, &cancel).await;

        let event = match outcome {
            Outcome::Completed(summary) => {
                session.finish(SessionStatus::Completed);
                info!(chunks = summary.chunks_applied, "Action completed");
                ActionEvent::Completed {
                    session: session.id,
                    action,
                    summary,
                }
            }
            Outcome::Cancelled(chunks_applied) => {
                self.transition(OrchestratorState::Cancelled);
                session.finish(SessionStatus::Cancelled);
                info!(chunks_applied, "Action cancelled");
                ActionEvent::Cancelled {
                    session: session.id,
                    action,
                    chunks_applied,
                }
            }
            Outcome::Failed(err, chunks_applied) => {
                self.transition(OrchestratorState::Failed);
                session.finish(SessionStatus::Failed);
                warn!(error = %err, chunks_applied, "Action failed");
                ActionEvent::Failed {
                    session: session.id,
                    action,
                    kind: err.kind(),
                    message: err.to_string(),
                    chunks_applied,
                }
            }
        };

        lock(&self.scope).reset();
        self.transition(OrchestratorState::Idle);
        {
            let mut active = lock(&self.active);
            if active.as_ref().is_some_and(|a| a.id == session.id) {
                *active = None;
            }
        }
        // the slot is free before the outcome is published
        self.processing.send_replace(None);
        self.emit(event);
    }

    async fn execute(&self, session: &mut TransformSession, cancel: &CancellationToken) -> Outcome {
        self.transition(OrchestratorState::Resolving);

        let (request, mut edit) = {
            let mut document = self.document.lock().await;
            let extracted = match self.extractor.extract(&session.scope, &*document) {
                Ok(extracted) => extracted,
                Err(err) => return Outcome::Failed(err, 0),
            };
            if cancel.is_cancelled() {
                return Outcome::Cancelled(0);
            }
            debug!(range = %extracted.resolved.range, chars = extracted.text.chars().count(), "Scope resolved");

            let edit = match self.patcher.begin_edit(
                &mut *document,
                &extracted.resolved,
                self.settings.visual_feedback,
            ) {
                Ok(edit) => edit,
                Err(err) => return Outcome::Failed(err, 0),
            };
            (TransformRequest::new(&session.request, extracted.text), edit)
        };

        self.transition(OrchestratorState::Streaming);

        let streamed = match self.client.invoke(&request, cancel.clone()).await {
            Ok(stream) => {
                session.mark_streaming();
                self.stream_into(session, &mut edit, stream).await
            }
            Err(err) => Err(err),
        };

        let mut document = self.document.lock().await;
        match streamed {
            Ok(()) => {
                self.transition(OrchestratorState::Finalizing);
                Outcome::Completed(self.patcher.finalize(edit, &mut *document))
            }
            Err(ComposerError::Cancelled) => {
                let summary = self.patcher.abort(edit, &mut *document);
                Outcome::Cancelled(summary.chunks_applied)
            }
            Err(err) => {
                let summary = self.patcher.abort(edit, &mut *document);
                Outcome::Failed(err, summary.chunks_applied)
            }
        }
    }

    /// Apply chunks in arrival order until the stream ends.
    async fn stream_into(
        &self,
        session: &mut TransformSession,
        edit: &mut EditSession,
        mut stream: TransformStream,
    ) -> Result<(), ComposerError> {
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|source| ComposerError::StreamMid {
                chunks_applied: edit.chunks_applied(),
                source,
            })?;

            {
                let mut document = self.document.lock().await;
                self.patcher.apply_chunk(edit, &mut *document, &chunk)?;
            }

            let index = session.push_chunk(chunk);
            self.emit(ActionEvent::ChunkApplied {
                session: session.id,
                action: session.request.kind(),
                index,
            });
        }

        if stream.was_cancelled() {
            return Err(ComposerError::Cancelled);
        }
        Ok(())
    }

    fn transition(&self, next: OrchestratorState) -> bool {
        let mut refused_from = None;
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                debug!(from = %current, to = %next, "State transition");
                *current = next;
                true
            } else {
                refused_from = Some(*current);
                false
            }
        });

        if let Some(from) = refused_from {
            warn!(%from, to = %next, "Refusing invalid state transition");
            return false;
        }
        true
    }

    fn reject_busy(&self, action: ActionKind, active: ActionKind) -> ComposerError {
        let err = ComposerError::Busy { active };
        info!(%action, %active, "Action rejected while another is running");
        self.reject(action, &err);
        err
    }

    fn reject(&self, action: ActionKind, err: &ComposerError) {
        self.emit(ActionEvent::Rejected {
            action,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn emit(&self, event: ActionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let session = SessionId::new();
        let started = ActionEvent::Started {
            session,
            action: ActionKind::Grammar,
        };
        assert_eq!(started.action(), ActionKind::Grammar);
        assert!(!started.is_terminal());

        let cancelled = ActionEvent::Cancelled {
            session,
            action: ActionKind::Tone,
            chunks_applied: 2,
        };
        assert!(cancelled.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = ActionEvent::Rejected {
            action: ActionKind::ReadingLevel,
            kind: ErrorKind::Busy,
            message: "busy".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "rejected");
        assert_eq!(value["action"], "readingLevel");
        assert_eq!(value["kind"], "busy");
    }

    #[test]
    fn test_settings_from_config() {
        let config = ComposerConfig {
            visual_feedback: VisualFeedback::Highlight,
            ..ComposerConfig::default()
        };
        assert_eq!(
            OrchestratorSettings::from(&config).visual_feedback,
            VisualFeedback::Highlight
        );
    }
}
