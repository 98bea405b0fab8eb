//! Common test utilities for integration tests
//!
//! Provides a scripted in-process transformation service and helpers for
//! building an orchestrator over an in-memory document.

#![allow(dead_code)]

use async_trait::async_trait;
use composer::domain::errors::TransformError;
use composer::domain::models::Chunk;
use composer::domain::ports::{ChunkStream, TransformRequest, TransformService};
use composer::infrastructure::document::MemoryDocument;
use composer::infrastructure::transform::RetryPolicy;
use composer::services::{
    ActionEvent, ActionOrchestrator, OrchestratorSettings, StreamingTransformClient,
};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// One step of a scripted response stream
#[derive(Debug, Clone)]
pub enum Step {
    Chunk(&'static str),
    Delay(Duration),
    Fail(TransformError),
    /// Never yields again
    Hang,
}

/// Transformation service that plays back a fixed script.
pub struct ScriptedService {
    establish_errors: Mutex<Vec<TransformError>>,
    steps: Vec<Step>,
    attempts: AtomicU32,
    attempt_times: Mutex<Vec<Instant>>,
    requests: Mutex<Vec<TransformRequest>>,
}

impl ScriptedService {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            establish_errors: Mutex::new(Vec::new()),
            steps,
            attempts: AtomicU32::new(0),
            attempt_times: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn chunks(chunks: &[&'static str]) -> Self {
        Self::new(chunks.iter().map(|c| Step::Chunk(*c)).collect())
    }

    /// Fail the first establishment attempts with `errors`, in order
    pub fn failing_first(mut self, errors: Vec<TransformError>) -> Self {
        self.establish_errors = Mutex::new(errors);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn attempt_times(&self) -> Vec<Instant> {
        self.attempt_times.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<TransformRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransformService for ScriptedService {
    fn service_name(&self) -> &str {
        "scripted"
    }

    async fn open_stream(&self, request: &TransformRequest) -> Result<ChunkStream, TransformError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());
        self.requests.lock().unwrap().push(request.clone());

        {
            let mut errors = self.establish_errors.lock().unwrap();
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }

        let steps = self.steps.clone().into_iter();
        let stream = stream::unfold(steps, |mut steps| async move {
            loop {
                match steps.next()? {
                    Step::Chunk(text) => return Some((Ok(Chunk::from(text)), steps)),
                    Step::Delay(duration) => tokio::time::sleep(duration).await,
                    Step::Fail(err) => return Some((Err(err), steps)),
                    Step::Hang => std::future::pending::<()>().await,
                }
            }
        });
        Ok(stream.boxed())
    }
}

pub struct Harness {
    pub orchestrator: ActionOrchestrator<MemoryDocument>,
    pub service: Arc<ScriptedService>,
    pub events: broadcast::Receiver<ActionEvent>,
}

impl Harness {
    pub fn new(document: MemoryDocument, service: ScriptedService) -> Self {
        Self::with_retry(document, service, RetryPolicy::new(3, 100, 1_000))
    }

    pub fn with_retry(document: MemoryDocument, service: ScriptedService, retry: RetryPolicy) -> Self {
        let service = Arc::new(service);
        let client = StreamingTransformClient::new(service.clone(), retry);
        let orchestrator = ActionOrchestrator::new(
            Arc::new(tokio::sync::Mutex::new(document)),
            client,
            OrchestratorSettings::default(),
        );
        let events = orchestrator.subscribe_events();
        Self {
            orchestrator,
            service,
            events,
        }
    }

    /// Wait for the next event that ends a session
    pub async fn next_terminal(&mut self) -> ActionEvent {
        loop {
            match self.events.recv().await {
                Ok(event) if event.is_terminal() => return event,
                Ok(_) => {}
                Err(err) => panic!("event channel failed: {err}"),
            }
        }
    }

    /// Wait until chunk number `index` (zero-based) has been applied
    pub async fn wait_for_chunk(&mut self, index: usize) {
        loop {
            match self.events.recv().await {
                Ok(ActionEvent::ChunkApplied { index: applied, .. }) if applied >= index => return,
                Ok(event) if event.is_terminal() => panic!("session ended early: {event:?}"),
                Ok(_) => {}
                Err(err) => panic!("event channel failed: {err}"),
            }
        }
    }

    pub async fn content(&self) -> String {
        let document = self.orchestrator.document();
        let content = document.lock().await.content().to_string();
        content
    }
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
