use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::errors::TransformError;
use crate::domain::models::action::{Action, ActionRequest};
use crate::domain::models::session::Chunk;

/// Ordered, single-pass sequence of chunks from an established stream.
pub type ChunkStream = BoxStream<'static, Result<Chunk, TransformError>>;

/// Payload sent to the transformation service.
///
/// ```json
/// {"text": "...", "modelId": "gpt-4o", "temperature": 0.7,
///  "action": "translate", "actionParams": {"language": "French"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    pub text: String,
    pub model_id: String,
    pub temperature: f32,
    #[serde(flatten)]
    pub action: Action,
}

impl TransformRequest {
    pub fn new(request: &ActionRequest, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model_id: request.model_id.clone(),
            temperature: request.temperature,
            action: request.action.clone(),
        }
    }
}

/// Streaming text-transformation backend.
#[async_trait]
pub trait TransformService: Send + Sync {
    /// Short identifier used in logs
    fn service_name(&self) -> &str;

    /// Open one stream for `request`.
    ///
    /// Returning `Ok` means the stream is established. Errors after that point
    /// arrive as items of the returned stream.
    async fn open_stream(&self, request: &TransformRequest) -> Result<ChunkStream, TransformError>;
}
