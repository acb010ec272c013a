// src/model.rs
// Generative model abstraction and startup selection.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Error types for model operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("model connection failed: {0}")]
    ConnectionFailed(String),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

/// Incremental text deltas from a streaming generation call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send + 'static>>;

/// A hosted text model, answering either in one shot or as a delta stream.
#[async_trait::async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
    async fn stream_generate(&self, prompt: &str) -> Result<TextStream, ModelError>;
    fn model_name(&self) -> &str;
}

/// Model variants in probing order, fastest first.
pub const CANDIDATE_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];

/// One-shot prompt used to verify that a candidate actually answers.
pub const PROBE_PROMPT: &str = "test";

/// The model the process settled on at startup.
#[derive(Clone)]
pub struct SelectedModel {
    pub handle: Arc<dyn GenerativeModel>,
    pub name: String,
}

/// Probes the candidates in order with a one-shot generation and keeps the
/// first one that answers. Candidates after the winner are never contacted.
/// Every probe failing yields `None`, which stays until the process restarts.
pub async fn select_model(candidates: Vec<Box<dyn GenerativeModel>>) -> Option<SelectedModel> {
    for candidate in candidates {
        let name = candidate.model_name().to_string();
        match candidate.generate(PROBE_PROMPT).await {
            Ok(_) => {
                info!(model = %name, "model probe succeeded");
                return Some(SelectedModel {
                    handle: Arc::from(candidate),
                    name,
                });
            }
            Err(err) => {
                warn!(model = %name, error = %err, "model probe failed, trying next candidate");
            }
        }
    }
    warn!("all model probes failed, chat stays disabled until restart");
    None
}

static SELECTED: OnceCell<Option<SelectedModel>> = OnceCell::const_new();

/// Runs selection at most once per process, even when first calls race.
/// Concurrent callers share the single outcome; it is never revisited.
pub async fn select_once(candidates: Vec<Box<dyn GenerativeModel>>) -> Option<SelectedModel> {
    SELECTED
        .get_or_init(|| select_model(candidates))
        .await
        .clone()
}
