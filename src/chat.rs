// src/chat.rs
// Conversation model and the per-turn pipeline.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::GenerativeModel;
use crate::session::SessionStore;

/// Opening line every new session starts with.
pub const GREETING: &str = "안녕! 우리 몸에 대해 궁금한 게 있니? 선생님이 알려줄게! 😊";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Persona and safety instructions, the knowledge text, and the latest
/// question. Nothing else goes in: earlier turns stay out of the prompt.
pub fn build_prompt(knowledge: &str, user_text: &str) -> String {
    format!(
        "당신은 초등학교 6학년 과학 선생님입니다.
지식: {knowledge}

[규칙]
1. 초등학생 눈높이로 쉽고 친절하게 설명하세요.
2. 욕설, 폭력, 위험한 질문은 단호하게 거절하고 올바른 태도를 지도하세요.
3. 틀린 내용을 말하면 정답을 바로 주지 말고, 힌트를 주어 스스로 생각하게 하세요.

학생: {user_text}"
    )
}

/// What one turn emits towards the browser.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Delta(String),
    Done,
    Error(String),
}

/// Runs one turn: record the question, ask the model, stream the answer,
/// record the answer. Any failure ends the turn with a single error event
/// and no assistant entry, so the next question starts clean. The caller
/// guarantees `user_text` is non-empty.
pub async fn handle_turn(
    model: Arc<dyn GenerativeModel>,
    knowledge: &str,
    sessions: &SessionStore,
    session_id: Uuid,
    user_text: &str,
    events: &UnboundedSender<TurnEvent>,
) {
    sessions.push(session_id, ChatMessage::user(user_text));

    let prompt = build_prompt(knowledge, user_text);
    let mut stream = match model.stream_generate(&prompt).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(session = %session_id, error = %err, "generation could not start");
            let _ = events.send(TurnEvent::Error(format!("오류가 났어요: {err}")));
            return;
        }
    };

    let mut answer = String::new();
    while let Some(delta) = stream.next().await {
        match delta {
            Ok(delta) => {
                answer.push_str(&delta);
                // A gone browser does not cut the turn short: the stream is
                // drained so the transcript still gets the full answer.
                let _ = events.send(TurnEvent::Delta(delta));
            }
            Err(err) => {
                warn!(session = %session_id, error = %err, "generation failed mid-stream");
                let _ = events.send(TurnEvent::Error(format!("오류가 났어요: {err}")));
                return;
            }
        }
    }

    debug!(session = %session_id, chars = answer.chars().count(), "turn completed");
    sessions.push(session_id, ChatMessage::assistant(answer));
    let _ = events.send(TurnEvent::Done);
}
