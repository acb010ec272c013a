use actix_cors::Cors;
use actix_web::cookie::Cookie;
use actix_web::{web, App, Error, HttpRequest, HttpResponse, HttpServer};
use chrono::Utc;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::{self, TurnEvent};
use crate::config::AppConfig;
use crate::model::SelectedModel;
use crate::session::SessionStore;

/// Message shown when every model variant failed its probe.
pub const ALL_MODELS_DOWN: &str = "😭 모든 AI 모델 연결에 실패했어요. 잠시 후 다시 시도해주세요.";

const SESSION_COOKIE: &str = "saem_session";

static CHAT_PAGE: &str = include_str!("../../assets/chat.html");

/// Everything the handlers need, injected per worker.
#[derive(Clone)]
pub struct AppState {
    pub model: Option<SelectedModel>,
    pub knowledge: &'static str,
    pub sessions: SessionStore,
}

#[derive(serde::Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Generate a short request ID for correlation
fn generate_request_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .finish()
}

// The cookie is minted here on first contact; the flag tells the handler to
// attach Set-Cookie. A garbled cookie value starts a fresh session.
fn session_id(req: &HttpRequest) -> (Uuid, bool) {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if let Ok(id) = Uuid::parse_str(cookie.value()) {
            return (id, false);
        }
    }
    (Uuid::new_v4(), true)
}

/// One SSE frame per turn event, one JSON object per frame.
fn sse_frame(event: &TurnEvent) -> String {
    let payload = match event {
        TurnEvent::Delta(text) => json!({ "delta": text }),
        TurnEvent::Done => json!({ "done": true }),
        TurnEvent::Error(message) => json!({ "error": message }),
    };
    format!("data: {}\n\n", payload)
}

pub async fn chat_page() -> Result<HttpResponse, Error> {
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(CHAT_PAGE))
}

pub async fn model_status(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();
    match &state.model {
        Some(selected) => Ok(HttpResponse::Ok().json(json!({
            "status": "connected",
            "model": selected.name,
            "request_id": request_id
        }))),
        None => Ok(HttpResponse::Ok().json(json!({
            "status": "error",
            "message": ALL_MODELS_DOWN,
            "request_id": request_id
        }))),
    }
}

pub async fn history(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();
    let (session, minted) = session_id(&req);
    let messages = state.sessions.messages(session);

    let mut response = HttpResponse::Ok();
    if minted {
        response.cookie(session_cookie(session));
    }
    Ok(response.json(json!({
        "messages": messages,
        "request_id": request_id
    })))
}

pub async fn chat_stream(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();
    let (session, minted) = session_id(&req);

    let text = body.message.trim().to_string();
    if text.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "status": "error",
            "message": "질문을 입력해주세요.",
            "request_id": request_id
        })));
    }

    let Some(selected) = state.model.clone() else {
        warn!("[{}] Chat rejected: no model connected", request_id);
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "error",
            "message": ALL_MODELS_DOWN,
            "request_id": request_id
        })));
    };

    info!(
        "[{}] Turn started, {} chars from session {}",
        request_id,
        text.chars().count(),
        session
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let knowledge = state.knowledge;
    let sessions = state.sessions.clone();
    actix_web::rt::spawn(async move {
        chat::handle_turn(selected.handle, knowledge, &sessions, session, &text, &tx).await;
    });

    let frames =
        UnboundedReceiverStream::new(rx).map(|event| Ok::<_, Error>(web::Bytes::from(sse_frame(&event))));

    let mut response = HttpResponse::Ok();
    response.content_type("text/event-stream");
    response.insert_header(("Cache-Control", "no-cache"));
    if minted {
        response.cookie(session_cookie(session));
    }
    Ok(response.streaming(frames))
}

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let request_id = generate_request_id();
    match &state.model {
        Some(selected) => Ok(HttpResponse::Ok().json(json!({
            "status": "healthy",
            "model": selected.name,
            "knowledge_chars": state.knowledge.chars().count(),
            "build_time": env!("BUILD_TIME"),
            "git_sha": env!("GIT_SHA"),
            "timestamp": Utc::now().to_rfc3339(),
            "request_id": request_id
        }))),
        None => Ok(HttpResponse::ServiceUnavailable().json(json!({
            "status": "unhealthy",
            "model": null,
            "error": ALL_MODELS_DOWN,
            "knowledge_chars": state.knowledge.chars().count(),
            "timestamp": Utc::now().to_rfc3339(),
            "request_id": request_id
        }))),
    }
}

/// Route table, shared by the server and the test harness.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // ============================================================================
    // PAGE & CHAT ROUTES
    // ============================================================================
    cfg.route("/", web::get().to(chat_page))
        .route("/status", web::get().to(model_status))
        .route("/history", web::get().to(history))
        .route("/chat", web::post().to(chat_stream))
        .route("/health", web::get().to(health_check));
}

pub fn start_server(
    config: &AppConfig,
    state: AppState,
) -> impl std::future::Future<Output = std::io::Result<()>> {
    // Snapshot needed config values to satisfy 'static factory closure
    let bind_addr = config.bind_addr();
    let state_data = web::Data::new(state);

    let http_server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state_data.clone())
            .wrap(cors)
            .configure(configure_routes)
    });
    http_server
        .bind(bind_addr.clone())
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {}", bind_addr, e))
        .run()
}
