use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{test, web, App};
use saem::api::{configure_routes, AppState, ALL_MODELS_DOWN};
use saem::chat::{Role, GREETING};
use saem::model::{GenerativeModel, ModelError, SelectedModel, TextStream};
use saem::session::SessionStore;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Scripted model: replays fixed deltas, or refuses every request
struct FixedModel {
    deltas: Vec<String>,
    refuse: bool,
}

#[async_trait::async_trait]
impl GenerativeModel for FixedModel {
    async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        if self.refuse {
            return Err(ModelError::ConnectionFailed("refused".to_string()));
        }
        Ok(self.deltas.concat())
    }

    async fn stream_generate(&self, _prompt: &str) -> Result<TextStream, ModelError> {
        if self.refuse {
            return Err(ModelError::ConnectionFailed("refused".to_string()));
        }
        let items: Vec<Result<String, ModelError>> =
            self.deltas.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "gemini-1.5-flash"
    }
}

fn state_with(model: Option<FixedModel>) -> AppState {
    AppState {
        model: model.map(|m| SelectedModel {
            name: m.model_name().to_string(),
            handle: Arc::new(m),
        }),
        knowledge: "",
        sessions: SessionStore::new(),
    }
}

fn working_state(deltas: &[&str]) -> AppState {
    state_with(Some(FixedModel {
        deltas: deltas.iter().map(|d| d.to_string()).collect(),
        refuse: false,
    }))
}

/// Parses SSE body text into the JSON payload of each data frame
fn sse_payloads(body: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(|payload| serde_json::from_str(payload).expect("Frame should be valid JSON"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_page_serves_the_chat_ui() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(working_state(&[])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body = String::from_utf8(test::read_body(resp).await.to_vec())
            .expect("Page should be UTF-8");
        assert!(body.contains("4.우리 몸의 구조와 기능"));
        assert!(body.contains("질문 입력..."));
        assert!(body.contains("선생님과 함께 우리 몸에 대해 재미있게 알아보아요!"));
    }

    #[actix_web::test]
    async fn test_status_reports_the_connected_model() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(working_state(&[])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "connected");
        assert_eq!(body["model"], "gemini-1.5-flash");
    }

    #[actix_web::test]
    async fn test_status_reports_failure_when_no_model_survived() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(None)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], ALL_MODELS_DOWN);
    }

    #[actix_web::test]
    async fn test_history_greets_new_sessions_and_sets_the_cookie() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(working_state(&[])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/history").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let set_cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .expect("First contact should set the session cookie")
            .to_str()
            .expect("Cookie should be ASCII");
        assert!(set_cookie.contains("saem_session="));

        let body: Value = test::read_body_json(resp).await;
        let messages = body["messages"]
            .as_array()
            .expect("History should carry a messages array");
        assert_eq!(messages.len(), 1, "New session starts with the greeting only");
        assert_eq!(messages[0]["role"], "assistant");
        assert_eq!(messages[0]["content"], GREETING);
    }

    #[actix_web::test]
    async fn test_completed_turn_streams_deltas_and_appends_two_messages() {
        let state = working_state(&["심장은 ", "펌프야"]);
        let sessions = state.sessions.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let session = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/chat")
            .cookie(Cookie::new("saem_session", session.to_string()))
            .set_json(serde_json::json!({ "message": "심장은 무슨 일을 해?" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert_eq!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .expect("Streaming response should declare a content type"),
            "text/event-stream"
        );

        let body = String::from_utf8(test::read_body(resp).await.to_vec())
            .expect("SSE body should be UTF-8");
        let payloads = sse_payloads(&body);
        assert_eq!(payloads.len(), 3, "Two deltas and a done frame, got: {body:?}");
        assert_eq!(payloads[0]["delta"], "심장은 ");
        assert_eq!(payloads[1]["delta"], "펌프야");
        assert_eq!(payloads[2]["done"], true);

        let messages = sessions.messages(session);
        assert_eq!(messages.len(), 3, "greeting + user + assistant");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "심장은 무슨 일을 해?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "심장은 펌프야");
    }

    #[actix_web::test]
    async fn test_failed_turn_keeps_the_user_message_only() {
        let state = state_with(Some(FixedModel {
            deltas: vec![],
            refuse: true,
        }));
        let sessions = state.sessions.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let session = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/chat")
            .cookie(Cookie::new("saem_session", session.to_string()))
            .set_json(serde_json::json!({ "message": "호흡은 왜 해?" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success(), "Turn failure still streams");

        let body = String::from_utf8(test::read_body(resp).await.to_vec())
            .expect("SSE body should be UTF-8");
        let payloads = sse_payloads(&body);
        assert_eq!(payloads.len(), 1, "A single error frame, got: {body:?}");
        let message = payloads[0]["error"]
            .as_str()
            .expect("Error frame should carry a message");
        assert!(message.starts_with("오류가 났어요: "));

        let messages = sessions.messages(session);
        assert_eq!(messages.len(), 2, "greeting + user, no assistant entry");
        assert_eq!(messages[1].role, Role::User);
    }

    #[actix_web::test]
    async fn test_blank_input_is_rejected_without_touching_the_session() {
        let state = working_state(&["무시"]);
        let sessions = state.sessions.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let session = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/chat")
            .cookie(Cookie::new("saem_session", session.to_string()))
            .set_json(serde_json::json!({ "message": "   \n\t " }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let messages = sessions.messages(session);
        assert_eq!(
            messages.len(),
            1,
            "Blank input must not add a turn, only the seed greeting exists"
        );
    }

    #[actix_web::test]
    async fn test_chat_without_a_model_answers_503() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(None)))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/chat")
            .set_json(serde_json::json!({ "message": "뼈는 몇 개야?" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 503);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], ALL_MODELS_DOWN);
    }

    #[actix_web::test]
    async fn test_health_reflects_the_selected_model() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(working_state(&[])))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"], "gemini-1.5-flash");
        assert_eq!(body["knowledge_chars"], 0);

        let degraded = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(None)))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&degraded, req).await;
        assert_eq!(resp.status(), 503);
    }
}
