// saem/src/main.rs
use saem::api::{self, AppState};
use saem::config::AppConfig;
use saem::gemini::GeminiClient;
use saem::knowledge;
use saem::model::{self, CANDIDATE_MODELS};
use saem::session::SessionStore;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // The API key is the one fatal configuration error.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    println!("📚 Loading teaching material from {} ...", config.data_dir.display());
    let knowledge = knowledge::knowledge(&config.data_dir);

    println!("🔌 Probing model variants...");
    let client = GeminiClient::new(config.api_key.clone(), config.base_url.clone());
    let selected = model::select_once(client.candidates(&CANDIDATE_MODELS)).await;
    match &selected {
        Some(selected) => println!("✅ 연결 성공! ({})", selected.name),
        None => println!("{}", api::ALL_MODELS_DOWN),
    }

    let state = AppState {
        model: selected,
        knowledge,
        sessions: SessionStore::new(),
    };

    println!("🩺 Starting server on http://{} ...", config.bind_addr());
    api::start_server(&config, state).await
}
