pub mod api;
pub mod chat;
pub mod config;
pub mod extract;
pub mod gemini;
pub mod knowledge;
pub mod model;
pub mod session;
pub use chat::{ChatMessage, Role};
pub use session::SessionStore;
