// Public modules
pub mod api;
pub mod boundary;
pub mod chat;
pub mod client;
pub mod error;
pub mod render;
pub mod session;
pub mod sse;
pub mod store;
pub mod stream;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use api::ChatApi;
pub use boundary::ErrorBoundary;
pub use client::GustoBot;
pub use error::{Error, Operation, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use session::{ChatSession, ExchangeState, SendOutcome};
pub use store::{FileStore, MemoryStore, SESSION_ID_KEY, SessionStore};
pub use stream::{ChatStream, StreamCancel};
pub use types::*;
