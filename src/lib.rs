//! Headless client for the assistant chat backend.
//!
//! Wraps the REST API, the SSE streaming protocol, and the client-side
//! state that sits between them: per-turn streaming sessions, the
//! tool-call ledger, and the cached mirror of server conversation
//! state. UI layers drive [`coordinator::ChatCoordinator`] and render
//! from the state it exposes.

pub mod auth;
pub mod cache;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod models;
pub mod session;
pub mod sse;
pub mod stream;

pub use client::ApiClient;
pub use coordinator::{ChatCoordinator, CoordinatorError, UiEffect};
pub use error::ApiError;
