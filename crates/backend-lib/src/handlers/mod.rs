// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! HTTP handlers for the REST side of the chat API.
pub mod messages;
pub mod users;

/// Liveness probe
pub async fn health() -> &'static str {
    "Healthy"
}
