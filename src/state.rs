use crate::db::Database;

/// Application state shared across HTTP handlers.
///
/// Wrapped in `Arc` and handed to handlers through Axum's State extraction.
/// The uploads route carries its own state and does not use this one.
#[derive(Clone)]
pub struct AppState {
    /// Database handle, used by the health probe
    pub db: Database,
}
