use std::sync::Arc;

use crate::config::Config;
use crate::quiz::QuizGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Holds the provider (`Arc<dyn QuizProvider>`); swapped for a fake in tests.
    pub generator: Arc<QuizGenerator>,
}
