use std::sync::Arc;

use fysiocode_core::Resolver;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }
}
