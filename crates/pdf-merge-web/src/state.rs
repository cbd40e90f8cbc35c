use pdf_merge_core::{AppConfig, MergeLimits};

/// Global application state
pub struct AppState {
    config: AppConfig,
}

impl AppState {
    pub const fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub const fn limits(&self) -> &MergeLimits {
        &self.config.limits
    }

    /// Minimum selection the bundled upload page asks for.
    pub const fn min_files(&self) -> usize {
        self.config.client.min_files
    }

    /// Whether internal error text is sent to clients.
    pub const fn expose_error_detail(&self) -> bool {
        self.config.server.expose_error_detail
    }

    /// Transport-level cap on the request body.
    pub fn body_limit(&self) -> usize {
        self.config.server.body_limit(&self.config.limits)
    }
}
