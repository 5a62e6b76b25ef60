use std::sync::Arc;

use crate::annotate::AnnotateOptions;
use crate::config::Config;
use crate::session::SessionStore;
use crate::storage::Storage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Resolved `uploads/` and `downloads/` directories.
    pub storage: Arc<Storage>,
    /// Pluggable session backend. Default: FsSessionStore under the uploads directory.
    pub sessions: Arc<dyn SessionStore>,
    pub annotate_options: AnnotateOptions,
}
