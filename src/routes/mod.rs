pub mod analysis;
pub mod health;
pub mod sync;

use crate::config::AppConfig;
use crate::services::github::GithubClient;
use crate::services::open_meteo::OpenMeteoClient;
use crate::services::sync::SharedSyncState;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: sqlx::PgPool,
    /// None when no GitHub token is configured
    pub(crate) github_client: Option<GithubClient>,
    pub(crate) weather_client: OpenMeteoClient,
    pub(crate) sync_state: SharedSyncState,
    pub(crate) config: AppConfig,
}
